//! Runs against a live database when `GRANTOR_TEST_DSN` is set; skipped otherwise.

use anyhow::{Context, Result, anyhow};
use chrono::{TimeDelta, Utc};
use grantor::{
    grant::AccountId,
    password,
    store::{LockoutTrigger, PgUserStore, StoreError, UserStore, postgres::SCHEMA_SQL},
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc};
use uuid::Uuid;

struct Seeded {
    store: Arc<PgUserStore>,
    id: AccountId,
    username: String,
}

async fn seeded_store() -> Result<Option<Seeded>> {
    let Ok(dsn) = env::var("GRANTOR_TEST_DSN") else {
        eprintln!("GRANTOR_TEST_DSN not set, skipping");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&dsn)
        .await
        .context("Failed to connect to test database")?;
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(&pool)
        .await
        .context("Failed to apply schema")?;

    let params = argon2::Params::new(8, 1, 1, None).map_err(|e| anyhow!(e.to_string()))?;
    let hash = password::hash_password("correct", params).map_err(|e| anyhow!(e.to_string()))?;

    let id = Uuid::new_v4();
    let username = format!("Alice-{}", id.simple());
    sqlx::query(
        "INSERT INTO accounts (id, username, email, password_hash, security_stamp, roles) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(&username)
    .bind("alice@grantor.dev")
    .bind(hash)
    .bind("stamp")
    .bind(vec!["admin".to_string()])
    .execute(&pool)
    .await?;
    sqlx::query(
        "INSERT INTO account_claims (account_id, claim_type, claim_value) VALUES ($1, $2, $3)",
    )
    .bind(id)
    .bind("department")
    .bind("finance")
    .execute(&pool)
    .await?;

    Ok(Some(Seeded {
        store: Arc::new(PgUserStore::new(pool)),
        id: AccountId::new(id),
        username,
    }))
}

#[tokio::test]
async fn find_and_verify() -> Result<()> {
    let Some(seeded) = seeded_store().await? else {
        return Ok(());
    };

    let account = seeded
        .store
        .find_by_username(&seeded.username.to_uppercase())
        .await?
        .context("account not found by case-insensitive username")?;
    assert_eq!(account.id, seeded.id);
    assert_eq!(account.roles, vec!["admin".to_string()]);
    assert_eq!(
        account.claims,
        vec![("department".to_string(), "finance".to_string())]
    );

    assert!(
        seeded
            .store
            .verify_password(&account, &SecretString::from("correct"))
            .await?
    );
    assert!(
        !seeded
            .store
            .verify_password(&account, &SecretString::from("wrong"))
            .await?
    );
    assert!(seeded.store.find_by_username("nobody-here").await?.is_none());
    seeded.store.ping().await?;
    Ok(())
}

#[tokio::test]
async fn concurrent_increments_are_atomic() -> Result<()> {
    let Some(seeded) = seeded_store().await? else {
        return Ok(());
    };

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = Arc::clone(&seeded.store);
        let id = seeded.id;
        handles.push(tokio::spawn(async move {
            store
                .increment_failed_count(id, None)
                .await
                .map(|attempt| attempt.count)
        }));
    }
    let mut counts = Vec::new();
    for handle in handles {
        counts.push(handle.await??);
    }
    counts.sort_unstable();
    assert_eq!(counts, (1..=20).collect::<Vec<u32>>());

    assert!(seeded.store.reset_failed_count(seeded.id, None).await?);
    let account = seeded
        .store
        .find_by_username(&seeded.username)
        .await?
        .context("account")?;
    assert_eq!(account.failed_attempt_count, 0);
    assert!(account.lockout_end.is_none());
    Ok(())
}

#[tokio::test]
async fn lockout_end_only_moves_forward() -> Result<()> {
    let Some(seeded) = seeded_store().await? else {
        return Ok(());
    };

    let later = Utc::now() + TimeDelta::minutes(10);
    let earlier = Utc::now() + TimeDelta::minutes(1);
    seeded.store.set_lockout_end(seeded.id, later).await?;
    seeded.store.set_lockout_end(seeded.id, earlier).await?;

    let account = seeded
        .store
        .find_by_username(&seeded.username)
        .await?
        .context("account")?;
    let stored = account.lockout_end.context("lockout_end")?;
    assert!((stored - later).num_seconds().abs() < 1);
    Ok(())
}

#[tokio::test]
async fn unknown_account_updates_fail() -> Result<()> {
    let Some(seeded) = seeded_store().await? else {
        return Ok(());
    };

    let missing = AccountId::new(Uuid::new_v4());
    assert!(matches!(
        seeded.store.increment_failed_count(missing, None).await,
        Err(StoreError::AccountNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn threshold_increment_locks_in_the_same_update() -> Result<()> {
    let Some(seeded) = seeded_store().await? else {
        return Ok(());
    };

    let until = Utc::now() + TimeDelta::minutes(5);
    let trigger = Some(LockoutTrigger {
        threshold: 2,
        until,
    });
    let first = seeded.store.increment_failed_count(seeded.id, trigger).await?;
    assert_eq!(first.count, 1);
    assert!(first.lockout_end.is_none());

    let second = seeded.store.increment_failed_count(seeded.id, trigger).await?;
    assert_eq!(second.count, 2);
    let end = second.lockout_end.context("lockout_end")?;
    assert!((end - until).num_seconds().abs() < 1);
    Ok(())
}

#[tokio::test]
async fn reset_keeps_running_lockout() -> Result<()> {
    let Some(seeded) = seeded_store().await? else {
        return Ok(());
    };

    let now = Utc::now();
    seeded
        .store
        .increment_failed_count(
            seeded.id,
            Some(LockoutTrigger {
                threshold: 1,
                until: now + TimeDelta::minutes(5),
            }),
        )
        .await?;

    assert!(!seeded.store.reset_failed_count(seeded.id, Some(now)).await?);
    let account = seeded
        .store
        .find_by_username(&seeded.username)
        .await?
        .context("account")?;
    assert_eq!(account.failed_attempt_count, 1);
    assert!(account.lockout_end.is_some());

    assert!(
        seeded
            .store
            .reset_failed_count(seeded.id, Some(now + TimeDelta::minutes(6)))
            .await?
    );
    let account = seeded
        .store
        .find_by_username(&seeded.username)
        .await?
        .context("account")?;
    assert_eq!(account.failed_attempt_count, 0);
    assert!(account.lockout_end.is_none());
    Ok(())
}
