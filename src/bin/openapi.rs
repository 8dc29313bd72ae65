use anyhow::Result;

fn main() -> Result<()> {
    let json = serde_json::to_string_pretty(&grantor::api::openapi())?;
    println!("{json}");
    Ok(())
}
