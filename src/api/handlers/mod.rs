pub mod health;
pub use self::health::health;

pub mod logout;
pub use self::logout::{SessionConfig, logout};

pub mod paserk;
pub use self::paserk::paserk;

pub mod token;
pub use self::token::token;
