pub mod bundle;
pub mod cli_commands;
pub mod error;
pub mod facts;
pub mod hostinfo;
pub mod image;
pub mod inspect;
pub mod migrate;
pub mod upgrade;

pub use error::{Error, Result};
pub use facts::Facts;
pub use image::ImageFlags;
pub use upgrade::{UpgradePlan, UpgradeStep};
