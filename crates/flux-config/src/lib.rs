pub mod global;
pub mod loader;
pub mod sweep;

pub use global::{
    GlobalConfig, IngestConfig, LogFormat, LoggingConfig, StoreConfig, SystemConfig,
};
pub use loader::ConfigLoader;
pub use sweep::{SweepConfig, TierConfig};
