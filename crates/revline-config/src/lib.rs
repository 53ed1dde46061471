//! Configuration for the Revline runtime.
//!
//! Settings persist to disk as a RON file and can be overridden from the
//! command line. Sections missing from the file fall back to their defaults,
//! and unknown fields are ignored so older and newer files both load.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME, Config, DebugConfig, LodConfig, MemoryConfig, TextureConfig,
    default_config_dir,
};
pub use error::ConfigError;
