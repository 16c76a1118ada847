pub mod app_config;
pub mod config;
pub mod fields;
pub mod profiles;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use fields::{FieldName, FieldRule};
pub use profiles::{
    load_profiles, parse_profiles, FetchParams, ProfileRegistry, SelectorTier, SiteProfile, Tier,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read profiles file at {path}: {source}")]
    ProfilesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profiles file: {0}")]
    ProfilesFileParse(#[from] serde_yaml::Error),

    #[error("profile validation error: {0}")]
    Validation(String),
}
