//! Configuration loading, env substitution, overrides and validation.
//!
//! Config files: `slackbridge.toml`, `slackbridge.yaml` or `slackbridge.json`,
//! searched in `./` then `~/.config/slackbridge/`.
//!
//! Supports `${ENV_VAR}` substitution in the raw file and `SLACKBRIDGE_*`
//! overrides on top of the parsed values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, credentials_path, data_dir, discover_and_load,
        load_config, save_config,
    },
    schema::{
        BridgeConfig, CALLBACK_PATH, DEFAULT_API_BASE_URL, DeliveryMode, ServerConfig, SiteConfig,
        StorageConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
