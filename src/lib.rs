pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{Cli, Command};

pub use adapters::{
    secrets::{secret_store_from_config, FileSecretStore, KeyVaultSecretStore, MemorySecretStore},
    storage::LocalStorage,
};
pub use config::toml_config::SyncConfig;
pub use core::{engine::SyncEngine, pipeline::SyncPipeline};
pub use utils::error::{Result, SyncError};
