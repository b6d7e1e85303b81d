use crate::domain::model::EntityKind;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bullhorn-plecto-sync")]
#[command(about = "Synchronizes Bullhorn appointments and notes into Plecto")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "sync-config.toml", global = true)]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Fetch records from Bullhorn and upload them to Plecto (default)
    Sync {
        /// Show what would be synchronized without contacting any API
        #[arg(long)]
        dry_run: bool,

        /// Override fetch.lookback_hours
        #[arg(long)]
        lookback_hours: Option<u64>,

        /// Override fetch.entity (appointment or note)
        #[arg(long)]
        entity: Option<EntityKind>,
    },
    /// Exchange an authorization code for the first refresh token and store it
    Authorize {
        #[arg(long)]
        code: String,
    },
    /// Create the Plecto data source for the configured entity and print its id
    CreateDatasource {
        #[arg(long)]
        title: Option<String>,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Sync {
            dry_run: false,
            lookback_hours: None,
            entity: None,
        })
    }
}
