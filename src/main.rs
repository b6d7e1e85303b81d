use anyhow::Context;
use bullhorn_plecto_sync::core::plecto::PlectoClient;
use bullhorn_plecto_sync::core::session::SessionResolver;
use bullhorn_plecto_sync::core::token::TokenManager;
use bullhorn_plecto_sync::domain::ports::SecretStore;
use bullhorn_plecto_sync::utils::error::ErrorSeverity;
use bullhorn_plecto_sync::utils::{logger, validation::Validate};
use bullhorn_plecto_sync::{
    secret_store_from_config, Cli, Command, LocalStorage, SyncConfig, SyncEngine, SyncError,
    SyncPipeline,
};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = SyncConfig::from_file(&cli.config).with_context(|| {
        format!(
            "failed to load config file '{}' (make sure it exists and is valid TOML)",
            cli.config
        )
    })?;

    logger::init_logger(cli.verbose, config.log_format(), config.log_level());
    tracing::info!("📁 Configuration loaded from {}", cli.config);

    let command = cli.command();
    if let Command::Sync {
        lookback_hours,
        entity,
        ..
    } = &command
    {
        if let Some(hours) = lookback_hours {
            config.fetch.lookback_hours = Some(*hours);
            tracing::info!("🔧 Lookback overridden to {}h", hours);
        }
        if let Some(entity) = entity {
            config.fetch.entity = *entity;
            tracing::info!("🔧 Entity overridden to {}", entity);
        }
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let outcome = match command {
        Command::CheckConfig => {
            display_config_summary(&config);
            println!("✅ Configuration is valid");
            Ok(())
        }
        Command::Sync { dry_run: true, .. } => {
            display_config_summary(&config);
            println!("🔍 Dry run: no API was contacted and no token was rotated");
            Ok(())
        }
        Command::Sync { .. } => run_sync(config).await,
        Command::Authorize { code } => authorize(&config, &code).await,
        Command::CreateDatasource { title } => create_datasource(&config, title).await,
    };

    if let Err(e) = outcome {
        tracing::error!(
            "❌ Sync failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run_sync(config: SyncConfig) -> Result<(), SyncError> {
    let client = config.http_client()?;
    let secrets = secret_store_from_config(&config.secrets, client)?;
    let snapshots = config.snapshot_dir().map(LocalStorage::new);

    let pipeline = SyncPipeline::new(config, secrets, snapshots)?;
    let summary = SyncEngine::new(pipeline).run().await?;

    tracing::info!(
        "🎉 Sync completed: {} fetched, {} uploaded in {} batches",
        summary.fetched,
        summary.uploaded,
        summary.batches
    );
    println!(
        "✅ Sync completed: {} records fetched, {} registrations uploaded",
        summary.fetched, summary.uploaded
    );
    Ok(())
}

async fn authorize(config: &SyncConfig, code: &str) -> Result<(), SyncError> {
    let client = config.http_client()?;
    let secrets = secret_store_from_config(&config.secrets, client.clone())?;
    let tokens = TokenManager::new(client.clone(), config.bullhorn.clone());

    let grant = tokens.exchange_code(code).await?;
    secrets
        .set(&config.bullhorn.refresh_token_secret, &grant.refresh_token)
        .await?;
    tracing::info!("💾 Initial refresh token stored");

    let session = SessionResolver::new(client, config.bullhorn.login_base_url())
        .resolve(&grant.access_token)
        .await?;
    println!("✅ Authorized. REST URL: {}", session.rest_url);
    Ok(())
}

async fn create_datasource(config: &SyncConfig, title: Option<String>) -> Result<(), SyncError> {
    let entity = config.fetch.entity;
    let title = title
        .or_else(|| config.plecto.data_source_title.clone())
        .unwrap_or_else(|| entity.default_title().to_string());

    let plecto = PlectoClient::new(config.http_client()?, &config.plecto);
    let id = plecto.create_data_source(&title, entity).await?;
    println!("✅ Data source created: {}", id);
    println!("💡 Set plecto.data_source_id = \"{}\" in the configuration", id);
    Ok(())
}

fn display_config_summary(config: &SyncConfig) {
    println!("📋 Configuration Summary:");
    println!("  Bullhorn auth: {}", config.bullhorn.auth_base_url());
    println!("  Bullhorn login: {}", config.bullhorn.login_base_url());
    println!("  Entity: {}", config.fetch.entity);
    println!("  Page size: {}", config.fetch.page_size);
    match config.fetch.lookback_hours {
        Some(hours) => println!("  Window: last {}h", hours),
        None => println!("  Window: none (full scan)"),
    }
    if let Some(action) = &config.fetch.action_filter {
        println!("  Action filter: {}", action);
    }
    println!("  On page error: {:?}", config.fetch.on_page_error);
    println!("  Plecto: {}", config.plecto.base_url());
    println!(
        "  Data source: {}",
        config
            .plecto
            .data_source_id()
            .unwrap_or("(created on first run)")
    );
    if config.plecto.per_record {
        println!("  Upload: one registration per request");
    } else {
        println!("  Upload: batches of {}", config.plecto.batch_size);
    }
    println!("  Secrets: {:?}", config.secrets.backend);
    if let Some(dir) = config.snapshot_dir() {
        println!("  Snapshots: {}", dir);
    }
    println!();
}

