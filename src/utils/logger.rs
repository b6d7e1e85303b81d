use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

fn build_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    let default = match (verbose, level) {
        (true, _) => "bullhorn_plecto_sync=debug,info".to_string(),
        (false, Some(level)) => format!("bullhorn_plecto_sync={}", level),
        (false, None) => "bullhorn_plecto_sync=info".to_string(),
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn init_logger(verbose: bool, format: LogFormat, level: Option<&str>) {
    let filter = build_filter(verbose, level);

    match format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .init(),
        // Scheduler environments (cron runners, CI jobs) ingest JSON lines
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .json(),
            )
            .init(),
    }
}

/// Shortens a credential for log output.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(6).collect();
    if secret.chars().count() <= 6 {
        "***".to_string()
    } else {
        format!("{}***", visible)
    }
}
