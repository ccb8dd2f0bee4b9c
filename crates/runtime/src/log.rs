
use tracing_subscriber::filter::Targets;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::layer::{Layer, SubscriberExt};


#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("Error parsing RUST_LOG env var into targets specifier")]
    InvalidLogEnv(#[source] tracing_subscriber::filter::ParseError),
    #[error("Setting tracing listener failed (setup_logger called twice?)")]
    SetFailed(#[source] tracing::subscriber::SetGlobalDefaultError),
}

/// Default targets when RUST_LOG is unset; `verbose` turns on per-element tracing.
pub fn default_targets(crate_name: &str, verbose: bool) -> String {
    if verbose {
        format!("{crate_name}=trace,videoframes=trace,runtime=debug,warn")
    } else {
        format!("{crate_name}=info,videoframes=info,warn")
    }
}

/// Installs a hierarchical logger on stderr, so stdout stays free for output.
pub fn setup_logger(crate_name: &'static str, verbose: bool) -> Result<(), LoggerError> {
    let env_targets = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| default_targets(crate_name, verbose));
    let env_filter = env_targets.parse::<Targets>().map_err(LoggerError::InvalidLogEnv)?;

    let subscriber = Registry::default()
        .with(tracing_tree::HierarchicalLayer::new(2)
            .with_writer(std::io::stderr)
            .with_targets(true)
            .with_bracketed_fields(true)
            .with_filter(env_filter)
        );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(LoggerError::SetFailed)?;

    Ok(())
}
