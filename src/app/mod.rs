mod config;
mod error;
mod logging;
pub mod reporter;
mod runtime;

pub use config::{AppConfig, ListingConfig};
pub use error::AppError;
pub use runtime::SystemClock;

pub fn run() -> Result<(), AppError> {
    let env_file = config::load_dotenv();
    logging::init()?;

    if let Some(path) = env_file {
        tracing::info!(path = %path.display(), "environment loaded from .env file");
    }

    let config = AppConfig::from_env()?;

    if let Some(offset) = config.ignored_offset.as_deref() {
        tracing::warn!(
            offset,
            cadence = config.report_kind.name(),
            "measure offset is not used for this cadence"
        );
    }

    tracing::info!(
        cadence = config.report_kind.name(),
        offset = ?config.report_kind.offset(),
        devices_like = %config.devices_like,
        test_mode = config.test_mode,
        kasa_api_url = %config.kasa.api_url,
        insert_api_url = %config.newrelic.insert_api_url,
        "power report starting"
    );

    runtime::run(config)?;

    tracing::info!("power report completed");
    Ok(())
}

pub fn run_device_listing() -> Result<(), AppError> {
    config::load_dotenv();
    logging::init()?;

    let config = ListingConfig::from_env()?;
    runtime::list_devices(&config)
}
