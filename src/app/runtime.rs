use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::adapters::insights::InsightsClient;
use crate::adapters::kasa_cloud::{DeviceDirectory, KasaCloudClient};
use crate::app::config::{AppConfig, KasaConfig, ListingConfig};
use crate::app::error::AppError;
use crate::app::reporter::{ElectricityReporter, ReportError, ReportSettings};
use crate::domain::models::Device;
use crate::domain::period::Clock;

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

fn login(kasa: &KasaConfig, timeout: Duration) -> Result<KasaCloudClient, AppError> {
    let client = KasaCloudClient::login(&kasa.api_url, &kasa.username, &kasa.password, timeout)
        .map_err(AppError::client_init)?;
    tracing::info!(api_url = %kasa.api_url, "authenticated to kasa cloud");
    Ok(client)
}

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let timeout = Duration::from_secs(config.http_timeout_secs);

    let directory = login(&config.kasa, timeout)?;
    let sink = InsightsClient::new(
        config.newrelic.insert_api_url.clone(),
        config.newrelic.insert_api_key.clone(),
        timeout,
    )
    .map_err(AppError::client_init)?;

    let reporter = ElectricityReporter::new(
        directory,
        sink,
        SystemClock,
        ReportSettings {
            kind: config.report_kind,
            test_mode: config.test_mode,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        },
    );

    reporter.run(Some(config.devices_like.as_str()))?;
    Ok(())
}

pub fn list_devices(config: &ListingConfig) -> Result<(), AppError> {
    let client = login(&config.kasa, Duration::from_secs(config.http_timeout_secs))?;

    let devices = match config.devices_like.as_deref() {
        Some(filter) => client.find_devices(filter),
        None => client.get_devices(),
    }
    .map_err(ReportError::DeviceListing)?;

    println!("{} device(s)", devices.len());
    for device in &devices {
        let power_mw = match client.power_usage_realtime(device) {
            Ok(usage) => usage.power_mw,
            Err(error) => {
                tracing::warn!(
                    device = %device.alias,
                    error = %error,
                    "realtime usage unavailable"
                );
                None
            }
        };
        println!("{}", format_device_line(device, power_mw));
    }

    Ok(())
}

fn format_device_line(device: &Device, power_mw: Option<f64>) -> String {
    let id = match device.child_id() {
        Some(child_id) => format!("{} / {}", device.device_id, child_id),
        None => device.device_id.clone(),
    };
    let power = power_mw
        .map(|mw| format!("{:.1} W", mw / 1000.0))
        .unwrap_or_else(|| "n/a".to_string());

    format!("{} | {} | {} | {}", device.alias, device.model_type, id, power)
}
