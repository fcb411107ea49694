use std::time::Duration;

use chrono::Datelike;
use serde_json::Value;
use thiserror::Error;

use crate::adapters::insights::EventSink;
use crate::adapters::kasa_cloud::{DeviceDirectory, KasaCloudError};
use crate::domain::event::{Event, build_point_event, build_summary_event};
use crate::domain::models::Device;
use crate::domain::period::{Clock, PeriodTarget, ReportKind, resolve};
use crate::domain::usage::{UsageReading, UsageRecord, select};

pub const MAX_FETCH_ATTEMPTS: u32 = 3;
pub const MAX_REPORT_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to list devices: {0}")]
    DeviceListing(#[source] KasaCloudError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSettings {
    pub kind: ReportKind,
    pub test_mode: bool,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedUsage {
    pub reading: UsageReading,
    pub series: Option<Vec<UsageRecord>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOutcome {
    FetchFailed,
    Reported,
    ReportFailed,
}

pub struct ElectricityReporter<D, S, C> {
    directory: D,
    sink: S,
    clock: C,
    settings: ReportSettings,
}

impl<D, S, C> ElectricityReporter<D, S, C>
where
    D: DeviceDirectory,
    S: EventSink,
    C: Clock,
{
    pub fn new(directory: D, sink: S, clock: C, settings: ReportSettings) -> Self {
        Self {
            directory,
            sink,
            clock,
            settings,
        }
    }

    pub fn run(&self, devices_filter: Option<&str>) -> Result<(), ReportError> {
        let devices = match devices_filter {
            Some(filter) => {
                let devices = self
                    .directory
                    .find_devices(filter)
                    .map_err(ReportError::DeviceListing)?;
                tracing::info!(
                    count = devices.len(),
                    devices_like = filter,
                    "found devices matching filter"
                );
                devices
            }
            None => {
                let devices = self
                    .directory
                    .get_devices()
                    .map_err(ReportError::DeviceListing)?;
                tracing::info!(count = devices.len(), "found devices");
                devices
            }
        };

        let mut reported = 0_usize;
        for device in &devices {
            if self.report_device(device) == DeviceOutcome::Reported {
                reported += 1;
            }
        }

        tracing::info!(
            cadence = self.settings.kind.name(),
            reported,
            failed = devices.len() - reported,
            "power report run finished"
        );

        Ok(())
    }

    pub fn report_device(&self, device: &Device) -> DeviceOutcome {
        let cadence = self.settings.kind.name();

        let Some(fetched) = self.fetch_with_retries(device) else {
            tracing::warn!(
                device = %device.alias,
                cadence,
                attempts = MAX_FETCH_ATTEMPTS,
                "failed to get usage data"
            );
            return DeviceOutcome::FetchFailed;
        };
        tracing::info!(device = %device.alias, cadence, "finished getting usage data");

        if self.submit_with_retries(device, &fetched) {
            tracing::info!(device = %device.alias, cadence, "finished reporting usage data");
            DeviceOutcome::Reported
        } else {
            tracing::warn!(
                device = %device.alias,
                cadence,
                attempts = MAX_REPORT_ATTEMPTS,
                "failed to report usage data"
            );
            DeviceOutcome::ReportFailed
        }
    }

    // Ok(None): the device answered without a record for the target period.
    pub fn fetch(&self, device: &Device) -> Result<Option<FetchedUsage>, KasaCloudError> {
        let Some(target) = resolve(self.settings.kind, self.clock.today()) else {
            let usage = self.directory.power_usage_realtime(device)?;
            return Ok(Some(FetchedUsage {
                reading: UsageReading::Realtime(usage),
                series: None,
            }));
        };

        let series = match target {
            PeriodTarget::Day(date) => {
                self.directory
                    .power_usage_day(device, date.year(), date.month())?
            }
            PeriodTarget::Month(month) => self.directory.power_usage_month(device, month.year)?,
        };

        Ok(select(&series, &target).map(|record| FetchedUsage {
            reading: UsageReading::Period(record),
            series: Some(series),
        }))
    }

    fn fetch_with_retries(&self, device: &Device) -> Option<FetchedUsage> {
        for attempt in 1..=MAX_FETCH_ATTEMPTS {
            if attempt > 1 {
                self.pause();
            }
            tracing::debug!(device = %device.alias, attempt, "getting usage data");

            match self.fetch(device) {
                Ok(Some(fetched)) => return Some(fetched),
                Ok(None) => {
                    tracing::debug!(device = %device.alias, attempt, "no record for target period");
                }
                Err(error) => {
                    tracing::warn!(
                        device = %device.alias,
                        attempt,
                        error = %error,
                        "usage request failed"
                    );
                }
            }
        }
        None
    }

    fn submit_with_retries(&self, device: &Device, fetched: &FetchedUsage) -> bool {
        let ReportSettings {
            kind, test_mode, ..
        } = self.settings;
        let point = build_point_event(device, &fetched.reading, kind, test_mode);
        let summary = fetched
            .series
            .as_deref()
            .and_then(|series| build_summary_event(device, series, kind, test_mode));

        for attempt in 1..=MAX_REPORT_ATTEMPTS {
            if attempt > 1 {
                self.pause();
            }
            let accepted = self.submit(device, &point, attempt);
            // Sent on every pass regardless of the point event's outcome.
            if let Some(summary) = &summary {
                self.submit(device, summary, attempt);
            }
            if accepted {
                return true;
            }
        }
        false
    }

    fn submit(&self, device: &Device, event: &Event, attempt: u32) -> bool {
        match self.sink.insert_event(event, true) {
            Ok(true) => {
                tracing::info!(
                    device = %device.alias,
                    event_type = event.event_type(),
                    "inserted event"
                );
                true
            }
            Ok(false) => {
                let payload = Value::Object(event.fields().clone());
                tracing::warn!(
                    device = %device.alias,
                    event_type = event.event_type(),
                    attempt,
                    payload = %payload,
                    "failed to insert event"
                );
                false
            }
            Err(error) => {
                tracing::warn!(
                    device = %device.alias,
                    event_type = event.event_type(),
                    attempt,
                    error = %error,
                    "event submission failed"
                );
                false
            }
        }
    }

    fn pause(&self) {
        if !self.settings.retry_delay.is_zero() {
            std::thread::sleep(self.settings.retry_delay);
        }
    }
}
