use std::cell::RefCell;
use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::{Map, json};

use crate::adapters::insights::{EventSink, InsightsError};
use crate::adapters::kasa_cloud::{DeviceDirectory, KasaCloudError};
use crate::domain::event::Event;
use crate::domain::models::Device;
use crate::domain::period::Clock;
use crate::domain::usage::{RealtimeUsage, UsageRecord};

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

pub fn plug(alias: &str, device_id: &str) -> Device {
    let mut metadata = Map::new();
    metadata.insert("device_id".to_string(), json!(device_id));
    metadata.insert("alias".to_string(), json!(alias));
    metadata.insert("device_model".to_string(), json!("HS110(EU)"));
    Device {
        device_id: device_id.to_string(),
        child_id: None,
        model_type: "HS110".to_string(),
        alias: alias.to_string(),
        metadata,
    }
}

pub fn day_series(year: i32, month: u32, days: &[(u32, f64)]) -> Vec<UsageRecord> {
    days.iter()
        .map(|(day, energy_wh)| UsageRecord {
            year,
            month,
            day: Some(*day),
            energy_wh: *energy_wh,
        })
        .collect()
}

pub fn month_series(year: i32, months: &[(u32, f64)]) -> Vec<UsageRecord> {
    months
        .iter()
        .map(|(month, energy_wh)| UsageRecord {
            year,
            month: *month,
            day: None,
            energy_wh: *energy_wh,
        })
        .collect()
}

/// In-memory device directory. Usage series are keyed by device alias and
/// every usage call is recorded as `<kind>:<alias>[:<args>]`.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    pub devices: Vec<Device>,
    pub realtime: HashMap<String, RealtimeUsage>,
    pub day_series: HashMap<String, Vec<UsageRecord>>,
    pub month_series: HashMap<String, Vec<UsageRecord>>,
    pub failing_aliases: Vec<String>,
    pub fail_listing: bool,
    pub calls: RefCell<Vec<String>>,
}

impl FakeDirectory {
    pub fn with_devices(devices: Vec<Device>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    pub fn calls_for(&self, alias: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.split(':').nth(1) == Some(alias))
            .cloned()
            .collect()
    }

    fn record(&self, device: &Device, call: String) -> Result<(), KasaCloudError> {
        self.calls.borrow_mut().push(call);
        if self.failing_aliases.contains(&device.alias) {
            return Err(KasaCloudError::Api {
                code: -20002,
                message: "device is offline".to_string(),
            });
        }
        Ok(())
    }
}

impl DeviceDirectory for FakeDirectory {
    fn get_devices(&self) -> Result<Vec<Device>, KasaCloudError> {
        if self.fail_listing {
            return Err(KasaCloudError::Api {
                code: -20651,
                message: "Token expired".to_string(),
            });
        }
        Ok(self.devices.clone())
    }

    fn power_usage_realtime(&self, device: &Device) -> Result<RealtimeUsage, KasaCloudError> {
        self.record(device, format!("realtime:{}", device.alias))?;
        Ok(self.realtime.get(&device.alias).cloned().unwrap_or_default())
    }

    fn power_usage_day(
        &self,
        device: &Device,
        year: i32,
        month: u32,
    ) -> Result<Vec<UsageRecord>, KasaCloudError> {
        self.record(device, format!("day:{}:{year}:{month}", device.alias))?;
        Ok(self.day_series.get(&device.alias).cloned().unwrap_or_default())
    }

    fn power_usage_month(
        &self,
        device: &Device,
        year: i32,
    ) -> Result<Vec<UsageRecord>, KasaCloudError> {
        self.record(device, format!("month:{}:{year}", device.alias))?;
        Ok(self.month_series.get(&device.alias).cloned().unwrap_or_default())
    }
}

/// Records every submitted event. Rejects the first `n` inserts of an event
/// type registered with `reject_first`, accepts everything else.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: RefCell<Vec<Event>>,
    rejections: RefCell<HashMap<String, u32>>,
}

impl RecordingSink {
    pub fn reject_first(self, event_type: &str, times: u32) -> Self {
        self.rejections
            .borrow_mut()
            .insert(event_type.to_string(), times);
        self
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .map(|event| event.event_type().to_string())
            .collect()
    }

    pub fn events_for(&self, device_id: &str) -> Vec<Event> {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.get("device_id") == Some(&json!(device_id)))
            .cloned()
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn insert_event(&self, event: &Event, _flatten: bool) -> Result<bool, InsightsError> {
        self.events.borrow_mut().push(event.clone());

        let mut rejections = self.rejections.borrow_mut();
        match rejections.get_mut(event.event_type()) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}
