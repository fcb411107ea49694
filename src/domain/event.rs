use serde_json::{Map, Value};

use crate::domain::models::Device;
use crate::domain::period::ReportKind;
use crate::domain::usage::{UsageReading, UsageRecord};

const EVENT_TYPE_BASE: &str = "TPLinkEMeterDevicePower";
const TEST_EVENT_MARKER: &str = "Test";

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: String,
    fields: Map<String, Value>,
}

impl Event {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

// A key written twice keeps its first position and takes the later value.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event_type: String,
    fields: Map<String, Value>,
}

impl EventBuilder {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            fields: Map::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn merge(mut self, fields: Map<String, Value>) -> Self {
        for (key, value) in fields {
            self.fields.insert(key, value);
        }
        self
    }

    pub fn build(self) -> Event {
        Event {
            event_type: self.event_type,
            fields: self.fields,
        }
    }
}

pub fn point_event_type(kind: ReportKind, test_mode: bool) -> String {
    let suffix = match kind {
        ReportKind::Current => "Current",
        ReportKind::Day(_) => "DaySummary",
        ReportKind::Month(_) => "MonthSummary",
    };
    compose_event_type(suffix, test_mode)
}

pub fn summary_event_type(kind: ReportKind, test_mode: bool) -> Option<String> {
    let suffix = match kind {
        ReportKind::Current => return None,
        ReportKind::Day(_) => "DayAllSummary",
        ReportKind::Month(_) => "MonthAllSummary",
    };
    Some(compose_event_type(suffix, test_mode))
}

fn compose_event_type(suffix: &str, test_mode: bool) -> String {
    if test_mode {
        format!("{TEST_EVENT_MARKER}{EVENT_TYPE_BASE}{suffix}")
    } else {
        format!("{EVENT_TYPE_BASE}{suffix}")
    }
}

fn with_device_identity(builder: EventBuilder, device: &Device) -> EventBuilder {
    let builder = builder
        .field("device_id", device.device_id.clone())
        .field("model_type", device.model_type.clone());

    let builder = match device.child_id() {
        Some(child_id) => builder.field("child_id", child_id),
        None => builder,
    };

    builder.merge(device.metadata.clone())
}

pub fn build_point_event(
    device: &Device,
    reading: &UsageReading,
    kind: ReportKind,
    test_mode: bool,
) -> Event {
    with_device_identity(EventBuilder::new(point_event_type(kind, test_mode)), device)
        .merge(reading.fields())
        .build()
}

pub fn build_summary_event(
    device: &Device,
    series: &[UsageRecord],
    kind: ReportKind,
    test_mode: bool,
) -> Option<Event> {
    let event_type = summary_event_type(kind, test_mode)?;
    if series.is_empty() {
        return None;
    }

    let builder = with_device_identity(EventBuilder::new(event_type), device);
    let builder = series.iter().fold(builder, |builder, record| {
        builder.field(summary_key(kind, record), record.energy_wh)
    });

    Some(builder.build())
}

fn summary_key(kind: ReportKind, record: &UsageRecord) -> String {
    match kind {
        ReportKind::Month(_) => format!("energy.{}.{}", record.year, record.month),
        _ => format!("energy.{}", record.period_path()),
    }
}
