use chrono::Datelike;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::period::PeriodTarget;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UsageRecord {
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub day: Option<u32>,
    pub energy_wh: f64,
}

impl UsageRecord {
    pub fn matches(&self, target: &PeriodTarget) -> bool {
        match target {
            PeriodTarget::Day(date) => {
                self.day == Some(date.day())
                    && self.month == date.month()
                    && self.year == date.year()
            }
            PeriodTarget::Month(target) => {
                i64::from(self.month) == target.month && self.year == target.year
            }
        }
    }

    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("year".to_string(), self.year.into());
        fields.insert("month".to_string(), self.month.into());
        if let Some(day) = self.day {
            fields.insert("day".to_string(), day.into());
        }
        fields.insert("energy_wh".to_string(), self.energy_wh.into());
        fields
    }

    pub fn period_path(&self) -> String {
        match self.day {
            Some(day) => format!("{}.{}.{}", self.year, self.month, day),
            None => format!("{}.{}", self.year, self.month),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RealtimeUsage {
    #[serde(default)]
    pub voltage_mv: Option<f64>,
    #[serde(default)]
    pub current_ma: Option<f64>,
    #[serde(default)]
    pub power_mw: Option<f64>,
    #[serde(default)]
    pub total_wh: Option<f64>,
}

impl RealtimeUsage {
    pub fn fields(&self) -> Map<String, Value> {
        let readings = [
            ("voltage_mv", self.voltage_mv),
            ("current_ma", self.current_ma),
            ("power_mw", self.power_mw),
            ("total_wh", self.total_wh),
        ];

        readings
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key.to_string(), Value::from(value))))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UsageReading {
    Realtime(RealtimeUsage),
    Period(UsageRecord),
}

impl UsageReading {
    pub fn fields(&self) -> Map<String, Value> {
        match self {
            Self::Realtime(usage) => usage.fields(),
            Self::Period(record) => record.fields(),
        }
    }
}

pub fn select(series: &[UsageRecord], target: &PeriodTarget) -> Option<UsageRecord> {
    series.iter().find(|record| record.matches(target)).cloned()
}
