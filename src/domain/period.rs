use chrono::{Datelike, Duration, NaiveDate};
use thiserror::Error;

pub const MIN_DAY_OFFSET: u32 = 2;
pub const MAX_DAY_OFFSET: u32 = 30;

pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportKindError {
    #[error("report cadence \"{0}\" not recognized; options are current, day, month")]
    UnknownCadence(String),
    #[error("a measure offset is required for the {0} cadence")]
    MissingOffset(&'static str),
    #[error("measure offset \"{0}\" is not a whole number")]
    InvalidOffset(String),
    #[error("day offset {0} is out of range; must be 2 <= offset <= 30")]
    DayOffsetOutOfRange(u32),
    #[error("month offset must be at least 1")]
    MonthOffsetZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayOffset(u32);

impl DayOffset {
    pub fn new(days: u32) -> Result<Self, ReportKindError> {
        if !(MIN_DAY_OFFSET..=MAX_DAY_OFFSET).contains(&days) {
            return Err(ReportKindError::DayOffsetOutOfRange(days));
        }
        Ok(Self(days))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthOffset(u32);

impl MonthOffset {
    pub fn new(months: u32) -> Result<Self, ReportKindError> {
        if months == 0 {
            return Err(ReportKindError::MonthOffsetZero);
        }
        Ok(Self(months))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Current,
    Day(DayOffset),
    Month(MonthOffset),
}

impl ReportKind {
    pub fn from_cadence(cadence: &str, offset: Option<&str>) -> Result<Self, ReportKindError> {
        let offset = offset.map(str::trim).filter(|value| !value.is_empty());

        match cadence {
            "current" => Ok(Self::Current),
            "day" => {
                let days = parse_offset(offset.ok_or(ReportKindError::MissingOffset("day"))?)?;
                Ok(Self::Day(DayOffset::new(days)?))
            }
            "month" => {
                let months =
                    parse_offset(offset.ok_or(ReportKindError::MissingOffset("month"))?)?;
                Ok(Self::Month(MonthOffset::new(months)?))
            }
            _ => Err(ReportKindError::UnknownCadence(cadence.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Day(_) => "day",
            Self::Month(_) => "month",
        }
    }

    pub fn offset(&self) -> Option<u32> {
        match self {
            Self::Current => None,
            Self::Day(offset) => Some(offset.get()),
            Self::Month(offset) => Some(offset.get()),
        }
    }
}

fn parse_offset(raw: &str) -> Result<u32, ReportKindError> {
    raw.parse::<u32>()
        .map_err(|_| ReportKindError::InvalidOffset(raw.to_string()))
}

// Large offsets can roll `month` outside 1..=12; such targets never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthTarget {
    pub year: i32,
    pub month: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodTarget {
    Day(NaiveDate),
    Month(MonthTarget),
}

pub fn resolve(kind: ReportKind, today: NaiveDate) -> Option<PeriodTarget> {
    match kind {
        ReportKind::Current => None,
        ReportKind::Day(offset) => Some(PeriodTarget::Day(
            today - Duration::days(i64::from(offset.get())),
        )),
        ReportKind::Month(offset) => Some(PeriodTarget::Month(month_target(offset, today))),
    }
}

fn month_target(offset: MonthOffset, today: NaiveDate) -> MonthTarget {
    let current = i64::from(today.month());
    let offset = i64::from(offset.get());

    if current > offset {
        MonthTarget {
            year: today.year(),
            month: current - offset,
        }
    } else if current == offset {
        MonthTarget {
            year: today.year() - 1,
            month: 12,
        }
    } else {
        MonthTarget {
            year: today.year() - 1,
            month: 11 - (offset - current),
        }
    }
}
