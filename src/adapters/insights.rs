use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::event::Event;

const INSERT_KEY_HEADER: &str = "X-Insert-Key";

pub trait EventSink {
    fn insert_event(&self, event: &Event, flatten: bool) -> Result<bool, InsightsError>;
}

#[derive(Debug, Error)]
pub enum InsightsError {
    #[error("insights request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    #[serde(default)]
    success: bool,
}

pub fn default_insert_url(account_id: &str) -> String {
    format!("https://insights-collector.newrelic.com/v1/accounts/{account_id}/events")
}

#[derive(Debug)]
pub struct InsightsClient {
    http: reqwest::blocking::Client,
    insert_url: String,
    insert_key: String,
}

impl InsightsClient {
    pub fn new(
        insert_url: impl Into<String>,
        insert_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InsightsError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            insert_url: insert_url.into(),
            insert_key: insert_key.into(),
        })
    }
}

impl EventSink for InsightsClient {
    fn insert_event(&self, event: &Event, flatten: bool) -> Result<bool, InsightsError> {
        let payload = Value::Array(vec![Value::Object(event_payload(event, flatten))]);

        let response = self
            .http
            .post(&self.insert_url)
            .header(INSERT_KEY_HEADER, &self.insert_key)
            .json(&payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| String::from("<no body>"));
            tracing::warn!(
                event_type = event.event_type(),
                status = status.as_u16(),
                body = %body,
                "insights rejected event"
            );
            return Ok(false);
        }

        let accepted = response
            .json::<InsertResponse>()
            .map(|body| body.success)
            .unwrap_or(false);
        Ok(accepted)
    }
}

pub fn event_payload(event: &Event, flatten: bool) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert(
        "eventType".to_string(),
        Value::String(event.event_type().to_string()),
    );

    if flatten {
        payload.extend(flatten_fields(event.fields()));
    } else {
        payload.extend(event.fields().clone());
    }

    payload
}

// Nested objects and arrays become dotted keys; nulls are dropped.
pub fn flatten_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, value) in fields {
        flatten_into(key, value, &mut flat);
    }
    flat
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(&format!("{prefix}.{key}"), nested, out);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten_into(&format!("{prefix}.{index}"), nested, out);
            }
        }
        scalar => {
            out.insert(prefix.to_string(), scalar.clone());
        }
    }
}
