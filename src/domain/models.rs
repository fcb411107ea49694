use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub device_id: String,
    pub child_id: Option<String>,
    pub model_type: String,
    pub alias: String,
    pub metadata: Map<String, Value>,
}

impl Device {
    pub fn child_id(&self) -> Option<&str> {
        self.child_id.as_deref().filter(|id| !id.is_empty())
    }
}
