use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::models::Device;
use crate::domain::usage::{RealtimeUsage, UsageRecord};

pub const DEFAULT_API_URL: &str = "https://wap.tplinkcloud.com";
const APP_TYPE: &str = "Kasa_Android";

// Strips whose outlets are metered and addressed individually.
const MULTI_OUTLET_MODELS: &[&str] = &["HS107", "HS300", "KP200", "KP303", "KP400", "EP40"];

pub trait DeviceDirectory {
    fn get_devices(&self) -> Result<Vec<Device>, KasaCloudError>;

    fn find_devices(&self, alias_filter: &str) -> Result<Vec<Device>, KasaCloudError> {
        Ok(self
            .get_devices()?
            .into_iter()
            .filter(|device| device.alias.contains(alias_filter))
            .collect())
    }

    fn power_usage_realtime(&self, device: &Device) -> Result<RealtimeUsage, KasaCloudError>;

    fn power_usage_day(
        &self,
        device: &Device,
        year: i32,
        month: u32,
    ) -> Result<Vec<UsageRecord>, KasaCloudError>;

    fn power_usage_month(
        &self,
        device: &Device,
        year: i32,
    ) -> Result<Vec<UsageRecord>, KasaCloudError>;
}

#[derive(Debug, Error)]
pub enum KasaCloudError {
    #[error("kasa cloud request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("kasa cloud returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("kasa cloud error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("kasa cloud response for {0} has no result")]
    MissingResult(&'static str),
    #[error("device {device_id} returned err_code {code} for {method}")]
    Device {
        device_id: String,
        method: String,
        code: i64,
    },
    #[error("failed to decode kasa payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct CloudResponse<T> {
    error_code: i64,
    #[serde(default)]
    msg: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceListResult {
    #[serde(default)]
    device_list: Vec<KasaDeviceInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PassthroughResult {
    response_data: String,
}

// camelCase from the cloud, snake_case in the device metadata blob.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase", serialize = "snake_case"))]
struct KasaDeviceInfo {
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    role: Option<i64>,
    #[serde(default)]
    fw_ver: Option<String>,
    #[serde(default)]
    app_server_url: Option<String>,
    #[serde(default)]
    device_region: Option<String>,
    device_id: String,
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default)]
    device_hw_ver: Option<String>,
    #[serde(default)]
    alias: String,
    #[serde(default)]
    device_mac: Option<String>,
    #[serde(default)]
    oem_id: Option<String>,
    #[serde(default)]
    device_model: String,
    #[serde(default)]
    hw_id: Option<String>,
    #[serde(default)]
    fw_id: Option<String>,
    #[serde(default)]
    is_same_region: Option<bool>,
    #[serde(default)]
    status: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SysInfo {
    #[serde(default)]
    children: Vec<OutletInfo>,
}

#[derive(Debug, Deserialize)]
struct OutletInfo {
    id: String,
    #[serde(default)]
    alias: String,
}

#[derive(Debug, Deserialize)]
struct DayStat {
    #[serde(default)]
    day_list: Vec<UsageRecord>,
}

#[derive(Debug, Deserialize)]
struct MonthStat {
    #[serde(default)]
    month_list: Vec<UsageRecord>,
}

#[derive(Debug)]
pub struct KasaCloudClient {
    http: reqwest::blocking::Client,
    api_url: String,
    token: String,
}

impl KasaCloudClient {
    pub fn login(
        api_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, KasaCloudError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        let api_url = api_url.trim_end_matches('/').to_string();

        let body = json!({
            "method": "login",
            "params": {
                "appType": APP_TYPE,
                "cloudUserName": username,
                "cloudPassword": password,
                "terminalUUID": uuid::Uuid::new_v4().to_string(),
            }
        });
        let response = post_json(&http, &api_url, None, &body)?;
        let login: LoginResult = unwrap_result(response, "login")?;

        tracing::debug!(api_url = %api_url, "authenticated to kasa cloud");

        Ok(Self {
            http,
            api_url,
            token: login.token,
        })
    }

    fn list_device_infos(&self) -> Result<Vec<KasaDeviceInfo>, KasaCloudError> {
        let body = json!({ "method": "getDeviceList" });
        let response = post_json(&self.http, &self.api_url, Some(&self.token), &body)?;
        let list: DeviceListResult = unwrap_result(response, "getDeviceList")?;
        Ok(list.device_list)
    }

    fn passthrough(
        &self,
        server_url: &str,
        device_id: &str,
        child_id: Option<&str>,
        module: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, KasaCloudError> {
        let mut request = json!({ module: { method: params } });
        if let (Some(child_id), Some(object)) = (child_id, request.as_object_mut()) {
            object.insert("context".to_string(), json!({ "child_ids": [child_id] }));
        }

        let body = json!({
            "method": "passthrough",
            "params": {
                "deviceId": device_id,
                "requestData": request.to_string(),
            }
        });
        let response = post_json(&self.http, server_url, Some(&self.token), &body)?;
        let result: PassthroughResult = unwrap_result(response, "passthrough")?;
        let data: Value = serde_json::from_str(&result.response_data)?;

        let payload = data
            .get(module)
            .and_then(|module_value| module_value.get(method))
            .cloned()
            .ok_or(KasaCloudError::MissingResult("passthrough"))?;

        let err_code = payload.get("err_code").and_then(Value::as_i64).unwrap_or(0);
        if err_code != 0 {
            return Err(KasaCloudError::Device {
                device_id: device_id.to_string(),
                method: format!("{module}.{method}"),
                code: err_code,
            });
        }

        Ok(payload)
    }

    fn emeter<T: DeserializeOwned>(
        &self,
        device: &Device,
        method: &str,
        params: Value,
    ) -> Result<T, KasaCloudError> {
        let server_url = device
            .metadata
            .get("app_server_url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .unwrap_or(self.api_url.as_str());
        let payload = self.passthrough(
            server_url,
            &device.device_id,
            device.child_id(),
            "emeter",
            method,
            params,
        )?;
        serde_json::from_value(payload).map_err(KasaCloudError::from)
    }

    fn expand_outlets(&self, info: &KasaDeviceInfo) -> Result<Vec<Device>, KasaCloudError> {
        let server_url = info
            .app_server_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(self.api_url.as_str());
        let payload = self.passthrough(
            server_url,
            &info.device_id,
            None,
            "system",
            "get_sysinfo",
            json!({}),
        )?;
        let sysinfo: SysInfo = serde_json::from_value(payload)?;
        let metadata = device_metadata(info)?;
        let model_type = format!("{}CHILD", model_type(&info.device_model));

        Ok(sysinfo
            .children
            .into_iter()
            .map(|outlet| Device {
                device_id: info.device_id.clone(),
                child_id: Some(qualify_child_id(&info.device_id, &outlet.id)),
                model_type: model_type.clone(),
                alias: outlet.alias,
                metadata: metadata.clone(),
            })
            .collect())
    }
}

impl DeviceDirectory for KasaCloudClient {
    fn get_devices(&self) -> Result<Vec<Device>, KasaCloudError> {
        let mut devices = Vec::new();

        for info in self.list_device_infos()? {
            let model = model_type(&info.device_model);
            if MULTI_OUTLET_MODELS.contains(&model.as_str()) {
                match self.expand_outlets(&info) {
                    Ok(outlets) => devices.extend(outlets),
                    Err(error) => tracing::warn!(
                        device = %info.alias,
                        device_id = %info.device_id,
                        error = %error,
                        "skipping strip, outlets unavailable"
                    ),
                }
                continue;
            }

            devices.push(Device {
                device_id: info.device_id.clone(),
                child_id: None,
                model_type: model,
                alias: info.alias.clone(),
                metadata: device_metadata(&info)?,
            });
        }

        Ok(devices)
    }

    fn power_usage_realtime(&self, device: &Device) -> Result<RealtimeUsage, KasaCloudError> {
        self.emeter(device, "get_realtime", json!({}))
    }

    fn power_usage_day(
        &self,
        device: &Device,
        year: i32,
        month: u32,
    ) -> Result<Vec<UsageRecord>, KasaCloudError> {
        let stat: DayStat =
            self.emeter(device, "get_daystat", json!({ "year": year, "month": month }))?;
        Ok(stat.day_list)
    }

    fn power_usage_month(
        &self,
        device: &Device,
        year: i32,
    ) -> Result<Vec<UsageRecord>, KasaCloudError> {
        let stat: MonthStat = self.emeter(device, "get_monthstat", json!({ "year": year }))?;
        Ok(stat.month_list)
    }
}

fn post_json(
    http: &reqwest::blocking::Client,
    url: &str,
    token: Option<&str>,
    body: &Value,
) -> Result<Value, KasaCloudError> {
    let mut request = http.post(url).json(body);
    if let Some(token) = token {
        request = request.query(&[("token", token)]);
    }

    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(KasaCloudError::Http {
            status: status.as_u16(),
            body,
        });
    }

    response.json().map_err(KasaCloudError::from)
}

fn unwrap_result<T: DeserializeOwned>(
    response: Value,
    method: &'static str,
) -> Result<T, KasaCloudError> {
    let envelope: CloudResponse<T> = serde_json::from_value(response)?;
    if envelope.error_code != 0 {
        return Err(KasaCloudError::Api {
            code: envelope.error_code,
            message: envelope.msg.unwrap_or_default(),
        });
    }
    envelope.result.ok_or(KasaCloudError::MissingResult(method))
}

fn device_metadata(
    info: &KasaDeviceInfo,
) -> Result<serde_json::Map<String, Value>, KasaCloudError> {
    match serde_json::to_value(info)? {
        Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

/// `HS110(EU)` -> `HS110`.
fn model_type(device_model: &str) -> String {
    let model = device_model
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase();
    if model.is_empty() {
        "UNKNOWN".to_string()
    } else {
        model
    }
}

// Some firmware reports only the outlet suffix.
fn qualify_child_id(parent_id: &str, child_id: &str) -> String {
    if child_id.starts_with(parent_id) {
        child_id.to_string()
    } else {
        format!("{parent_id}{child_id}")
    }
}
