use chrono::{DateTime, Utc};
use serde::Deserializer;
use serde_derive::{Deserialize, Serialize};

/// Appliance type tag the upstream API uses for smart meters
pub const SMART_METER_TYPE: &str = "EL_SMART_METER";

const REMO_FIRMWARE_PREFIX: &str = "Remo/";
const REMO_E_LITE_FIRMWARE_PREFIX: &str = "Remo-E-lite/";

/// Reads a JSON `null` as the zero value of `T`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    let value: Option<T> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nickname: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub superuser: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    #[serde(rename = "val", default, deserialize_with = "null_as_default")]
    pub value: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Newest sensor readings reported by a device
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "te", default)]
    pub temperature: Option<SensorValue>,
    #[serde(rename = "hu", default)]
    pub humidity: Option<SensorValue>,
    #[serde(rename = "il", default)]
    pub illumination: Option<SensorValue>,
    #[serde(rename = "mo", default)]
    pub motion: Option<SensorValue>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub firmware_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temperature_offset: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub humidity_offset: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<User>,
    #[serde(default)]
    pub newest_events: Option<Event>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Remo,
    RemoELite,
    Unknown,
}

impl Device {
    pub fn kind(&self) -> DeviceKind {
        if self.firmware_version.starts_with(REMO_FIRMWARE_PREFIX) {
            DeviceKind::Remo
        } else if self
            .firmware_version
            .starts_with(REMO_E_LITE_FIRMWARE_PREFIX)
        {
            DeviceKind::RemoELite
        } else {
            DeviceKind::Unknown
        }
    }

    pub fn is_remo(&self) -> bool {
        self.kind() == DeviceKind::Remo
    }

    pub fn is_remo_e_lite(&self) -> bool {
        self.kind() == DeviceKind::RemoELite
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub manufacturer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appliance {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub device: Device,
    #[serde(default)]
    pub model: Option<Model>,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub appliance_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nickname: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,
    #[serde(default)]
    pub smart_meter: Option<SmartMeter>,
}

impl Appliance {
    pub fn is_smart_meter(&self) -> bool {
        self.appliance_type == SMART_METER_TYPE
    }
}

/// Smart meter payload. Properties arrive in no particular order.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartMeter {
    #[serde(default, deserialize_with = "null_as_default")]
    pub echonetlite_properties: Vec<EchonetliteProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchonetliteProperty {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub epc: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub val: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Rate limit information reported by the upstream API on every response
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct RateLimitMeta {
    pub limit: f64,
    pub remaining: f64,
    pub reset: f64,
}

/// Outcome of a fetch for one resource kind, either fresh or served from cache
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult<T> {
    pub status_code: u16,
    pub meta: RateLimitMeta,
    pub payload: Vec<T>,
    pub from_cache: bool,
}

pub type GetDevicesResult = FetchResult<Device>;
pub type GetAppliancesResult = FetchResult<Appliance>;
