use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

use super::snapshot::WeatherSnapshot;

pub const KEY_HIGH_TEMP: &str = "max_temp";
pub const KEY_LOW_TEMP: &str = "min_temp";
pub const KEY_WEATHER_ID: &str = "weather_id";
pub const KEY_TIME: &str = "current_time";

/// One typed value inside a companion data item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum DataValue {
    Str(String),
    Int(i32),
    Long(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl DataValue {
    fn type_name(&self) -> &'static str {
        match self {
            DataValue::Str(_) => "string",
            DataValue::Int(_) => "int",
            DataValue::Long(_) => "long",
            DataValue::Float(_) => "float",
            DataValue::Bytes(_) => "bytes",
        }
    }
}

/// Key/value payload of a data item.
pub type DataMap = BTreeMap<String, DataValue>;

/// Decode a weather record.
///
/// `max_temp`, `min_temp` and `weather_id` are required. Older companions
/// omit `current_time`; the snapshot is then stamped with `received_at`.
pub fn decode_weather(map: &DataMap, received_at: DateTime<Utc>) -> Result<WeatherSnapshot, DecodeError> {
    let high = decimal_field(map, KEY_HIGH_TEMP)?;
    let low = decimal_field(map, KEY_LOW_TEMP)?;
    let condition_code = condition_field(map)?;
    let observed_at = match map.get(KEY_TIME) {
        None => received_at,
        Some(value) => timestamp_field(value)?,
    };

    Ok(WeatherSnapshot::new(high, low, condition_code, observed_at))
}

/// Encode a snapshot the way the companion publishes it.
pub fn encode_weather(snapshot: &WeatherSnapshot) -> DataMap {
    let mut map = DataMap::new();
    map.insert(
        KEY_HIGH_TEMP.to_string(),
        DataValue::Str(snapshot.high_temperature.to_string()),
    );
    map.insert(
        KEY_LOW_TEMP.to_string(),
        DataValue::Str(snapshot.low_temperature.to_string()),
    );
    map.insert(
        KEY_WEATHER_ID.to_string(),
        DataValue::Int(snapshot.condition_code),
    );
    map.insert(
        KEY_TIME.to_string(),
        DataValue::Long(snapshot.observed_at.timestamp_millis()),
    );
    map
}

fn decimal_field(map: &DataMap, key: &'static str) -> Result<f64, DecodeError> {
    match map.get(key) {
        None => Err(DecodeError::MissingField(key)),
        Some(DataValue::Str(raw)) => {
            let value: f64 = raw.trim().parse().map_err(|_| DecodeError::InvalidField {
                key,
                reason: format!("'{raw}' is not a decimal"),
            })?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(DecodeError::InvalidField {
                    key,
                    reason: format!("'{raw}' is not finite"),
                })
            }
        }
        Some(other) => Err(wrong_type(key, "string", other)),
    }
}

fn condition_field(map: &DataMap) -> Result<i32, DecodeError> {
    match map.get(KEY_WEATHER_ID) {
        None => Err(DecodeError::MissingField(KEY_WEATHER_ID)),
        Some(DataValue::Int(code)) => Ok(*code),
        Some(DataValue::Long(code)) => i32::try_from(*code).map_err(|_| DecodeError::InvalidField {
            key: KEY_WEATHER_ID,
            reason: format!("{code} out of range"),
        }),
        Some(other) => Err(wrong_type(KEY_WEATHER_ID, "int", other)),
    }
}

fn timestamp_field(value: &DataValue) -> Result<DateTime<Utc>, DecodeError> {
    let millis = match value {
        DataValue::Long(ms) => *ms,
        DataValue::Int(ms) => i64::from(*ms),
        other => return Err(wrong_type(KEY_TIME, "long", other)),
    };

    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| DecodeError::InvalidField {
            key: KEY_TIME,
            reason: format!("{millis}ms is not a representable time"),
        })
}

fn wrong_type(key: &'static str, expected: &str, found: &DataValue) -> DecodeError {
    DecodeError::InvalidField {
        key,
        reason: format!("expected {expected}, found {}", found.type_name()),
    }
}
