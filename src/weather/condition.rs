use serde::{Deserialize, Serialize};

/// Icon bucket for a companion condition code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionBucket {
    Clear,
    LightClouds,
    Cloudy,
    Fog,
    LightRain,
    Rain,
    Snow,
    Storm,
}

impl ConditionBucket {
    /// Map a condition code onto its bucket. Unknown codes draw as clear.
    pub fn from_code(code: i32) -> Self {
        match code {
            200..=232 => ConditionBucket::Storm,
            300..=321 => ConditionBucket::LightRain,
            500..=504 => ConditionBucket::Rain,
            511 => ConditionBucket::Snow,
            520..=531 => ConditionBucket::LightRain,
            600..=622 => ConditionBucket::Snow,
            701..=761 => ConditionBucket::Fog,
            781 => ConditionBucket::Storm,
            800 => ConditionBucket::Clear,
            801 => ConditionBucket::LightClouds,
            802..=804 => ConditionBucket::Cloudy,
            _ => ConditionBucket::Clear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionBucket::Clear => "clear",
            ConditionBucket::LightClouds => "light_clouds",
            ConditionBucket::Cloudy => "cloudy",
            ConditionBucket::Fog => "fog",
            ConditionBucket::LightRain => "light_rain",
            ConditionBucket::Rain => "rain",
            ConditionBucket::Snow => "snow",
            ConditionBucket::Storm => "storm",
        }
    }
}
