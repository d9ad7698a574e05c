use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use crate::{
    power::PowerMode,
    weather::{ConditionBucket, WeatherSnapshot},
};

/// Display state that shapes a frame besides the time and the weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    pub mode: PowerMode,
    pub low_bit_rendering: bool,
    pub use_24_hour: bool,
    pub stale: bool,
}

/// Everything a pixel renderer needs for one frame, already formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceFrame {
    pub hour: String,
    pub minute: String,
    /// Only drawn in interactive mode.
    pub seconds: Option<String>,
    /// `AM`/`PM`, absent on a 24-hour face.
    pub meridiem: Option<String>,
    pub date: String,
    pub high: String,
    pub low: String,
    pub condition: ConditionBucket,
    pub ambient: bool,
    pub anti_alias: bool,
    pub stale: bool,
}

impl FaceFrame {
    pub fn compose(local: NaiveDateTime, snapshot: &WeatherSnapshot, ctx: FrameContext) -> Self {
        let ambient = matches!(ctx.mode, PowerMode::Ambient | PowerMode::HiddenAmbient);

        let (hour, meridiem) = if ctx.use_24_hour {
            (format!("{:02}", local.hour()), None)
        } else {
            let (pm, hour12) = local.hour12();
            let meridiem = if pm { "PM" } else { "AM" };
            (hour12.to_string(), Some(meridiem.to_string()))
        };

        let seconds = (ctx.mode == PowerMode::Interactive).then(|| format!("{:02}", local.second()));

        Self {
            hour,
            minute: format!("{:02}", local.minute()),
            seconds,
            meridiem,
            date: local.format("%a, %b %-d %Y").to_string().to_uppercase(),
            high: format_temperature(snapshot.high_temperature),
            low: format_temperature(snapshot.low_temperature),
            condition: snapshot.condition(),
            ambient,
            anti_alias: !(ambient && ctx.low_bit_rendering),
            stale: ctx.stale,
        }
    }
}

fn format_temperature(value: f64) -> String {
    format!("{:.0}°", value)
}
