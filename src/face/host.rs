use chrono::{DateTime, Utc};

use super::frame::FaceFrame;

/// Lifecycle callbacks a platform adapter forwards to the face.
///
/// Calls arrive on one logical stream, in order. The host's start callback
/// is construction (`FaceController::start`); everything after it, stop
/// included, goes through this trait.
pub trait FaceHost {
    fn on_visibility_changed(&mut self, visible: bool);

    fn on_ambient_mode_changed(&mut self, ambient: bool);

    /// Coarse per-minute tick the host delivers in every mode.
    fn on_time_tick(&mut self);

    fn on_draw(&self, now: DateTime<Utc>) -> FaceFrame;

    /// No tick and no weather delivery reaches the renderer after return.
    fn on_stop(&mut self);
}
