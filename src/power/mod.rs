use log::debug;
use serde::{Deserialize, Serialize};

use crate::{face::Renderer, tick::TickControl};

/// Display power state, derived from visibility and ambient flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PowerMode {
    Hidden,
    HiddenAmbient,
    Interactive,
    Ambient,
}

impl PowerMode {
    pub fn from_flags(visible: bool, ambient: bool) -> Self {
        match (visible, ambient) {
            (false, false) => PowerMode::Hidden,
            (false, true) => PowerMode::HiddenAmbient,
            (true, false) => PowerMode::Interactive,
            (true, true) => PowerMode::Ambient,
        }
    }

    /// Second-granularity redraws only run in interactive mode.
    pub fn should_tick(self) -> bool {
        matches!(self, PowerMode::Interactive)
    }
}

/// Visibility/ambient state machine that decides whether ticks run.
///
/// Nothing derived is stored: the armed decision is recomputed from the two
/// flags after every transition.
#[derive(Debug, Default)]
pub struct PowerModeController {
    visible: bool,
    ambient: bool,
    low_bit_ambient: bool,
}

impl PowerModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_ambient(&self) -> bool {
        self.ambient
    }

    pub fn mode(&self) -> PowerMode {
        PowerMode::from_flags(self.visible, self.ambient)
    }

    pub fn should_tick(&self) -> bool {
        self.visible && !self.ambient
    }

    /// Whether drawing should drop anti-aliasing right now.
    pub fn low_bit_rendering(&self) -> bool {
        self.ambient && self.low_bit_ambient
    }

    pub fn on_visibility_changed(
        &mut self,
        visible: bool,
        ticks: &mut impl TickControl,
        renderer: &dyn Renderer,
    ) {
        self.visible = visible;
        self.apply(ticks, renderer);
    }

    pub fn on_ambient_changed(
        &mut self,
        ambient: bool,
        ticks: &mut impl TickControl,
        renderer: &dyn Renderer,
    ) {
        self.ambient = ambient;
        self.apply(ticks, renderer);
    }

    /// Display capability reported by the host; takes effect on the next draw.
    pub fn on_properties_changed(&mut self, low_bit_ambient: bool) {
        self.low_bit_ambient = low_bit_ambient;
    }

    fn apply(&self, ticks: &mut impl TickControl, renderer: &dyn Renderer) {
        if self.should_tick() {
            ticks.arm();
        } else {
            ticks.disarm();
        }
        debug!("power mode now {:?}, ticking={}", self.mode(), ticks.is_armed());
        renderer.request_redraw();
    }
}
