pub mod controller;
pub mod frame;
pub mod host;
pub mod render;

pub use controller::FaceController;
pub use frame::{FaceFrame, FrameContext};
pub use host::FaceHost;
pub use render::{RedrawSignal, Renderer};
