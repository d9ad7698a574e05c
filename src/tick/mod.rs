pub mod boundary;
pub mod clock;
pub mod scheduler;

pub use clock::{AnchoredClock, Clock, SystemClock};
pub use scheduler::{TickControl, TickScheduler};
