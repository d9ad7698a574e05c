pub mod condition;
pub mod record;
pub mod snapshot;

pub use condition::ConditionBucket;
pub use record::{decode_weather, encode_weather, DataMap, DataValue};
pub use snapshot::{SnapshotReader, SnapshotStore, WeatherSnapshot};
