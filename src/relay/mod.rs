//! Room relay: typed connection events and message fan-out.

mod dispatcher;
mod types;

pub use dispatcher::{DeliveryResult, RelayDispatcher, RelayStatsSnapshot};
pub use types::{Envelope, RelayEvent};
