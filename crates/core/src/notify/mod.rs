//! Run event notifications for front-ends.

mod events;
mod sinks;

pub use events::RunEvent;
pub use sinks::{BroadcastSink, FanoutSink, NotificationSink, NullSink, TracingSink};
