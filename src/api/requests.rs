//! API request bodies not shared with the services

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Optional body of the timer control endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerControlRequest {
    /// Start timestamp override for `start`
    pub start_time: Option<DateTime<Utc>>,
    /// New duration in milliseconds for `reset`
    pub duration: Option<u64>,
    /// Signed milliseconds for `adjust`
    pub adjustment: Option<i64>,
}

/// Query string of the room event stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeQuery {
    pub role: Option<String>,
    pub client: Option<String>,
}
