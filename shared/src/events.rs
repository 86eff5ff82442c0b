use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emitted by a tick for every projection whose rounded population moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationChange {
    pub country: String,
    pub old: u64,
    pub new: u64,
    /// `new - old` after clamping at zero.
    pub delta: i64,
    /// Cumulative delta since tracking began.
    pub total_change: i64,
    pub at: DateTime<Utc>,
}

impl PopulationChange {
    pub fn is_increase(&self) -> bool {
        self.delta > 0
    }
}
