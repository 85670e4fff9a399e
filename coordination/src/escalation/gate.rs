//! Delay Gate: minimum spacing between consecutive attempts
//!
//! The trigger fires every minute or few minutes, which is shorter than the
//! escalation delay, so every tick re-checks elapsed wall-clock time.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// What the minimum delay is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayAnchor {
    /// Time the most recent call was placed.
    #[default]
    LastAttempt,
    /// Additionally wait `min_delay` after the provider's end timestamp of
    /// the most recent call.
    CallEnd,
}

/// True if a new attempt may be placed now.
pub fn can_attempt(
    last_attempt_at: Option<DateTime<Utc>>,
    min_delay: TimeDelta,
    now: DateTime<Utc>,
) -> bool {
    remaining(last_attempt_at, min_delay, now).is_none()
}

/// Time left before the gate opens, or `None` if it is open.
pub fn remaining(
    since: Option<DateTime<Utc>>,
    min_delay: TimeDelta,
    now: DateTime<Utc>,
) -> Option<TimeDelta> {
    let since = since?;
    let elapsed = now - since;
    (elapsed < min_delay).then(|| min_delay - elapsed)
}
