use chrono::Utc;

/// Current time as epoch seconds, the unit every persisted timestamp uses.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
