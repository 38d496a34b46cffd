use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, used for token expiry checks.
pub fn timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs()
}
