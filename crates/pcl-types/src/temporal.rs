use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as milliseconds since the UNIX epoch.
///
/// A clock set before 1970 reads as zero rather than failing.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn now_does_not_go_backwards_within_a_call_pair() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
