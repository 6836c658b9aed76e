//! Push key generation

use chrono::Utc;

/// Generates keys that sort in creation order
///
/// Keys combine the wall-clock millisecond with a sequence number, so they
/// keep sorting after keys written by an earlier process.
#[derive(Debug, Default)]
pub struct PushKeyGenerator {
    last_millis: i64,
    sequence: u32,
}

impl PushKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next key, strictly greater than every key returned before
    pub fn next_key(&mut self) -> String {
        self.next_key_at(Utc::now().timestamp_millis())
    }

    fn next_key_at(&mut self, now_millis: i64) -> String {
        if now_millis > self.last_millis {
            self.last_millis = now_millis;
            self.sequence = 0;
        } else {
            self.sequence += 1;
        }
        format!("{:013}-{:06}", self.last_millis, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_increase_within_same_millisecond() {
        let mut keys = PushKeyGenerator::new();
        let a = keys.next_key_at(1_000);
        let b = keys.next_key_at(1_000);
        assert!(a < b);
    }

    #[test]
    fn test_keys_survive_clock_going_backwards() {
        let mut keys = PushKeyGenerator::new();
        let a = keys.next_key_at(2_000);
        let b = keys.next_key_at(1_500);
        assert!(a < b);
    }

    #[test]
    fn test_keys_order_across_milliseconds() {
        let mut keys = PushKeyGenerator::new();
        let a = keys.next_key_at(999);
        let _ = keys.next_key_at(999);
        let c = keys.next_key_at(1_000);
        assert!(a < c);
        assert_eq!(c, "0000000001000-000000");
    }
}
