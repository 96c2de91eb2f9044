use std::time::Duration;

pub const BASE_RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

/// Reconnect schedule for the market feed: linear backoff
/// (attempt * base delay) with a hard attempt budget. Once the budget is
/// spent the feed loop must stop retrying and report a terminal
/// disconnect.
#[derive(Debug, Default)]
pub struct ReconnectPolicy {
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection was established; the next failure starts a fresh budget.
    pub fn on_connected(&mut self) {
        self.attempt = 0;
    }

    pub fn on_failure(&mut self) -> Reconnect {
        self.attempt += 1;
        if self.attempt > MAX_RECONNECT_ATTEMPTS {
            Reconnect::GiveUp
        } else {
            Reconnect::Retry {
                attempt: self.attempt,
                delay: BASE_RECONNECT_DELAY * self.attempt,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_is_linear_then_terminal() {
        let mut policy = ReconnectPolicy::new();

        for expected in 1..=MAX_RECONNECT_ATTEMPTS {
            match policy.on_failure() {
                Reconnect::Retry { attempt, delay } => {
                    assert_eq!(attempt, expected);
                    assert_eq!(delay, BASE_RECONNECT_DELAY * expected);
                }
                Reconnect::GiveUp => panic!("gave up inside the attempt budget"),
            }
        }

        assert_eq!(policy.on_failure(), Reconnect::GiveUp);
    }

    #[test]
    fn successful_connection_resets_the_budget() {
        let mut policy = ReconnectPolicy::new();

        for _ in 0..MAX_RECONNECT_ATTEMPTS {
            policy.on_failure();
        }
        policy.on_connected();

        assert_eq!(
            policy.on_failure(),
            Reconnect::Retry {
                attempt: 1,
                delay: BASE_RECONNECT_DELAY
            }
        );
    }
}
