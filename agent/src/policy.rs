/// What an agent does when a tick's delivery fails.
///
/// The fleet runs best-effort: the default policy drops the frame and lets
/// the next tick try again naturally. The seam exists so a retrying policy
/// could be swapped in without touching the tick loop.
pub trait FailurePolicy: Send + Sync {
    /// Returns `true` if delivery should be attempted again within the
    /// same tick. `attempt` starts at 1 for the first failed try.
    fn should_retry(&self, attempt: u32) -> bool;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// At most one attempt per tick; failures are logged and dropped.
pub struct DropAndContinue;

impl FailurePolicy for DropAndContinue {
    fn should_retry(&self, _attempt: u32) -> bool {
        false
    }

    fn name(&self) -> &str {
        "drop-and-continue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_and_continue_never_retries() {
        let policy = DropAndContinue;
        for attempt in 1..=5 {
            assert!(!policy.should_retry(attempt));
        }
        assert_eq!(policy.name(), "drop-and-continue");
    }
}
