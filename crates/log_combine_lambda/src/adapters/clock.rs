use std::time::Duration;

/// Wall-clock budget of the current invocation. The merge loop consults it
/// between files and yields a continuation marker when the remaining time
/// drops below the configured safety margin.
pub trait TimeBudget {
    fn remaining(&self) -> Duration;
}
