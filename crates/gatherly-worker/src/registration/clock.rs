use std::sync::Arc;

use crate::util::now_ts;

/// Source of the current Unix time in seconds.
pub trait Clock {
    fn now_ts(&self) -> i64;
}

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ts(&self) -> i64 {
        now_ts()
    }
}

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
