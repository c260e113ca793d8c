use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Source of wall-clock time used to mint retirement tags.
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now_unix_secs(&self) -> i64;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock for tests. Every reading advances by `step` seconds so that
/// consecutive runs mint distinct tags.
#[derive(Debug)]
pub struct FixedClock {
    time: AtomicI64,
    step: i64,
}

impl FixedClock {
    pub fn new(time: i64) -> FixedClock {
        FixedClock { time: AtomicI64::new(time), step: 0 }
    }

    pub fn stepping(time: i64, step: i64) -> FixedClock {
        FixedClock { time: AtomicI64::new(time), step }
    }
}

impl Clock for FixedClock {
    fn now_unix_secs(&self) -> i64 {
        self.time.fetch_add(self.step, Ordering::SeqCst)
    }
}
