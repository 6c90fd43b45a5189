// Copyright © 2024 Pathway

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How an engine run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Outcome {
    Finished,
    Aborted,
}

/// Shared "keep running" flag. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct RunningFlag {
    keep_running: Arc<AtomicBool>,
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningFlag {
    pub fn new() -> Self {
        Self {
            keep_running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn from_atomic(keep_running: Arc<AtomicBool>) -> Self {
        Self { keep_running }
    }

    pub fn is_running(&self) -> bool {
        self.keep_running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.keep_running.store(false, Ordering::Release);
    }
}
