use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::Stage;
use crate::error::{Result, SiftError};

/// Cooperative cancellation flag shared between a caller and a running pipeline
///
/// Clones share the same flag. Stages poll it at least once per page or
/// embedding batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    stop_requested: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation has been requested
    pub fn check(&self, stage: Stage) -> Result<()> {
        if self.is_cancelled() {
            Err(SiftError::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}
