//! External decoder invocation.

pub mod julius;
pub mod process;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::types::InputSource;

/// Everything one forced-alignment run needs.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub utterance_id: String,
    pub dictionary_path: PathBuf,
    pub grammar_path: PathBuf,
    pub input: InputSource,
}

/// Captured output of a successful run. `stdout` is the alignment trace.
#[derive(Debug, Clone, Default)]
pub struct EngineTrace {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Run-wide stop signal shared with every in-flight engine call.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
