//! Deterministic password generator

use crate::error::InfraError;
use crate::secrets::PasswordGenerator;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Yields "generated-1", "generated-2", ...
#[derive(Debug, Clone, Default)]
pub struct SequencePasswordGenerator {
    counter: Arc<AtomicUsize>,
}

impl SequencePasswordGenerator {
    /// Create a generator starting at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many secrets have been handed out.
    pub fn generated(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

impl PasswordGenerator for SequencePasswordGenerator {
    fn generate(&self) -> Result<String, InfraError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("generated-{n}"))
    }
}
