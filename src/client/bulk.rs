//! Bulk operation results

use crate::error::Error;

/// Outcome of a batch where every item succeeds or fails on its own.
///
/// Both lists keep the order of the inputs.
#[derive(Debug)]
pub struct BulkOperationResult<I, T> {
    pub succeeded: Vec<(I, T)>,
    pub failed: Vec<(I, Error)>,
}

impl<I, T> Default for BulkOperationResult<I, T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<I, T> BulkOperationResult<I, T> {
    /// Record one item's outcome
    pub fn push(&mut self, input: I, outcome: Result<T, Error>) {
        match outcome {
            Ok(output) => self.succeeded.push((input, output)),
            Err(err) => self.failed.push((input, err)),
        }
    }

    /// Number of items processed
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Inputs that succeeded
    pub fn succeeded_inputs(&self) -> impl Iterator<Item = &I> {
        self.succeeded.iter().map(|(input, _)| input)
    }

    /// Inputs that failed
    pub fn failed_inputs(&self) -> impl Iterator<Item = &I> {
        self.failed.iter().map(|(input, _)| input)
    }
}

impl<I, T> FromIterator<(I, Result<T, Error>)> for BulkOperationResult<I, T> {
    fn from_iter<It: IntoIterator<Item = (I, Result<T, Error>)>>(iter: It) -> Self {
        let mut result = Self::default();
        for (input, outcome) in iter {
            result.push(input, outcome);
        }
        result
    }
}
