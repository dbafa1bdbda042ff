//! Build outcomes and summaries

use std::fmt;

use crate::error::{IndexError, Result};

/// Counters reported at the end of every build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Files the build was asked to process
    pub files_total: usize,
    /// Files fully processed
    pub files_processed: usize,
    /// Files skipped because they could not be read
    pub files_failed: usize,
    /// Identifiers dropped because an earlier file already claimed them
    pub collisions: usize,
    /// Entries in the result
    pub exported: usize,
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} files processed, {} failed, {} collisions, {} entries",
            self.files_processed, self.files_total, self.files_failed, self.collisions, self.exported
        )
    }
}

/// Result of a build that may be cancelled
///
/// Cancellation is an expected outcome, not an error. A cancelled build
/// discards its partial result and keeps only the counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome<T> {
    /// All files were visited
    Completed(T),
    /// The cancellation token fired between files
    Cancelled(BuildSummary),
}

impl<T> BuildOutcome<T> {
    /// Check if the build was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Completed value, or [`IndexError::Cancelled`]
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Cancelled(_) => Err(IndexError::Cancelled),
        }
    }
}
