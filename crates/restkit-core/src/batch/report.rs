//! Partial-failure reports for tool output.

use std::fmt::Display;

use serde::Serialize;

use super::{BatchEntry, BatchResult};
use crate::error::{ApiError, Retryable};

/// Summary of a batch suitable for returning to an agent.
///
/// Successful keys are counted; each failure is listed with enough detail for
/// the caller to decide whether to resubmit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub label: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<BatchFailure>,
}

/// One rejected entry of a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub key: String,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub retryable: bool,
    pub error: String,
}

impl BatchReport {
    /// True when every entry succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<K: Display, T> BatchResult<K, T, ApiError> {
    /// Builds the partial-failure report for this result.
    pub fn report(&self, label: &str) -> BatchReport {
        let failed = self
            .iter()
            .filter_map(|entry| match entry {
                BatchEntry::Rejected { key, index, reason } => Some(BatchFailure {
                    key: key.to_string(),
                    index: *index,
                    status: reason.status(),
                    retryable: reason.is_retryable(),
                    error: reason.to_string(),
                }),
                BatchEntry::Fulfilled { .. } => None,
            })
            .collect::<Vec<_>>();

        BatchReport {
            label: label.to_string(),
            total: self.len(),
            succeeded: self.len() - failed.len(),
            failed,
        }
    }
}
