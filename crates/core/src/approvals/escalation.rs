use serde::{Deserialize, Serialize};

use crate::domain::employee::Employee;
use crate::domain::leave::Leave;
use crate::errors::DomainError;

/// Longest leave span (in days) a given authority level may sign off alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityThreshold {
    pub max_span_days: i64,
    pub required_level: i32,
}

/// Maps a leave's span to the minimum authority level that can approve it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Checked in ascending `max_span_days` order.
    pub thresholds: Vec<AuthorityThreshold>,
    /// Required level when the span exceeds every threshold.
    pub fallback_level: i32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            thresholds: vec![
                AuthorityThreshold { max_span_days: 5, required_level: 0 },
                AuthorityThreshold { max_span_days: 10, required_level: 3 },
            ],
            fallback_level: 5,
        }
    }
}

impl EscalationPolicy {
    pub fn required_authority_level(&self, span_days: i64) -> i32 {
        let mut thresholds = self.thresholds.clone();
        thresholds.sort_by_key(|threshold| threshold.max_span_days);
        thresholds
            .iter()
            .find(|threshold| span_days <= threshold.max_span_days)
            .map(|threshold| threshold.required_level)
            .unwrap_or(self.fallback_level)
    }

    /// True when `approver`'s current authority is below what the leave's
    /// span requires, so someone above them must also approve.
    pub fn needs_next_reviewer(
        &self,
        leave: &Leave,
        approver: &Employee,
    ) -> Result<bool, DomainError> {
        let level = approver.authority_level().ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "reviewer {} has no position and therefore no authority level",
                approver.id
            ))
        })?;

        Ok(level < self.required_authority_level(leave.span_days()))
    }
}
