use std::time::Duration;

use crate::config::ControlConfig;
use crate::error::{CohortError, Result};

/// Point-in-time view of the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeResult {
    pub member_count: usize,
    pub service_found: bool,
}

impl ProbeResult {
    pub fn new(member_count: usize, service_found: bool) -> Self {
        Self {
            member_count,
            service_found,
        }
    }
}

/// State the cluster must reach for `ensure` to succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceTarget {
    /// Expected member count, the local control process included.
    pub expected_members: usize,
    /// Service that must resolve.
    pub required_service: String,
    /// Attempt budget, at least 1.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub poll_interval: Duration,
}

impl ConvergenceTarget {
    /// Build a target with an explicit member count (local process included).
    pub fn new(
        expected_members: usize,
        required_service: impl Into<String>,
        max_attempts: u32,
        poll_interval: Duration,
    ) -> Result<Self> {
        if max_attempts == 0 {
            return Err(CohortError::InvalidArgument(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if poll_interval.is_zero() {
            return Err(CohortError::InvalidArgument(
                "poll_interval must be positive".to_string(),
            ));
        }

        Ok(Self {
            expected_members,
            required_service: required_service.into(),
            max_attempts,
            poll_interval,
        })
    }

    /// Build a target from the number of *other* members the caller wants.
    ///
    /// The control process is a member itself, so `others + 1` are expected.
    pub fn for_other_members(others: usize, config: &ControlConfig) -> Result<Self> {
        let expected_members = others.checked_add(1).ok_or_else(|| {
            CohortError::InvalidArgument(format!("Member count {} is too large", others))
        })?;

        Self::new(
            expected_members,
            config.required_service.clone(),
            config.max_attempts,
            config.poll_interval(),
        )
    }

    /// Whether an observation satisfies this target.
    pub fn is_met_by(&self, observed: &ProbeResult) -> bool {
        observed.member_count == self.expected_members && observed.service_found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_members_include_self() {
        let config = ControlConfig::default();
        let target = ConvergenceTarget::for_other_members(3, &config).unwrap();
        let direct = ConvergenceTarget::new(
            4,
            config.required_service.clone(),
            config.max_attempts,
            config.poll_interval(),
        )
        .unwrap();
        assert_eq!(target, direct);
    }

    #[test]
    fn test_other_members_at_usize_max_is_rejected() {
        let err = ConvergenceTarget::for_other_members(usize::MAX, &ControlConfig::default())
            .unwrap_err();
        assert!(matches!(err, CohortError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_empty_budget() {
        let err = ConvergenceTarget::new(2, "cache", 0, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, CohortError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(ConvergenceTarget::new(2, "cache", 3, Duration::ZERO).is_err());
    }

    #[test]
    fn test_needs_both_count_and_service() {
        let target = ConvergenceTarget::new(2, "cache", 3, Duration::from_millis(10)).unwrap();
        assert!(target.is_met_by(&ProbeResult::new(2, true)));
        assert!(!target.is_met_by(&ProbeResult::new(2, false)));
        assert!(!target.is_met_by(&ProbeResult::new(3, true)));
        assert!(!target.is_met_by(&ProbeResult::new(1, true)));
    }
}
