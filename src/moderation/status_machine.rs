use crate::error::ModerationError;
use crate::moderation::ReportStatus;

/// Service for managing report status transitions
pub struct StatusMachine;

impl StatusMachine {
    /// Check if a status transition is valid
    ///
    /// # Valid Transitions
    /// - Pending → Confirmed, Rejected
    /// - Confirmed, Rejected → (terminal, nothing allowed, not even itself)
    pub fn is_valid_transition(from: ReportStatus, to: ReportStatus) -> bool {
        matches!(
            (from, to),
            (ReportStatus::Pending, ReportStatus::Confirmed)
                | (ReportStatus::Pending, ReportStatus::Rejected)
        )
    }

    /// Attempt to move report `report_id` from `from` to `to`
    ///
    /// # Returns
    /// `Ok(to)` if the transition is valid, `AlreadyHandled` when the report
    /// has left the pending state
    pub fn transition(
        report_id: i64,
        from: ReportStatus,
        to: ReportStatus,
    ) -> Result<ReportStatus, ModerationError> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(ModerationError::AlreadyHandled {
                report_id,
                status: from,
            })
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn report_status_strategy() -> impl Strategy<Value = ReportStatus> {
        prop_oneof![
            Just(ReportStatus::Pending),
            Just(ReportStatus::Confirmed),
            Just(ReportStatus::Rejected),
        ]
    }

    /// Property: terminal statuses never change again
    #[test]
    fn prop_terminal_statuses_are_final() {
        proptest!(|(from in report_status_strategy(), to in report_status_strategy())| {
            if from.is_terminal() {
                prop_assert!(
                    !StatusMachine::is_valid_transition(from, to),
                    "No transition should be allowed from {} to {}",
                    from,
                    to
                );
            }
        });
    }

    /// Property: every valid transition starts at pending and ends terminal
    #[test]
    fn prop_valid_transitions_leave_pending() {
        proptest!(|(from in report_status_strategy(), to in report_status_strategy())| {
            if StatusMachine::is_valid_transition(from, to) {
                prop_assert_eq!(from, ReportStatus::Pending);
                prop_assert!(to.is_terminal());
            }
        });
    }

    /// Property: transition() and is_valid_transition() agree
    #[test]
    fn prop_transition_consistency() {
        proptest!(|(from in report_status_strategy(), to in report_status_strategy())| {
            let is_valid = StatusMachine::is_valid_transition(from, to);
            let result = StatusMachine::transition(1, from, to);
            if is_valid {
                prop_assert_eq!(result.unwrap(), to);
            } else {
                let is_already_handled = matches!(result, Err(ModerationError::AlreadyHandled { .. }));
                prop_assert!(is_already_handled);
            }
        });
    }
}
