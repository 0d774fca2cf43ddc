use crate::orders::models::OrderStatus;

/// Service for managing order status transitions
///
/// Transitions are manager-initiated; the storefront itself only ever
/// creates orders in the New state.
pub struct StatusMachine;

impl StatusMachine {
    /// Check if a status transition is valid
    ///
    /// # Valid Transitions
    /// - New → Processing, Cancelled
    /// - Processing → Shipped, Cancelled
    /// - Shipped → Completed, Cancelled
    /// - Completed, Cancelled → terminal, no transitions out
    /// - Any status → same status (idempotent)
    pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        if from == to {
            return true;
        }

        match (from, to) {
            (OrderStatus::New, OrderStatus::Processing) => true,
            (OrderStatus::New, OrderStatus::Cancelled) => true,

            (OrderStatus::Processing, OrderStatus::Shipped) => true,
            (OrderStatus::Processing, OrderStatus::Cancelled) => true,

            (OrderStatus::Shipped, OrderStatus::Completed) => true,
            (OrderStatus::Shipped, OrderStatus::Cancelled) => true,

            // Terminal states
            (OrderStatus::Completed, _) => false,
            (OrderStatus::Cancelled, _) => false,

            _ => false,
        }
    }

    /// Attempt to transition from one status to another
    ///
    /// # Returns
    /// `Ok(to)` if the transition is valid, `Err(message)` otherwise
    pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<OrderStatus, String> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(format!("Invalid status transition from {} to {}", from, to))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::New,
            OrderStatus::Processing
        ));
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Processing,
            OrderStatus::Shipped
        ));
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Shipped,
            OrderStatus::Completed
        ));
    }

    #[test]
    fn test_cancel_from_non_terminal_states() {
        for from in [
            OrderStatus::New,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ] {
            assert!(StatusMachine::is_valid_transition(from, OrderStatus::Cancelled));
        }
    }

    #[test]
    fn test_completed_is_terminal() {
        for to in [
            OrderStatus::New,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            assert!(!StatusMachine::is_valid_transition(OrderStatus::Completed, to));
        }
    }

    #[test]
    fn test_cancelled_is_terminal() {
        for to in [
            OrderStatus::New,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Completed,
        ] {
            assert!(!StatusMachine::is_valid_transition(OrderStatus::Cancelled, to));
        }
    }

    #[test]
    fn test_no_skipping_forward() {
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::New,
            OrderStatus::Shipped
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::New,
            OrderStatus::Completed
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Processing,
            OrderStatus::Completed
        ));
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Processing,
            OrderStatus::New
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Shipped,
            OrderStatus::Processing
        ));
    }

    #[test]
    fn test_same_status_is_idempotent() {
        for status in [
            OrderStatus::New,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert!(StatusMachine::is_valid_transition(status, status));
        }
    }

    #[test]
    fn test_transition_returns_target() {
        let result = StatusMachine::transition(OrderStatus::New, OrderStatus::Processing);
        assert_eq!(result.unwrap(), OrderStatus::Processing);
    }

    #[test]
    fn test_transition_error_message() {
        let result = StatusMachine::transition(OrderStatus::Cancelled, OrderStatus::New);
        assert!(result.unwrap_err().contains("Invalid status transition"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn order_status_strategy() -> impl Strategy<Value = OrderStatus> {
        prop_oneof![
            Just(OrderStatus::New),
            Just(OrderStatus::Processing),
            Just(OrderStatus::Shipped),
            Just(OrderStatus::Completed),
            Just(OrderStatus::Cancelled),
        ]
    }

    /// Cancellation is reachable from every non-terminal state and only
    /// from those
    #[test]
    fn prop_cancel_reachable_from_non_terminal() {
        proptest!(|(from in order_status_strategy())| {
            let can_cancel = StatusMachine::is_valid_transition(from, OrderStatus::Cancelled);
            if from == OrderStatus::Cancelled {
                prop_assert!(can_cancel); // idempotent same-status case
            } else {
                prop_assert_eq!(can_cancel, !from.is_terminal());
            }
        });
    }

    /// Terminal states admit no transition except to themselves
    #[test]
    fn prop_terminal_states_are_sinks() {
        proptest!(|(to in order_status_strategy())| {
            for terminal in [OrderStatus::Completed, OrderStatus::Cancelled] {
                if to != terminal {
                    prop_assert!(!StatusMachine::is_valid_transition(terminal, to));
                }
            }
        });
    }

    /// transition() agrees with is_valid_transition()
    #[test]
    fn prop_transition_consistency() {
        proptest!(|(
            from in order_status_strategy(),
            to in order_status_strategy()
        )| {
            let is_valid = StatusMachine::is_valid_transition(from, to);
            let result = StatusMachine::transition(from, to);

            if is_valid {
                prop_assert_eq!(result.unwrap(), to);
            } else {
                prop_assert!(result.is_err());
            }
        });
    }
}
