//! Queue commands, the events effects feed back, and rejection reasons.

use crate::auth::PasswordDigest;
use crate::call::CallSnapshot;
use crate::types::{SettingsError, TicketNumber, TicketRange, VenueSettings};
use thiserror::Error;
use uuid::Uuid;

/// Why a queue command was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The command needs an issued range
    #[error("no tickets have been issued")]
    NoTicketsIssued,

    /// The ticket is outside the issued range
    #[error("ticket {ticket} is not in the issued range {range}")]
    OutOfRange {
        /// Ticket presented
        ticket: TicketNumber,
        /// Range currently issued
        range: TicketRange,
    },

    /// A ticket that left cannot come back in
    #[error("ticket {0} has already checked out")]
    AlreadyCheckedOut(TicketNumber),

    /// Check-out before check-in
    #[error("ticket {0} has not checked in")]
    NotCheckedIn(TicketNumber),

    /// Venue settings failed validation
    #[error(transparent)]
    InvalidSettings(#[from] SettingsError),
}

impl Rejection {
    /// Short label for logs and metrics
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NoTicketsIssued => "no_tickets_issued",
            Self::OutOfRange { .. } => "out_of_range",
            Self::AlreadyCheckedOut(_) => "already_checked_out",
            Self::NotCheckedIn(_) => "not_checked_in",
            Self::InvalidSettings(_) => "invalid_settings",
        }
    }
}

/// Everything the queue reducer handles.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueAction {
    // ========== Commands ==========
    /// Set or replace the admin password
    SetPassword {
        /// Correlates the outcome with the request
        request_id: Uuid,
        /// Digest of the new password
        digest: PasswordDigest,
    },

    /// Change capacity and notify window
    ConfigureVenue {
        /// Correlates the outcome with the request
        request_id: Uuid,
        /// New settings
        settings: VenueSettings,
    },

    /// Start a new queue with a fresh range
    IssueTickets {
        /// Correlates the outcome with the request
        request_id: Uuid,
        /// Range of printed tickets
        range: TicketRange,
    },

    /// A ticket holder entered the venue
    CheckIn {
        /// Correlates the outcome with the request
        request_id: Uuid,
        /// Scanned ticket
        ticket: TicketNumber,
    },

    /// A ticket holder left the venue
    CheckOut {
        /// Correlates the outcome with the request
        request_id: Uuid,
        /// Scanned ticket
        ticket: TicketNumber,
    },

    /// Manually call one more number
    CallNext {
        /// Correlates the outcome with the request
        request_id: Uuid,
    },

    /// Manually step the call back one number
    CallPrevious {
        /// Correlates the outcome with the request
        request_id: Uuid,
    },

    /// Clear the queue (password and settings stay)
    Reset {
        /// Correlates the outcome with the request
        request_id: Uuid,
    },

    // ========== Events ==========
    /// A command was applied
    CommandApplied {
        /// Request that sent the command
        request_id: Uuid,
    },

    /// A command was refused; state is unchanged
    CommandRejected {
        /// Request that sent the command
        request_id: Uuid,
        /// Why
        rejection: Rejection,
    },

    /// The called number or the notify window changed
    ///
    /// Effects run concurrently, so these can reach observers out of order.
    /// Only the highest `revision` seen is current.
    CallChanged {
        /// State revision the snapshot was taken at
        revision: u64,
        /// New board contents
        call: CallSnapshot,
    },

    /// A snapshot reached the snapshot store
    SnapshotSaved {
        /// Revision written
        revision: u64,
    },

    /// A snapshot could not be written
    SnapshotFailed {
        /// Revision that failed
        revision: u64,
        /// Error description
        error: String,
    },
}

impl QueueAction {
    /// Request ID of a command or of a command outcome
    #[must_use]
    pub const fn request_id(&self) -> Option<Uuid> {
        match self {
            Self::SetPassword { request_id, .. }
            | Self::ConfigureVenue { request_id, .. }
            | Self::IssueTickets { request_id, .. }
            | Self::CheckIn { request_id, .. }
            | Self::CheckOut { request_id, .. }
            | Self::CallNext { request_id }
            | Self::CallPrevious { request_id }
            | Self::Reset { request_id }
            | Self::CommandApplied { request_id }
            | Self::CommandRejected { request_id, .. } => Some(*request_id),
            Self::CallChanged { .. } | Self::SnapshotSaved { .. } | Self::SnapshotFailed { .. } => {
                None
            },
        }
    }

    /// Whether this is the outcome (applied or rejected) of `request_id`
    #[must_use]
    pub fn is_outcome_of(&self, request_id: Uuid) -> bool {
        matches!(
            self,
            Self::CommandApplied { request_id: id } | Self::CommandRejected { request_id: id, .. }
                if *id == request_id
        )
    }

    /// Short command name for logs and metrics, `None` for events
    #[must_use]
    pub const fn command_name(&self) -> Option<&'static str> {
        match self {
            Self::SetPassword { .. } => Some("set_password"),
            Self::ConfigureVenue { .. } => Some("configure_venue"),
            Self::IssueTickets { .. } => Some("issue_tickets"),
            Self::CheckIn { .. } => Some("check_in"),
            Self::CheckOut { .. } => Some("check_out"),
            Self::CallNext { .. } => Some("call_next"),
            Self::CallPrevious { .. } => Some("call_previous"),
            Self::Reset { .. } => Some("reset"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_matching() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(QueueAction::CommandApplied { request_id: id }.is_outcome_of(id));
        assert!(QueueAction::CommandRejected {
            request_id: id,
            rejection: Rejection::NoTicketsIssued
        }
        .is_outcome_of(id));
        assert!(!QueueAction::CommandApplied { request_id: other }.is_outcome_of(id));
        assert!(!QueueAction::CallNext { request_id: id }.is_outcome_of(id));
        assert!(!QueueAction::SnapshotSaved { revision: 1 }.is_outcome_of(id));
    }

    #[test]
    fn test_request_id_and_names() {
        let id = Uuid::new_v4();
        let action = QueueAction::Reset { request_id: id };
        assert_eq!(action.request_id(), Some(id));
        assert_eq!(action.command_name(), Some("reset"));

        let event = QueueAction::CallChanged {
            revision: 1,
            call: CallSnapshot::default(),
        };
        assert_eq!(event.request_id(), None);
        assert_eq!(event.command_name(), None);
    }
}
