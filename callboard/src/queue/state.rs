//! Queue board state.
//!
//! This is also the persisted snapshot: it serializes to the JSON state file
//! as is.

use crate::auth::PasswordDigest;
use crate::call::{self, Attendance, CallSnapshot, Occupancy, TicketProgress};
use crate::types::{TicketNumber, TicketRange, VenueSettings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// State of the queue board.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueState {
    /// Issued range, `None` before the first issue
    pub range: Option<TicketRange>,
    /// Capacity and notify window
    pub settings: VenueSettings,
    /// How many tickets from the start of the range have been called
    pub called: u32,
    /// Tickets that checked in (ever)
    pub checked_in: BTreeSet<TicketNumber>,
    /// Tickets that checked out; always a subset of `checked_in`
    pub checked_out: BTreeSet<TicketNumber>,
    /// Admin password digest
    pub admin_password: Option<PasswordDigest>,
    /// Bumped on every applied command
    pub revision: u64,
    /// When the last command was applied
    pub updated_at: Option<DateTime<Utc>>,
    /// Last snapshot write error, cleared by the next successful write
    #[serde(skip)]
    pub last_persist_error: Option<String>,
}

/// Counts for the admin summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    /// Tickets ever checked in
    pub checked_in_count: u32,
    /// Tickets checked out
    pub checked_out_count: u32,
    /// People inside now
    pub inside: u32,
    /// Tickets in the issued range
    pub distributed_count: u32,
    /// Tickets called so far
    pub called: u32,
    /// Number currently being called
    pub current_call_number: Option<TicketNumber>,
    /// Issued range
    pub range: Option<TicketRange>,
    /// Venue settings
    pub settings: VenueSettings,
    /// Whether an admin password is set
    pub password_set: bool,
    /// Last snapshot write error
    pub persist_error: Option<String>,
}

#[allow(clippy::cast_possible_truncation)] // Sets are bounded by MAX_TICKETS
impl QueueState {
    /// Tickets in the issued range
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.range.as_ref().map_or(0, TicketRange::len)
    }

    /// Distinct tickets ever checked in
    #[must_use]
    pub fn arrived(&self) -> u32 {
        self.checked_in.len() as u32
    }

    /// People inside now
    #[must_use]
    pub fn inside(&self) -> u32 {
        self.arrived()
            .saturating_sub(self.checked_out.len() as u32)
    }

    /// Inputs of the call rule
    #[must_use]
    pub fn occupancy(&self) -> Occupancy {
        Occupancy {
            capacity: self.settings.max_inside,
            inside: self.inside(),
            arrived: self.arrived(),
            issued: self.issued(),
        }
    }

    /// What the user board shows
    #[must_use]
    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot::new(self.range.as_ref(), self.called, self.settings.notify_count)
    }

    /// Where `ticket` stands, `None` if it was not issued
    #[must_use]
    pub fn progress(&self, ticket: TicketNumber) -> Option<TicketProgress> {
        let range = self.range.as_ref()?;
        TicketProgress::new(
            range,
            self.called,
            self.settings.notify_count,
            ticket,
            Attendance {
                checked_in: self.checked_in.contains(&ticket),
                checked_out: self.checked_out.contains(&ticket),
            },
        )
    }

    /// Move the call forward as far as capacity allows
    pub fn advance_call(&mut self) {
        self.called = call::advance(self.called, &self.occupancy());
    }

    /// Clear the queue, keeping password and settings
    pub fn clear_queue(&mut self) {
        self.range = None;
        self.called = 0;
        self.checked_in.clear();
        self.checked_out.clear();
    }

    /// Counts for the admin summary
    #[must_use]
    pub fn summary(&self) -> QueueSummary {
        QueueSummary {
            checked_in_count: self.arrived(),
            checked_out_count: self.checked_out.len() as u32,
            inside: self.inside(),
            distributed_count: self.issued(),
            called: self.called,
            current_call_number: self.snapshot().current,
            range: self.range,
            settings: self.settings,
            password_set: self.admin_password.is_some(),
            persist_error: self.last_persist_error.clone(),
        }
    }

    /// Bring a loaded snapshot back within its invariants
    ///
    /// A hand-edited state file may hold tickets outside the range, checkouts
    /// without check-ins, or a call past the end.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        match self.range {
            Some(range) => {
                self.checked_in.retain(|t| range.contains(*t));
                let checked_in = &self.checked_in;
                self.checked_out.retain(|t| checked_in.contains(t));
                self.called = self.called.min(range.len());
            },
            None => self.clear_queue(),
        }
        if VenueSettings::new(self.settings.max_inside, self.settings.notify_count).is_err() {
            self.settings = VenueSettings::default();
        }
        self
    }
}
