//! The call rule: which ticket is being called, and who should get ready.
//!
//! The board counts `called`, the number of tickets (from the start of the
//! range) that have been called so far. Capacity moves it forward:
//!
//! ```text
//! vacancies   = capacity - inside            (saturating)
//! call_target = min(issued, arrived + vacancies)
//! called      = max(called, call_target)
//! ```
//!
//! Every ticket that already arrived has been called, and at most
//! `vacancies` called tickets may still be on their way. Automatic movement
//! never goes backwards; only the manual `call_previous` does.

use crate::types::{TicketNumber, TicketRange};
use serde::{Deserialize, Serialize};

/// Inputs of the call rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    /// Venue capacity
    pub capacity: u32,
    /// Checked in and not yet checked out
    pub inside: u32,
    /// Distinct tickets ever checked in
    pub arrived: u32,
    /// Tickets in the issued range
    pub issued: u32,
}

impl Occupancy {
    /// Free places in the venue
    #[must_use]
    pub const fn vacancies(&self) -> u32 {
        self.capacity.saturating_sub(self.inside)
    }

    /// How many tickets should have been called by now
    #[must_use]
    pub const fn call_target(&self) -> u32 {
        let target = self.arrived.saturating_add(self.vacancies());
        if target < self.issued {
            target
        } else {
            self.issued
        }
    }
}

/// Move `called` forward to the capacity target, never backwards.
#[must_use]
pub fn advance(called: u32, occupancy: &Occupancy) -> u32 {
    called.max(occupancy.call_target()).min(occupancy.issued)
}

/// Manual "next number".
#[must_use]
pub fn call_next(called: u32, issued: u32) -> u32 {
    called.saturating_add(1).min(issued)
}

/// Manual "previous number".
#[must_use]
pub const fn call_previous(called: u32) -> u32 {
    called.saturating_sub(1)
}

/// What the user board shows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallSnapshot {
    /// Number currently being called, `None` before the first call
    pub current: Option<TicketNumber>,
    /// Numbers that should get ready, starting with the current one
    pub notify: Vec<TicketNumber>,
}

impl CallSnapshot {
    /// Snapshot of a board that has called `called` tickets of `range`.
    #[must_use]
    pub fn new(range: Option<&TicketRange>, called: u32, notify_count: u32) -> Self {
        let Some(range) = range else {
            return Self::default();
        };

        let current = called.checked_sub(1).and_then(|i| range.nth(i));
        let first = called.saturating_sub(1);
        let notify = (first..first.saturating_add(notify_count))
            .map_while(|i| range.nth(i))
            .collect();

        Self { current, notify }
    }
}

/// Where one ticket stands in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketProgress {
    /// The ticket asked about
    pub ticket: TicketNumber,
    /// Number currently being called
    pub current: Option<TicketNumber>,
    /// Calls still to go before this ticket; 0 once called
    pub ahead: u32,
    /// Whether this ticket has been called
    pub called: bool,
    /// Whether this ticket is in the "get ready" window
    pub near: bool,
    /// Whether this ticket has checked in
    pub checked_in: bool,
    /// Whether this ticket has checked out
    pub checked_out: bool,
}

/// Check-in flags for [`TicketProgress::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attendance {
    /// Has checked in
    pub checked_in: bool,
    /// Has checked out
    pub checked_out: bool,
}

impl TicketProgress {
    /// Progress of `ticket`, or `None` if it is not in `range`.
    #[must_use]
    pub fn new(
        range: &TicketRange,
        called: u32,
        notify_count: u32,
        ticket: TicketNumber,
        attendance: Attendance,
    ) -> Option<Self> {
        let position = range.position(ticket)?;
        let snapshot = CallSnapshot::new(Some(range), called, notify_count);

        Some(Self {
            ticket,
            current: snapshot.current,
            ahead: (position + 1).saturating_sub(called),
            called: position < called,
            near: snapshot.notify.contains(&ticket),
            checked_in: attendance.checked_in,
            checked_out: attendance.checked_out,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn numbers(tickets: &[TicketNumber]) -> Vec<u32> {
        tickets.iter().map(|t| t.value()).collect()
    }

    #[test]
    fn test_empty_board_calls_up_to_capacity() {
        let occupancy = Occupancy {
            capacity: 3,
            inside: 0,
            arrived: 0,
            issued: 100,
        };
        assert_eq!(advance(0, &occupancy), 3);
    }

    #[test]
    fn test_full_venue_holds_the_call() {
        let occupancy = Occupancy {
            capacity: 3,
            inside: 3,
            arrived: 3,
            issued: 100,
        };
        assert_eq!(occupancy.vacancies(), 0);
        assert_eq!(advance(3, &occupancy), 3);
    }

    #[test]
    fn test_checkout_frees_a_place() {
        let occupancy = Occupancy {
            capacity: 3,
            inside: 2,
            arrived: 3,
            issued: 100,
        };
        assert_eq!(advance(3, &occupancy), 4);
    }

    #[test]
    fn test_overfull_venue_saturates() {
        let occupancy = Occupancy {
            capacity: 2,
            inside: 5,
            arrived: 5,
            issued: 10,
        };
        assert_eq!(occupancy.vacancies(), 0);
        assert_eq!(advance(7, &occupancy), 7);
    }

    #[test]
    fn test_target_capped_by_issued() {
        let occupancy = Occupancy {
            capacity: 50,
            inside: 0,
            arrived: 0,
            issued: 10,
        };
        assert_eq!(advance(0, &occupancy), 10);
    }

    #[test]
    fn test_manual_moves_clamp() {
        assert_eq!(call_next(9, 10), 10);
        assert_eq!(call_next(10, 10), 10);
        assert_eq!(call_previous(1), 0);
        assert_eq!(call_previous(0), 0);
    }

    #[test]
    fn test_snapshot_nothing_called() {
        let range = TicketRange::new(1, 10).unwrap();
        let snapshot = CallSnapshot::new(Some(&range), 0, 3);
        assert_eq!(snapshot.current, None);
        assert_eq!(numbers(&snapshot.notify), vec![1, 2, 3]);
    }

    #[test]
    fn test_snapshot_window_includes_current() {
        let range = TicketRange::new(101, 110).unwrap();
        let snapshot = CallSnapshot::new(Some(&range), 4, 3);
        assert_eq!(snapshot.current, Some(TicketNumber::new(104)));
        assert_eq!(numbers(&snapshot.notify), vec![104, 105, 106]);
    }

    #[test]
    fn test_snapshot_window_stops_at_end() {
        let range = TicketRange::new(1, 10).unwrap();
        let snapshot = CallSnapshot::new(Some(&range), 9, 5);
        assert_eq!(numbers(&snapshot.notify), vec![9, 10]);
    }

    #[test]
    fn test_snapshot_without_range() {
        assert_eq!(CallSnapshot::new(None, 4, 3), CallSnapshot::default());
    }

    #[test]
    fn test_snapshot_serializes_null_current() {
        let json = serde_json::to_string(&CallSnapshot::default()).unwrap();
        assert_eq!(json, r#"{"current":null,"notify":[]}"#);
    }

    #[test]
    fn test_progress() {
        let range = TicketRange::new(1, 20).unwrap();

        let waiting =
            TicketProgress::new(&range, 4, 3, TicketNumber::new(6), Attendance::default()).unwrap();
        assert_eq!(waiting.ahead, 2);
        assert!(!waiting.called);
        assert!(waiting.near);

        let far =
            TicketProgress::new(&range, 4, 3, TicketNumber::new(15), Attendance::default()).unwrap();
        assert_eq!(far.ahead, 11);
        assert!(!far.near);

        let called = TicketProgress::new(
            &range,
            4,
            3,
            TicketNumber::new(2),
            Attendance {
                checked_in: true,
                checked_out: false,
            },
        )
        .unwrap();
        assert_eq!(called.ahead, 0);
        assert!(called.called);
        assert!(called.checked_in);

        assert!(TicketProgress::new(&range, 4, 3, TicketNumber::new(21), Attendance::default()).is_none());
    }

    proptest! {
        #[test]
        fn prop_advance_is_bounded_and_monotonic(
            called in 0u32..200,
            capacity in 1u32..100,
            inside in 0u32..150,
            arrived in 0u32..200,
            issued in 1u32..200,
        ) {
            let called = called.min(issued);
            let occupancy = Occupancy { capacity, inside, arrived, issued };
            let next = advance(called, &occupancy);

            prop_assert!(next >= called);
            prop_assert!(next <= issued);
        }

        #[test]
        fn prop_snapshot_invariants(
            start in 1u32..1000,
            len in 1u32..300,
            called in 0u32..400,
            notify_count in 1u32..=100,
        ) {
            let range = TicketRange::new(start, start + len - 1).unwrap();
            let called = called.min(range.len());
            let snapshot = CallSnapshot::new(Some(&range), called, notify_count);

            prop_assert!(snapshot.notify.len() <= notify_count as usize);
            prop_assert!(snapshot.notify.iter().all(|t| range.contains(*t)));
            if let Some(current) = snapshot.current {
                prop_assert!(range.contains(current));
                prop_assert_eq!(snapshot.notify.first().copied(), Some(current));
            } else {
                prop_assert_eq!(called, 0);
            }
        }
    }
}
