//! Queue reducer.
//!
//! Commands are validated against the current state first. A rejected
//! command leaves the state untouched and answers with
//! [`QueueAction::CommandRejected`]. An applied command re-runs the call rule,
//! bumps the revision, schedules a snapshot write and answers with
//! [`QueueAction::CommandApplied`], plus [`QueueAction::CallChanged`] when the
//! board changed.

use super::actions::{QueueAction, Rejection};
use super::environment::QueueEnvironment;
use super::state::QueueState;
use crate::call;
use crate::metrics;
use crate::types::{TicketNumber, VenueSettings};
use callboard_core::{async_effect, effect::Effect, emit, reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// Reducer for the queue board
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueReducer;

impl QueueReducer {
    /// Creates a new `QueueReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn validate_ticket(state: &QueueState, ticket: TicketNumber) -> Result<(), Rejection> {
        let range = state.range.ok_or(Rejection::NoTicketsIssued)?;
        if range.contains(ticket) {
            Ok(())
        } else {
            Err(Rejection::OutOfRange { ticket, range })
        }
    }

    fn validate_check_in(state: &QueueState, ticket: TicketNumber) -> Result<(), Rejection> {
        Self::validate_ticket(state, ticket)?;
        if state.checked_out.contains(&ticket) {
            return Err(Rejection::AlreadyCheckedOut(ticket));
        }
        Ok(())
    }

    fn validate_check_out(state: &QueueState, ticket: TicketNumber) -> Result<(), Rejection> {
        Self::validate_ticket(state, ticket)?;
        if !state.checked_in.contains(&ticket) {
            return Err(Rejection::NotCheckedIn(ticket));
        }
        Ok(())
    }

    fn validate(state: &QueueState, command: &QueueAction) -> Result<(), Rejection> {
        match command {
            QueueAction::ConfigureVenue { settings, .. } => {
                VenueSettings::new(settings.max_inside, settings.notify_count)?;
                Ok(())
            },
            QueueAction::CheckIn { ticket, .. } => Self::validate_check_in(state, *ticket),
            QueueAction::CheckOut { ticket, .. } => Self::validate_check_out(state, *ticket),
            QueueAction::CallNext { .. } | QueueAction::CallPrevious { .. } => state
                .range
                .map(|_| ())
                .ok_or(Rejection::NoTicketsIssued),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // State changes
    // ========================================================================

    /// Apply a validated command
    fn apply_command(state: &mut QueueState, command: QueueAction) {
        match command {
            QueueAction::SetPassword { digest, .. } => {
                state.admin_password = Some(digest);
            },
            QueueAction::ConfigureVenue { settings, .. } => {
                state.settings = settings;
                state.advance_call();
            },
            QueueAction::IssueTickets { range, .. } => {
                state.clear_queue();
                state.range = Some(range);
                state.advance_call();
            },
            QueueAction::CheckIn { ticket, .. } => {
                state.checked_in.insert(ticket);
                state.advance_call();
            },
            QueueAction::CheckOut { ticket, .. } => {
                state.checked_out.insert(ticket);
                state.advance_call();
            },
            QueueAction::CallNext { .. } => {
                state.called = call::call_next(state.called, state.issued());
            },
            QueueAction::CallPrevious { .. } => {
                state.called = call::call_previous(state.called);
            },
            QueueAction::Reset { .. } => state.clear_queue(),
            _ => {},
        }
    }

    /// Effect writing the current state to the snapshot store
    fn save_snapshot(state: &QueueState, env: &QueueEnvironment) -> Effect<QueueAction> {
        let snapshots = Arc::clone(&env.snapshots);
        let snapshot = state.clone();
        let revision = snapshot.revision;

        async_effect! {
            match snapshots.save(snapshot).await {
                Ok(()) => Some(QueueAction::SnapshotSaved { revision }),
                Err(e) => Some(QueueAction::SnapshotFailed {
                    revision,
                    error: e.to_string(),
                }),
            }
        }
    }

    fn handle_command(
        state: &mut QueueState,
        command: QueueAction,
        env: &QueueEnvironment,
    ) -> SmallVec<[Effect<QueueAction>; 4]> {
        let (Some(request_id), Some(name)) = (command.request_id(), command.command_name()) else {
            return SmallVec::new();
        };

        if let Err(rejection) = Self::validate(state, &command) {
            tracing::info!(
                command = name,
                %request_id,
                reason = rejection.reason(),
                "Command rejected: {rejection}"
            );
            metrics::record_rejection(rejection.reason());
            return smallvec![emit!(QueueAction::CommandRejected {
                request_id,
                rejection
            })];
        }

        let before = state.snapshot();
        Self::apply_command(state, command);
        state.revision += 1;
        state.updated_at = Some(env.clock.now());

        metrics::record_command(name);
        metrics::update_occupancy(state.inside(), state.called, state.issued());
        tracing::debug!(
            command = name,
            %request_id,
            revision = state.revision,
            called = state.called,
            inside = state.inside(),
            "Command applied"
        );

        let mut effects: SmallVec<[Effect<QueueAction>; 4]> = smallvec![
            Self::save_snapshot(state, env),
            emit!(QueueAction::CommandApplied { request_id }),
        ];

        let after = state.snapshot();
        if after != before {
            tracing::info!(current = ?after.current, notify = ?after.notify, "Call changed");
            effects.push(emit!(QueueAction::CallChanged {
                revision: state.revision,
                call: after
            }));
        }

        effects
    }
}

impl Reducer for QueueReducer {
    type State = QueueState;
    type Action = QueueAction;
    type Environment = QueueEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Events ==========
            QueueAction::CommandApplied { .. }
            | QueueAction::CommandRejected { .. }
            | QueueAction::CallChanged { .. } => SmallVec::new(),

            QueueAction::SnapshotSaved { revision } => {
                if state.last_persist_error.take().is_some() {
                    tracing::info!(revision, "Snapshot writes recovered");
                }
                SmallVec::new()
            },

            QueueAction::SnapshotFailed { revision, error } => {
                tracing::error!(revision, error = %error, "Failed to save queue snapshot");
                metrics::record_snapshot_failed();
                state.last_persist_error = Some(error);
                SmallVec::new()
            },

            // ========== Commands ==========
            command => Self::handle_command(state, command, env),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::auth::PasswordDigest;
    use crate::call::CallSnapshot;
    use crate::persistence::{InMemorySnapshotStore, PersistenceError, SnapshotStore};
    use crate::types::TicketRange;
    use callboard_testing::{assertions, run_effects, test_clock, ReducerTest};
    use futures::future::BoxFuture;
    use uuid::Uuid;

    struct FailingSnapshotStore;

    impl SnapshotStore for FailingSnapshotStore {
        fn load(&self) -> BoxFuture<'_, Result<Option<QueueState>, PersistenceError>> {
            Box::pin(async { Ok(None) })
        }

        fn save(&self, _state: QueueState) -> BoxFuture<'_, Result<(), PersistenceError>> {
            Box::pin(async {
                Err(PersistenceError::Io {
                    path: "state.json".into(),
                    source: std::io::Error::other("disk full"),
                })
            })
        }
    }

    fn env_with(snapshots: Arc<dyn SnapshotStore>) -> QueueEnvironment {
        QueueEnvironment::new(Arc::new(test_clock()), snapshots)
    }

    fn test_env() -> QueueEnvironment {
        env_with(Arc::new(InMemorySnapshotStore::new()))
    }

    fn n(value: u32) -> TicketNumber {
        TicketNumber::new(value)
    }

    /// Range 1..=100, capacity 2, notify 3
    fn issued_state() -> QueueState {
        let mut state = QueueState {
            settings: VenueSettings::new(2, 3).unwrap(),
            ..QueueState::default()
        };
        let effects = QueueReducer::new().reduce(
            &mut state,
            QueueAction::IssueTickets {
                request_id: Uuid::new_v4(),
                range: TicketRange::new(1, 100).unwrap(),
            },
            &test_env(),
        );
        drop(effects);
        state
    }

    fn apply(state: &mut QueueState, action: QueueAction) -> Vec<QueueAction> {
        let env = test_env();
        let effects = QueueReducer::new().reduce(state, action, &env);
        tokio_test::block_on(run_effects(effects))
    }

    fn rejection_of(actions: &[QueueAction]) -> Option<Rejection> {
        actions.iter().find_map(|a| match a {
            QueueAction::CommandRejected { rejection, .. } => Some(rejection.clone()),
            _ => None,
        })
    }

    #[test]
    fn test_issue_calls_up_to_capacity() {
        ReducerTest::new(QueueReducer::new())
            .with_env(test_env())
            .given_state(QueueState {
                settings: VenueSettings::new(5, 3).unwrap(),
                ..QueueState::default()
            })
            .when_action(QueueAction::IssueTickets {
                request_id: Uuid::new_v4(),
                range: TicketRange::new(10, 30).unwrap(),
            })
            .then_state(|state| {
                assert_eq!(state.called, 5);
                assert_eq!(state.snapshot().current, Some(n(14)));
                assert_eq!(state.revision, 1);
                assert!(state.updated_at.is_some());
            })
            .then_effects(|effects| {
                // save, applied, call changed
                assertions::assert_effects_count(effects, 3);
            })
            .run();
    }

    #[test]
    fn test_issue_clears_previous_queue() {
        let mut state = issued_state();
        apply(
            &mut state,
            QueueAction::CheckIn {
                request_id: Uuid::new_v4(),
                ticket: n(1),
            },
        );

        apply(
            &mut state,
            QueueAction::IssueTickets {
                request_id: Uuid::new_v4(),
                range: TicketRange::new(200, 210).unwrap(),
            },
        );

        assert!(state.checked_in.is_empty());
        assert_eq!(state.called, 2);
        assert_eq!(state.snapshot().current, Some(n(201)));
    }

    #[test]
    fn test_check_in_and_out_advance_the_call() {
        let mut state = issued_state();
        assert_eq!(state.called, 2);

        // Arrivals free nothing while they stay inside
        apply(
            &mut state,
            QueueAction::CheckIn {
                request_id: Uuid::new_v4(),
                ticket: n(1),
            },
        );
        assert_eq!(state.called, 2);

        let events = apply(
            &mut state,
            QueueAction::CheckOut {
                request_id: Uuid::new_v4(),
                ticket: n(1),
            },
        );
        assert_eq!(state.called, 3);
        assert!(events.contains(&QueueAction::CallChanged {
            revision: state.revision,
            call: CallSnapshot {
                current: Some(n(3)),
                notify: vec![n(3), n(4), n(5)],
            }
        }));
    }

    #[test]
    fn test_check_in_out_of_range_is_rejected() {
        let mut state = issued_state();
        let before = state.clone();

        let events = apply(
            &mut state,
            QueueAction::CheckIn {
                request_id: Uuid::new_v4(),
                ticket: n(101),
            },
        );

        assert!(matches!(
            rejection_of(&events),
            Some(Rejection::OutOfRange { .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_check_in_without_range_is_rejected() {
        let mut state = QueueState::default();
        let events = apply(
            &mut state,
            QueueAction::CheckIn {
                request_id: Uuid::new_v4(),
                ticket: n(1),
            },
        );
        assert_eq!(rejection_of(&events), Some(Rejection::NoTicketsIssued));
        assert_eq!(state.revision, 0);
    }

    #[test]
    fn test_check_out_requires_check_in() {
        let mut state = issued_state();
        let events = apply(
            &mut state,
            QueueAction::CheckOut {
                request_id: Uuid::new_v4(),
                ticket: n(4),
            },
        );
        assert_eq!(rejection_of(&events), Some(Rejection::NotCheckedIn(n(4))));
    }

    #[test]
    fn test_check_in_after_check_out_is_rejected() {
        let mut state = issued_state();
        for action in [
            QueueAction::CheckIn {
                request_id: Uuid::new_v4(),
                ticket: n(2),
            },
            QueueAction::CheckOut {
                request_id: Uuid::new_v4(),
                ticket: n(2),
            },
        ] {
            apply(&mut state, action);
        }

        let events = apply(
            &mut state,
            QueueAction::CheckIn {
                request_id: Uuid::new_v4(),
                ticket: n(2),
            },
        );
        assert_eq!(rejection_of(&events), Some(Rejection::AlreadyCheckedOut(n(2))));
    }

    #[test]
    fn test_repeated_check_in_is_idempotent() {
        let mut state = issued_state();
        for _ in 0..3 {
            let events = apply(
                &mut state,
                QueueAction::CheckIn {
                    request_id: Uuid::new_v4(),
                    ticket: n(1),
                },
            );
            assert_eq!(rejection_of(&events), None);
        }
        assert_eq!(state.arrived(), 1);
        assert_eq!(state.inside(), 1);
    }

    #[test]
    fn test_manual_override() {
        let mut state = issued_state();

        apply(&mut state, QueueAction::CallNext { request_id: Uuid::new_v4() });
        assert_eq!(state.called, 3);

        apply(&mut state, QueueAction::CallPrevious { request_id: Uuid::new_v4() });
        apply(&mut state, QueueAction::CallPrevious { request_id: Uuid::new_v4() });
        // Auto advance does not undo the override
        assert_eq!(state.called, 1);
    }

    #[test]
    fn test_call_next_stops_at_end_of_range() {
        let mut state = QueueState::default();
        apply(
            &mut state,
            QueueAction::IssueTickets {
                request_id: Uuid::new_v4(),
                range: TicketRange::new(1, 3).unwrap(),
            },
        );
        assert_eq!(state.called, 3);

        let events = apply(&mut state, QueueAction::CallNext { request_id: Uuid::new_v4() });
        assert_eq!(state.called, 3);
        assert!(!events
            .iter()
            .any(|e| matches!(e, QueueAction::CallChanged { .. })));
    }

    #[test]
    fn test_call_next_without_range_is_rejected() {
        ReducerTest::new(QueueReducer::new())
            .with_env(test_env())
            .given_state(QueueState::default())
            .when_action(QueueAction::CallNext {
                request_id: Uuid::new_v4(),
            })
            .then_state(|state| assert_eq!(*state, QueueState::default()))
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn test_configure_venue_readvances() {
        let mut state = issued_state();
        apply(
            &mut state,
            QueueAction::ConfigureVenue {
                request_id: Uuid::new_v4(),
                settings: VenueSettings::new(10, 3).unwrap(),
            },
        );
        assert_eq!(state.called, 10);
    }

    #[test]
    fn test_configure_venue_rejects_zero_capacity() {
        let mut state = issued_state();
        let events = apply(
            &mut state,
            QueueAction::ConfigureVenue {
                request_id: Uuid::new_v4(),
                settings: VenueSettings {
                    max_inside: 0,
                    notify_count: 3,
                },
            },
        );
        assert!(matches!(
            rejection_of(&events),
            Some(Rejection::InvalidSettings(_))
        ));
        assert_eq!(state.settings.max_inside, 2);
    }

    #[test]
    fn test_reset_keeps_password_and_settings() {
        let mut state = issued_state();
        apply(
            &mut state,
            QueueAction::SetPassword {
                request_id: Uuid::new_v4(),
                digest: PasswordDigest::of("pw"),
            },
        );

        let events = apply(&mut state, QueueAction::Reset { request_id: Uuid::new_v4() });

        assert!(state.range.is_none());
        assert_eq!(state.called, 0);
        assert!(state.admin_password.is_some());
        assert_eq!(state.settings.max_inside, 2);
        assert!(events.contains(&QueueAction::CallChanged {
            revision: state.revision,
            call: CallSnapshot::default()
        }));
    }

    #[test]
    fn test_set_password_leaves_call_alone() {
        ReducerTest::new(QueueReducer::new())
            .with_env(test_env())
            .given_state(issued_state())
            .when_action(QueueAction::SetPassword {
                request_id: Uuid::new_v4(),
                digest: PasswordDigest::of("pw"),
            })
            .then_state(|state| {
                assert!(state.admin_password.as_ref().unwrap().verifies("pw"));
            })
            .then_effects(|effects| {
                // save, applied
                assertions::assert_effects_count(effects, 2);
            })
            .run();
    }

    #[test]
    fn test_applied_command_writes_snapshot() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let env = env_with(store.clone());
        let mut state = issued_state();
        let request_id = Uuid::new_v4();

        let effects = QueueReducer::new().reduce(
            &mut state,
            QueueAction::CheckIn {
                request_id,
                ticket: n(1),
            },
            &env,
        );
        let events = tokio_test::block_on(run_effects(effects));

        assert!(events.contains(&QueueAction::CommandApplied { request_id }));
        assert!(events.contains(&QueueAction::SnapshotSaved {
            revision: state.revision
        }));
        assert_eq!(store.last().unwrap(), state);
    }

    #[test]
    fn test_failed_snapshot_is_recorded_then_cleared() {
        let env = env_with(Arc::new(FailingSnapshotStore));
        let mut state = issued_state();

        let effects = QueueReducer::new().reduce(
            &mut state,
            QueueAction::CallNext {
                request_id: Uuid::new_v4(),
            },
            &env,
        );
        let events = tokio_test::block_on(run_effects(effects));
        let failure = events
            .into_iter()
            .find(|e| matches!(e, QueueAction::SnapshotFailed { .. }))
            .unwrap();

        let revision = state.revision;
        let effects = QueueReducer::new().reduce(&mut state, failure, &env);
        assertions::assert_no_effects(&effects);
        assert!(state.last_persist_error.as_deref().unwrap().contains("disk full"));
        // Events do not bump the revision
        assert_eq!(state.revision, revision);

        QueueReducer::new().reduce(&mut state, QueueAction::SnapshotSaved { revision }, &env);
        assert!(state.last_persist_error.is_none());
    }
}
