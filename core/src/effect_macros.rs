//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when creating `Effect` variants inside reducers.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use callboard_core::async_effect;
///
/// async_effect! {
///     store.save(&snapshot).await.err().map(|e| QueueAction::SnapshotFailed {
///         error: e.to_string(),
///     })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Future` that immediately produces an action
///
/// Used to publish an event to store observers (HTTP handlers waiting on a
/// command outcome, WebSocket clients) without doing any I/O.
///
/// # Example
///
/// ```rust,ignore
/// use callboard_core::emit;
///
/// emit!(QueueAction::CommandApplied { request_id })
/// ```
#[macro_export]
macro_rules! emit {
    ($action:expr) => {{
        let action = $action;
        $crate::effect::Effect::Future(::std::boxed::Box::pin(async move { Some(action) }))
    }};
}
