//! Lifecycle notifications emitted by the guard.

use crate::provider::Credentials;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What just happened inside the guard.
#[derive(Debug)]
pub enum AuthEvent<'a, P> {
    Attempting { credentials: &'a Credentials },
    Validated { principal: &'a P },
    Failed { credentials: &'a Credentials },
    Login { principal: &'a P },
    Logout { principal: Option<&'a P> },
}

impl<P> AuthEvent<'_, P> {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthEvent::Attempting { .. } => "attempting",
            AuthEvent::Validated { .. } => "validated",
            AuthEvent::Failed { .. } => "failed",
            AuthEvent::Login { .. } => "login",
            AuthEvent::Logout { .. } => "logout",
        }
    }
}

/// Receives [`AuthEvent`]s synchronously.  An error is logged by the guard
/// and otherwise ignored.
pub trait EventNotifier<P>: Send + Sync {
    fn notify(&self, event: &AuthEvent<'_, P>) -> Result<(), BoxError>;
}

impl<P, F> EventNotifier<P> for F
where
    F: Fn(&AuthEvent<'_, P>) -> Result<(), BoxError> + Send + Sync,
{
    fn notify(&self, event: &AuthEvent<'_, P>) -> Result<(), BoxError> {
        self(event)
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl<P> EventNotifier<P> for NoopNotifier {
    fn notify(&self, _event: &AuthEvent<'_, P>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Logs each event kind at `info` level.  Credentials are never logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl<P> EventNotifier<P> for TracingNotifier {
    fn notify(&self, event: &AuthEvent<'_, P>) -> Result<(), BoxError> {
        tracing::info!(event = event.kind(), "auth event");
        Ok(())
    }
}
