//! Command port: sends service calls back to the hub.

use std::future::Future;

use hamirror_domain::error::MirrorError;
use hamirror_domain::service::ServiceCall;

/// Executes a [`ServiceCall`] at most once.
pub trait CommandExecutor: Send + Sync + 'static {
    fn execute(&self, call: ServiceCall) -> impl Future<Output = Result<(), MirrorError>> + Send;
}

impl<T: CommandExecutor> CommandExecutor for std::sync::Arc<T> {
    fn execute(&self, call: ServiceCall) -> impl Future<Output = Result<(), MirrorError>> + Send {
        (**self).execute(call)
    }
}
