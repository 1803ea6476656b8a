//! Pre-dispatch checks.
//!
//! Middleware runs after a message has resolved to a [`Target`] and before
//! its arguments are parsed. Each middleware may veto the dispatch by
//! returning an [`InputError`], which is reported back to the user like any
//! other input error. Middleware runs in registration order and the first
//! veto wins.
//!
//! Synchronous closures implement [`Middleware`] directly:
//!
//! ```rust,ignore
//! let no_bots = |message: &Message, _: &Actor, _: &Target| {
//!     if message.author.name.ends_with("[bot]") {
//!         Err(InputError::rejected("bots may not use commands"))
//!     } else {
//!         Ok(())
//!     }
//! };
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use herald_core::Message;

use crate::context::{Actor, Target};
use crate::error::InputError;

/// A check run before every handler invocation.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, message: &Message, actor: &Actor, target: &Target)
    -> Result<(), InputError>;
}

/// A shared middleware trait object.
pub type BoxedMiddleware = Arc<dyn Middleware>;

#[async_trait]
impl<F> Middleware for F
where
    F: Fn(&Message, &Actor, &Target) -> Result<(), InputError> + Send + Sync + 'static,
{
    async fn handle(
        &self,
        message: &Message,
        actor: &Actor,
        target: &Target,
    ) -> Result<(), InputError> {
        (self)(message, actor, target)
    }
}
