//! Handler actions.
//!
//! An [`Action`] is what a command or await runs once routing, middleware
//! and argument parsing have succeeded. Plain async closures implement it
//! through a blanket impl, so most code never names the trait:
//!
//! ```rust,ignore
//! let ping = Command::new("ping").action(|_inv: Invocation| async {
//!     Ok::<_, BoxError>("pong")
//! });
//! ```
//!
//! The closure may return anything convertible into [`Replies`]: `()`, a
//! string, a [`Reply`](crate::reply::Reply), a
//! [`RichReply`](crate::reply::RichReply), a `Vec` of replies or an
//! `Option` of any of these.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

pub use crate::context::Invocation;
use crate::error::BoxError;
use crate::reply::Replies;

/// A handler action.
#[async_trait]
pub trait Action: Send + Sync + 'static {
    async fn call(&self, invocation: Invocation) -> Result<Replies, BoxError>;
}

/// A shared, type-erased action.
pub type BoxedAction = Arc<dyn Action>;

#[async_trait]
impl<F, Fut, R, E> Action for F
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Into<Replies> + 'static,
    E: Into<BoxError> + 'static,
{
    async fn call(&self, invocation: Invocation) -> Result<Replies, BoxError> {
        (self)(invocation).await.map(Into::into).map_err(Into::into)
    }
}
