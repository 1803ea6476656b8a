//! Awaits: short-lived listeners for a user's next message.
//!
//! An [`Await`] is built detached, then armed by
//! [`AwaitRegistry::register`], which keys it by `channel ++ user` and
//! starts its timeout. From then on each inbound message from that user in
//! that channel is offered to it via [`AwaitRegistry::lookup`]:
//!
//! ```text
//!               register()
//!  detached ───────────────▶ armed ──── check passes ──▶ triggered
//!                              │  ▲                          │
//!            check fails,      │  └──── refresh_on_use ──────┤
//!            one_time ─────────┤                             │
//!            timeout ──────────┤  (on_cancel is called)      │
//!                              ▼                             │
//!                           cleared ◀─────── otherwise ──────┘
//! ```
//!
//! At most one await is armed per key; arming a second replaces the first.
//! Every armed await carries a generation number and every lifecycle step is
//! a compare-and-act on the registry entry under a single lock, so a timer
//! that fires after its await was cleared, refreshed or replaced does
//! nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use herald_core::{ChannelId, Message, SentMessage, UserId};

use crate::argument::ArgSpec;
use crate::error::AwaitError;
use crate::handler::{Action, BoxedAction};
use crate::normalizer::Normalized;

/// Default time an await stays armed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Decides whether a message satisfies an await. Receives the raw message
/// and the normalized content.
pub type AwaitCheck = Arc<dyn Fn(&Message, &str) -> bool + Send + Sync>;

/// Called when an await expires without being triggered.
pub type CancelFn = Arc<dyn Fn() + Send + Sync>;

// =============================================================================
// Await (detached description)
// =============================================================================

/// A detached await description.
///
/// # Example
///
/// ```rust,ignore
/// let confirm = Await::new(|inv: Invocation| async move {
///     Ok::<_, BoxError>(format!("confirmed by {}", inv.actor.user.name))
/// })
/// .check(|_, content| content.eq_ignore_ascii_case("yes"))
/// .one_time(true)
/// .timeout(Duration::from_secs(10));
/// ```
#[derive(Clone)]
pub struct Await {
    specs: Vec<ArgSpec>,
    check: AwaitCheck,
    timeout: Duration,
    one_time: bool,
    refresh_on_use: bool,
    on_cancel: Option<CancelFn>,
    user: Option<UserId>,
    channel: Option<ChannelId>,
    should_shift: bool,
    require_prefix: bool,
    action: BoxedAction,
}

impl Await {
    /// Creates an await that accepts any message and runs `action`.
    pub fn new(action: impl Action) -> Self {
        Self::from_action(Arc::new(action))
    }

    /// Creates an await around an already shared action.
    pub fn from_action(action: BoxedAction) -> Self {
        Self {
            specs: Vec::new(),
            check: Arc::new(|_, _| true),
            timeout: DEFAULT_TIMEOUT,
            one_time: false,
            refresh_on_use: false,
            on_cancel: None,
            user: None,
            channel: None,
            should_shift: false,
            require_prefix: false,
            action,
        }
    }

    /// Arguments parsed from the triggering message.
    pub fn args(mut self, specs: impl IntoIterator<Item = ArgSpec>) -> Self {
        self.specs = specs.into_iter().collect();
        self
    }

    /// Predicate a message must satisfy to trigger the await.
    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Message, &str) -> bool + Send + Sync + 'static,
    {
        self.check = Arc::new(check);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Clear the await after the first message that fails the check.
    pub fn one_time(mut self, one_time: bool) -> Self {
        self.one_time = one_time;
        self
    }

    /// Keep the await armed (with a fresh timeout) after it triggers.
    pub fn refresh_on_use(mut self, refresh: bool) -> Self {
        self.refresh_on_use = refresh;
        self
    }

    pub fn on_cancel<F>(mut self, on_cancel: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_cancel = Some(Arc::new(on_cancel));
        self
    }

    /// Listen to this user instead of the registering fallback.
    pub fn user(mut self, user: impl Into<UserId>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Listen in this channel instead of the registering fallback.
    pub fn channel(mut self, channel: impl Into<ChannelId>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Skip the first word of the message before parsing arguments.
    pub fn shift(mut self, shift: bool) -> Self {
        self.should_shift = shift;
        self
    }

    /// Only consider messages carrying the prefix.
    pub fn require_prefix(mut self, require: bool) -> Self {
        self.require_prefix = require;
        self
    }

    pub fn specs(&self) -> &[ArgSpec] {
        &self.specs
    }

    pub fn action(&self) -> &BoxedAction {
        &self.action
    }

    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    pub fn is_one_time(&self) -> bool {
        self.one_time
    }

    pub fn refreshes_on_use(&self) -> bool {
        self.refresh_on_use
    }

    pub fn should_shift(&self) -> bool {
        self.should_shift
    }

    pub fn requires_prefix(&self) -> bool {
        self.require_prefix
    }
}

impl fmt::Debug for Await {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Await")
            .field("specs", &self.specs)
            .field("timeout", &self.timeout)
            .field("one_time", &self.one_time)
            .field("refresh_on_use", &self.refresh_on_use)
            .field("user", &self.user)
            .field("channel", &self.channel)
            .field("should_shift", &self.should_shift)
            .field("require_prefix", &self.require_prefix)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Keys and armed entries
// =============================================================================

/// Registry key: the channel id concatenated with the user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AwaitKey(String);

impl AwaitKey {
    pub fn new(channel: &ChannelId, user: &UserId) -> Self {
        Self(format!("{channel}{user}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AwaitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Armed {
    key: AwaitKey,
    generation: u64,
    spec: Await,
    channel: ChannelId,
    user: UserId,
    trigger_response: Option<SentMessage>,
    /// Cancels the running timeout task. Replaced on refresh.
    timer: Mutex<CancellationToken>,
}

#[derive(Default)]
struct RegistryInner {
    entries: Mutex<HashMap<AwaitKey, Arc<Armed>>>,
    generation: AtomicU64,
}

impl RegistryInner {
    /// Removes `armed` if it is still the current entry for its key.
    ///
    /// With `timer` set, the removal is also skipped when that timer has
    /// been cancelled, which is how a timeout loses a race against a
    /// refresh.
    fn remove_if_current(&self, armed: &Armed, timer: Option<&CancellationToken>) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(&armed.key) {
            Some(current) if current.generation == armed.generation => {
                if timer.is_some_and(CancellationToken::is_cancelled) {
                    return false;
                }
                current.timer.lock().cancel();
                entries.remove(&armed.key);
                true
            }
            _ => false,
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// An armed await.
///
/// Holds the await's data and a weak lookup handle on the registry that
/// armed it; the registry alone owns the entry.
#[derive(Clone)]
pub struct AwaitHandle {
    armed: Arc<Armed>,
    registry: Weak<RegistryInner>,
}

impl AwaitHandle {
    pub fn key(&self) -> &AwaitKey {
        &self.armed.key
    }

    pub fn channel(&self) -> &ChannelId {
        &self.armed.channel
    }

    pub fn user(&self) -> &UserId {
        &self.armed.user
    }

    /// The description this await was armed from.
    pub fn spec(&self) -> &Await {
        &self.armed.spec
    }

    /// The sent message that carried this await, if any.
    pub fn trigger_response(&self) -> Option<&SentMessage> {
        self.armed.trigger_response.as_ref()
    }

    /// Returns `true` while this await is the armed entry for its key.
    pub fn is_armed(&self) -> bool {
        self.registry.upgrade().is_some_and(|inner| {
            inner
                .entries
                .lock()
                .get(&self.armed.key)
                .is_some_and(|current| current.generation == self.armed.generation)
        })
    }

    /// Clears this await. Returns `false` if it was no longer armed.
    pub fn clear(&self) -> Result<bool, AwaitError> {
        let inner = self.registry.upgrade().ok_or(AwaitError::RegistryGone)?;
        Ok(AwaitRegistry { inner }.clear(self))
    }

    /// Restarts this await's timeout. Returns `false` if it was no longer
    /// armed.
    pub fn refresh(&self) -> Result<bool, AwaitError> {
        let inner = self.registry.upgrade().ok_or(AwaitError::RegistryGone)?;
        Ok(AwaitRegistry { inner }.refresh(self))
    }
}

impl fmt::Debug for AwaitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitHandle")
            .field("key", &self.armed.key)
            .field("generation", &self.armed.generation)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// The table of armed awaits, shared by every in-flight dispatch.
///
/// Cloning is cheap and yields a handle on the same table. Registering
/// spawns the timeout on the current tokio runtime.
#[derive(Clone, Default)]
pub struct AwaitRegistry {
    inner: Arc<RegistryInner>,
}

impl AwaitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `spec`.
    ///
    /// The await's own channel/user win over the fallbacks, which are
    /// normally the conversation and author of the originating command.
    /// Any await already armed under the same key is replaced.
    pub fn register(
        &self,
        spec: Await,
        fallback_channel: Option<&ChannelId>,
        fallback_user: Option<&UserId>,
        trigger_response: Option<SentMessage>,
    ) -> Result<AwaitHandle, AwaitError> {
        let channel = spec
            .channel
            .clone()
            .or_else(|| fallback_channel.cloned())
            .ok_or(AwaitError::MissingTarget { field: "channel" })?;
        let user = spec
            .user
            .clone()
            .or_else(|| fallback_user.cloned())
            .ok_or(AwaitError::MissingTarget { field: "user" })?;

        let key = AwaitKey::new(&channel, &user);
        let token = CancellationToken::new();
        let armed = Arc::new(Armed {
            key: key.clone(),
            generation: self.inner.generation.fetch_add(1, Ordering::Relaxed),
            spec,
            channel,
            user,
            trigger_response,
            timer: Mutex::new(token.clone()),
        });

        {
            let mut entries = self.inner.entries.lock();
            if let Some(previous) = entries.insert(key.clone(), Arc::clone(&armed)) {
                previous.timer.lock().cancel();
                debug!(key = %key, "Replaced armed await");
            }
            self.spawn_timer(Arc::clone(&armed), token);
        }

        debug!(key = %key, timeout = ?armed.spec.timeout, "Await armed");
        Ok(AwaitHandle {
            armed,
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Offers an inbound message to the await armed for its channel and
    /// author.
    ///
    /// Returns the handle if the await triggers. A failed check clears a
    /// one-time await and leaves any other armed; a missing prefix on a
    /// prefix-requiring await leaves it armed.
    ///
    /// The check runs without the registry lock held, so it may call back
    /// into the registry.
    pub fn lookup(&self, message: &Message, normalized: &Normalized) -> Option<AwaitHandle> {
        let key = AwaitKey::new(&message.channel.id, &message.author.id);
        let armed = Arc::clone(self.inner.entries.lock().get(&key)?);

        if armed.spec.require_prefix && !normalized.prefixed {
            trace!(key = %key, "Await requires a prefix, message ignored");
            return None;
        }

        if (armed.spec.check)(message, &normalized.content) {
            trace!(key = %key, "Await triggered");
            return Some(AwaitHandle {
                armed,
                registry: Arc::downgrade(&self.inner),
            });
        }

        if armed.spec.one_time && self.inner.remove_if_current(&armed, None) {
            debug!(key = %key, "One-time await rejected message, cleared");
        }
        None
    }

    /// Returns the handle armed under `channel` + `user`, without running
    /// any check.
    pub fn get(&self, channel: &ChannelId, user: &UserId) -> Option<AwaitHandle> {
        let key = AwaitKey::new(channel, user);
        self.inner
            .entries
            .lock()
            .get(&key)
            .map(|armed| AwaitHandle {
                armed: Arc::clone(armed),
                registry: Arc::downgrade(&self.inner),
            })
    }

    /// Removes `handle` and cancels its timeout. Returns `false` if it was
    /// no longer armed (already cleared, expired or replaced).
    pub fn clear(&self, handle: &AwaitHandle) -> bool {
        let removed = self.inner.remove_if_current(&handle.armed, None);
        if removed {
            debug!(key = %handle.armed.key, "Await cleared");
        }
        removed
    }

    /// Restarts the timeout of `handle`. Returns `false` if it was no
    /// longer armed.
    pub fn refresh(&self, handle: &AwaitHandle) -> bool {
        let entries = self.inner.entries.lock();
        match entries.get(&handle.armed.key) {
            Some(current) if current.generation == handle.armed.generation => {
                let token = CancellationToken::new();
                {
                    let mut timer = current.timer.lock();
                    timer.cancel();
                    *timer = token.clone();
                }
                self.spawn_timer(Arc::clone(current), token);
                debug!(key = %handle.armed.key, "Await refreshed");
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn_timer(&self, armed: Arc<Armed>, token: CancellationToken) {
        let registry = Arc::downgrade(&self.inner);
        let timeout = armed.spec.timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let Some(inner) = registry.upgrade() else {
                        return;
                    };
                    if inner.remove_if_current(&armed, Some(&token)) {
                        debug!(key = %armed.key, "Await expired");
                        if let Some(on_cancel) = &armed.spec.on_cancel {
                            on_cancel();
                        }
                    }
                }
            }
        });
    }
}

impl fmt::Debug for AwaitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitRegistry")
            .field("armed", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::handler::Invocation;
    use crate::testing::guild_message;
    use std::sync::atomic::AtomicUsize;

    fn noop() -> Await {
        Await::new(|_: Invocation| async { Ok::<_, BoxError>(()) })
    }

    fn normalized(content: &str, prefixed: bool) -> Normalized {
        Normalized {
            content: content.into(),
            prefixed,
        }
    }

    fn channel() -> ChannelId {
        ChannelId::from("c1")
    }

    fn user() -> UserId {
        UserId::from("u1")
    }

    #[tokio::test]
    async fn test_register_requires_channel_and_user() {
        let registry = AwaitRegistry::new();
        let err = registry.register(noop(), None, Some(&user()), None).unwrap_err();
        assert_eq!(err, AwaitError::MissingTarget { field: "channel" });
        let err = registry.register(noop(), Some(&channel()), None, None).unwrap_err();
        assert_eq!(err, AwaitError::MissingTarget { field: "user" });

        // Explicit targets make fallbacks unnecessary.
        let handle = registry
            .register(noop().channel("c1").user("u1"), None, None, None)
            .unwrap();
        assert_eq!(handle.key().as_str(), "c1u1");
    }

    #[tokio::test]
    async fn test_key_is_concatenation() {
        assert_eq!(AwaitKey::new(&channel(), &user()).as_str(), "c1u1");
    }

    #[tokio::test]
    async fn test_second_registration_replaces_first() {
        let registry = AwaitRegistry::new();
        let first = registry
            .register(noop(), Some(&channel()), Some(&user()), None)
            .unwrap();
        let second = registry
            .register(noop(), Some(&channel()), Some(&user()), None)
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(!first.is_armed());
        assert!(second.is_armed());

        let found = registry
            .lookup(&guild_message("hi"), &normalized("hi", false))
            .unwrap();
        assert!(found.is_armed());
        // Clearing the stale handle must not touch the live entry.
        assert!(!registry.clear(&first));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_one_time_cleared_after_one_miss() {
        let registry = AwaitRegistry::new();
        registry
            .register(
                noop().check(|_, c| c == "yes").one_time(true),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();

        assert!(registry.lookup(&guild_message("no"), &normalized("no", false)).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failed_check_keeps_regular_await() {
        let registry = AwaitRegistry::new();
        registry
            .register(
                noop().check(|_, c| c == "yes"),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();

        assert!(registry.lookup(&guild_message("no"), &normalized("no", false)).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(&guild_message("yes"), &normalized("yes", false)).is_some());
    }

    #[tokio::test]
    async fn test_require_prefix_ignores_without_clearing() {
        let registry = AwaitRegistry::new();
        registry
            .register(
                noop().require_prefix(true).one_time(true),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();

        assert!(registry.lookup(&guild_message("x"), &normalized("x", false)).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(&guild_message("!x"), &normalized("x", true)).is_some());
    }

    #[tokio::test]
    async fn test_check_may_read_registry() {
        let registry = AwaitRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let reader = registry.clone();
        let counter = Arc::clone(&seen);
        registry
            .register(
                noop()
                    .check(move |message, _| {
                        counter.store(reader.len(), Ordering::SeqCst);
                        reader
                            .get(&message.channel.id, &message.author.id)
                            .is_some_and(|handle| !handle.is_armed())
                    })
                    .one_time(true),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();

        assert!(registry.lookup(&guild_message("no"), &normalized("no", false)).is_none());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_one_time_miss_keeps_replacement_armed() {
        let registry = AwaitRegistry::new();
        let rival = registry.clone();
        registry
            .register(
                noop()
                    .check(move |_, _| {
                        rival
                            .register(noop(), Some(&channel()), Some(&user()), None)
                            .unwrap();
                        false
                    })
                    .one_time(true),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();

        assert!(registry.lookup(&guild_message("no"), &normalized("no", false)).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(&guild_message("yes"), &normalized("yes", false)).is_some());
    }

    #[tokio::test]
    async fn test_concurrent_lookups_on_one_key() {
        let registry = AwaitRegistry::new();
        registry
            .register(
                noop().check(|_, c| c == "yes").one_time(true),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();
        let triggered = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let registry = &registry;
                let triggered = &triggered;
                scope.spawn(move || {
                    let content = if i == 0 { "yes" } else { "no" };
                    let message = guild_message(content);
                    if registry.lookup(&message, &normalized(content, false)).is_some() {
                        triggered.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert!(triggered.load(Ordering::SeqCst) <= 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_other_user_does_not_trigger() {
        let registry = AwaitRegistry::new();
        registry
            .register(noop(), Some(&channel()), Some(&UserId::from("u9")), None)
            .unwrap();
        assert!(registry.lookup(&guild_message("x"), &normalized("x", false)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_clears_and_calls_on_cancel() {
        let registry = AwaitRegistry::new();
        let cancelled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cancelled);
        registry
            .register(
                noop()
                    .timeout(Duration::from_secs(5))
                    .on_cancel(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(registry.len(), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(registry.is_empty());
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_restarts_timeout() {
        let registry = AwaitRegistry::new();
        let handle = registry
            .register(
                noop().timeout(Duration::from_secs(5)),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(handle.refresh().unwrap());
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(handle.is_armed(), "old timer must not expire a refreshed await");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!handle.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_await_never_calls_on_cancel() {
        let registry = AwaitRegistry::new();
        let cancelled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cancelled);
        let handle = registry
            .register(
                noop().timeout(Duration::from_secs(1)).on_cancel(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();

        assert!(handle.clear().unwrap());
        assert!(!handle.clear().unwrap());
        assert!(!handle.refresh().unwrap());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_await_timer_is_noop() {
        let registry = AwaitRegistry::new();
        registry
            .register(
                noop().timeout(Duration::from_secs(1)),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();
        let second = registry
            .register(
                noop().timeout(Duration::from_secs(10)),
                Some(&channel()),
                Some(&user()),
                None,
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(second.is_armed());
    }

    #[tokio::test]
    async fn test_handle_outliving_registry() {
        let registry = AwaitRegistry::new();
        let handle = registry
            .register(noop(), Some(&channel()), Some(&user()), None)
            .unwrap();
        drop(registry);
        assert_eq!(handle.clear(), Err(AwaitError::RegistryGone));
        assert!(!handle.is_armed());
    }
}
