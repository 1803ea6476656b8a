//! Runtime orchestration.
//!
//! The runtime owns a configured [`Dispatcher`] and pumps inbound messages
//! from a channel into it, one task per message. Input errors are answered
//! in the originating channel; defects are logged.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use herald_runtime::HeraldRuntime;
//!
//! let runtime = HeraldRuntime::builder(transport)
//!     .profile("production")
//!     .command(ping)
//!     .build()?;
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! // hand `tx` to whatever reads from the chat service
//! runtime.run(rx).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, HeraldConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use herald_core::{BoxedDirectory, BoxedReactionBinder, BoxedTransport, Message, Outbound};
use herald_framework::{Command, DispatchError, Dispatcher, DispatcherBuilder, Middleware, Replacer};

// =============================================================================
// RuntimeStats
// =============================================================================

/// Message counters, updated as dispatches finish.
#[derive(Debug, Default)]
pub struct RuntimeStats {
    received: AtomicU64,
    routed: AtomicU64,
    ignored: AtomicU64,
    input_errors: AtomicU64,
    defects: AtomicU64,
}

impl RuntimeStats {
    /// Messages taken off the inbox.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Messages that reached a command or await and completed.
    pub fn routed(&self) -> u64 {
        self.routed.load(Ordering::Relaxed)
    }

    /// Messages that were not addressed to the router.
    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    pub fn input_errors(&self) -> u64 {
        self.input_errors.load(Ordering::Relaxed)
    }

    pub fn defects(&self) -> u64 {
        self.defects.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// HeraldRuntime
// =============================================================================

/// A configured dispatcher plus the loop that feeds it.
pub struct HeraldRuntime {
    config: HeraldConfig,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<RuntimeStats>,
    shutdown: CancellationToken,
}

impl HeraldRuntime {
    /// Starts building a runtime around a transport.
    pub fn builder(transport: BoxedTransport) -> RuntimeBuilder {
        RuntimeBuilder::new(transport)
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    /// A token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Requests shutdown. In-flight dispatches are allowed to finish.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Dispatches one message and handles the outcome.
    pub async fn handle_message(&self, message: Message) {
        process(&self.dispatcher, &self.stats, message).await;
    }

    /// Pumps `inbox` until Ctrl+C, SIGTERM, [`shutdown`](Self::shutdown), or
    /// until every sender is dropped.
    pub async fn run(&self, inbox: mpsc::Receiver<Message>) -> RuntimeResult<()> {
        info!("Herald runtime is now running. Press Ctrl+C to stop.");
        self.serve(inbox, wait_for_shutdown()).await
    }

    /// Like [`run`](Self::run), with a custom shutdown future in place of
    /// the process signals.
    pub async fn run_until<F>(&self, inbox: mpsc::Receiver<Message>, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.serve(inbox, shutdown).await
    }

    async fn serve<F>(&self, mut inbox: mpsc::Receiver<Message>, signal: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(signal);
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut signal => break,
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                received = inbox.recv() => match received {
                    Some(message) => {
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let stats = Arc::clone(&self.stats);
                        tasks.spawn(async move { process(&dispatcher, &stats, message).await });
                    }
                    None => {
                        debug!("Inbox closed");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            }
        }

        if !tasks.is_empty() {
            debug!(in_flight = tasks.len(), "Waiting for in-flight dispatches");
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        info!(
            received = self.stats.received(),
            routed = self.stats.routed(),
            input_errors = self.stats.input_errors(),
            defects = self.stats.defects(),
            "Runtime stopped"
        );
        Ok(())
    }
}

async fn process(dispatcher: &Dispatcher, stats: &RuntimeStats, message: Message) {
    RuntimeStats::bump(&stats.received);
    match dispatcher.dispatch(&message).await {
        Ok(Some(_)) => RuntimeStats::bump(&stats.routed),
        Ok(None) => RuntimeStats::bump(&stats.ignored),
        Err(DispatchError::Input(err)) => {
            RuntimeStats::bump(&stats.input_errors);
            debug!(message = %message.id, error = %err, "Rejected input");
            let notice = Outbound::text(err.to_string());
            if let Err(send_err) = dispatcher.transport().send(&message.channel.id, &notice).await {
                warn!(
                    channel = %message.channel.id,
                    error = %send_err,
                    "Failed to report input error"
                );
            }
        }
        Err(err) => {
            RuntimeStats::bump(&stats.defects);
            error!(
                message = %message.id,
                channel = %message.channel.id,
                error = %err,
                "Dispatch failed"
            );
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "Dispatch task panicked");
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to register SIGTERM handler");
                ctrl_c.await;
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl+C, shutting down");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

type Configure = Box<dyn FnOnce(DispatcherBuilder) -> DispatcherBuilder>;

/// Builder for a [`HeraldRuntime`].
///
/// Configuration comes from a [`ConfigLoader`] unless an explicit config is
/// supplied. Registrations are applied after the configured settings, so a
/// [`configure`](Self::configure) hook can still override them.
pub struct RuntimeBuilder {
    transport: BoxedTransport,
    config_loader: ConfigLoader,
    config: Option<HeraldConfig>,
    directory: Option<BoxedDirectory>,
    binder: Option<BoxedReactionBinder>,
    hooks: Vec<Configure>,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new(transport: BoxedTransport) -> Self {
        Self {
            transport,
            config_loader: ConfigLoader::new(),
            config: None,
            directory: None,
            binder: None,
            hooks: Vec::new(),
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically, above files and environment.
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses this configuration as-is instead of loading one.
    pub fn config(mut self, config: HeraldConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn directory(mut self, directory: BoxedDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Supplies the reaction binder. It is only installed when
    /// `dispatch.reactions_enabled` is set.
    pub fn reactions(mut self, binder: BoxedReactionBinder) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn command(self, command: Command) -> Self {
        self.configure(move |builder| builder.command(command))
    }

    pub fn replacer(self, replacer: Replacer) -> Self {
        self.configure(move |builder| builder.replacer(replacer))
    }

    pub fn middleware(self, middleware: impl Middleware) -> Self {
        self.configure(move |builder| builder.middleware(middleware))
    }

    /// Adjusts the dispatcher builder directly.
    pub fn configure<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(DispatcherBuilder) -> DispatcherBuilder + 'static,
    {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Loads configuration, initializes logging and builds the dispatcher.
    pub fn build(self) -> RuntimeResult<HeraldRuntime> {
        let config = match self.config {
            Some(config) => {
                validate_config(&config)?;
                config
            }
            None => self.config_loader.load()?,
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let settings = &config.dispatch;
        let mut builder = Dispatcher::builder(self.transport)
            .prefix(settings.prefix.clone())
            .markers(settings.replacer_open.clone(), settings.replacer_close.clone());
        if let Some(owner) = &settings.owner_id {
            builder = builder.owner(owner.clone());
        }
        for (scope, prefix) in &settings.prefixes {
            builder = builder.prefix_override(scope.clone(), prefix.clone());
        }
        if let Some(directory) = self.directory {
            builder = builder.directory(directory);
        }
        match (settings.reactions_enabled, self.binder) {
            (true, Some(binder)) => builder = builder.reactions(binder),
            (true, None) => return Err(RuntimeError::ReactionsUnavailable),
            (false, Some(_)) => debug!("Reaction binder supplied but reactions are disabled"),
            (false, None) => {}
        }
        for hook in self.hooks {
            builder = hook(builder);
        }
        let dispatcher = builder.build()?;

        info!(
            prefix = %settings.prefix,
            commands = dispatcher.commands().len(),
            replacers = dispatcher.replacers().len(),
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Ok(HeraldRuntime {
            config,
            dispatcher: Arc::new(dispatcher),
            stats: Arc::new(RuntimeStats::default()),
            shutdown: CancellationToken::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use async_trait::async_trait;
    use herald_core::{
        ApiResult, Channel, ChannelId, ReactInterface, ReactionBinder, SentMessage, Transport,
        User, UserId,
    };
    use herald_framework::{ArgSpec, BoxError, Invocation};

    struct Recorder {
        me: UserId,
        sent: Mutex<Vec<(ChannelId, String)>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                me: UserId::from("bot"),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn texts(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(_, text)| text.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for Recorder {
        fn self_id(&self) -> &UserId {
            &self.me
        }

        async fn send(&self, channel: &ChannelId, message: &Outbound) -> ApiResult<SentMessage> {
            let mut sent = self.sent.lock();
            sent.push((channel.clone(), message.content.clone().unwrap_or_default()));
            Ok(SentMessage::new(format!("r{}", sent.len()), channel.clone()))
        }

        async fn delete(&self, _message: &SentMessage) -> ApiResult<()> {
            Ok(())
        }
    }

    struct NullBinder;

    #[async_trait]
    impl ReactionBinder for NullBinder {
        async fn bind(
            &self,
            _response: &SentMessage,
            _interface: &ReactInterface,
            _owner: &UserId,
        ) -> ApiResult<()> {
            Ok(())
        }
    }

    fn said(content: &str, author: &str) -> Message {
        Message::new(
            "m1",
            content,
            User::new(author, author),
            Channel::guild("c1", "general", "g1"),
        )
    }

    fn ping() -> Command {
        Command::new("ping").action(|_: Invocation| async { Ok::<_, BoxError>("pong") })
    }

    fn echo() -> Command {
        Command::new("echo")
            .args([ArgSpec::required("text").delimiter("")])
            .action(|inv: Invocation| async move {
                Ok::<_, BoxError>(inv.args.text(0).unwrap_or_default().to_string())
            })
    }

    fn config_with_prefix(prefix: &str) -> HeraldConfig {
        let mut config = HeraldConfig::default();
        config.dispatch.prefix = prefix.into();
        config
    }

    #[tokio::test]
    async fn test_build_applies_dispatch_settings() {
        let transport = Recorder::new();
        let mut config = config_with_prefix("?");
        config.dispatch.prefixes.insert("g2".into(), "$".into());
        let runtime = HeraldRuntime::builder(transport.clone())
            .config(config)
            .without_logging()
            .command(ping())
            .build()
            .unwrap();

        assert_eq!(runtime.dispatcher().prefix_for("g2"), "$");
        runtime.handle_message(said("!ping", "u1")).await;
        runtime.handle_message(said("?ping", "u1")).await;

        assert_eq!(transport.texts(), ["pong"]);
        assert_eq!(runtime.stats().received(), 2);
        assert_eq!(runtime.stats().ignored(), 1);
        assert_eq!(runtime.stats().routed(), 1);
    }

    #[tokio::test]
    async fn test_input_errors_are_reported_in_channel() {
        let transport = Recorder::new();
        let mut config = HeraldConfig::default();
        config.dispatch.owner_id = Some("owner".into());
        let runtime = HeraldRuntime::builder(transport.clone())
            .config(config)
            .without_logging()
            .command(echo())
            .command(ping().restricted(true))
            .build()
            .unwrap();

        runtime.handle_message(said("!echo", "u1")).await;
        runtime.handle_message(said("!ping", "u1")).await;
        runtime.handle_message(said("!ping", "owner")).await;

        let texts = transport.texts();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("usage: echo <text>"), "{}", texts[0]);
        assert!(texts[1].contains("restricted"), "{}", texts[1]);
        assert_eq!(texts[2], "pong");
        assert_eq!(runtime.stats().input_errors(), 2);
    }

    #[tokio::test]
    async fn test_handler_failure_counts_as_defect() {
        let transport = Recorder::new();
        let runtime = HeraldRuntime::builder(transport.clone())
            .config(HeraldConfig::default())
            .without_logging()
            .command(Command::new("boom").action(|_: Invocation| async {
                Err::<(), BoxError>("kaput".into())
            }))
            .build()
            .unwrap();

        runtime.handle_message(said("!boom", "u1")).await;
        assert_eq!(runtime.stats().defects(), 1);
        assert!(transport.texts().is_empty());
    }

    #[test]
    fn test_reactions_require_a_binder() {
        let mut config = HeraldConfig::default();
        config.dispatch.reactions_enabled = true;

        let err = HeraldRuntime::builder(Recorder::new())
            .config(config.clone())
            .without_logging()
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::ReactionsUnavailable));

        assert!(
            HeraldRuntime::builder(Recorder::new())
                .config(config)
                .without_logging()
                .reactions(Arc::new(NullBinder))
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = HeraldRuntime::builder(Recorder::new())
            .config(config_with_prefix(""))
            .without_logging()
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[tokio::test]
    async fn test_run_drains_inbox_until_closed() {
        let transport = Recorder::new();
        let runtime = HeraldRuntime::builder(transport.clone())
            .config(HeraldConfig::default())
            .without_logging()
            .command(ping())
            .build()
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        for _ in 0..3 {
            tx.send(said("!ping", "u1")).await.unwrap();
        }
        drop(tx);

        runtime
            .run_until(rx, std::future::pending())
            .await
            .unwrap();
        assert_eq!(runtime.stats().received(), 3);
        assert_eq!(transport.texts(), ["pong", "pong", "pong"]);
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_run() {
        let runtime = HeraldRuntime::builder(Recorder::new())
            .config(HeraldConfig::default())
            .without_logging()
            .build()
            .unwrap();
        let (_tx, rx) = mpsc::channel::<Message>(8);

        let token = runtime.shutdown_token();
        tokio::spawn(async move { token.cancel() });
        runtime
            .run_until(rx, std::future::pending())
            .await
            .unwrap();
        assert_eq!(runtime.stats().received(), 0);
    }
}
