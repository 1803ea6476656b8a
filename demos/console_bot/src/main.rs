//! Console Bot Example
//!
//! A Herald bot that reads messages from stdin and prints replies to
//! stdout. Every line you type is posted to `#general` in a pretend guild;
//! start a line with `#random ` to post to `#random` instead.
//!
//! # Things to try
//!
//! ```text
//! !help
//! !add 2 40
//! !whois bob
//! !announce #random {upper hello everyone}
//! !guess            (then type numbers)
//! @herald ping      (self-mention works as a prefix)
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --owner --reactions
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use herald::prelude::*;
use herald::runtime::config::ConfigLoader;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

const GUILD: &str = "g1";
const YOU: &str = "u0";

#[derive(Parser, Debug)]
#[command(name = "console-bot", about = "Chat with a Herald bot from the terminal")]
struct Cli {
    /// Configuration file (defaults to herald.toml lookup)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile
    #[arg(short, long)]
    profile: Option<String>,

    /// Your display name
    #[arg(short, long, default_value = "you")]
    name: String,

    /// Make yourself the bot owner
    #[arg(long)]
    owner: bool,

    /// Enable reaction interfaces
    #[arg(long)]
    reactions: bool,
}

// ============================================================================
// Collaborators
// ============================================================================

/// Prints outbound messages.
struct ConsoleTransport {
    me: UserId,
    next_id: AtomicU64,
}

impl ConsoleTransport {
    fn new() -> Self {
        Self {
            me: UserId::from("herald"),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn self_id(&self) -> &UserId {
        &self.me
    }

    async fn send(&self, channel: &ChannelId, message: &Outbound) -> ApiResult<SentMessage> {
        let id = format!("out-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = channel_name(channel);
        if let Some(content) = &message.content {
            println!("[#{name}] herald: {content}");
        }
        if let Some(embed) = &message.embed {
            println!("[#{name}] herald (embed): {embed}");
        }
        if let Some(file) = &message.file {
            println!("[#{name}] herald (file): {} ({} bytes)", file.name, file.data.len());
        }
        Ok(SentMessage::new(id, channel.clone()))
    }

    async fn delete(&self, message: &SentMessage) -> ApiResult<()> {
        println!("[#{}] (message {} deleted)", channel_name(&message.channel_id), message.id);
        Ok(())
    }
}

/// A pretend guild with two channels and three members.
struct ConsoleDirectory {
    members: Vec<User>,
    channels: Vec<Channel>,
}

impl ConsoleDirectory {
    fn new(me: User) -> Self {
        Self {
            members: vec![me, User::new("u1", "alice"), User::new("u2", "bob")],
            channels: vec![general(), random()],
        }
    }
}

#[async_trait]
impl Directory for ConsoleDirectory {
    async fn user(&self, id: &UserId) -> ApiResult<Option<User>> {
        Ok(self.members.iter().find(|u| &u.id == id).cloned())
    }

    async fn channel(&self, id: &ChannelId) -> ApiResult<Option<Channel>> {
        Ok(self.channels.iter().find(|c| &c.id == id).cloned())
    }

    async fn members(&self, guild: &GuildId) -> ApiResult<Vec<User>> {
        if guild.as_str() != GUILD {
            return Err(ApiError::Other(format!("unknown guild {guild}")));
        }
        Ok(self.members.clone())
    }

    async fn channels(&self, guild: &GuildId) -> ApiResult<Vec<Channel>> {
        if guild.as_str() != GUILD {
            return Err(ApiError::Other(format!("unknown guild {guild}")));
        }
        Ok(self.channels.clone())
    }
}

/// Prints the buttons instead of attaching them.
struct ConsoleBinder;

#[async_trait]
impl ReactionBinder for ConsoleBinder {
    async fn bind(
        &self,
        response: &SentMessage,
        interface: &ReactInterface,
        owner: &UserId,
    ) -> ApiResult<()> {
        let buttons: Vec<String> = interface
            .buttons
            .iter()
            .map(|b| format!("{} {}", b.emoji, b.action))
            .collect();
        println!("  buttons on {} for {owner}: {}", response.id, buttons.join(" | "));
        Ok(())
    }
}

fn general() -> Channel {
    Channel::guild("c1", "general", GUILD)
}

fn random() -> Channel {
    Channel::guild("c2", "random", GUILD)
}

fn channel_name(id: &ChannelId) -> &str {
    match id.as_str() {
        "c1" => "general",
        "c2" => "random",
        other => other,
    }
}

// ============================================================================
// Commands
// ============================================================================

const HELP: &str = r"╭──────────────────────────────────────────────╮
│              Console Bot - Commands          │
├──────────────────────────────────────────────┤
│ !ping                  - Pong!               │
│ !echo <text>           - Echo text           │
│ !add <a> <b>           - Add two numbers     │
│ !whois <user>          - Look up a member    │
│ !announce <ch> <text>  - Post elsewhere      │
│ !poof                  - Self-deleting reply │
│ !guess                 - Number game         │
│ !poll <question>       - Reaction poll       │
│ !secret                - Owner only          │
│ {upper <text>} {me}    - Inline replacers    │
╰──────────────────────────────────────────────╯";

fn commands() -> Vec<Command> {
    vec![
        Command::new("help")
            .describe("List commands")
            .action(|_: Invocation| async { Ok::<_, BoxError>(HELP) }),
        Command::new("ping")
            .describe("Pong!")
            .action(|_: Invocation| async { Ok::<_, BoxError>("Pong! 🏓") }),
        Command::new("echo")
            .alias("say")
            .args([ArgSpec::required("text").delimiter("")])
            .action(|inv: Invocation| async move {
                Ok::<_, BoxError>(inv.args.text(0).unwrap_or_default().to_string())
            }),
        Command::new("add")
            .args([
                ArgSpec::required("a").kind(ArgKind::Number),
                ArgSpec::required("b").kind(ArgKind::Number).delimiter(""),
            ])
            .action(|inv: Invocation| async move {
                let sum = inv.args.number(0).unwrap_or_default() + inv.args.number(1).unwrap_or_default();
                Ok::<_, BoxError>(format!("{sum}"))
            }),
        Command::new("whois")
            .guild_only(true)
            .args([ArgSpec::required("user").kind(ArgKind::User).delimiter("")])
            .action(|inv: Invocation| async move {
                let Some(user) = inv.args.user(0) else {
                    return Ok::<_, BoxError>(Replies::none());
                };
                let embed = json!({ "title": user.name, "fields": [{ "name": "id", "value": user.id }] });
                Ok(RichReply::new().embed(embed).into())
            }),
        Command::new("announce")
            .guild_only(true)
            .args([
                ArgSpec::required("channel").kind(ArgKind::Channel),
                ArgSpec::required("text").delimiter(""),
            ])
            .action(|inv: Invocation| async move {
                let (Some(channel), Some(text)) = (inv.args.channel(0), inv.args.text(1)) else {
                    return Ok::<_, BoxError>(Replies::none());
                };
                Ok(vec![
                    Reply::from(RichReply::new().content(text).channel(channel.id.clone())),
                    Reply::from(format!("announced in #{}", channel.name)),
                ]
                .into())
            }),
        Command::new("poof").action(|_: Invocation| async {
            Ok::<_, BoxError>(
                RichReply::new()
                    .content("this message will self-destruct in 5 seconds")
                    .delete_after(Duration::from_secs(5)),
            )
        }),
        Command::new("poll")
            .args([ArgSpec::required("question").delimiter("")])
            .action(|inv: Invocation| async move {
                let question = inv.args.text(0).unwrap_or_default().to_string();
                Ok::<_, BoxError>(RichReply::new().content(question).react_interface(
                    ReactInterface::new([ReactButton::new("👍", "yes"), ReactButton::new("👎", "no")]),
                ))
            }),
        Command::new("secret")
            .restricted(true)
            .action(|inv: Invocation| async move {
                Ok::<_, BoxError>(format!("hello {}, you own this bot", inv.actor.user.name))
            }),
        Command::new("guess").action(|_: Invocation| async {
            let secret = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.subsec_nanos() % 100 + 1)
                .unwrap_or(42);
            Ok::<_, BoxError>(
                RichReply::new()
                    .content("I'm thinking of a number between 1 and 100")
                    .await_reply(guessing(secret, 1)),
            )
        }),
    ]
}

/// Listens for the next guess. Each wrong guess re-arms a fresh await.
fn guessing(secret: u32, attempt: u32) -> Await {
    Await::new(move |inv: Invocation| async move {
        let guess = inv.args.number(0).unwrap_or_default();
        let hint = match guess.partial_cmp(&f64::from(secret)) {
            Some(std::cmp::Ordering::Less) => "higher",
            Some(std::cmp::Ordering::Greater) => "lower",
            _ => {
                return Ok::<Replies, BoxError>(
                    format!("{secret} it is! Got it in {attempt} tries").into(),
                );
            }
        };
        Ok(RichReply::new()
            .content(hint)
            .await_reply(guessing(secret, attempt + 1))
            .into())
    })
    .args([ArgSpec::required("guess").kind(ArgKind::Number).delimiter("")])
    .check(|_, content| content.trim().parse::<f64>().is_ok())
    .timeout(Duration::from_secs(30))
    .on_cancel(|| println!("(nobody guessed in time, the game is over)"))
}

fn replacers() -> Vec<Replacer> {
    vec![
        Replacer::new("upper", |call: &ReplacerCall<'_>| {
            call.args.text(0).unwrap_or_default().to_uppercase()
        })
        .args([ArgSpec::required("text").delimiter("")]),
        Replacer::new("me", |call: &ReplacerCall<'_>| call.message.author.name.clone()),
    ]
}

// ============================================================================
// Input
// ============================================================================

async fn read_stdin(inbox: mpsc::Sender<Message>, me: User) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut count = 0u64;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                error!(error = %err, "Failed to read stdin");
                break;
            }
        };
        let (channel, content) = match line.strip_prefix("#random ") {
            Some(rest) => (random(), rest.to_string()),
            None => (general(), line),
        };
        count += 1;
        let message = Message::new(format!("in-{count}"), content, me.clone(), channel);
        if inbox.send(message).await.is_err() {
            break;
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile.clone());
    }
    let mut config = loader.load()?;
    if cli.owner {
        config.dispatch.owner_id = Some(YOU.to_string());
    }
    if cli.reactions {
        config.dispatch.reactions_enabled = true;
    }

    let me = User::new(YOU, cli.name.clone());
    let mut builder = HeraldRuntime::builder(Arc::new(ConsoleTransport::new()))
        .config(config)
        .directory(Arc::new(ConsoleDirectory::new(me.clone())))
        .reactions(Arc::new(ConsoleBinder));
    for command in commands() {
        builder = builder.command(command);
    }
    for replacer in replacers() {
        builder = builder.replacer(replacer);
    }
    let runtime = builder.build()?;

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(read_stdin(tx, me));

    info!("Type !help to get started");
    runtime.run(rx).await?;
    Ok(())
}
