//! Named commands and the command table.
//!
//! ```rust,ignore
//! let kick = Command::new("kick")
//!     .alias("k")
//!     .args([
//!         ArgSpec::required("target").kind(ArgKind::User),
//!         ArgSpec::optional("reason").delimiter(""),
//!     ])
//!     .guild_only(true)
//!     .describe("Remove a member from the server")
//!     .action(kick_action);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::argument::{ArgSpec, usage, validate_specs};
use crate::error::SetupError;
use crate::handler::{Action, BoxedAction};

/// A command definition. Immutable once registered.
#[derive(Clone)]
pub struct Command {
    name: String,
    aliases: Vec<String>,
    specs: Vec<ArgSpec>,
    restricted: bool,
    guild_only: bool,
    description: Option<String>,
    action: Option<BoxedAction>,
}

impl Command {
    /// Creates a command. Names and aliases match case-insensitively.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            aliases: Vec::new(),
            specs: Vec::new(),
            restricted: false,
            guild_only: false,
            description: None,
            action: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into().to_lowercase());
        self
    }

    pub fn args(mut self, specs: impl IntoIterator<Item = ArgSpec>) -> Self {
        self.specs = specs.into_iter().collect();
        self
    }

    /// Only the application owner may invoke this command.
    pub fn restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }

    /// Reject invocations from direct conversations.
    pub fn guild_only(mut self, guild_only: bool) -> Self {
        self.guild_only = guild_only;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn action(mut self, action: impl Action) -> Self {
        self.action = Some(Arc::new(action));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn specs(&self) -> &[ArgSpec] {
        &self.specs
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn is_guild_only(&self) -> bool {
        self.guild_only
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// `None` for a command registered without an action.
    pub fn action_ref(&self) -> Option<&BoxedAction> {
        self.action.as_ref()
    }

    /// Renders the usage line, e.g. `kick <target> [reason]`.
    pub fn usage(&self) -> String {
        usage(&self.name, &self.specs)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("specs", &self.specs)
            .field("restricted", &self.restricted)
            .field("guild_only", &self.guild_only)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

/// Registered commands, indexed by name and alias.
#[derive(Debug, Default, Clone)]
pub struct CommandTable {
    commands: BTreeMap<String, Arc<Command>>,
    index: HashMap<String, String>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a command.
    ///
    /// A later registration claiming an existing name or alias takes it over.
    pub fn register(&mut self, command: Command) -> Result<(), SetupError> {
        let warnings = validate_specs(&command.specs).map_err(|source| SetupError::InvalidSpec {
            target: command.name.clone(),
            source,
        })?;
        for warning in warnings {
            warn!(command = %command.name, "{warning}");
        }
        if command.action.is_none() {
            warn!(command = %command.name, "Command registered without an action");
        }

        if let Some(replaced) = self.commands.get(&command.name) {
            for key in &replaced.aliases {
                if self.index.get(key) == Some(&replaced.name) {
                    self.index.remove(key);
                }
            }
        }
        for key in std::iter::once(&command.name).chain(&command.aliases) {
            if let Some(previous) = self.index.insert(key.clone(), command.name.clone())
                && previous != command.name
            {
                warn!(key = %key, previous = %previous, command = %command.name, "Command key reassigned");
            }
        }
        debug!(command = %command.name, aliases = ?command.aliases, "Command registered");
        self.commands.insert(command.name.clone(), Arc::new(command));
        Ok(())
    }

    /// Looks up a command by name or alias, case-insensitively.
    pub fn get(&self, keyword: &str) -> Option<Arc<Command>> {
        let name = self.index.get(&keyword.to_lowercase())?;
        self.commands.get(name).cloned()
    }

    /// All commands, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, SpecError};
    use crate::handler::Invocation;

    fn noop(name: &str) -> Command {
        Command::new(name).action(|_: Invocation| async { Ok::<_, BoxError>(()) })
    }

    #[test]
    fn test_lookup_by_name_and_alias() {
        let mut table = CommandTable::new();
        table.register(noop("Ping").alias("P")).unwrap();
        assert_eq!(table.get("ping").unwrap().name(), "ping");
        assert_eq!(table.get("PING").unwrap().name(), "ping");
        assert_eq!(table.get("p").unwrap().name(), "ping");
        assert!(table.get("pong").is_none());
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let mut table = CommandTable::new();
        let err = table
            .register(noop("bad").args([ArgSpec::optional("a"), ArgSpec::required("b")]))
            .unwrap_err();
        assert!(matches!(
            err,
            SetupError::InvalidSpec {
                source: SpecError::MandatoryAfterOptional { position: 1, .. },
                ..
            }
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_later_registration_takes_over_alias() {
        let mut table = CommandTable::new();
        table.register(noop("first").alias("x")).unwrap();
        table.register(noop("second").alias("x")).unwrap();
        assert_eq!(table.get("x").unwrap().name(), "second");
        assert_eq!(table.get("first").unwrap().name(), "first");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_reregistration_drops_old_aliases() {
        let mut table = CommandTable::new();
        table.register(noop("roll").alias("r").alias("dice")).unwrap();
        table.register(noop("roll").alias("d")).unwrap();
        assert!(table.get("r").is_none());
        assert!(table.get("dice").is_none());
        assert_eq!(table.get("d").unwrap().name(), "roll");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_missing_action_still_registers() {
        let mut table = CommandTable::new();
        table.register(Command::new("empty")).unwrap();
        assert!(table.get("empty").unwrap().action_ref().is_none());
    }

    #[test]
    fn test_usage_and_iteration_order() {
        let mut table = CommandTable::new();
        table.register(noop("zeta")).unwrap();
        table
            .register(noop("alpha").args([ArgSpec::required("who").delimiter("")]))
            .unwrap();
        let names: Vec<_> = table.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert_eq!(table.get("alpha").unwrap().usage(), "alpha <who>");
    }
}
