//! Declarative positional arguments.
//!
//! Commands, replacers and awaits describe their arguments as an ordered
//! list of [`ArgSpec`]s. The [tokenizer](crate::tokenizer) walks that list
//! to cut a raw text span into typed [`ArgValue`]s.
//!
//! ```rust,ignore
//! use herald_framework::argument::{ArgKind, ArgSpec};
//!
//! let specs = vec![
//!     ArgSpec::required("target").kind(ArgKind::User),
//!     ArgSpec::required("amount").kind(ArgKind::Number),
//!     ArgSpec::optional("reason").delimiter(""),
//! ];
//! ```

use std::fmt;

use herald_core::{Channel, User};

use crate::error::SpecError;

/// How a positional argument is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArgKind {
    /// Used as-is.
    #[default]
    String,
    /// Parsed as a non-zero float.
    Number,
    /// Resolved to a guild member.
    User,
    /// Resolved to a guild channel.
    Channel,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Number => "number",
            Self::User => "user",
            Self::Channel => "channel",
        })
    }
}

/// Description of one positional argument. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    name: String,
    mandatory: bool,
    delimiter: String,
    kind: ArgKind,
}

impl ArgSpec {
    /// A mandatory string argument delimited by a single space.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mandatory: true,
            delimiter: " ".to_string(),
            kind: ArgKind::String,
        }
    }

    /// An optional string argument delimited by a single space.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            mandatory: false,
            ..Self::required(name)
        }
    }

    /// Sets the delimiter that ends this argument. An empty delimiter
    /// consumes the rest of the text.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Sets the coercion applied to this argument.
    pub fn kind(mut self, kind: ArgKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn delimiter_str(&self) -> &str {
        &self.delimiter
    }

    pub fn arg_kind(&self) -> ArgKind {
        self.kind
    }
}

/// Loadable-but-suspicious argument lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecWarning {
    /// The final argument has a non-empty delimiter, which is never used:
    /// the last position always consumes the rest of the text.
    TrailingDelimiter { name: String, delimiter: String },
}

impl fmt::Display for SpecWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrailingDelimiter { name, delimiter } => write!(
                f,
                "final argument '{name}' declares delimiter {delimiter:?}, which is ignored"
            ),
        }
    }
}

/// Checks an argument list.
///
/// Once an optional argument appears, no later argument may be mandatory.
pub fn validate_specs(specs: &[ArgSpec]) -> Result<Vec<SpecWarning>, SpecError> {
    let mut seen_optional = false;
    for (position, spec) in specs.iter().enumerate() {
        if spec.name.is_empty() {
            return Err(SpecError::EmptyName { position });
        }
        if spec.mandatory && seen_optional {
            return Err(SpecError::MandatoryAfterOptional {
                position,
                name: spec.name.clone(),
            });
        }
        seen_optional |= !spec.mandatory;
    }

    let mut warnings = Vec::new();
    if let Some(last) = specs.last()
        && !last.delimiter.is_empty()
    {
        warnings.push(SpecWarning::TrailingDelimiter {
            name: last.name.clone(),
            delimiter: last.delimiter.clone(),
        });
    }
    Ok(warnings)
}

/// Renders `name <a> <b> [c]`.
pub fn usage(name: &str, specs: &[ArgSpec]) -> String {
    let mut out = name.to_string();
    for spec in specs {
        out.push(' ');
        if spec.mandatory {
            out.push_str(&format!("<{}>", spec.name));
        } else {
            out.push_str(&format!("[{}]", spec.name));
        }
    }
    out
}

// =============================================================================
// Parsed values
// =============================================================================

/// One coerced positional value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Number(f64),
    User(User),
    Channel(Channel),
}

impl ArgValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Self::User(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&Channel> {
        match self {
            Self::Channel(c) => Some(c),
            _ => None,
        }
    }
}

/// Positional values produced by the tokenizer.
///
/// Positions that received no characters are `None`; trailing empty
/// positions are dropped, so `len()` may be shorter than the declared argument list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<Option<ArgValue>>,
}

impl Args {
    pub fn new(mut values: Vec<Option<ArgValue>>) -> Self {
        while values.last().is_some_and(Option::is_none) {
            values.pop();
        }
        Self { values }
    }

    /// Number of produced positions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(ArgValue::as_text)
    }

    pub fn number(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(ArgValue::as_number)
    }

    pub fn user(&self, index: usize) -> Option<&User> {
        self.get(index).and_then(ArgValue::as_user)
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.get(index).and_then(ArgValue::as_channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&ArgValue>> {
        self.values.iter().map(Option::as_ref)
    }

    /// Returns `true` if every mandatory position of `specs` has a value.
    pub fn covers(&self, specs: &[ArgSpec]) -> bool {
        specs
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.mandatory)
            .all(|(index, _)| self.get(index).is_some())
    }
}
