//! Inline replacers.
//!
//! A replacer is an inline macro written between two markers, `{time utc}`
//! with the default `{`/`}` markers. During normalization every marked span
//! is replaced, in a single left-to-right pass, by the output of the
//! replacer named by the span's first word. Replacement output is never
//! scanned again.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use herald_core::Message;

use crate::argument::{ArgSpec, Args, validate_specs};
use crate::error::SetupError;
use crate::tokenizer::{Resolver, tokenize};

/// Substituted for a span whose key names no replacer.
pub const INVALID_KEY: &str = "[invalid replacer]";

/// Substituted for a span whose arguments fail to parse.
pub const INVALID_ARGUMENTS: &str = "[invalid arguments]";

/// What a replacer action receives.
#[derive(Debug)]
pub struct ReplacerCall<'a> {
    /// The full span, markers included.
    pub span: &'a str,
    /// The text between the markers.
    pub inner: &'a str,
    /// Parsed arguments (everything after the key).
    pub args: &'a Args,
    /// The message being normalized.
    pub message: &'a Message,
}

/// Replacer action signature.
pub type ReplacerFn = Arc<dyn Fn(&ReplacerCall<'_>) -> String + Send + Sync>;

/// A named inline macro.
#[derive(Clone)]
pub struct Replacer {
    key: String,
    specs: Vec<ArgSpec>,
    action: ReplacerFn,
}

impl Replacer {
    /// Creates a replacer. The key is matched case-insensitively.
    pub fn new<F>(key: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ReplacerCall<'_>) -> String + Send + Sync + 'static,
    {
        Self {
            key: key.into().to_lowercase(),
            specs: Vec::new(),
            action: Arc::new(action),
        }
    }

    pub fn args(mut self, specs: impl IntoIterator<Item = ArgSpec>) -> Self {
        self.specs = specs.into_iter().collect();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn specs(&self) -> &[ArgSpec] {
        &self.specs
    }
}

impl fmt::Debug for Replacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replacer")
            .field("key", &self.key)
            .field("specs", &self.specs)
            .finish_non_exhaustive()
    }
}

/// Registered replacers, by key.
#[derive(Debug, Default, Clone)]
pub struct ReplacerTable {
    replacers: HashMap<String, Replacer>,
}

impl ReplacerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a replacer after validating its argument list.
    pub fn register(&mut self, replacer: Replacer) -> Result<(), SetupError> {
        let warnings = validate_specs(&replacer.specs).map_err(|source| SetupError::InvalidSpec {
            target: replacer.key.clone(),
            source,
        })?;
        for warning in warnings {
            warn!(replacer = %replacer.key, "{warning}");
        }
        if self.replacers.contains_key(&replacer.key) {
            warn!(replacer = %replacer.key, "Duplicate replacer key, last registration wins");
        }
        self.replacers.insert(replacer.key.clone(), replacer);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Replacer> {
        self.replacers.get(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.replacers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacers.is_empty()
    }

    /// Expands a single span.
    async fn expand(
        &self,
        span: &str,
        inner: &str,
        resolver: &dyn Resolver,
        message: &Message,
    ) -> String {
        let body = inner.trim_start();
        let (key, rest) = match body.find(char::is_whitespace) {
            Some(at) => (&body[..at], body[at..].trim_start()),
            None => (body, ""),
        };

        let Some(replacer) = self.get(key) else {
            debug!(key, "Unknown replacer key");
            return INVALID_KEY.to_string();
        };

        match tokenize(&replacer.specs, rest, resolver, message).await {
            Some(args) if args.covers(&replacer.specs) => (replacer.action)(&ReplacerCall {
                span,
                inner,
                args: &args,
                message,
            }),
            _ => INVALID_ARGUMENTS.to_string(),
        }
    }
}

/// Compiled open/close markers.
#[derive(Debug, Clone)]
pub struct Markers {
    open: String,
    close: String,
    pattern: Regex,
}

impl Markers {
    /// Builds the span pattern. Markers are escaped, so regex
    /// metacharacters such as `[` or `(` are fine.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self, SetupError> {
        let open = open.into();
        let close = close.into();
        if open.is_empty() || close.is_empty() {
            return Err(SetupError::EmptyMarkers);
        }
        let pattern = Regex::new(&format!(
            "(?s){}(.*?){}",
            regex::escape(&open),
            regex::escape(&close)
        ))?;
        Ok(Self {
            open,
            close,
            pattern,
        })
    }

    pub fn open(&self) -> &str {
        &self.open
    }

    pub fn close(&self) -> &str {
        &self.close
    }

    /// Byte ranges of every span and its inner capture, left to right.
    fn spans(&self, text: &str) -> Vec<(Range<usize>, Range<usize>)> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let inner = caps.get(1)?;
                Some((whole.range(), inner.range()))
            })
            .collect()
    }
}

/// Replaces every marked span of `text` in a single pass.
pub async fn substitute(
    text: &str,
    markers: &Markers,
    table: &ReplacerTable,
    resolver: &dyn Resolver,
    message: &Message,
) -> String {
    let spans = markers.spans(text);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (whole, inner) in spans {
        out.push_str(&text[cursor..whole.start]);
        let expanded = table
            .expand(&text[whole.clone()], &text[inner], resolver, message)
            .await;
        out.push_str(&expanded);
        cursor = whole.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::ArgKind;
    use crate::testing::{FixtureResolver, guild_message};

    fn table() -> ReplacerTable {
        let mut table = ReplacerTable::new();
        table
            .register(Replacer::new("upper", |call| {
                call.args.text(0).unwrap_or_default().to_uppercase()
            })
            .args([ArgSpec::required("text").delimiter("")]))
            .unwrap();
        table
            .register(Replacer::new("double", |call| {
                format!("{}", call.args.number(0).unwrap_or_default() * 2.0)
            })
            .args([ArgSpec::required("n").kind(ArgKind::Number).delimiter("")]))
            .unwrap();
        table
            .register(Replacer::new("echo", |call| call.span.to_string()))
            .unwrap();
        table
    }

    async fn run(text: &str, markers: &Markers) -> String {
        substitute(text, markers, &table(), &FixtureResolver, &guild_message(text)).await
    }

    #[tokio::test]
    async fn test_text_outside_spans_untouched() {
        let markers = Markers::new("{", "}").unwrap();
        assert_eq!(run("no spans here", &markers).await, "no spans here");
        assert_eq!(
            run("say {upper hi there} now", &markers).await,
            "say HI THERE now"
        );
    }

    #[tokio::test]
    async fn test_each_span_replaced_once() {
        let markers = Markers::new("{", "}").unwrap();
        // `echo` returns its own span; the result must not be expanded again.
        assert_eq!(run("{echo} {echo}", &markers).await, "{echo} {echo}");
    }

    #[tokio::test]
    async fn test_key_is_case_insensitive() {
        let markers = Markers::new("{", "}").unwrap();
        assert_eq!(run("{UPPER abc}", &markers).await, "ABC");
    }

    #[tokio::test]
    async fn test_invalid_key_and_arguments() {
        let markers = Markers::new("{", "}").unwrap();
        assert_eq!(run("{nope 1}", &markers).await, INVALID_KEY);
        assert_eq!(run("{double zero}", &markers).await, INVALID_ARGUMENTS);
        assert_eq!(run("{upper}", &markers).await, INVALID_ARGUMENTS);
        assert_eq!(run("{double 4}", &markers).await, "8");
    }

    #[tokio::test]
    async fn test_metacharacter_markers() {
        let markers = Markers::new("[[", "]]").unwrap();
        assert_eq!(run("a [[upper b]] c", &markers).await, "a B c");
        let markers = Markers::new("(", ")").unwrap();
        assert_eq!(run("(upper x)(upper y)", &markers).await, "XY");
    }

    #[test]
    fn test_empty_markers_rejected() {
        assert!(matches!(Markers::new("", "}"), Err(SetupError::EmptyMarkers)));
    }
}
