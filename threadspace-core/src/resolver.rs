//! Natural-language command resolution.
//!
//! Commands are matched against an ordered table of regular expressions. The
//! first pattern (in registration order) that finds a match anywhere in the
//! lower-cased command builds the resulting [`Action`]. Text that matches
//! nothing resolves to `None`, which callers treat as a silent no-op.

use regex::Regex;
use thiserror::Error;

use threadspace_types::{Action, EffectKind, ModulatorKind};

/// Step applied by the "soften" / "increase" modulation commands.
pub const MODULATION_STEP: f32 = 0.2;

type ActionBuilder = Box<dyn Fn(&str) -> Action + Send + Sync>;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("invalid command pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

struct CommandPattern {
    regex: Regex,
    build: ActionBuilder,
}

/// Ordered, immutable pattern table. Safe to share across instances.
pub struct ActionResolver {
    patterns: Vec<CommandPattern>,
}

impl std::fmt::Debug for ActionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionResolver")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionResolver {
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    /// The built-in command table.
    pub fn standard() -> Self {
        standard_builder()
            .build()
            .expect("built-in command patterns must compile")
    }

    /// Resolve `text` to an action, or `None` if no pattern matches.
    ///
    /// Builders receive the original (not lower-cased) text.
    pub fn resolve(&self, text: &str) -> Option<Action> {
        let normalized = text.to_lowercase();
        if normalized.trim().is_empty() {
            return None;
        }
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(&normalized))
            .map(|p| (p.build)(text))
    }

    /// Pattern sources in match order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.regex.as_str())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for ActionResolver {
    fn default() -> Self {
        Self::standard()
    }
}

/// Collects patterns in order; regexes are compiled by [`build`](Self::build).
#[derive(Default)]
pub struct ResolverBuilder {
    pending: Vec<(String, ActionBuilder)>,
}

impl ResolverBuilder {
    /// Register a pattern whose action is computed from the command text.
    pub fn pattern<F>(mut self, pattern: &str, build: F) -> Self
    where
        F: Fn(&str) -> Action + Send + Sync + 'static,
    {
        self.pending.push((pattern.to_string(), Box::new(build)));
        self
    }

    /// Register a pattern that always yields the same action.
    pub fn action(self, pattern: &str, action: Action) -> Self {
        self.pattern(pattern, move |_| action)
    }

    pub fn build(self) -> Result<ActionResolver, ResolverError> {
        let patterns = self
            .pending
            .into_iter()
            .map(|(pattern, build)| match Regex::new(&pattern) {
                Ok(regex) => Ok(CommandPattern { regex, build }),
                Err(source) => Err(ResolverError::InvalidPattern { pattern, source }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ActionResolver { patterns })
    }
}

fn standard_builder() -> ResolverBuilder {
    ActionResolver::builder()
        .action(
            "soften.*modulation",
            Action::adjust_modulation(-MODULATION_STEP),
        )
        .action(
            "increase.*modulation",
            Action::adjust_modulation(MODULATION_STEP),
        )
        .action("add.*shimmer", Action::add_effect(EffectKind::Shimmer))
        .action("add.*delay", Action::add_effect(EffectKind::Delay))
        .action("add.*reverb", Action::add_effect(EffectKind::Reverb))
        .action("remove.*lfo", Action::remove_modulator(ModulatorKind::Lfo))
        .action(
            "remove.*envelope",
            Action::remove_modulator(ModulatorKind::Envelope),
        )
        .action(
            "remove.*random",
            Action::remove_modulator(ModulatorKind::Random),
        )
}
