use serde::{Deserialize, Serialize};

/// Effects a command can switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Shimmer,
    Delay,
    Reverb,
}

impl EffectKind {
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Shimmer => "shimmer",
            EffectKind::Delay => "delay",
            EffectKind::Reverb => "reverb",
        }
    }

    pub fn all() -> [EffectKind; 3] {
        [EffectKind::Shimmer, EffectKind::Delay, EffectKind::Reverb]
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<EffectKind> {
        Self::all()
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }
}
