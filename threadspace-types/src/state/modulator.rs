use serde::{Deserialize, Serialize};

/// Modulation sources a command can remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModulatorKind {
    Lfo,
    Envelope,
    Random,
}

impl ModulatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModulatorKind::Lfo => "lfo",
            ModulatorKind::Envelope => "envelope",
            ModulatorKind::Random => "random",
        }
    }

    pub fn all() -> [ModulatorKind; 3] {
        [ModulatorKind::Lfo, ModulatorKind::Envelope, ModulatorKind::Random]
    }

    pub fn from_name(name: &str) -> Option<ModulatorKind> {
        Self::all()
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }
}
