use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{reduce, Action, EffectKind, ModulatorKind};

/// Modulation depth of a freshly created instance.
pub const DEFAULT_MODULATION_DEPTH: f32 = 0.5;

/// Mutable per-instance plugin state.
///
/// `modulation_depth` stays within `[0, 1]` across every [`apply`](Self::apply).
/// Effect and modulator sets are ordered so serialized snapshots are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub modulation_depth: f32,
    pub active_effects: BTreeSet<EffectKind>,
    pub active_modulators: BTreeSet<ModulatorKind>,
}

impl Default for InstanceState {
    fn default() -> Self {
        Self {
            modulation_depth: DEFAULT_MODULATION_DEPTH,
            active_effects: BTreeSet::new(),
            active_modulators: BTreeSet::new(),
        }
    }
}

impl InstanceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from explicit parts, clamping the depth into range.
    pub fn with_parts(
        modulation_depth: f32,
        effects: impl IntoIterator<Item = EffectKind>,
        modulators: impl IntoIterator<Item = ModulatorKind>,
    ) -> Self {
        let modulation_depth = if modulation_depth.is_finite() {
            modulation_depth.clamp(0.0, 1.0)
        } else {
            DEFAULT_MODULATION_DEPTH
        };
        Self {
            modulation_depth,
            active_effects: effects.into_iter().collect(),
            active_modulators: modulators.into_iter().collect(),
        }
    }

    /// Apply an action in place. Returns true if the state changed.
    pub fn apply(&mut self, action: &Action) -> bool {
        reduce::reduce_action(action, self)
    }

    pub fn has_effect(&self, kind: EffectKind) -> bool {
        self.active_effects.contains(&kind)
    }

    pub fn has_modulator(&self, kind: ModulatorKind) -> bool {
        self.active_modulators.contains(&kind)
    }
}
