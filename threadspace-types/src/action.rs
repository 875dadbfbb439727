//! Typed instructions derived from resolved commands.

use serde::{Deserialize, Serialize};

use crate::{EffectKind, ModulatorKind};

/// Largest modulation step a single action may carry, in either direction.
pub const MAX_MODULATION_STEP: f32 = 1.0;

/// An immutable instruction applied to an [`InstanceState`](crate::InstanceState).
///
/// Serializes as `{"type": "modulation_adjust", "depth": -0.2}`,
/// `{"type": "add_effect", "effect": "shimmer"}` or
/// `{"type": "remove_modulator", "modulator": "lfo"}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "modulation_adjust")]
    AdjustModulation {
        #[serde(rename = "depth")]
        delta: f32,
    },
    #[serde(rename = "add_effect")]
    AddEffect {
        #[serde(rename = "effect")]
        kind: EffectKind,
    },
    #[serde(rename = "remove_modulator")]
    RemoveModulator {
        #[serde(rename = "modulator")]
        kind: ModulatorKind,
    },
}

impl Action {
    /// Build a modulation adjustment, bounding the step to `[-1, 1]`.
    /// Non-finite steps collapse to zero.
    pub fn adjust_modulation(delta: f32) -> Self {
        let delta = if delta.is_finite() {
            delta.clamp(-MAX_MODULATION_STEP, MAX_MODULATION_STEP)
        } else {
            0.0
        };
        Action::AdjustModulation { delta }
    }

    pub fn add_effect(kind: EffectKind) -> Self {
        Action::AddEffect { kind }
    }

    pub fn remove_modulator(kind: ModulatorKind) -> Self {
        Action::RemoveModulator { kind }
    }

    /// Short label used in log lines and the command history.
    pub fn describe(&self) -> String {
        match self {
            Action::AdjustModulation { delta } => format!("modulation {:+.2}", delta),
            Action::AddEffect { kind } => format!("add {}", kind.name()),
            Action::RemoveModulator { kind } => format!("remove {}", kind.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_modulation_bounds_step() {
        assert_eq!(
            Action::adjust_modulation(3.0),
            Action::AdjustModulation { delta: 1.0 }
        );
        assert_eq!(
            Action::adjust_modulation(-7.5),
            Action::AdjustModulation { delta: -1.0 }
        );
        assert_eq!(
            Action::adjust_modulation(-0.2),
            Action::AdjustModulation { delta: -0.2 }
        );
    }

    #[test]
    fn adjust_modulation_rejects_nan() {
        assert_eq!(
            Action::adjust_modulation(f32::NAN),
            Action::AdjustModulation { delta: 0.0 }
        );
    }

    #[test]
    fn action_json_shape() {
        let json = serde_json::to_value(Action::add_effect(EffectKind::Shimmer)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "add_effect", "effect": "shimmer"}));

        let json = serde_json::to_value(Action::remove_modulator(ModulatorKind::Lfo)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "remove_modulator", "modulator": "lfo"}));

        let json = serde_json::to_value(Action::adjust_modulation(0.5)).unwrap();
        assert_eq!(json["type"], "modulation_adjust");
        assert_eq!(json["depth"], 0.5);
    }

    #[test]
    fn describe_is_readable() {
        assert_eq!(Action::adjust_modulation(-0.2).describe(), "modulation -0.20");
        assert_eq!(Action::add_effect(EffectKind::Reverb).describe(), "add reverb");
        assert_eq!(
            Action::remove_modulator(ModulatorKind::Envelope).describe(),
            "remove envelope"
        );
    }
}
