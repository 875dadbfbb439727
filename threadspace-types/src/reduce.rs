//! Pure state-mutation reducer for instance actions.
//!
//! This is the single place where an [`Action`] changes an [`InstanceState`].
//! The reducer does not notify observers, broadcast to peers or write
//! snapshots; callers do that after it returns.

use crate::{Action, InstanceState};

/// Apply `action` to `state`. Returns true if the state changed.
///
/// Modulation adjustments saturate at `0.0` and `1.0`; a non-finite delta is
/// treated as zero. Adding an effect that is already active or removing a
/// modulator that is not active is a no-op.
pub fn reduce_action(action: &Action, state: &mut InstanceState) -> bool {
    match action {
        Action::AdjustModulation { delta } => {
            if !delta.is_finite() {
                return false;
            }
            let before = state.modulation_depth;
            state.modulation_depth = (before + delta).clamp(0.0, 1.0);
            state.modulation_depth != before
        }
        Action::AddEffect { kind } => state.active_effects.insert(*kind),
        Action::RemoveModulator { kind } => state.active_modulators.remove(kind),
    }
}
