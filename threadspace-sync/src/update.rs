//! Peer updates and the merge rule that keeps instances convergent.
//!
//! Every local command is stamped with a Lamport clock and the source id.
//! Receivers replay effect and modulator actions, which commute (effects are
//! only ever added, modulators only ever removed), and take the modulation
//! depth from whichever update carries the highest stamp. Two instances that
//! have seen the same set of commands end up with the same state regardless
//! of delivery order.

use threadspace_types::{Action, InstanceId, InstanceState};

/// Lamport timestamp. Ordered by clock, then source id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp {
    clock: u64,
    source: InstanceId,
}

impl Stamp {
    pub fn new(clock: u64, source: InstanceId) -> Self {
        Self { clock, source }
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn source(&self) -> &InstanceId {
        &self.source
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    /// A command applied at the source.
    Command { stamp: Stamp, action: Action },
    /// A bare state broadcast. Receivers adopt it wholesale.
    Snapshot,
}

/// What a peer's delivery worker receives.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub source: InstanceId,
    pub kind: UpdateKind,
    /// Source state after the change.
    pub state: InstanceState,
}

impl StateUpdate {
    pub fn snapshot(source: InstanceId, state: InstanceState) -> Self {
        Self {
            source,
            kind: UpdateKind::Snapshot,
            state,
        }
    }

    pub fn command(stamp: Stamp, action: Action, state: InstanceState) -> Self {
        Self {
            source: stamp.source.clone(),
            kind: UpdateKind::Command { stamp, action },
            state,
        }
    }

    pub fn action(&self) -> Option<Action> {
        match &self.kind {
            UpdateKind::Command { action, .. } => Some(*action),
            UpdateKind::Snapshot => None,
        }
    }
}

/// An instance's live state plus the clock needed to merge peer updates.
#[derive(Debug, Clone)]
pub struct Replica {
    id: InstanceId,
    state: InstanceState,
    clock: u64,
    depth_stamp: Option<Stamp>,
}

impl Replica {
    pub fn new(id: InstanceId, state: InstanceState) -> Self {
        Self {
            id,
            state,
            clock: 0,
            depth_stamp: None,
        }
    }

    pub fn state(&self) -> &InstanceState {
        &self.state
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Apply a local action. Returns whether the state changed and the update
    /// to broadcast.
    pub fn apply_local(&mut self, action: Action) -> (bool, StateUpdate) {
        self.clock += 1;
        let stamp = Stamp::new(self.clock, self.id.clone());
        let changed = self.state.apply(&action);
        if matches!(action, Action::AdjustModulation { .. }) {
            self.depth_stamp = Some(stamp.clone());
        }
        (changed, StateUpdate::command(stamp, action, self.state.clone()))
    }

    /// Merge a peer update. Returns true if the local state changed.
    pub fn merge(&mut self, update: &StateUpdate) -> bool {
        let before = self.state.clone();
        match &update.kind {
            UpdateKind::Command { stamp, action } => {
                self.clock = self.clock.max(stamp.clock);
                match action {
                    Action::AdjustModulation { .. } => {
                        let newer = self.depth_stamp.as_ref().map_or(true, |seen| stamp > seen);
                        if newer && update.state.modulation_depth.is_finite() {
                            self.state.modulation_depth =
                                update.state.modulation_depth.clamp(0.0, 1.0);
                            self.depth_stamp = Some(stamp.clone());
                        }
                    }
                    other => {
                        self.state.apply(other);
                    }
                }
            }
            UpdateKind::Snapshot => self.state = update.state.clone(),
        }
        self.state != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadspace_types::{EffectKind, ModulatorKind};

    fn replica(id: &str) -> Replica {
        Replica::new(
            InstanceId::new(id),
            InstanceState::with_parts(0.5, [], [ModulatorKind::Lfo, ModulatorKind::Random]),
        )
    }

    #[test]
    fn stamps_order_by_clock_then_source() {
        let a1 = Stamp::new(1, InstanceId::new("A"));
        let b1 = Stamp::new(1, InstanceId::new("B"));
        let a2 = Stamp::new(2, InstanceId::new("A"));
        assert!(a1 < b1);
        assert!(b1 < a2);
    }

    #[test]
    fn concurrent_set_commands_both_survive() {
        let mut a = replica("A");
        let mut b = replica("B");
        let (_, from_a) = a.apply_local(Action::add_effect(EffectKind::Shimmer));
        let (_, from_b) = b.apply_local(Action::add_effect(EffectKind::Delay));

        assert!(a.merge(&from_b));
        assert!(b.merge(&from_a));
        assert_eq!(a.state(), b.state());
        assert!(a.state().has_effect(EffectKind::Shimmer));
        assert!(a.state().has_effect(EffectKind::Delay));
    }

    #[test]
    fn concurrent_depth_commands_settle_on_highest_stamp() {
        let mut a = replica("A");
        let mut b = replica("B");
        let (_, up) = a.apply_local(Action::adjust_modulation(0.2));
        let (_, down) = b.apply_local(Action::adjust_modulation(-0.2));

        a.merge(&down);
        b.merge(&up);
        assert_eq!(a.state(), b.state());
        // (1, "B") outranks (1, "A").
        assert!((a.state().modulation_depth - 0.3).abs() < 1e-6);
    }

    #[test]
    fn merge_order_does_not_matter() {
        let mut a = replica("A");
        let mut b = replica("B");
        let mut c = replica("C");
        let updates = vec![
            a.apply_local(Action::adjust_modulation(0.2)).1,
            a.apply_local(Action::remove_modulator(ModulatorKind::Lfo)).1,
            b.apply_local(Action::add_effect(EffectKind::Reverb)).1,
            b.apply_local(Action::adjust_modulation(-0.4)).1,
        ];

        let mut forward = replica("X");
        let mut backward = replica("Y");
        for update in &updates {
            forward.merge(update);
        }
        for update in updates.iter().rev() {
            backward.merge(update);
        }
        assert_eq!(forward.state(), backward.state());

        for update in &updates {
            c.merge(update);
        }
        assert_eq!(c.state(), forward.state());
        assert!(!c.state().has_modulator(ModulatorKind::Lfo));
        assert!(c.state().has_modulator(ModulatorKind::Random));
    }

    #[test]
    fn local_command_after_merge_outranks_what_was_seen() {
        let mut a = replica("A");
        let mut b = replica("B");
        for _ in 0..3 {
            b.apply_local(Action::adjust_modulation(0.1));
        }
        let (_, seen) = b.apply_local(Action::adjust_modulation(0.1));
        a.merge(&seen);
        assert_eq!(a.clock(), 4);

        let (_, reply) = a.apply_local(Action::adjust_modulation(-0.5));
        assert!(b.merge(&reply));
        assert_eq!(a.state().modulation_depth, b.state().modulation_depth);
    }

    #[test]
    fn snapshot_is_adopted_wholesale() {
        let mut a = replica("A");
        let state = InstanceState::with_parts(0.9, [EffectKind::Delay], []);
        assert!(a.merge(&StateUpdate::snapshot(InstanceId::new("B"), state.clone())));
        assert_eq!(a.state(), &state);
        assert!(!a.merge(&StateUpdate::snapshot(InstanceId::new("B"), state)));
    }
}
