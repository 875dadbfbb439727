use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

use threadspace_core::ActionResolver;
use threadspace_sync::{PluginInstance, SyncError, SyncRegistry};
use threadspace_types::InstanceState;

use crate::repl::{ReplCommand, HELP};

/// In-process instances driven from the command line.
pub struct Session {
    registry: Arc<SyncRegistry>,
    resolver: Arc<ActionResolver>,
    initial: InstanceState,
    heartbeats: bool,
    instances: BTreeMap<String, PluginInstance>,
}

impl Session {
    pub fn new(registry: Arc<SyncRegistry>, resolver: Arc<ActionResolver>, initial: InstanceState) -> Self {
        Self {
            registry,
            resolver,
            initial,
            heartbeats: true,
            instances: BTreeMap::new(),
        }
    }

    /// Attach instances without starting their heartbeat tasks.
    pub fn without_heartbeats(mut self) -> Self {
        self.heartbeats = false;
        self
    }

    pub fn spawn(&mut self, id: &str) -> Result<bool, SyncError> {
        if self.instances.get(id).is_some_and(PluginInstance::is_live) {
            return Ok(false);
        }
        let instance = PluginInstance::attach(
            id,
            self.initial.clone(),
            self.resolver.clone(),
            self.registry.clone(),
        )?;
        if self.heartbeats {
            instance.start_heartbeat()?;
        }
        // Dropping an evicted predecessor leaves the new registration alone.
        self.instances.insert(id.to_string(), instance);
        Ok(true)
    }

    /// Run one command. Returns `Ok(false)` when the session should end.
    pub fn execute(&mut self, command: ReplCommand, out: &mut impl Write) -> io::Result<bool> {
        match command {
            ReplCommand::Issue { id, text } => match self.instances.get(&id) {
                Some(instance) => match instance.process_command(&text) {
                    Some(action) => {
                        let state = instance.state();
                        writeln!(out, "{}: {} -> {}", id, action.describe(), format_state(&state))?;
                        if !instance.is_live() {
                            writeln!(out, "{}: evicted, change stayed local", id)?;
                        }
                    }
                    None => writeln!(out, "{}: no matching command", id)?,
                },
                None => writeln!(out, "no instance named {}", id)?,
            },
            ReplCommand::Spawn(id) => match self.spawn(&id) {
                Ok(true) => writeln!(out, "attached {}", id)?,
                Ok(false) => writeln!(out, "{} is already attached", id)?,
                Err(e) => writeln!(out, "could not attach {}: {}", id, e)?,
            },
            ReplCommand::Drop(id) => match self.instances.remove(&id) {
                Some(instance) => {
                    drop(instance);
                    writeln!(out, "detached {}", id)?;
                }
                None => writeln!(out, "no instance named {}", id)?,
            },
            ReplCommand::Stall(id) => match self.instances.get(&id) {
                Some(instance) => {
                    instance.stop_heartbeat();
                    writeln!(out, "{} stopped heartbeating", id)?;
                }
                None => writeln!(out, "no instance named {}", id)?,
            },
            ReplCommand::List => {
                let live = self.registry.live_ids();
                if live.is_empty() {
                    writeln!(out, "no live instances")?;
                }
                for id in &live {
                    writeln!(out, "  {}", id)?;
                }
                for id in self.instances.keys() {
                    if !self.registry.contains(id) {
                        writeln!(out, "  {} (evicted)", id)?;
                    }
                }
            }
            ReplCommand::State(id) => match self.instances.get(&id) {
                Some(instance) => writeln!(out, "{}: {}", id, format_state(&instance.state()))?,
                None => writeln!(out, "no instance named {}", id)?,
            },
            ReplCommand::Last => match self.registry.snapshots().read_last() {
                Some(snapshot) => writeln!(out, "{}", snapshot.summary())?,
                None => writeln!(out, "no snapshots yet")?,
            },
            ReplCommand::Help => writeln!(out, "{}", HELP)?,
            ReplCommand::Quit => return Ok(false),
        }
        Ok(true)
    }
}

pub fn format_state(state: &InstanceState) -> String {
    let effects: Vec<&str> = state.active_effects.iter().map(|e| e.name()).collect();
    let modulators: Vec<&str> = state.active_modulators.iter().map(|m| m.name()).collect();
    format!(
        "depth {:.2}, effects [{}], modulators [{}]",
        state.modulation_depth,
        effects.join(", "),
        modulators.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use threadspace_core::snapshot::MemorySink;
    use threadspace_core::{NotificationHub, SnapshotWriter, SyncConfig};
    use threadspace_types::EffectKind;

    fn session() -> Session {
        let writer = SnapshotWriter::spawn(Arc::new(MemorySink::new(4))).unwrap();
        let registry = Arc::new(SyncRegistry::new(
            SyncConfig::default(),
            NotificationHub::new(),
            writer,
        ));
        Session::new(
            registry,
            Arc::new(ActionResolver::standard()),
            InstanceState::default(),
        )
        .without_heartbeats()
    }

    fn run(session: &mut Session, command: ReplCommand) -> String {
        let mut out = Vec::new();
        session.execute(command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn spawn_issue_and_inspect() {
        let mut session = session();
        assert_eq!(run(&mut session, ReplCommand::Spawn("a".into())), "attached a\n");
        assert_eq!(
            run(&mut session, ReplCommand::Spawn("a".into())),
            "a is already attached\n"
        );

        let out = run(
            &mut session,
            ReplCommand::Issue {
                id: "a".into(),
                text: "add some shimmer".into(),
            },
        );
        assert_eq!(
            out,
            "a: add shimmer -> depth 0.50, effects [shimmer], modulators []\n"
        );
        assert!(session.instances["a"].state().has_effect(EffectKind::Shimmer));
    }

    #[test]
    fn unmatched_and_unknown() {
        let mut session = session();
        session.spawn("a").unwrap();
        assert_eq!(
            run(
                &mut session,
                ReplCommand::Issue {
                    id: "a".into(),
                    text: "banana".into()
                }
            ),
            "a: no matching command\n"
        );
        assert_eq!(
            run(&mut session, ReplCommand::State("zz".into())),
            "no instance named zz\n"
        );
    }

    #[test]
    fn drop_unregisters() {
        let mut session = session();
        session.spawn("a").unwrap();
        session.spawn("b").unwrap();
        run(&mut session, ReplCommand::Drop("a".into()));
        assert_eq!(run(&mut session, ReplCommand::List), "  b\n");
    }

    #[test]
    fn evicted_instance_is_listed_and_can_respawn() {
        let mut session = session();
        session.spawn("a").unwrap();
        let later = std::time::Instant::now() + Duration::from_secs(60);
        session.registry.sweep_at(later);

        assert_eq!(
            run(&mut session, ReplCommand::List),
            "no live instances\n  a (evicted)\n"
        );
        assert!(session.spawn("a").unwrap());
        assert!(session.registry.contains("a"));
    }

    #[test]
    fn last_shows_latest_record() {
        let mut session = session();
        assert_eq!(run(&mut session, ReplCommand::Last), "no snapshots yet\n");
        session.spawn("a").unwrap();
        run(
            &mut session,
            ReplCommand::Issue {
                id: "a".into(),
                text: "remove the lfo".into(),
            },
        );
        assert!(session.registry.snapshots().flush(Duration::from_secs(2)));
        let out = run(&mut session, ReplCommand::Last);
        assert!(out.contains("a \"remove the lfo\" -> remove lfo"), "{}", out);
    }

    #[test]
    fn quit_ends_session() {
        let mut session = session();
        let mut out = Vec::new();
        assert!(!session.execute(ReplCommand::Quit, &mut out).unwrap());
    }
}
