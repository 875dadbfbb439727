mod logging;
mod repl;
mod session;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Receiver;

use threadspace_core::snapshot::{JsonFileSink, MemorySink, NullSink, SinkSet, SnapshotSink};
use threadspace_core::{ActionResolver, Config, NotificationHub, SnapshotWriter, SyncEvent};
use threadspace_sync::SyncRegistry;

use session::{format_state, Session};

fn snapshot_sink(config: &Config) -> Arc<dyn SnapshotSink> {
    if !config.snapshot_enabled() {
        return Arc::new(NullSink);
    }
    let mut sinks = SinkSet::new().with(Arc::new(MemorySink::new(config.snapshot_history())));
    match config.snapshot_path() {
        Some(path) => {
            log::info!("writing snapshots to {}", path.display());
            sinks = sinks.with(Arc::new(JsonFileSink::new(path)));
        }
        None => log::warn!(target: "snapshot", "no data directory, snapshots kept in memory only"),
    }
    Arc::new(sinks)
}

fn print_events(events: Receiver<SyncEvent>) {
    for event in events {
        match event {
            SyncEvent::InstancesChanged(ids) => {
                let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
                println!("[sync] live: {}", ids.join(", "));
            }
            SyncEvent::StateUpdated { instance, state } => {
                println!("[sync] {} -> {}", instance, format_state(&state));
            }
        }
    }
}

fn main() -> io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    if let Err(e) = logging::init(verbose) {
        eprintln!("threadspace: logging disabled: {}", e);
    }

    // Comma-separated instance ids to attach at startup
    let startup_instances: Vec<String> = args
        .iter()
        .position(|a| a == "--instances")
        .and_then(|i| args.get(i + 1))
        .map(|s| {
            s.split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("threadspace: {}", e);
            std::process::exit(1);
        }
    };
    let sync_config = match config.sync() {
        Ok(sync) => sync,
        Err(e) => {
            eprintln!("threadspace: invalid [sync] config: {}", e);
            std::process::exit(1);
        }
    };

    let writer = SnapshotWriter::spawn(snapshot_sink(&config))?;
    let registry = match SyncRegistry::start(sync_config, NotificationHub::new(), writer) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("threadspace: {}", e);
            std::process::exit(1);
        }
    };

    let events = registry.subscribe();
    thread::Builder::new()
        .name("event-printer".into())
        .spawn(move || print_events(events))?;

    let mut session = Session::new(
        registry.clone(),
        Arc::new(ActionResolver::standard()),
        config.initial_state(),
    );
    for id in &startup_instances {
        if let Err(e) = session.spawn(id) {
            eprintln!("threadspace: could not attach {}: {}", id, e);
        }
    }

    println!("threadspace: type /help for commands");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let command = match repl::parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if !session.execute(command, &mut stdout)? {
            break;
        }
        stdout.flush()?;
    }

    drop(session);
    registry.shutdown();
    registry.snapshots().flush(std::time::Duration::from_secs(1));
    log::info!("threadspace exiting");
    Ok(())
}
