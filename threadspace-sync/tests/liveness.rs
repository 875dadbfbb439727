mod common;

use std::time::{Duration, Instant};

use threadspace_core::snapshot::NullSink;
use threadspace_core::{NotificationHub, SnapshotWriter, SyncEvent};
use threadspace_sync::SyncRegistry;

#[test]
fn test_silent_instance_is_evicted() {
    let (registry, _) = common::make_registry();
    let _rx = common::register_channel(&registry, "A");
    let threshold = registry.config().staleness_threshold();

    let start = Instant::now();
    assert!(registry.sweep_at(start + threshold / 2).is_empty());
    assert!(registry.contains("A"));

    let evicted = registry.sweep_at(start + threshold + Duration::from_millis(50));
    assert_eq!(evicted, common::ids(&["A"]));
    assert!(!registry.contains("A"));
}

#[test]
fn test_heartbeats_keep_instance_live() {
    let (registry, _) = common::make_registry_with(common::fast_config());
    let _rx = common::register_channel(&registry, "A");
    let threshold = registry.config().staleness_threshold();

    // Beat well inside the threshold for several threshold lengths.
    let until = Instant::now() + threshold * 4;
    while Instant::now() < until {
        assert!(registry.heartbeat("A"));
        registry.sweep();
        assert!(registry.contains("A"));
        std::thread::sleep(threshold / 15);
    }
}

#[test]
fn test_background_sweep_evicts_stalled_instance() {
    let (registry, _) = common::make_registry_with(common::fast_config());
    registry.start_sweeper().unwrap();

    let beating = common::attach("A", &registry);
    beating.start_heartbeat().unwrap();
    let stalled = common::attach("B", &registry);

    common::wait_for(Duration::from_secs(2), "B to be evicted", || {
        !stalled.is_live()
    });
    assert!(beating.is_live());
    assert_eq!(registry.live_ids(), common::ids(&["A"]));
    registry.shutdown();
}

#[test]
fn test_heartbeat_after_eviction_does_not_revive() {
    let (registry, _) = common::make_registry();
    let _rx = common::register_channel(&registry, "A");
    let later = Instant::now() + registry.config().staleness_threshold() * 2;
    registry.sweep_at(later);

    assert!(!registry.heartbeat("A"));
    assert!(!registry.contains("A"));
    assert!(registry.is_empty());
}

#[test]
fn test_reregistration_after_eviction_is_fresh() {
    let (registry, _) = common::make_registry();
    let _old = common::register_channel(&registry, "A");
    let threshold = registry.config().staleness_threshold();
    let later = Instant::now() + threshold * 2;
    assert_eq!(registry.sweep_at(later).len(), 1);

    let _new = common::register_channel(&registry, "A");
    assert!(registry.contains("A"));
    let registered_at = registry.last_heartbeat("A").unwrap();
    // A sweep one threshold after the new registration leaves it alone.
    assert!(registry.sweep_at(registered_at + threshold).is_empty());
    assert!(registry.contains("A"));
}

#[test]
fn test_dropping_evicted_instance_keeps_successor() {
    let (registry, _) = common::make_registry();
    let old = common::attach("A", &registry);
    let later = Instant::now() + registry.config().staleness_threshold() * 2;
    registry.sweep_at(later);

    let new = common::attach("A", &registry);
    let registered_at = registry.last_heartbeat("A").unwrap();
    std::thread::sleep(Duration::from_millis(5));

    // The stale instance's heartbeat neither refreshes nor revives the entry.
    assert!(!old.heartbeat());
    assert_eq!(registry.last_heartbeat("A"), Some(registered_at));

    drop(old);
    assert!(new.is_live());
    assert_eq!(registry.live_ids(), common::ids(&["A"]));

    drop(new);
    assert!(registry.is_empty());
}

#[test]
fn test_stale_heartbeat_task_ends_after_eviction() {
    let (registry, _) = common::make_registry_with(common::fast_config());
    let old = common::attach("A", &registry);
    old.start_heartbeat().unwrap();
    let later = Instant::now() + registry.config().staleness_threshold() * 2;
    registry.sweep_at(later);

    let new = common::attach("A", &registry);
    let registered_at = registry.last_heartbeat("A").unwrap();
    std::thread::sleep(registry.config().heartbeat_interval() * 5);
    assert_eq!(registry.last_heartbeat("A"), Some(registered_at));
    assert!(new.is_live());
}

#[test]
fn test_one_notification_per_sweep_batch() {
    let (registry, _) = common::make_registry();
    let _a = common::register_channel(&registry, "A");
    let _b = common::register_channel(&registry, "B");
    let later = Instant::now() + registry.config().staleness_threshold() * 2;
    let _c = common::register_channel(&registry, "C");
    registry.heartbeat("C");

    let events = registry.subscribe();
    // C was registered last but the clock jump covers everyone.
    let evicted = registry.sweep_at(later);
    assert_eq!(evicted.len(), 3);

    let received: Vec<SyncEvent> = events.try_iter().collect();
    assert_eq!(received, vec![SyncEvent::InstancesChanged(vec![])]);
}

#[test]
fn test_membership_notifications_carry_sorted_ids() {
    let writer = SnapshotWriter::spawn(std::sync::Arc::new(NullSink)).unwrap();
    let registry = SyncRegistry::new(Default::default(), NotificationHub::new(), writer);
    let events = registry.subscribe();

    let _c = common::register_channel(&registry, "C");
    let _a = common::register_channel(&registry, "A");
    let _b = common::register_channel(&registry, "B");
    registry.unregister("A");

    let received: Vec<SyncEvent> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            SyncEvent::InstancesChanged(common::ids(&["C"])),
            SyncEvent::InstancesChanged(common::ids(&["A", "C"])),
            SyncEvent::InstancesChanged(common::ids(&["A", "B", "C"])),
            SyncEvent::InstancesChanged(common::ids(&["B", "C"])),
        ]
    );
}
