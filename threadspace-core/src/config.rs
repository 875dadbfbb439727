use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use threadspace_types::{EffectKind, InstanceState, ModulatorKind, DEFAULT_MODULATION_DEPTH};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("embedded config.toml is malformed: {0}")]
    Embedded(#[source] toml::de::Error),
    #[error("config override is malformed: {0}")]
    Override(#[source] toml::de::Error),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error(
        "staleness threshold ({threshold:?}) must exceed the heartbeat interval ({heartbeat:?})"
    )]
    ThresholdTooShort {
        threshold: Duration,
        heartbeat: Duration,
    },
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    sync: SyncSection,
    #[serde(default)]
    defaults: DefaultsSection,
    #[serde(default)]
    snapshot: SnapshotSection,
}

#[derive(Deserialize, Default)]
struct SyncSection {
    heartbeat_interval_ms: Option<u64>,
    sweep_interval_ms: Option<u64>,
    staleness_threshold_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct DefaultsSection {
    modulation_depth: Option<f32>,
    effects: Option<Vec<String>>,
    modulators: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct SnapshotSection {
    enabled: Option<bool>,
    file_name: Option<String>,
    history: Option<usize>,
}

/// Validated liveness timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    heartbeat_interval: Duration,
    sweep_interval: Duration,
    staleness_threshold: Duration,
}

impl SyncConfig {
    /// Validate timing constants. The threshold must be strictly longer than
    /// the heartbeat interval. Ratios under 2:1 are accepted with a warning.
    pub fn new(
        heartbeat_interval: Duration,
        sweep_interval: Duration,
        staleness_threshold: Duration,
    ) -> Result<Self, ConfigError> {
        if heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("heartbeat interval"));
        }
        if sweep_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("sweep interval"));
        }
        if staleness_threshold <= heartbeat_interval {
            return Err(ConfigError::ThresholdTooShort {
                threshold: staleness_threshold,
                heartbeat: heartbeat_interval,
            });
        }
        if staleness_threshold < heartbeat_interval * 2 {
            log::warn!(
                target: "config",
                "staleness threshold {:?} is less than twice the heartbeat interval {:?}",
                staleness_threshold,
                heartbeat_interval
            );
        }
        Ok(Self {
            heartbeat_interval,
            sweep_interval,
            staleness_threshold,
        })
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn staleness_threshold(&self) -> Duration {
        self.staleness_threshold
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(2),
            staleness_threshold: Duration::from_secs(5),
        }
    }
}

pub struct Config {
    sync: SyncSection,
    defaults: DefaultsSection,
    snapshot: SnapshotSection,
}

impl Config {
    /// Embedded defaults merged with `~/.config/threadspace/config.toml`.
    /// An unreadable or malformed user file is logged and ignored.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::embedded()?;

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => config.merge(user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Ok(config)
    }

    pub fn embedded() -> Result<Self, ConfigError> {
        let base: ConfigFile = toml::from_str(DEFAULT_CONFIG).map_err(ConfigError::Embedded)?;
        Ok(Self {
            sync: base.sync,
            defaults: base.defaults,
            snapshot: base.snapshot,
        })
    }

    /// Embedded defaults merged with an explicit TOML document.
    pub fn with_overrides(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Self::embedded()?;
        let user: ConfigFile = toml::from_str(contents).map_err(ConfigError::Override)?;
        config.merge(user);
        Ok(config)
    }

    fn merge(&mut self, user: ConfigFile) {
        merge_sync(&mut self.sync, user.sync);
        merge_defaults(&mut self.defaults, user.defaults);
        merge_snapshot(&mut self.snapshot, user.snapshot);
    }

    pub fn sync(&self) -> Result<SyncConfig, ConfigError> {
        let fallback = SyncConfig::default();
        let ms = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };
        SyncConfig::new(
            ms(self.sync.heartbeat_interval_ms, fallback.heartbeat_interval),
            ms(self.sync.sweep_interval_ms, fallback.sweep_interval),
            ms(self.sync.staleness_threshold_ms, fallback.staleness_threshold),
        )
    }

    /// State a newly attached instance starts from. Unknown effect or
    /// modulator names are skipped with a warning.
    pub fn initial_state(&self) -> InstanceState {
        let effects = self
            .defaults
            .effects
            .iter()
            .flatten()
            .filter_map(|name| {
                let kind = EffectKind::from_name(name);
                if kind.is_none() {
                    log::warn!(target: "config", "unknown effect '{}' in defaults", name);
                }
                kind
            })
            .collect::<Vec<_>>();
        let modulators = self
            .defaults
            .modulators
            .iter()
            .flatten()
            .filter_map(|name| {
                let kind = ModulatorKind::from_name(name);
                if kind.is_none() {
                    log::warn!(target: "config", "unknown modulator '{}' in defaults", name);
                }
                kind
            })
            .collect::<Vec<_>>();
        InstanceState::with_parts(
            self.defaults
                .modulation_depth
                .unwrap_or(DEFAULT_MODULATION_DEPTH),
            effects,
            modulators,
        )
    }

    pub fn snapshot_enabled(&self) -> bool {
        self.snapshot.enabled.unwrap_or(true)
    }

    /// Number of recent snapshots kept for display (clamped to 1..100).
    pub fn snapshot_history(&self) -> usize {
        self.snapshot.history.unwrap_or(5).clamp(1, 100)
    }

    /// `~/.local/share/threadspace/<file_name>` on Linux.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        let file_name = self
            .snapshot
            .file_name
            .as_deref()
            .unwrap_or("ThreadSpaceMemoryLog.json");
        dirs::data_dir().map(|d| d.join("threadspace").join(file_name))
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("threadspace").join("config.toml"))
}

fn merge_sync(base: &mut SyncSection, user: SyncSection) {
    if user.heartbeat_interval_ms.is_some() {
        base.heartbeat_interval_ms = user.heartbeat_interval_ms;
    }
    if user.sweep_interval_ms.is_some() {
        base.sweep_interval_ms = user.sweep_interval_ms;
    }
    if user.staleness_threshold_ms.is_some() {
        base.staleness_threshold_ms = user.staleness_threshold_ms;
    }
}

fn merge_defaults(base: &mut DefaultsSection, user: DefaultsSection) {
    if user.modulation_depth.is_some() {
        base.modulation_depth = user.modulation_depth;
    }
    if user.effects.is_some() {
        base.effects = user.effects;
    }
    if user.modulators.is_some() {
        base.modulators = user.modulators;
    }
}

fn merge_snapshot(base: &mut SnapshotSection, user: SnapshotSection) {
    if user.enabled.is_some() {
        base.enabled = user.enabled;
    }
    if user.file_name.is_some() {
        base.file_name = user.file_name;
    }
    if user.history.is_some() {
        base.history = user.history;
    }
}
