use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::player::PlayerOptions;
use crate::probe::ProbeOptions;
use crate::watcher::WatcherTuning;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Address of the JSON clip manifest.
    pub manifest_url: String,
    /// Where user-tunable settings persist between sessions.
    pub settings_path: PathBuf,
    /// Initial viewport, used until the first resize signal arrives.
    pub screen_width: u32,
    pub screen_height: u32,
    /// Bounded wait for one clip's metadata probe.
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    /// How much of the media head the prober fetches.
    pub probe_head_bytes: u64,
    /// Maximum concurrent metadata probes at startup.
    pub probe_concurrency: usize,
    /// Bounded wait for decodable progress after a load.
    #[serde(with = "humantime_serde")]
    pub first_progress_timeout: Duration,
    /// Optional pause between loading a clip and starting the transition.
    #[serde(with = "humantime_serde")]
    pub inter_clip_delay: Duration,
    /// Remaining time that arms the end-of-clip sequence.
    #[serde(with = "humantime_serde")]
    pub near_end_lead: Duration,
    /// Deceleration ramp cadence.
    #[serde(with = "humantime_serde")]
    pub decel_tick: Duration,
    /// Rate decrement per ramp tick.
    pub decel_step: f64,
    /// Rate clamp applied when the exit sequence arms.
    pub slow_rate_ceiling: f64,
    /// Ramp floor.
    pub min_rate: f64,
    /// Remaining time treated as end-of-clip.
    #[serde(with = "humantime_serde")]
    pub end_epsilon: Duration,
    /// Width/height ratio slack classified as square.
    pub square_tolerance: f64,
    /// Debounce for screen-resize signals before re-evaluating orientation.
    #[serde(with = "humantime_serde")]
    pub resize_settle: Duration,
    /// Assumed clip length for the simulated soak backend.
    #[serde(with = "humantime_serde")]
    pub sim_clip_length: Duration,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Validate runtime invariants that cannot be expressed via serde
    /// defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(!self.manifest_url.is_empty(), "manifest-url must be set");
        ensure!(
            self.probe_timeout > Duration::ZERO,
            "probe-timeout must be positive"
        );
        ensure!(self.probe_head_bytes > 0, "probe-head-bytes must be positive");
        ensure!(self.probe_concurrency > 0, "probe-concurrency must be positive");
        ensure!(
            self.first_progress_timeout > Duration::ZERO,
            "first-progress-timeout must be positive"
        );
        ensure!(
            self.near_end_lead > Duration::ZERO,
            "near-end-lead must be positive"
        );
        ensure!(self.decel_tick > Duration::ZERO, "decel-tick must be positive");
        ensure!(self.decel_step > 0.0, "decel-step must be positive");
        ensure!(
            self.min_rate > 0.0 && self.min_rate <= self.slow_rate_ceiling,
            "min-rate must be positive and no greater than slow-rate-ceiling"
        );
        ensure!(
            self.slow_rate_ceiling <= 1.0,
            "slow-rate-ceiling must not exceed normal speed"
        );
        ensure!(
            self.end_epsilon > Duration::ZERO,
            "end-epsilon must be positive"
        );
        ensure!(
            self.square_tolerance > 0.0 && self.square_tolerance < 1.0,
            "square-tolerance must be within (0, 1)"
        );
        ensure!(
            self.sim_clip_length > Duration::ZERO,
            "sim-clip-length must be positive"
        );
        Ok(self)
    }

    pub fn watcher_tuning(&self) -> WatcherTuning {
        WatcherTuning {
            near_end_lead: self.near_end_lead,
            decel_tick: self.decel_tick,
            decel_step: self.decel_step,
            slow_rate_ceiling: self.slow_rate_ceiling,
            min_rate: self.min_rate,
            end_epsilon: self.end_epsilon,
        }
    }

    pub fn player_options(&self) -> PlayerOptions {
        PlayerOptions {
            first_progress_timeout: self.first_progress_timeout,
            inter_clip_delay: self.inter_clip_delay,
        }
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            timeout: self.probe_timeout,
            head_bytes: self.probe_head_bytes,
            square_tolerance: self.square_tolerance,
        }
    }

    const fn default_probe_head_bytes() -> u64 {
        256 * 1024
    }

    const fn default_probe_concurrency() -> usize {
        4
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            manifest_url: String::new(),
            settings_path: PathBuf::from("settings.json"),
            screen_width: 1920,
            screen_height: 1080,
            probe_timeout: Duration::from_secs(8),
            probe_head_bytes: Self::default_probe_head_bytes(),
            probe_concurrency: Self::default_probe_concurrency(),
            first_progress_timeout: Duration::from_secs(5),
            inter_clip_delay: Duration::ZERO,
            near_end_lead: Duration::from_millis(1500),
            decel_tick: Duration::from_millis(120),
            decel_step: 0.05,
            slow_rate_ceiling: 0.7,
            min_rate: 0.5,
            end_epsilon: Duration::from_millis(50),
            square_tolerance: 0.08,
            resize_settle: Duration::from_millis(250),
            sim_clip_length: Duration::from_secs(12),
        }
    }
}
