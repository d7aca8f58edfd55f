//! Write-rate driven switching between the single-ring and sharded
//! transports.
//!
//! A watcher thread samples the shared [`Stats`](crate::Stats) once per
//! measurement window and feeds the deltas to a [`ScalePlanner`], a pure
//! state machine (no clocks, no threads) that owns the hysteresis: streaks of
//! consecutive windows beyond a threshold, plus a cooldown after every
//! transition. The planner's verdicts are applied by the logger core's
//! drain-swap-retire sequence.

use crate::{Architecture, Error, Result};
use std::time::Duration;

/// Tunables for the transport autoscaler. The defaults are starting points
/// for tuning, not recommendations.
#[derive(Debug, Clone)]
pub struct AutoscaleConfig {
    /// How often the watcher samples the counters.
    pub measurement_window: Duration,
    /// Writes per window at or above which the transport scales up.
    pub scale_up_threshold: u64,
    /// Writes per window below which the transport scales down.
    pub scale_down_threshold: u64,
    /// Consecutive qualifying windows required before a transition.
    pub stability_required: u32,
    /// Minimum time between transitions.
    pub cooldown: Duration,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            measurement_window: Duration::from_secs(1),
            scale_up_threshold: 50_000,
            scale_down_threshold: 5_000,
            stability_required: 3,
            cooldown: Duration::from_secs(5),
        }
    }
}

impl AutoscaleConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.measurement_window.is_zero() {
            return Err(Error::InvalidConfig(
                "autoscale measurement_window must be non-zero".into(),
            ));
        }
        if self.scale_up_threshold <= self.scale_down_threshold {
            return Err(Error::InvalidConfig(format!(
                "autoscale thresholds must satisfy up > down, got up={} down={}",
                self.scale_up_threshold, self.scale_down_threshold
            )));
        }
        if self.stability_required == 0 {
            return Err(Error::InvalidConfig(
                "autoscale stability_required must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Cooldown expressed in whole measurement windows, rounded up.
    fn cooldown_windows(&self) -> u32 {
        let window = self.measurement_window.as_nanos().max(1);
        self.cooldown.as_nanos().div_ceil(window).min(u128::from(u32::MAX)) as u32
    }
}

/// One window's observation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WindowSample {
    pub writes: u64,
    /// Claims that found a full slot; direct evidence the current shape is
    /// undersized, so it counts toward the scale-up streak.
    pub contention: u64,
}

/// Pure hysteresis state machine, evaluated once per window.
#[derive(Debug)]
pub(crate) struct ScalePlanner {
    config: AutoscaleConfig,
    up_streak: u32,
    down_streak: u32,
    cooldown_remaining: u32,
}

impl ScalePlanner {
    pub(crate) fn new(config: AutoscaleConfig) -> Self {
        Self {
            config,
            up_streak: 0,
            down_streak: 0,
            cooldown_remaining: 0,
        }
    }

    /// Feeds one window; returns the architecture to transition to, if any.
    pub(crate) fn observe(
        &mut self,
        current: Architecture,
        sample: WindowSample,
    ) -> Option<Architecture> {
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            self.up_streak = 0;
            self.down_streak = 0;
            return None;
        }

        let wants_up = sample.writes >= self.config.scale_up_threshold || sample.contention > 0;
        let wants_down = sample.writes < self.config.scale_down_threshold;

        match current {
            Architecture::SingleRing => {
                self.down_streak = 0;
                if wants_up {
                    self.up_streak += 1;
                    if self.up_streak >= self.config.stability_required {
                        self.transitioned();
                        return Some(Architecture::Sharded);
                    }
                } else {
                    self.up_streak = 0;
                }
            }
            Architecture::Sharded => {
                self.up_streak = 0;
                if wants_down {
                    self.down_streak += 1;
                    if self.down_streak >= self.config.stability_required {
                        self.transitioned();
                        return Some(Architecture::SingleRing);
                    }
                } else {
                    self.down_streak = 0;
                }
            }
        }
        None
    }

    fn transitioned(&mut self) {
        self.up_streak = 0;
        self.down_streak = 0;
        self.cooldown_remaining = self.config.cooldown_windows();
    }
}
