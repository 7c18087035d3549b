//! Lifecycle policy
//!
//! Pure classification of one container observation into a state and the
//! action the cycle must take. Keeping this free of IO lets the whole
//! decision table live in unit tests.

use crate::models::RunStatus;
use crate::probe::KernelActivity;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Cutoffs the classification compares observation ages against
#[derive(Debug, Clone, Copy)]
pub struct PolicyThresholds {
    /// A running container whose kernels were all quiet for this long is idle
    pub idle_cutoff: Duration,
    /// A stopped container that exited longer ago than this is unused
    pub unused_cutoff: Duration,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            idle_cutoff: Duration::from_secs(30 * 60),
            unused_cutoff: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    RunningActive,
    RunningIdle,
    RunningEmpty,
    StoppedFresh,
    StoppedStale,
    StoppedUnused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Keep,
    /// Kill the container; also delete it when its image went stale
    Kill {
        remove: bool,
    },
    Remove,
}

/// One container as seen by a cycle, reduced to what the policy needs
#[derive(Debug, Clone)]
pub struct Observation {
    pub status: RunStatus,
    /// The container's image differs from the course's current one.
    /// Stays false when the expected image cannot be resolved.
    pub stale: bool,
    pub exited_at: Option<DateTime<Utc>>,
    /// Probe result for running containers, `None` when the probe failed
    pub activity: Option<KernelActivity>,
}

impl ContainerState {
    /// Whether figures count this container as running rather than frozen
    pub fn counts_running(self) -> bool {
        matches!(self, ContainerState::RunningActive)
    }

    pub fn action(self, stale: bool) -> ContainerAction {
        match self {
            ContainerState::RunningActive | ContainerState::StoppedFresh => {
                ContainerAction::Keep
            }
            ContainerState::RunningIdle | ContainerState::RunningEmpty => {
                ContainerAction::Kill { remove: stale }
            }
            ContainerState::StoppedStale | ContainerState::StoppedUnused => {
                ContainerAction::Remove
            }
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerState::RunningActive => "running-active",
            ContainerState::RunningIdle => "running-idle",
            ContainerState::RunningEmpty => "running-empty",
            ContainerState::StoppedFresh => "stopped-fresh",
            ContainerState::StoppedStale => "stopped-stale",
            ContainerState::StoppedUnused => "stopped-unused",
        };
        f.write_str(name)
    }
}

/// Classify one observation; `None` means the container cannot be judged
/// this cycle (running but unreachable) and must be left out of the counts
pub fn classify(
    observation: &Observation,
    now: DateTime<Utc>,
    thresholds: &PolicyThresholds,
) -> Option<ContainerState> {
    match observation.status {
        RunStatus::Stopped => Some(if observation.stale {
            ContainerState::StoppedStale
        } else if observation
            .exited_at
            .map(|exited| elapsed_at_least(now, exited, thresholds.unused_cutoff))
            .unwrap_or(false)
        {
            ContainerState::StoppedUnused
        } else {
            ContainerState::StoppedFresh
        }),
        RunStatus::Running => {
            let activity = observation.activity.as_ref()?;
            Some(if activity.kernels == 0 {
                ContainerState::RunningEmpty
            } else {
                match activity.last_activity {
                    Some(last) if elapsed_at_least(now, last, thresholds.idle_cutoff) => {
                        ContainerState::RunningIdle
                    }
                    _ => ContainerState::RunningActive,
                }
            })
        }
    }
}

fn elapsed_at_least(now: DateTime<Utc>, then: DateTime<Utc>, cutoff: Duration) -> bool {
    now.signed_duration_since(then)
        .to_std()
        .map(|elapsed| elapsed >= cutoff)
        .unwrap_or(false)
}
