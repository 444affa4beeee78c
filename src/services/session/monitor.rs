use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tracing::warn;

use crate::transcript::{read_entries, TranscriptEntry};

/// Soft session budgets. Limits left unset are never evaluated.
#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub time_limit_minutes: Option<f64>,
    pub message_limit: Option<usize>,
    pub token_limit: Option<usize>,
    pub flag_ratio: f64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            time_limit_minutes: None,
            message_limit: None,
            token_limit: None,
            flag_ratio: 0.2,
        }
    }
}

/// Result of one monitor evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorVerdict {
    pub final_lap: bool,
    pub end_flag: bool,
    pub message_count: usize,
    pub token_count: usize,
    pub elapsed_minutes: Option<f64>,
}

/// Replays a session transcript to reconstruct progress counters and raise
/// limit flags. The transcript is the single source of truth: counters are
/// recomputed from scratch on every call, which is cheap because per-session
/// logs are small and append-only. Only the `final_lap` alert is stateful:
/// it fires at most once per monitor instance.
#[derive(Debug)]
pub struct SessionMonitor {
    log_path: PathBuf,
    limits: SessionLimits,
    final_lap: bool,
    end_flag: bool,
}

#[derive(Debug, Default)]
struct ReplayCounters {
    message_count: usize,
    token_count: usize,
    start_time: Option<DateTime<Utc>>,
}

impl SessionMonitor {
    pub fn new(log_path: impl Into<PathBuf>, limits: SessionLimits) -> Self {
        Self {
            log_path: log_path.into(),
            limits,
            final_lap: false,
            end_flag: false,
        }
    }

    /// Re-evaluate against the current log contents. Safe to call repeatedly.
    pub fn evaluate(&mut self) -> io::Result<MonitorVerdict> {
        self.evaluate_at(Utc::now())
    }

    pub fn evaluate_at(&mut self, now: DateTime<Utc>) -> io::Result<MonitorVerdict> {
        let counters = self.replay()?;
        let elapsed_minutes = counters
            .start_time
            .map(|start| (now - start).num_milliseconds() as f64 / 60_000.0);

        self.update_alerts(&counters, elapsed_minutes);

        Ok(MonitorVerdict {
            final_lap: self.final_lap,
            end_flag: self.end_flag,
            message_count: counters.message_count,
            token_count: counters.token_count,
            elapsed_minutes,
        })
    }

    fn replay(&self) -> io::Result<ReplayCounters> {
        let mut counters = ReplayCounters::default();

        for entry in read_entries(&self.log_path)? {
            if counters.start_time.is_none() {
                counters.start_time = Some(entry.timestamp());
            }
            match entry {
                TranscriptEntry::Human { .. } => counters.message_count += 1,
                TranscriptEntry::Ai { details, .. } => {
                    counters.token_count += details.input_tokens + details.output_tokens;
                }
                _ => {}
            }
        }

        Ok(counters)
    }

    fn update_alerts(&mut self, counters: &ReplayCounters, elapsed_minutes: Option<f64>) {
        if let Some(limit) = self.limits.message_limit {
            self.check_count_limit("message", limit, counters.message_count);
        }
        if let Some(limit) = self.limits.token_limit {
            self.check_count_limit("token", limit, counters.token_count);
        }
        if let (Some(limit), Some(elapsed)) = (self.limits.time_limit_minutes, elapsed_minutes) {
            if (limit - elapsed) <= self.limits.flag_ratio * limit && !self.final_lap {
                warn!(
                    "Final lap: approaching time limit of {} minutes, elapsed {:.2}",
                    limit, elapsed
                );
                self.final_lap = true;
            }
            if elapsed >= limit {
                warn!("Time limit of {} minutes reached, ending session", limit);
                self.end_flag = true;
            }
        }
    }

    fn check_count_limit(&mut self, kind: &str, limit: usize, current: usize) {
        if (limit as f64 - current as f64) <= self.limits.flag_ratio * limit as f64
            && !self.final_lap
        {
            warn!(
                "Final lap: approaching {} limit of {}, current count {}",
                kind, limit, current
            );
            self.final_lap = true;
        }
        if current >= limit {
            warn!("{} limit of {} reached, ending session", kind, limit);
            self.end_flag = true;
        }
    }
}
