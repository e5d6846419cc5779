use std::{fmt, time::Duration};

use log::{error, info};

use crate::probe::{ProbeOutcome, ProbeStatus};

pub const EXIT_SUCCESS: u8 = 0;
/// The sweep could not run: bad configuration or no working probe mechanism.
pub const EXIT_FAILURE: u8 = 1;
/// The sweep finished but some hosts could not be probed.
pub const EXIT_PROBE_ERRORS: u8 = 2;
pub const EXIT_INTERRUPTED: u8 = 130;

/// Receives outcomes as they complete, in completion order.
///
/// This is a side channel for progress output only; the authoritative,
/// address-ordered view is the [`SweepReport`] returned at the end.
pub trait Reporter: Send + Sync {
    fn outcome(&self, outcome: &ProbeOutcome);
}

/// Writes one log line per host through the `log` facade.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogReporter {
    quiet: bool,
}

impl LogReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Reporter for LogReporter {
    fn outcome(&self, outcome: &ProbeOutcome) {
        // errors are reported even when quiet
        match outcome.status {
            ProbeStatus::Error => error!("{}", outcome),
            _ if self.quiet => {}
            _ => info!("{}", outcome),
        }
    }
}

/// The outcome of one sweep, sorted by ascending address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepReport {
    outcomes: Vec<ProbeOutcome>,
    complete: bool,
    abandoned: usize,
    elapsed: Duration,
}

impl SweepReport {
    pub(crate) fn new(
        mut outcomes: Vec<ProbeOutcome>,
        complete: bool,
        abandoned: usize,
        elapsed: Duration,
    ) -> Self {
        outcomes.sort_unstable_by_key(|outcome| outcome.target);
        Self {
            outcomes,
            complete,
            abandoned,
            elapsed,
        }
    }

    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<ProbeOutcome> {
        self.outcomes
    }

    /// `false` when the sweep was interrupted before every target was probed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// In-flight probes dropped without a result after an interrupt.
    pub fn abandoned(&self) -> usize {
        self.abandoned
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Process exit status for this sweep.
    ///
    /// DOWN hosts are a normal finding and leave the status at
    /// [`EXIT_SUCCESS`]. Interruption takes precedence over everything else.
    pub fn exit_code(&self) -> u8 {
        let summary = self.summary();
        if !self.complete {
            EXIT_INTERRUPTED
        } else if summary.all_errored() {
            EXIT_FAILURE
        } else if summary.error > 0 {
            EXIT_PROBE_ERRORS
        } else {
            EXIT_SUCCESS
        }
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.outcomes.len(),
            complete: self.complete,
            elapsed: self.elapsed,
            ..Default::default()
        };
        for outcome in &self.outcomes {
            match outcome.status {
                ProbeStatus::Up => summary.up += 1,
                ProbeStatus::Down => summary.down += 1,
                ProbeStatus::Error => summary.error += 1,
            }
        }
        summary
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub up: usize,
    pub down: usize,
    pub error: usize,
    pub total: usize,
    pub complete: bool,
    pub elapsed: Duration,
}

impl Summary {
    /// Every probe of a non-empty sweep failed to run.
    pub fn all_errored(&self) -> bool {
        self.total > 0 && self.error == self.total
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scan finished: {}/{} hosts up, {} down, {} error ({:.1}s)",
            self.up,
            self.total,
            self.down,
            self.error,
            self.elapsed.as_secs_f64()
        )?;
        if !self.complete {
            f.write_str(" [incomplete: interrupted]")?;
        }
        Ok(())
    }
}
