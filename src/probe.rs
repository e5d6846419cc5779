use std::{
    fmt,
    net::Ipv4Addr,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use log::debug;

use crate::error::Result;

/// What a single reachability check observed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Reachability {
    Reachable,
    Unreachable,
}

/// A mechanism able to check whether one address answers.
///
/// Implementations should try to honour `timeout` themselves, but callers go
/// through [`probe_with_deadline`], which enforces it regardless.
/// `Err` is reserved for the mechanism failing (missing privilege, missing
/// binary); a silent host is `Ok(Reachability::Unreachable)`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Result<Reachability>;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ProbeStatus {
    Up,
    Down,
    Error,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProbeStatus::Up => "UP",
            ProbeStatus::Down => "DOWN",
            ProbeStatus::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Result of probing one target. Created once and never mutated.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ProbeOutcome {
    pub target: Ipv4Addr,
    pub status: ProbeStatus,
    pub latency: Option<Duration>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn up(target: Ipv4Addr, latency: Duration) -> Self {
        Self {
            target,
            status: ProbeStatus::Up,
            latency: Some(latency),
            error: None,
        }
    }

    pub fn down(target: Ipv4Addr) -> Self {
        Self {
            target,
            status: ProbeStatus::Down,
            latency: None,
            error: None,
        }
    }

    pub fn error(target: Ipv4Addr, detail: impl Into<String>) -> Self {
        Self {
            target,
            status: ProbeStatus::Error,
            latency: None,
            error: Some(detail.into()),
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is {}", self.target, self.status)?;
        if let Some(detail) = &self.error {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

/// Runs one probe and classifies it, never taking longer than `timeout`
/// plus scheduling overhead.
///
/// An overrun counts as `Down`, a prober error as `Error`.
pub async fn probe_with_deadline<P>(prober: &P, target: Ipv4Addr, timeout: Duration) -> ProbeOutcome
where
    P: Prober + ?Sized,
{
    let started = Instant::now();
    match tokio::time::timeout(timeout, prober.probe(target, timeout)).await {
        Ok(Ok(Reachability::Reachable)) => ProbeOutcome::up(target, started.elapsed()),
        Ok(Ok(Reachability::Unreachable)) => ProbeOutcome::down(target),
        Ok(Err(err)) => ProbeOutcome::error(target, err.to_string()),
        Err(_) => {
            debug!("probe of {} overran its {:?} deadline", target, timeout);
            ProbeOutcome::down(target)
        }
    }
}
