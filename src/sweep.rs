use std::{collections::HashSet, net::Ipv4Addr, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use ipnet::Ipv4Net;
use log::{debug, error, info, warn};
use tokio::{task::JoinSet, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    probe::{probe_with_deadline, ProbeOutcome, Prober},
    report::{Reporter, SweepReport},
    target,
};

/// Extra time granted to in-flight probes after an interrupt, on top of the
/// probe timeout, before they are abandoned.
pub const DRAIN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub network: Ipv4Net,
    pub timeout: Duration,
    pub concurrency: usize,
    pub quiet: bool,
}

impl SweepConfig {
    pub fn host_count(&self) -> u64 {
        target::host_count(&self.network)
    }
}

#[derive(Debug, Clone)]
pub struct SweepConfigBuilder {
    network: String,
    timeout: Duration,
    concurrency: usize,
    quiet: bool,
}

impl SweepConfigBuilder {
    pub fn new(network: &str) -> Self {
        Self {
            network: network.into(),
            timeout: Duration::from_secs(1),
            concurrency: 50,
            quiet: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the timeout from fractional seconds, as taken on the command line.
    ///
    /// # Errors
    /// Returns an error if `secs` is not a finite positive number.
    pub fn with_timeout_secs(self, secs: f64) -> Result<Self> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "timeout must be a positive number of seconds, got {}",
                secs
            )));
        }
        Duration::try_from_secs_f64(secs)
            .map(|timeout| self.with_timeout(timeout))
            .map_err(|err| Error::InvalidConfig(format!("timeout {}s: {}", secs, err)))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    /// Returns an error if the network does not parse, the timeout is zero or
    /// the concurrency is zero.
    pub fn build(self) -> Result<SweepConfig> {
        let network = target::parse_network(&self.network)?;
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be positive".into()));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".into()));
        }
        Ok(SweepConfig {
            network,
            timeout: self.timeout,
            concurrency: self.concurrency,
            quiet: self.quiet,
        })
    }
}

/// Drives a bounded pool of probes over a sequence of targets.
///
/// At most `concurrency` probes are in flight at any time; the next target is
/// only taken from the sequence once a slot frees up. Results arrive in
/// completion order and are sorted by address in the final [`SweepReport`].
///
/// # Example
/// ```no_run
/// use async_sweep::{IcmpProber, LogReporter, SweepConfigBuilder, Sweeper};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// tokio_test::block_on(async {
///     let config = SweepConfigBuilder::new("192.168.1.0/24").build().unwrap();
///     let sweeper = Sweeper::new(Arc::new(IcmpProber::new().unwrap()), config);
///     let report = sweeper
///         .sweep(&LogReporter::new(false), CancellationToken::new())
///         .await;
///     println!("{}", report.summary());
/// })
/// ```
pub struct Sweeper<P: ?Sized> {
    prober: Arc<P>,
    config: SweepConfig,
}

impl<P> Sweeper<P>
where
    P: Prober + ?Sized + 'static,
{
    pub fn new(prober: Arc<P>, config: SweepConfig) -> Self {
        Self { prober, config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Sweeps every usable host of the configured network.
    pub async fn sweep<R>(&self, reporter: &R, cancel: CancellationToken) -> SweepReport
    where
        R: Reporter + ?Sized,
    {
        info!(
            "Starting sweep of {} ({} hosts) with concurrency {}",
            self.config.network,
            self.config.host_count(),
            self.config.concurrency
        );
        self.run(target::hosts(&self.config.network), reporter, cancel)
            .await
    }

    /// Probes each target exactly once.
    ///
    /// A complete report holds one outcome per target. Once `cancel` fires no
    /// further targets are dispatched; in-flight probes get `timeout +
    /// DRAIN_GRACE` to finish and are abandoned after that, and the report is
    /// marked incomplete.
    pub async fn run<I, R>(
        &self,
        targets: I,
        reporter: &R,
        cancel: CancellationToken,
    ) -> SweepReport
    where
        I: IntoIterator<Item = Ipv4Addr>,
        R: Reporter + ?Sized,
    {
        let started = Instant::now();
        let mut targets = targets.into_iter().fuse().peekable();
        let mut in_flight = JoinSet::new();
        let mut seen = HashSet::new();
        let mut pending = HashSet::new();
        let mut outcomes = Vec::new();
        let mut drain_deadline: Option<Instant> = None;

        loop {
            while drain_deadline.is_none()
                && !cancel.is_cancelled()
                && in_flight.len() < self.config.concurrency
            {
                let Some(target) = targets.next() else {
                    break;
                };
                if !seen.insert(target) {
                    debug!("skipping duplicate target {}", target);
                    continue;
                }
                pending.insert(target);
                in_flight.spawn(self.guarded_probe(target));
            }
            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled(), if drain_deadline.is_none() => {
                    warn!(
                        "sweep interrupted, waiting for {} in-flight probes",
                        in_flight.len()
                    );
                    drain_deadline = Some(Instant::now() + self.config.timeout + DRAIN_GRACE);
                }
                _ = tokio::time::sleep_until(drain_deadline.unwrap_or_else(Instant::now)),
                    if drain_deadline.is_some() => {
                    warn!("abandoning {} in-flight probes", in_flight.len());
                    in_flight.abort_all();
                    break;
                }
                joined = in_flight.join_next() => match joined {
                    Some(Ok(outcome)) => {
                        pending.remove(&outcome.target);
                        reporter.outcome(&outcome);
                        outcomes.push(outcome);
                    }
                    Some(Err(err)) => error!("probe task failed: {}", err),
                    None => {}
                },
            }
        }

        if !cancel.is_cancelled() {
            // a task that died without reporting still owes its target a result
            for target in pending.drain() {
                let outcome = ProbeOutcome::error(target, "probe task terminated unexpectedly");
                reporter.outcome(&outcome);
                outcomes.push(outcome);
            }
        }
        let abandoned = pending.len();
        let complete = abandoned == 0 && targets.peek().is_none();
        SweepReport::new(outcomes, complete, abandoned, started.elapsed())
    }

    fn guarded_probe(
        &self,
        target: Ipv4Addr,
    ) -> impl std::future::Future<Output = ProbeOutcome> + Send + 'static {
        let prober = Arc::clone(&self.prober);
        let timeout = self.config.timeout;
        async move {
            AssertUnwindSafe(probe_with_deadline(&*prober, target, timeout))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".into());
                    ProbeOutcome::error(target, format!("probe panicked: {}", reason))
                })
        }
    }
}
