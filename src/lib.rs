//! Concurrent reachability sweeps over IPv4 subnets.
//!
//! A [`Sweeper`] probes every usable host of a network with at most a fixed
//! number of probes in flight, each bounded by its own timeout, and returns a
//! [`SweepReport`] sorted by address. How a single host is probed is up to the
//! [`Prober`] it is given: [`IcmpProber`] (echo over a ping or raw socket),
//! [`CommandProber`] (the system `ping`) or [`TcpProber`] (TCP connect).
//!
//! ## Example
//! ```no_run
//! use async_sweep::{ProbeMethod, ProbeStatus, SweepConfigBuilder, Sweeper, LogReporter};
//! use tokio_util::sync::CancellationToken;
//!
//! tokio_test::block_on(async {
//!     let config = SweepConfigBuilder::new("10.0.0.0/30").build().unwrap();
//!     let sweeper = Sweeper::new(ProbeMethod::Tcp.prober(&[]).unwrap(), config);
//!     let report = sweeper
//!         .sweep(&LogReporter::new(true), CancellationToken::new())
//!         .await;
//!     for outcome in report.outcomes() {
//!         if outcome.status == ProbeStatus::Up {
//!             println!("{}", outcome.target);
//!         }
//!     }
//! })
//! ```

pub mod command;
pub mod error;
pub mod icmp;
pub mod method;
pub mod probe;
pub mod report;
pub mod sweep;
pub mod target;
pub mod tcp;

pub(crate) mod constants;

pub use command::CommandProber;
pub use error::{Error, Result};
pub use icmp::IcmpProber;
pub use method::ProbeMethod;
pub use probe::{probe_with_deadline, ProbeOutcome, ProbeStatus, Prober, Reachability};
pub use report::{LogReporter, Reporter, Summary, SweepReport};
pub use sweep::{SweepConfig, SweepConfigBuilder, Sweeper};
pub use tcp::TcpProber;
