use std::{io, net::Ipv4Addr, process::Stdio, time::Duration};

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::{
    error::{Error, Result},
    probe::{Prober, Reachability},
};

/// Delegates each probe to the system `ping` binary, sending a single echo.
///
/// The child is killed if the probe is dropped, so an overrunning `ping`
/// never outlives its deadline.
#[derive(Debug, Clone)]
pub struct CommandProber {
    program: String,
}

impl Default for CommandProber {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandProber {
    pub fn new() -> Self {
        Self {
            program: "ping".into(),
        }
    }

    /// Uses `program` instead of `ping` found on `PATH`.
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl Prober for CommandProber {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Result<Reachability> {
        let status = Command::new(&self.program)
            .args(ping_args(target, timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => Error::Unavailable(format!(
                    "'{}' command not found on this system",
                    self.program
                )),
                _ => Error::Io(err),
            })?;
        debug!("{} {} exited with {}", self.program, target, status);
        Ok(if status.success() {
            Reachability::Reachable
        } else {
            Reachability::Unreachable
        })
    }
}

#[cfg(windows)]
fn ping_args(target: Ipv4Addr, timeout: Duration) -> Vec<String> {
    let millis = timeout.as_millis().max(1);
    vec![
        "-n".into(),
        "1".into(),
        "-w".into(),
        millis.to_string(),
        target.to_string(),
    ]
}

/// Unix `ping -W` only takes whole seconds, so the timeout is rounded up.
#[cfg(not(windows))]
fn ping_args(target: Ipv4Addr, timeout: Duration) -> Vec<String> {
    let secs = timeout.as_millis().div_ceil(1000).max(1);
    vec![
        "-c".into(),
        "1".into(),
        "-W".into(),
        secs.to_string(),
        target.to_string(),
    ]
}
