use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4},
    time::Duration,
};

use async_trait::async_trait;
use futures::{stream::FuturesUnordered, StreamExt};
use log::debug;
use tokio::net::TcpStream;

use crate::{
    constants::DEFAULT_TCP_PORTS,
    error::{Error, Result},
    probe::{Prober, Reachability},
};

/// Treats a host as reachable if any of a few TCP ports answers, either by
/// accepting the connection or by refusing it.
///
/// Needs no privileges, at the cost of missing hosts that drop traffic to
/// every listed port.
#[derive(Debug, Clone)]
pub struct TcpProber {
    ports: Vec<u16>,
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpProber {
    pub fn new() -> Self {
        Self {
            ports: DEFAULT_TCP_PORTS.to_vec(),
        }
    }

    /// # Errors
    /// Returns an error if `ports` is empty.
    pub fn with_ports(mut self, ports: &[u16]) -> Result<Self> {
        if ports.is_empty() {
            return Err(Error::InvalidConfig("at least one TCP port is required".into()));
        }
        self.ports = ports.to_vec();
        Ok(self)
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Result<Reachability> {
        let mut attempts: FuturesUnordered<_> = self
            .ports
            .iter()
            .map(|&port| async move {
                let addr = SocketAddrV4::new(target, port);
                match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
                    Ok(connected) => answered(port, connected),
                    Err(_) => Err(None),
                }
            })
            .collect();
        let mut failures = Vec::with_capacity(self.ports.len());
        while let Some(attempt) = attempts.next().await {
            match attempt {
                Ok(port) => {
                    debug!("{} answered on port {}", target, port);
                    return Ok(Reachability::Reachable);
                }
                Err(failure) => failures.push(failure),
            }
        }
        settle(failures)
    }
}

/// Folds the failures of every port. A local failure on any port is an
/// error regardless of the order the attempts finished in.
fn settle(failures: Vec<Option<io::Error>>) -> Result<Reachability> {
    match failures.into_iter().flatten().next() {
        Some(err) => Err(Error::Io(err)),
        None => Ok(Reachability::Unreachable),
    }
}

/// `Ok(port)` if the host responded, `Err(None)` if it stayed silent or is
/// unreachable, `Err(Some(_))` for local failures.
fn answered(
    port: u16,
    connected: io::Result<TcpStream>,
) -> std::result::Result<u16, Option<io::Error>> {
    match connected {
        Ok(_) => Ok(port),
        Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => Ok(port),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => Err(Some(err)),
        Err(_) => Err(None),
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_empty_ports_rejected() {
        assert!(TcpProber::new().with_ports(&[]).is_err());
        assert_eq!(TcpProber::new().ports(), &[80, 443, 22]);
    }

    #[test]
    fn test_answer_classification() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(answered(22, Err(refused)).ok(), Some(22));
        let unreachable = io::Error::new(io::ErrorKind::Other, "no route to host");
        assert!(matches!(answered(22, Err(unreachable)), Err(None)));
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(answered(22, Err(denied)), Err(Some(_))));
    }

    #[test]
    fn test_local_failure_wins_over_silence_in_any_order() {
        let denied = || Some(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(settle(vec![denied(), None]), Err(Error::Io(_))));
        assert!(matches!(settle(vec![None, denied()]), Err(Error::Io(_))));
        assert!(matches!(
            settle(vec![None, None]),
            Ok(Reachability::Unreachable)
        ));
    }

    #[tokio::test]
    async fn test_listening_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let prober = TcpProber::new().with_ports(&[port]).unwrap();
        assert_eq!(
            prober
                .probe(Ipv4Addr::LOCALHOST, Duration::from_secs(1))
                .await
                .unwrap(),
            Reachability::Reachable
        );
    }

    #[tokio::test]
    async fn test_refused_port_is_reachable() {
        // bind then drop to find a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let prober = TcpProber::new().with_ports(&[port]).unwrap();
        assert_eq!(
            prober
                .probe(Ipv4Addr::LOCALHOST, Duration::from_secs(1))
                .await
                .unwrap(),
            Reachability::Reachable
        );
    }
}
