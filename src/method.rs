use std::sync::Arc;

use clap::ValueEnum;

use crate::{
    command::CommandProber, error::Result, icmp::IcmpProber, probe::Prober, tcp::TcpProber,
};

/// The reachability mechanism, chosen once at startup.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, ValueEnum)]
pub enum ProbeMethod {
    /// ICMP echo over a ping or raw socket
    #[default]
    Icmp,
    /// The system `ping` command
    Ping,
    /// TCP connect to a few common ports
    Tcp,
}

impl ProbeMethod {
    /// Builds the prober. `tcp_ports` only applies to [`ProbeMethod::Tcp`];
    /// empty means the default ports.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::Unavailable`] if the ICMP socket cannot
    /// be opened.
    pub fn prober(self, tcp_ports: &[u16]) -> Result<Arc<dyn Prober>> {
        Ok(match self {
            ProbeMethod::Icmp => Arc::new(IcmpProber::new()?),
            ProbeMethod::Ping => Arc::new(CommandProber::new()),
            ProbeMethod::Tcp if tcp_ports.is_empty() => Arc::new(TcpProber::new()),
            ProbeMethod::Tcp => Arc::new(TcpProber::new().with_ports(tcp_ports)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_cli_value() {
        assert_eq!(ProbeMethod::from_str("tcp", true), Ok(ProbeMethod::Tcp));
        assert_eq!(ProbeMethod::from_str("ping", true), Ok(ProbeMethod::Ping));
        assert!(ProbeMethod::from_str("arp", true).is_err());
        assert_eq!(ProbeMethod::default(), ProbeMethod::Icmp);
    }

    #[test]
    fn test_unprivileged_methods_build() {
        assert!(ProbeMethod::Ping.prober(&[]).is_ok());
        assert!(ProbeMethod::Tcp.prober(&[]).is_ok());
        assert!(ProbeMethod::Tcp.prober(&[8080]).is_ok());
    }
}
