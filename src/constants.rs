pub(crate) const ICMP_ECHO_LEN: usize = 8;
pub(crate) const ICMP_PAYLOAD: &[u8] = b"async-sweep reachability probe!!";
pub(crate) const MAX_REPLY_LEN: usize = 1500;

pub(crate) const DEFAULT_TCP_PORTS: [u16; 3] = [80, 443, 22];
