use std::net::{IpAddr, SocketAddr};

/// Opaque (address, port) pair identifying a remote endpoint.
///
/// Pure value type; used as the map key for every piece of per-connection
/// state in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    addr: IpAddr,
    port: u16,
}

impl Identity {
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl From<SocketAddr> for Identity {
    fn from(addr: SocketAddr) -> Self {
        Self {
            addr: addr.ip(),
            port: addr.port(),
        }
    }
}

impl From<Identity> for SocketAddr {
    fn from(identity: Identity) -> Self {
        SocketAddr::new(identity.addr, identity.port)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}
