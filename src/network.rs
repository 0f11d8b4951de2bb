//! Addressing of the setup access point.

use core::net::Ipv4Addr;

/// Subnet the access point serves. The access point is both the HTTP host
/// and the router handed to DHCP clients.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PortalNetwork {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

pub const PORTAL_NETWORK: PortalNetwork = PortalNetwork::new(Ipv4Addr::new(192, 168, 4, 1), 24);

impl PortalNetwork {
    pub const fn new(address: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            address,
            prefix_len,
        }
    }

    pub const fn netmask(&self) -> Ipv4Addr {
        let bits = match self.prefix_len {
            0 => 0,
            len if len >= 32 => u32::MAX,
            len => u32::MAX << (32 - len),
        };
        Ipv4Addr::from_bits(bits)
    }

    pub const fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = self.netmask().to_bits();
        ip.to_bits() & mask == self.address.to_bits() & mask
    }

    /// Usable host address: not the network or broadcast address.
    pub const fn is_host(&self, ip: Ipv4Addr) -> bool {
        let host_bits = !self.netmask().to_bits();
        let host = ip.to_bits() & host_bits;
        self.contains(ip) && host != 0 && host != host_bits
    }

    pub const fn router(&self) -> Ipv4Addr {
        self.address
    }

    /// Gateway list carried in DHCP offers.
    pub const fn dhcp_gateways(&self) -> [Ipv4Addr; 1] {
        [self.router()]
    }
}
