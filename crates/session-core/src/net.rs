//! Local address to advertise in `prepare` responses

use std::net::{IpAddr, Ipv4Addr};

use crate::errors::{Result, SessionError};

/// Address of `interface`, or of the first external IPv4 interface
///
/// A named interface yields its first IPv4 address, then its first IPv6
/// address. Without a name the first non-loopback IPv4 address wins, and
/// the IPv4 loopback is the fallback.
pub fn resolve_local_address(interface: Option<&str>) -> Result<IpAddr> {
    let addrs = interface_addresses()?;
    select_address(&addrs, interface)
}

fn select_address(addrs: &[(String, IpAddr)], interface: Option<&str>) -> Result<IpAddr> {
    match interface.filter(|name| !name.is_empty()) {
        Some(name) => {
            let own: Vec<IpAddr> = addrs
                .iter()
                .filter(|(iface, _)| iface == name)
                .map(|(_, ip)| *ip)
                .collect();
            own.iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| own.iter().find(|ip| ip.is_ipv6()))
                .copied()
                .ok_or_else(|| {
                    SessionError::address(format!("interface '{}' has no address", name))
                })
        }
        None => Ok(addrs
            .iter()
            .map(|(_, ip)| *ip)
            .find(|ip| ip.is_ipv4() && !ip.is_loopback())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))),
    }
}

#[cfg(unix)]
fn interface_addresses() -> Result<Vec<(String, IpAddr)>> {
    use nix::ifaddrs::getifaddrs;
    use std::net::{SocketAddrV4, SocketAddrV6};

    let ifaddrs = getifaddrs().map_err(|e| SessionError::address(format!("getifaddrs: {}", e)))?;
    let mut out = Vec::new();
    for ifaddr in ifaddrs {
        let Some(address) = ifaddr.address else {
            continue;
        };
        if let Some(sin) = address.as_sockaddr_in() {
            out.push((ifaddr.interface_name, IpAddr::V4(*SocketAddrV4::from(*sin).ip())));
        } else if let Some(sin6) = address.as_sockaddr_in6() {
            out.push((ifaddr.interface_name, IpAddr::V6(*SocketAddrV6::from(*sin6).ip())));
        }
    }
    Ok(out)
}

#[cfg(not(unix))]
fn interface_addresses() -> Result<Vec<(String, IpAddr)>> {
    Ok(Vec::new())
}
