// Copyright 2023 Protocol Labs
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Dial-data policy and address classification.

use std::net::IpAddr;

use libp2p_core::{multiaddr::Protocol, Multiaddr};

/// Decides whether a dial must be paid for with dial data first.
///
/// `observed_addr` is the remote endpoint of the connection the request
/// arrived on; `dial_addr` is the address the server is about to dial.
pub trait DialDataPolicy: Send + Sync + 'static {
    fn dial_data_required(&self, observed_addr: &Multiaddr, dial_addr: &Multiaddr) -> bool;
}

impl<F> DialDataPolicy for F
where
    F: Fn(&Multiaddr, &Multiaddr) -> bool + Send + Sync + 'static,
{
    fn dial_data_required(&self, observed_addr: &Multiaddr, dial_addr: &Multiaddr) -> bool {
        self(observed_addr, dial_addr)
    }
}

/// The default policy: demand dial data whenever the IP about to be dialed
/// differs from the IP the request came from.
///
/// A client asking the server to dial its own IP has already spent at least
/// as much bandwidth on the inbound connection as the dial back costs the
/// server, so no further payment is needed. Any other target could be a
/// victim.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmplificationAttackPrevention;

impl DialDataPolicy for AmplificationAttackPrevention {
    fn dial_data_required(&self, observed_addr: &Multiaddr, dial_addr: &Multiaddr) -> bool {
        let Some(observed_ip) = addr_ip(observed_addr) else {
            // An inbound connection without an IP endpoint gives no baseline
            // to compare against.
            return true;
        };
        addr_ip(dial_addr) != Some(observed_ip)
    }
}

pub(crate) fn addr_ip(addr: &Multiaddr) -> Option<IpAddr> {
    addr.iter().find_map(|p| match p {
        Protocol::Ip4(ip) => Some(IpAddr::V4(ip)),
        Protocol::Ip6(ip) => Some(IpAddr::V6(ip)),
        _ => None,
    })
}

/// Whether `addr` points at the public internet: its first component must be
/// a globally-routable IP or a DNS name.
pub(crate) fn is_public(addr: &Multiaddr) -> bool {
    match addr.iter().next() {
        Some(Protocol::Ip4(ip)) => ipv4_global::is_global(ip),
        Some(Protocol::Ip6(ip)) => ipv6_global::is_global(ip),
        Some(
            Protocol::Dns(_) | Protocol::Dns4(_) | Protocol::Dns6(_) | Protocol::Dnsaddr(_),
        ) => true,
        _ => false,
    }
}

/// This module contains an implementation of the `is_global` IPv4 address
/// space, taken from the libp2p global-only transport.
///
/// Credit for this implementation goes to the Rust standard library team.
///
/// Unstable tracking issue: [#27709](https://github.com/rust-lang/rust/issues/27709)
mod ipv4_global {
    use std::net::Ipv4Addr;

    /// Shared address space for carrier-grade NAT, `100.64.0.0/10` (RFC 6598).
    const fn is_shared(a: Ipv4Addr) -> bool {
        a.octets()[0] == 100 && (a.octets()[1] & 0b1100_0000 == 0b0100_0000)
    }

    /// Benchmarking range `198.18.0.0/15` (RFC 2544, errata 423).
    const fn is_benchmarking(a: Ipv4Addr) -> bool {
        a.octets()[0] == 198 && (a.octets()[1] & 0xfe) == 18
    }

    /// Reserved for future use, `240.0.0.0/4` (RFC 1112), excluding the
    /// broadcast address.
    const fn is_reserved(a: Ipv4Addr) -> bool {
        a.octets()[0] & 240 == 240 && !a.is_broadcast()
    }

    pub(crate) const fn is_global(a: Ipv4Addr) -> bool {
        !(a.octets()[0] == 0 // "This network"
            || a.is_private()
            || is_shared(a)
            || a.is_loopback()
            || a.is_link_local()
            // addresses reserved for future protocols (`192.0.0.0/24`),
            // except the PCP/NAT anycast addresses `192.0.0.9` and `192.0.0.10`
            || (a.octets()[0] == 192
                && a.octets()[1] == 0
                && a.octets()[2] == 0
                && a.octets()[3] != 9
                && a.octets()[3] != 10)
            || a.is_documentation()
            || is_benchmarking(a)
            || is_reserved(a)
            || a.is_broadcast())
    }
}

/// This module contains an implementation of the `is_global` IPv6 address
/// space, taken from the libp2p global-only transport.
///
/// Credit for this implementation goes to the Rust standard library team.
///
/// Unstable tracking issue: [#27709](https://github.com/rust-lang/rust/issues/27709)
mod ipv6_global {
    use std::net::Ipv6Addr;

    /// Unicast addresses with link-local scope, `fe80::/10` (RFC 4291).
    const fn is_unicast_link_local(a: Ipv6Addr) -> bool {
        (a.segments()[0] & 0xffc0) == 0xfe80
    }

    /// Unique local addresses, `fc00::/7` (RFC 4193).
    const fn is_unique_local(a: Ipv6Addr) -> bool {
        (a.segments()[0] & 0xfe00) == 0xfc00
    }

    /// Documentation range `2001:db8::/32` (RFC 3849).
    const fn is_documentation(a: Ipv6Addr) -> bool {
        (a.segments()[0] == 0x2001) && (a.segments()[1] == 0xdb8)
    }

    pub(crate) const fn is_global(a: Ipv6Addr) -> bool {
        !(a.is_unspecified()
            || a.is_loopback()
            // IPv4-mapped Address (`::ffff:0:0/96`)
            || matches!(a.segments(), [0, 0, 0, 0, 0, 0xffff, _, _])
            // IPv4-IPv6 Translat. (`64:ff9b:1::/48`)
            || matches!(a.segments(), [0x64, 0xff9b, 1, _, _, _, _, _])
            // Discard-Only Address Block (`100::/64`)
            || matches!(a.segments(), [0x100, 0, 0, 0, _, _, _, _])
            // IETF Protocol Assignments (`2001::/23`)
            || (matches!(a.segments(), [0x2001, b, _, _, _, _, _, _] if b < 0x200)
                && !(
                    // Port Control Protocol Anycast (`2001:1::1`)
                    u128::from_be_bytes(a.octets()) == 0x2001_0001_0000_0000_0000_0000_0000_0001
                    // Traversal Using Relays around NAT Anycast (`2001:1::2`)
                    || u128::from_be_bytes(a.octets()) == 0x2001_0001_0000_0000_0000_0000_0000_0002
                    // AMT (`2001:3::/32`)
                    || matches!(a.segments(), [0x2001, 3, _, _, _, _, _, _])
                    // AS112-v6 (`2001:4:112::/48`)
                    || matches!(a.segments(), [0x2001, 4, 0x112, _, _, _, _, _])
                    // ORCHIDv2 (`2001:20::/28`)
                    || matches!(a.segments(), [0x2001, b, _, _, _, _, _, _] if b >= 0x20 && b <= 0x2F)
                ))
            || is_documentation(a)
            || is_unique_local(a)
            || is_unicast_link_local(a))
    }
}
