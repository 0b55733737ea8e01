//! CIDR parsing and host enumeration.

use ipnet::{IpNet, Ipv4Net};
use netsweep_core::SweepError;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 block. Host bits in the input are truncated, so `10.0.0.7/30`
/// and `10.0.0.4/30` are the same range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    net: Ipv4Net,
}

impl AddressRange {
    /// Parse `a.b.c.d/len`. A bare address is taken as `/32`.
    pub fn parse(input: &str) -> Result<Self, SweepError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(SweepError::InvalidRange("empty range".into()));
        }
        let net = if s.contains('/') {
            match s.parse::<IpNet>() {
                Ok(IpNet::V4(n)) => n,
                Ok(IpNet::V6(_)) => return Err(SweepError::InvalidRange(format!("{}: IPv6 ranges are not supported", s))),
                Err(e) => return Err(SweepError::InvalidRange(format!("{}: {}", s, e))),
            }
        } else {
            let ip: Ipv4Addr = s.parse().map_err(|e| SweepError::InvalidRange(format!("{}: {}", s, e)))?;
            Ipv4Net::from(ip)
        };
        Ok(AddressRange { net: net.trunc() })
    }

    /// Usable hosts in ascending order. Network and broadcast addresses are
    /// skipped unless the prefix is /31 or /32.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        self.net.hosts()
    }

    pub fn host_count(&self) -> usize {
        let size = 1u64 << (32 - u32::from(self.net.prefix_len()));
        let usable = if self.net.prefix_len() >= 31 { size } else { size - 2 };
        usize::try_from(usable).unwrap_or(usize::MAX)
    }
}

impl FromStr for AddressRange {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AddressRange::parse(s)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(cidr: &str) -> Vec<Ipv4Addr> {
        AddressRange::parse(cidr).unwrap().hosts().collect()
    }

    #[test]
    fn slash_30_has_two_usable_hosts() {
        assert_eq!(hosts("192.168.1.0/30"), vec![Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)]);
    }

    #[test]
    fn slash_24_excludes_network_and_broadcast() {
        let h = hosts("10.0.0.0/24");
        assert_eq!(h.len(), 254);
        assert_eq!(h.first(), Some(&Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(h.last(), Some(&Ipv4Addr::new(10, 0, 0, 254)));
        assert!(!h.contains(&Ipv4Addr::new(10, 0, 0, 0)));
        assert!(!h.contains(&Ipv4Addr::new(10, 0, 0, 255)));
        assert!(h.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(AddressRange::parse("10.0.0.0/24").unwrap().host_count(), 254);
    }

    #[test]
    fn point_to_point_and_single_host() {
        assert_eq!(hosts("10.1.1.0/31"), vec![Ipv4Addr::new(10, 1, 1, 0), Ipv4Addr::new(10, 1, 1, 1)]);
        assert_eq!(hosts("10.1.1.9/32"), vec![Ipv4Addr::new(10, 1, 1, 9)]);
        assert_eq!(AddressRange::parse("10.1.1.0/31").unwrap().host_count(), 2);
        assert_eq!(AddressRange::parse("10.1.1.9/32").unwrap().host_count(), 1);
    }

    #[test]
    fn host_bits_are_truncated() {
        let r = AddressRange::parse("192.168.1.7/30").unwrap();
        assert_eq!(r.to_string(), "192.168.1.4/30");
        assert_eq!(r, "192.168.1.4/30".parse().unwrap());
    }

    #[test]
    fn bare_address_is_single_host() {
        let r = AddressRange::parse(" 172.16.0.3 ").unwrap();
        assert_eq!(r.to_string(), "172.16.0.3/32");
        assert_eq!(r.hosts().count(), 1);
    }

    #[test]
    fn large_prefix_counts_do_not_overflow() {
        assert_eq!(AddressRange::parse("0.0.0.0/0").unwrap().host_count(), (1usize << 32) - 2);
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        for bad in ["", "abc", "10.0.0.0/33", "10.0.0/24", "256.1.1.0/24", "10.0.0.0/", "10.0.0.0/-1", "fe80::/64", "10.0.0.0/24/1"] {
            match AddressRange::parse(bad) {
                Err(SweepError::InvalidRange(reason)) => assert!(!reason.is_empty(), "{bad}"),
                Ok(r) => panic!("accepted {bad} as {r}"),
            }
        }
    }
}
