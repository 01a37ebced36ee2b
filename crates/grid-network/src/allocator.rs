//! Address allocation within one logical network
//!
//! A network owns a /16; every participating node gets a /24 carved out of
//! it, and machines get host addresses inside their node's /24. Allocation
//! walks sibling blocks in strict forward order; duplicates are prevented by
//! the reservation sets.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::{Error, Result};

/// Prefix length of a logical network's range.
pub const RANGE_PREFIX: u8 = 16;
/// Prefix length of a per-node subnet.
pub const SUBNET_PREFIX: u8 = 24;
/// The first /24s of the range are kept for infrastructure addressing.
const RESERVED_LEADING_SUBNETS: u32 = 2;
/// Network and gateway addresses are skipped inside each subnet.
const RESERVED_LEADING_HOSTS: u32 = 2;

/// Whether an address sits in one of the RFC 1918 private blocks.
fn is_private(addr: Ipv4Addr) -> bool {
    let octets = addr.octets();
    octets[0] == 10
        || (octets[0] == 172 && (16..=31).contains(&octets[1]))
        || (octets[0] == 192 && octets[1] == 168)
}

/// Parse a range and force it to a private /16.
///
/// Any supplied prefix is masked down; a non-private base address is
/// rejected outright.
pub fn normalize_range(range: &str) -> Result<Ipv4Net> {
    let net: Ipv4Net = range
        .parse()
        .map_err(|_| Error::InvalidCidr(range.to_string()))?;
    if !is_private(net.addr()) {
        return Err(Error::NotPrivateRange(range.to_string()));
    }
    let masked = u32::from(net.addr()) & !((1u32 << (32 - RANGE_PREFIX)) - 1);
    Ipv4Net::new(Ipv4Addr::from(masked), RANGE_PREFIX)
        .map_err(|_| Error::InvalidCidr(range.to_string()))
}

/// Subnet reservation state for one logical network.
#[derive(Debug, Clone)]
pub struct AddressAllocator {
    range: Ipv4Net,
    reserved_subnets: BTreeSet<Ipv4Net>,
}

impl AddressAllocator {
    pub fn new(range: Ipv4Net) -> Self {
        Self {
            range,
            reserved_subnets: BTreeSet::new(),
        }
    }

    pub fn range(&self) -> Ipv4Net {
        self.range
    }

    pub fn reserved_subnets(&self) -> impl Iterator<Item = &Ipv4Net> {
        self.reserved_subnets.iter()
    }

    /// The nth /24 sibling from the range base.
    fn nth_subnet(&self, n: u32) -> Option<Ipv4Net> {
        if n >= 1u32 << (SUBNET_PREFIX - RANGE_PREFIX) {
            return None;
        }
        let base = u32::from(self.range.network());
        let addr = base + (n << (32 - SUBNET_PREFIX));
        Ipv4Net::new(Ipv4Addr::from(addr), SUBNET_PREFIX).ok()
    }

    /// Next unused /24, skipping the leading reserved blocks. The returned
    /// subnet is recorded as reserved.
    pub fn free_subnet(&mut self) -> Result<Ipv4Net> {
        let mut n = RESERVED_LEADING_SUBNETS;
        while let Some(subnet) = self.nth_subnet(n) {
            if !self.reserved_subnets.contains(&subnet) {
                self.reserved_subnets.insert(subnet);
                return Ok(subnet);
            }
            n += 1;
        }
        Err(Error::SubnetExhausted(self.range))
    }

    /// Reserve a caller-chosen subnet, validating width, containment and
    /// freeness. Only /24s are accepted; wider blocks would overlap the
    /// sibling walk of `free_subnet`.
    pub fn reserve_subnet(&mut self, subnet: Ipv4Net) -> Result<Ipv4Net> {
        if subnet.prefix_len() != SUBNET_PREFIX {
            return Err(Error::InvalidSubnetPrefix(subnet));
        }
        if !self.range.contains(&subnet.network()) || !self.range.contains(&subnet.broadcast()) {
            return Err(Error::SubnetOutOfRange {
                subnet,
                range: self.range,
            });
        }
        if self.reserved_subnets.contains(&subnet) {
            return Err(Error::SubnetNotFree(subnet));
        }
        self.reserved_subnets.insert(subnet);
        Ok(subnet)
    }

    /// Re-record a subnet seen while loading, without freeness checks.
    pub fn record_subnet(&mut self, subnet: Ipv4Net) {
        self.reserved_subnets.insert(subnet);
    }

    /// Keep only `subnet` reserved; the rest of the bookkeeping lives with
    /// the contracts of the remaining nodes.
    pub fn retain_only(&mut self, subnet: Option<Ipv4Net>) {
        self.reserved_subnets.retain(|s| Some(*s) == subnet);
    }
}

/// First free host address of `subnet`, skipping the network and gateway
/// addresses and anything already in `taken`.
pub fn next_free_ip(subnet: Ipv4Net, taken: &BTreeSet<Ipv4Addr>) -> Result<Ipv4Addr> {
    let first = u32::from(subnet.network()) + RESERVED_LEADING_HOSTS;
    let last = u32::from(subnet.broadcast()) - 1;
    for candidate in first..=last {
        let ip = Ipv4Addr::from(candidate);
        if !taken.contains(&ip) {
            return Ok(ip);
        }
    }
    Err(Error::IpExhausted(subnet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn normalize_forces_slash_16() {
        for input in ["10.20.0.0/16", "10.20.2.0/24", "192.168.12.0/18"] {
            let range = normalize_range(input).unwrap();
            assert_eq!(range.prefix_len(), 16, "input {input}");
        }
        assert_eq!(
            normalize_range("10.20.2.0/24").unwrap().to_string(),
            "10.20.0.0/16"
        );
    }

    #[test]
    fn normalize_rejects_public_ranges() {
        assert!(matches!(
            normalize_range("8.8.0.0/16"),
            Err(Error::NotPrivateRange(_))
        ));
        assert!(matches!(
            normalize_range("172.32.0.0/16"),
            Err(Error::NotPrivateRange(_))
        ));
    }

    #[test]
    fn normalize_rejects_garbage() {
        assert!(matches!(
            normalize_range("not-a-cidr"),
            Err(Error::InvalidCidr(_))
        ));
    }

    #[test]
    fn subnets_are_disjoint_and_skip_reserved_blocks() {
        let range = normalize_range("10.20.0.0/16").unwrap();
        let mut allocator = AddressAllocator::new(range);

        let reserved_0 = Ipv4Net::from_str("10.20.0.0/24").unwrap();
        let reserved_1 = Ipv4Net::from_str("10.20.1.0/24").unwrap();

        let mut seen = BTreeSet::new();
        for _ in 0..16 {
            let subnet = allocator.free_subnet().unwrap();
            assert_ne!(subnet, reserved_0);
            assert_ne!(subnet, reserved_1);
            assert!(seen.insert(subnet), "duplicate subnet {subnet}");
        }
        assert_eq!(
            seen.iter().next().unwrap().to_string(),
            "10.20.2.0/24"
        );
    }

    #[test]
    fn free_subnet_skips_explicit_reservations() {
        let range = normalize_range("10.20.0.0/16").unwrap();
        let mut allocator = AddressAllocator::new(range);
        allocator
            .reserve_subnet(Ipv4Net::from_str("10.20.2.0/24").unwrap())
            .unwrap();

        let subnet = allocator.free_subnet().unwrap();
        assert_eq!(subnet.to_string(), "10.20.3.0/24");
    }

    #[test]
    fn duplicate_reservation_fails() {
        let range = normalize_range("10.20.0.0/16").unwrap();
        let mut allocator = AddressAllocator::new(range);
        let subnet = Ipv4Net::from_str("10.20.5.0/24").unwrap();
        allocator.reserve_subnet(subnet).unwrap();
        assert!(matches!(
            allocator.reserve_subnet(subnet),
            Err(Error::SubnetNotFree(_))
        ));
    }

    #[test]
    fn reservation_must_be_a_node_subnet() {
        let range = normalize_range("10.20.0.0/16").unwrap();
        let mut allocator = AddressAllocator::new(range);
        let wide = Ipv4Net::from_str("10.20.2.0/23").unwrap();
        assert!(matches!(
            allocator.reserve_subnet(wide),
            Err(Error::InvalidSubnetPrefix(_))
        ));
        // the rejected block left no trace, the first /24 is still free
        assert_eq!(allocator.free_subnet().unwrap().to_string(), "10.20.2.0/24");
    }

    #[test]
    fn out_of_range_reservation_fails() {
        let range = normalize_range("10.20.0.0/16").unwrap();
        let mut allocator = AddressAllocator::new(range);
        let outside = Ipv4Net::from_str("10.30.2.0/24").unwrap();
        assert!(matches!(
            allocator.reserve_subnet(outside),
            Err(Error::SubnetOutOfRange { .. })
        ));
    }

    #[test]
    fn exhaustion_fails_fast() {
        let range = normalize_range("10.20.0.0/16").unwrap();
        let mut allocator = AddressAllocator::new(range);
        // 256 /24s minus the two reserved ones
        for _ in 0..254 {
            allocator.free_subnet().unwrap();
        }
        assert!(matches!(
            allocator.free_subnet(),
            Err(Error::SubnetExhausted(_))
        ));
    }

    #[test]
    fn first_ip_skips_network_and_gateway() {
        let subnet = Ipv4Net::from_str("10.20.2.0/24").unwrap();
        let ip = next_free_ip(subnet, &BTreeSet::new()).unwrap();
        assert_eq!(ip, Ipv4Addr::new(10, 20, 2, 2));
    }

    #[test]
    fn taken_ips_are_skipped() {
        let subnet = Ipv4Net::from_str("10.20.2.0/24").unwrap();
        let mut taken = BTreeSet::new();
        taken.insert(Ipv4Addr::new(10, 20, 2, 2));
        taken.insert(Ipv4Addr::new(10, 20, 2, 3));
        let ip = next_free_ip(subnet, &taken).unwrap();
        assert_eq!(ip, Ipv4Addr::new(10, 20, 2, 4));
    }

    #[test]
    fn full_subnet_is_exhausted() {
        let subnet = Ipv4Net::from_str("10.20.2.0/24").unwrap();
        let taken: BTreeSet<Ipv4Addr> = (2..=254)
            .map(|octet| Ipv4Addr::new(10, 20, 2, octet))
            .collect();
        assert!(matches!(
            next_free_ip(subnet, &taken),
            Err(Error::IpExhausted(_))
        ));
    }
}
