use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// IPv4 block in CIDR notation, e.g. 10.0.0.0/16
#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy)]
pub struct CidrIP {
    pub ip: Ipv4Addr,
    pub netmask: u8,
}

impl CidrIP {
    fn mask(&self) -> u32 {
        if self.netmask == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.netmask))
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.ip) & self.mask())
    }

    /// True when every address of `other` is also inside `self`
    pub fn contains(&self, other: &CidrIP) -> bool {
        other.netmask >= self.netmask && (u32::from(other.ip) & self.mask()) == u32::from(self.network())
    }
}

impl fmt::Display for CidrIP {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.netmask)
    }
}

impl FromStr for CidrIP {
    type Err = Error;

    fn from_str(cidr: &str) -> Result<Self, Self::Err> {
        let elems: Vec<&str> = cidr.trim().split('/').collect();
        if elems.len() != 2 {
            return Err(Error::Cidr(format!("'{}' is not of the form a.b.c.d/n", cidr)));
        }
        let ip: Ipv4Addr = elems[0].parse().map_err(|_| Error::Cidr(format!("'{}' has an invalid address", cidr)))?;
        let netmask: u8 = elems[1].parse().map_err(|_| Error::Cidr(format!("'{}' has an invalid netmask", cidr)))?;
        if netmask > 32 {
            return Err(Error::Cidr(format!("'{}' has a netmask above 32", cidr)));
        }
        Ok(Self { ip, netmask })
    }
}

impl Serialize for CidrIP {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CidrIP {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
