use std::{fmt, net::IpAddr, str::FromStr};

use crate::error::{FormatError, OutOfRangeError};

fn max_netmask(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn check_netmask(addr: &IpAddr, netmask: u8) -> Result<(), OutOfRangeError> {
    let max = max_netmask(addr);
    if netmask > max {
        return Err(OutOfRangeError::new(format!("netmask {netmask} exceeds {max} for {addr}")));
    }
    Ok(())
}

fn split_netmask(s: &str) -> Result<(IpAddr, Option<u8>), FormatError> {
    let (addr, netmask) = match s.split_once('/') {
        Some((addr, netmask)) => (addr, Some(netmask)),
        None => (s, None),
    };
    let addr = addr
        .parse()
        .map_err(|_| FormatError::new("invalid ip address", 0))?;
    let netmask = match netmask {
        Some(netmask) => Some(
            netmask
                .parse()
                .map_err(|_| FormatError::new("invalid netmask", addr_len(s)))?,
        ),
        None => None,
    };
    Ok((addr, netmask))
}

fn addr_len(s: &str) -> usize {
    s.find('/').map(|i| i + 1).unwrap_or(0)
}

/// `inet`, host address with optional netmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Inet {
    addr: IpAddr,
    netmask: u8,
}

impl Inet {
    pub fn new(addr: IpAddr, netmask: u8) -> Result<Self, OutOfRangeError> {
        check_netmask(&addr, netmask)?;
        Ok(Self { addr, netmask })
    }

    /// Single host address, netmask covers the whole address.
    pub fn host(addr: IpAddr) -> Self {
        Self { netmask: max_netmask(&addr), addr }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn netmask(&self) -> u8 {
        self.netmask
    }
}

impl From<IpAddr> for Inet {
    fn from(addr: IpAddr) -> Self {
        Self::host(addr)
    }
}

impl FromStr for Inet {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split_netmask(s)? {
            (addr, Some(netmask)) => Inet::new(addr, netmask)
                .map_err(|e| FormatError::new(e.to_string(), addr_len(s))),
            (addr, None) => Ok(Inet::host(addr)),
        }
    }
}

impl fmt::Display for Inet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.netmask == max_netmask(&self.addr) {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{}/{}", self.addr, self.netmask)
        }
    }
}

/// `cidr`, network address with mandatory netmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cidr {
    addr: IpAddr,
    netmask: u8,
}

impl Cidr {
    pub fn new(addr: IpAddr, netmask: u8) -> Result<Self, OutOfRangeError> {
        check_netmask(&addr, netmask)?;
        Ok(Self { addr, netmask })
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn netmask(&self) -> u8 {
        self.netmask
    }
}

impl From<Cidr> for Inet {
    fn from(cidr: Cidr) -> Self {
        Inet { addr: cidr.addr, netmask: cidr.netmask }
    }
}

impl FromStr for Cidr {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split_netmask(s)? {
            (addr, Some(netmask)) => Cidr::new(addr, netmask)
                .map_err(|e| FormatError::new(e.to_string(), addr_len(s))),
            (_, None) => Err(FormatError::new("missing netmask", s.len())),
        }
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.netmask)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_display() {
        let inet: Inet = "10.0.0.1".parse().unwrap();
        assert_eq!(inet.netmask(), 32);
        assert_eq!(inet.to_string(), "10.0.0.1");

        let inet: Inet = "::1/64".parse().unwrap();
        assert_eq!(inet.netmask(), 64);
        assert_eq!(inet.to_string(), "::1/64");

        let cidr: Cidr = "192.168.0.0/16".parse().unwrap();
        assert_eq!(cidr.to_string(), "192.168.0.0/16");
        assert_eq!(Inet::from(cidr).to_string(), "192.168.0.0/16");

        assert!("192.168.0.0".parse::<Cidr>().is_err());
        assert!("10.0.0.1/33".parse::<Inet>().is_err());
        assert_eq!("10.0.0.1/x".parse::<Inet>().unwrap_err().position(), 9);
    }
}
