//! Link-layer addresses
//!
//! 6LoWPAN derives IPv6 interface identifiers from the link-layer addresses of the frame; header
//! compression elides whatever the receiver can derive on its own.
//!
//! # References
//!
//! - [RFC 4944: Transmission of IPv6 Packets over IEEE 802.15.4 Networks, section 6][0]
//!
//! [0]: https://tools.ietf.org/html/rfc4944#section-6

use core::fmt;

use byteorder::{ByteOrder, NetworkEndian as NE};

use crate::{ipv6, mac};

/// A link-layer address
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Addr {
    /// IEEE 802.15.4 short address
    Short(ShortAddr),
    /// 48-bit MAC address
    Mac48(mac::Addr),
    /// IEEE 802.15.4 extended address
    Extended(ExtendedAddr),
}

/// The kind of a link-layer address
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Kind {
    /// 16-bit address
    Short,
    /// 48-bit address
    Mac48,
    /// 64-bit address
    Extended,
}

impl Addr {
    /// Returns the kind of this address
    pub fn kind(&self) -> Kind {
        match *self {
            Addr::Short(_) => Kind::Short,
            Addr::Mac48(_) => Kind::Mac48,
            Addr::Extended(_) => Kind::Extended,
        }
    }

    /// Checks if this address is of the given kind
    pub fn is_matching_type(&self, kind: Kind) -> bool {
        self.kind() == kind
    }

    /// Size of the address, in bytes
    pub fn size(&self) -> u8 {
        match self.kind() {
            Kind::Short => 2,
            Kind::Mac48 => 6,
            Kind::Extended => 8,
        }
    }

    /// IPv6 interface identifier derived from this address
    pub fn interface_id(&self) -> [u8; 8] {
        match *self {
            Addr::Short(sa) => sa.interface_id(),
            Addr::Mac48(ma) => ma.interface_id(),
            Addr::Extended(ea) => ea.eui_64(),
        }
    }

    /// IPv6 link-local address derived from this address
    pub fn link_local(&self) -> ipv6::Addr {
        self.global(ipv6::LINK_LOCAL_PREFIX)
    }

    /// IPv6 address made of the given (/64) prefix and the interface identifier derived from this
    /// address
    pub fn global(&self, prefix: [u8; 8]) -> ipv6::Addr {
        let mut bytes = [0; 16];
        bytes[..8].copy_from_slice(&prefix);
        bytes[8..].copy_from_slice(&self.interface_id());
        ipv6::Addr(bytes)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Addr::Short(sa) => fmt::Display::fmt(sa, f),
            Addr::Mac48(ma) => fmt::Display::fmt(ma, f),
            Addr::Extended(ea) => fmt::Display::fmt(ea, f),
        }
    }
}

/// Short (16-bit) address
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ShortAddr(pub u16);

impl fmt::Display for ShortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl ShortAddr {
    /// Broadcast address
    pub const BROADCAST: ShortAddr = ShortAddr(0xffff);

    /// Is this the broadcast address?
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Maps the address into an interface identifier: `0000:00ff:fe00:XXXX`
    pub fn interface_id(&self) -> [u8; 8] {
        let mut bytes = [0, 0, 0, 0xff, 0xfe, 0, 0, 0];
        NE::write_u16(&mut bytes[6..], self.0);
        bytes
    }
}

impl From<ShortAddr> for Addr {
    fn from(sa: ShortAddr) -> Addr {
        Addr::Short(sa)
    }
}

/// Extended (64-bit) address
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ExtendedAddr(pub u64);

impl ExtendedAddr {
    /// Serializes the address into an array of bytes using network endianness
    pub fn ne_bytes(&self) -> [u8; 8] {
        let mut bytes = [0; 8];
        NE::write_u64(&mut bytes, self.0);
        bytes
    }

    /// Converts the address into an Extended Unique Identifier (EUI-64)
    pub fn eui_64(&self) -> [u8; 8] {
        let mut bytes = self.ne_bytes();

        // toggle the universal / local bit
        bytes[0] ^= 1 << 1;

        bytes
    }
}

// NOTE printed in BIG (Network) endian representation to match the output of `ip link`
impl fmt::Display for ExtendedAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut is_first = true;

        for byte in self.ne_bytes().iter() {
            if is_first {
                is_first = false;
            } else {
                f.write_str(":")?;
            }

            write!(f, "{:02x}", byte)?;
        }

        Ok(())
    }
}

impl From<ExtendedAddr> for Addr {
    fn from(ea: ExtendedAddr) -> Addr {
        Addr::Extended(ea)
    }
}

impl From<mac::Addr> for Addr {
    fn from(ma: mac::Addr) -> Addr {
        Addr::Mac48(ma)
    }
}
