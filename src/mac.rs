//! MAC-48: 48-bit Medium Access Control addresses

use core::fmt;

/// MAC address
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Addr(pub [u8; 6]);

impl Addr {
    /// Broadcast address
    pub const BROADCAST: Self = Addr([0xff; 6]);

    /// Checks if this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Checks if this is a multicast address
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 1 == 1
    }

    /// Converts the address into an IPv6 interface identifier (RFC 2464, section 4)
    ///
    /// `0xfffe` is inserted in the middle and the universal / local bit is toggled
    pub fn interface_id(&self) -> [u8; 8] {
        let m = &self.0;
        [m[0] ^ (1 << 1), m[1], m[2], 0xff, 0xfe, m[3], m[4], m[5]]
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mac::Addr({})", self)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut is_first = true;
        for byte in &self.0 {
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
