//! Dispatch classification
//!
//! Every 6LoWPAN frame, and every NHC header following an IPHC header, starts with a dispatch
//! byte that identifies the encoding that follows.

/// Not a LoWPAN frame (`00xxxxxx`)
pub const NALP: u8 = 0x00;
/// Uncompressed IPv6 header
pub const IPV6: u8 = 0x41;
/// LOWPAN_HC1 compressed IPv6 header
pub const HC1: u8 = 0x42;
/// LOWPAN_BC0 broadcast header
pub const BC0: u8 = 0x50;
/// LOWPAN_IPHC compressed IPv6 header (`011xxxxx`)
pub const IPHC: u8 = 0x60;
/// Mesh header (`10xxxxxx`)
pub const MESH: u8 = 0x80;
/// First fragment (`11000xxx`)
pub const FRAG1: u8 = 0xc0;
/// Subsequent fragment (`11100xxx`)
pub const FRAGN: u8 = 0xe0;

/// NHC extension header (`1110xxxx`)
pub const NHC_EXT: u8 = 0xe0;
/// NHC UDP header (`11110xxx`)
pub const NHC_UDP: u8 = 0xf0;

/// What follows a dispatch byte
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Dispatch {
    /// Not a LoWPAN frame
    Nalp,
    /// Uncompressed IPv6 header
    Ipv6,
    /// HC1 compressed IPv6 header
    Hc1,
    /// Broadcast header
    Bc0,
    /// IPHC compressed IPv6 header
    Iphc,
    /// Mesh header
    Mesh,
    /// First fragment header
    Frag1,
    /// Subsequent fragment header
    FragN,
    /// Reserved or unassigned dispatch
    Unsupported,
}

/// What follows a NHC dispatch byte
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NhcDispatch {
    /// Compressed IPv6 extension header (or encapsulated IPv6 header)
    Extension,
    /// Compressed UDP header
    Udp,
    /// Reserved or unassigned dispatch
    Unsupported,
}

/// Classifies the first byte of a 6LoWPAN frame
pub fn classify(byte: u8) -> Dispatch {
    match byte {
        0x00..=0x3f => Dispatch::Nalp,
        IPV6 => Dispatch::Ipv6,
        HC1 => Dispatch::Hc1,
        BC0 => Dispatch::Bc0,
        0x60..=0x7f => Dispatch::Iphc,
        0x80..=0xbf => Dispatch::Mesh,
        0xc0..=0xc7 => Dispatch::Frag1,
        0xe0..=0xe7 => Dispatch::FragN,
        _ => Dispatch::Unsupported,
    }
}

/// Classifies the first byte of a NHC header
pub fn classify_nhc(byte: u8) -> NhcDispatch {
    match byte {
        0xe0..=0xef => NhcDispatch::Extension,
        0xf0..=0xf7 => NhcDispatch::Udp,
        _ => NhcDispatch::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, classify_nhc, Dispatch, NhcDispatch};

    #[test]
    fn ranges() {
        let count = |d: Dispatch| (0..=255u8).filter(|b| classify(*b) == d).count();

        assert_eq!(count(Dispatch::Nalp), 64);
        assert_eq!(count(Dispatch::Ipv6), 1);
        assert_eq!(count(Dispatch::Hc1), 1);
        assert_eq!(count(Dispatch::Bc0), 1);
        assert_eq!(count(Dispatch::Iphc), 32);
        assert_eq!(count(Dispatch::Mesh), 64);
        assert_eq!(count(Dispatch::Frag1), 8);
        assert_eq!(count(Dispatch::FragN), 8);
        assert_eq!(count(Dispatch::Unsupported), 256 - 64 - 3 - 32 - 64 - 16);
    }

    #[test]
    fn boundaries() {
        assert_eq!(classify(0x3f), Dispatch::Nalp);
        assert_eq!(classify(0x40), Dispatch::Unsupported);
        assert_eq!(classify(0x5f), Dispatch::Unsupported);
        assert_eq!(classify(0x60), Dispatch::Iphc);
        assert_eq!(classify(0x7f), Dispatch::Iphc);
        assert_eq!(classify(0xbf), Dispatch::Mesh);
        assert_eq!(classify(0xc7), Dispatch::Frag1);
        assert_eq!(classify(0xc8), Dispatch::Unsupported);
        assert_eq!(classify(0xdf), Dispatch::Unsupported);
        assert_eq!(classify(0xe7), Dispatch::FragN);
        assert_eq!(classify(0xe8), Dispatch::Unsupported);

        assert_eq!(classify_nhc(0xdf), NhcDispatch::Unsupported);
        assert_eq!(classify_nhc(0xe0), NhcDispatch::Extension);
        assert_eq!(classify_nhc(0xef), NhcDispatch::Extension);
        assert_eq!(classify_nhc(0xf0), NhcDispatch::Udp);
        assert_eq!(classify_nhc(0xf7), NhcDispatch::Udp);
        assert_eq!(classify_nhc(0xf8), NhcDispatch::Unsupported);
    }
}
