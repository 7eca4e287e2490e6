//! Errors

use thiserror::Error;

/// Errors raised while (de)compressing, fragmenting or reassembling a packet
///
/// None of these are recoverable for the packet at hand: the packet must be discarded. They never
/// leave the adaptation layer in an inconsistent state.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// The buffer is too short to hold the header it announces
    #[error("truncated {0} header")]
    Truncated(&'static str),

    /// A header field holds a value that can't be decoded
    #[error("malformed {0} header")]
    Malformed(&'static str),

    /// The packet does not start with a version 6 IP header
    #[error("not an IPv6 packet")]
    NotIpv6,

    /// HC1 packet announces an HC2 encoded upper-layer header
    #[error("HC2 encoding is not supported")]
    Hc2Unsupported,

    /// IPHC packet uses stateful (context based) compression
    #[error("context based address compression is not implemented")]
    ContextUnsupported,

    /// IPHC packet uses a reserved address mode combination
    #[error("reserved address mode (M = {m}, DAC = {dac}, DAM = {dam:#04b})")]
    ReservedAddressMode {
        /// Multicast compression flag
        m: bool,
        /// Destination address compression flag
        dac: bool,
        /// Destination address mode
        dam: u8,
    },

    /// Compression of the IPv6 Mobility header was requested
    #[error("compression of the Mobility header is not supported")]
    MobilityUnsupported,

    /// NHC extension header carries an unassigned EID
    #[error("unknown NHC extension header id {0}")]
    UnknownExtension(u8),

    /// The byte following an IPHC header with NH = 1 is not a NHC dispatch
    #[error("unsupported NHC dispatch {0:#04x}")]
    UnsupportedNhc(u8),

    /// The frame starts with a dispatch that can't be decompressed
    #[error("unsupported dispatch {0:#04x}")]
    UnsupportedDispatch(u8),

    /// Two fragments of a datagram start at the same offset but have different sizes
    #[error("fragment at offset {offset} has size {size} but a fragment of size {stored} was already received")]
    FragmentSizeMismatch {
        /// Offset, in bytes, of both fragments
        offset: u16,
        /// Size of the fragment that was received first
        stored: u16,
        /// Size of the fragment that was just received
        size: u16,
    },

    /// A fragment overlaps with a previously received one
    #[error("fragment [{offset}, {end}) overlaps a previously received fragment")]
    FragmentOverlap {
        /// Start offset, in bytes
        offset: u16,
        /// End offset, in bytes
        end: u16,
    },

    /// A fragment extends beyond the datagram size
    #[error("fragment [{offset}, {end}) exceeds the datagram size {size}")]
    FragmentOutOfBounds {
        /// Start offset, in bytes
        offset: u16,
        /// End offset, in bytes
        end: u16,
        /// Datagram size
        size: u16,
    },

    /// The link MTU can't carry a fragment header plus some payload
    #[error("link MTU of {0} bytes is too small to carry fragments")]
    MtuTooSmall(u16),

    /// The datagram doesn't fit in the 11-bit datagram size field
    #[error("datagram of {0} bytes exceeds the maximum fragmentable size")]
    DatagramTooLarge(usize),
}

/// `Result` specialized to this crate's `Error`
pub type Result<T, E = Error> = core::result::Result<T, E>;
