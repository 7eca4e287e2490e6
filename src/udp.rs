//! UDP: User Datagram Protocol
//!
//! # References
//!
//! - [RFC 768: User Datagram Protocol][0]
//!
//! [0]: https://tools.ietf.org/html/rfc768
//!
//! - [RFC 8200: IPv6 Specification, section 8.1 (Upper-Layer Checksums)][1]
//!
//! [1]: https://tools.ietf.org/html/rfc8200#section-8.1

use core::{
    fmt,
    ops::{Range, RangeFrom},
};

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::{u32, usize};

use crate::{
    fmt::Hex,
    ipv6,
    traits::UncheckedIndex,
};

/* Packet structure */
const SOURCE: Range<usize> = 0..2;
const DESTINATION: Range<usize> = 2..4;
const LENGTH: Range<usize> = 4..6;
const CHECKSUM: Range<usize> = 6..8;
const PAYLOAD: RangeFrom<usize> = 8..;

/// Size of the UDP header
pub const HEADER_SIZE: u8 = PAYLOAD.start as u8;

/// UDP packet
#[derive(Clone, Copy)]
pub struct Packet<BUFFER>
where
    BUFFER: AsSlice<Element = u8>,
{
    buffer: BUFFER,
}

impl<B> Packet<B>
where
    B: AsSlice<Element = u8>,
{
    /* Constructors */
    /// Parses the bytes as an UDP packet
    ///
    /// The whole of `bytes` is considered to be the UDP packet; the 'Length' field is not checked
    pub fn parse(bytes: B) -> Result<Self, B> {
        if bytes.as_slice().len() < usize(HEADER_SIZE) {
            Err(bytes)
        } else {
            Ok(Packet { buffer: bytes })
        }
    }

    /* Getters */
    /// Reads the 'Source (port)' field
    pub fn get_source(&self) -> u16 {
        NE::read_u16(unsafe { self.as_slice().r(SOURCE) })
    }

    /// Reads the 'Destination (port)' field
    pub fn get_destination(&self) -> u16 {
        NE::read_u16(unsafe { self.as_slice().r(DESTINATION) })
    }

    /// Reads the 'Length' field
    pub fn get_length(&self) -> u16 {
        NE::read_u16(unsafe { self.as_slice().r(LENGTH) })
    }

    /// Reads the 'Checksum' field
    pub fn get_checksum(&self) -> u16 {
        NE::read_u16(unsafe { self.as_slice().r(CHECKSUM) })
    }

    /// Immutable view into the payload
    pub fn payload(&self) -> &[u8] {
        unsafe { self.as_slice().rf(PAYLOAD) }
    }

    /// Returns the byte representation of this UDP packet
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /* Miscellaneous */
    /// Computes the checksum of this packet as carried over IPv6
    ///
    /// The current value of the 'Checksum' field is ignored. A computed value of zero is
    /// returned as `0xffff`
    pub fn compute_ipv6_checksum(&self, src: ipv6::Addr, dest: ipv6::Addr) -> u16 {
        const NEXT_HEADER: u8 = 17;

        let mut sum: u32 = 0;

        // Pseudo-header
        for chunk in src.0.chunks_exact(2).chain(dest.0.chunks_exact(2)) {
            sum += u32(NE::read_u16(chunk));
        }

        let len = self.as_slice().len() as u32;
        sum += len >> 16;
        sum += len & 0xffff;

        sum += u32(NEXT_HEADER);

        // UDP packet
        for (i, chunk) in self.as_slice().chunks(2).enumerate() {
            if i == CHECKSUM.start / 2 {
                // this is the checksum field, skip
                continue;
            }

            if chunk.len() == 1 {
                sum += u32(chunk[0]) << 8;
            } else {
                sum += u32(NE::read_u16(chunk));
            }
        }

        // fold carry-over
        while sum >> 16 != 0 {
            sum = (sum & 0xffff) + (sum >> 16);
        }

        match !(sum as u16) {
            // RFC 768: an all zero transmitted checksum means "no checksum"
            0 => 0xffff,
            cksum => cksum,
        }
    }

    /// Verifies the 'Checksum' field
    ///
    /// A zero checksum is invalid over IPv6
    pub fn verify_ipv6_checksum(&self, src: ipv6::Addr, dest: ipv6::Addr) -> bool {
        let cksum = self.get_checksum();

        cksum != 0 && self.compute_ipv6_checksum(src, dest) == cksum
    }

    /* Private */
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }
}

impl<B> Packet<B>
where
    B: AsMutSlice<Element = u8>,
{
    /* Constructors */
    /// Transforms the given buffer into an UDP packet
    ///
    /// NOTE The UDP packet will span the whole buffer and the 'Checksum' field will be zeroed.
    ///
    /// # Panics
    ///
    /// This constructor panics if the given `buffer` is not large enough to contain the UDP header
    pub fn new(buffer: B) -> Self {
        let len = buffer.as_slice().len();
        assert!(len >= usize(HEADER_SIZE));

        let mut packet = Packet { buffer };

        packet.set_length(cast::u16(len).unwrap_or(u16::MAX));
        packet.set_checksum(0);

        packet
    }

    /* Setters */
    /// Sets the 'Source (port)' field
    pub fn set_source(&mut self, port: u16) {
        NE::write_u16(&mut self.as_mut_slice()[SOURCE], port)
    }

    /// Sets the 'Destination (port)' field
    pub fn set_destination(&mut self, port: u16) {
        NE::write_u16(&mut self.as_mut_slice()[DESTINATION], port)
    }

    /// Sets the 'Length' field
    pub fn set_length(&mut self, len: u16) {
        NE::write_u16(&mut self.as_mut_slice()[LENGTH], len)
    }

    /// Sets the 'Checksum' field
    pub fn set_checksum(&mut self, cksum: u16) {
        NE::write_u16(&mut self.as_mut_slice()[CHECKSUM], cksum)
    }

    /// Computes and writes the checksum
    pub fn update_ipv6_checksum(&mut self, src: ipv6::Addr, dest: ipv6::Addr) {
        let cksum = self.compute_ipv6_checksum(src, dest);
        self.set_checksum(cksum);
    }

    /* Private */
    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }
}

/// NOTE excludes the payload
impl<B> fmt::Debug for Packet<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("udp::Packet")
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("length", &self.get_length())
            .field("checksum", &Hex(self.get_checksum()))
            .finish()
    }
}
