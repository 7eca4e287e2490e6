//! Fragmentation
//!
//! ``` text
//! FRAG1:  1 1 0 0 0 | datagram_size (11) | datagram_tag (16)
//! FRAGN:  1 1 1 0 0 | datagram_size (11) | datagram_tag (16) | datagram_offset (8)
//! ```
//!
//! The datagram size and offset refer to the *uncompressed* IPv6 packet; the offset is expressed
//! in 8-byte units. Only the first fragment carries the (compressed) headers.
//!
//! # References
//!
//! - [RFC 4944, section 5.3: Fragmentation Type and Header][0]
//!
//! [0]: https://tools.ietf.org/html/rfc4944#section-5.3

use core::{cmp, fmt, ops::Range};

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use log::debug;

use super::dispatch::{self, Dispatch};
use crate::{
    error::{Error, Result},
    fmt::Hex,
    traits::UncheckedIndex,
};

/* Header format */
const DATAGRAM_SIZE: Range<usize> = 0..2;
const DATAGRAM_TAG: Range<usize> = 2..4;
const DATAGRAM_OFFSET: usize = 4;

/// Size of the FRAG1 header
pub const FRAG1_HEADER_SIZE: usize = 4;

/// Size of the FRAGN header
pub const FRAGN_HEADER_SIZE: usize = 5;

/// Largest datagram size the 11-bit 'datagram_size' field can express
pub const MAX_DATAGRAM_SIZE: usize = 2047;

const SIZE_MASK: u16 = (1 << 11) - 1;

/// A FRAG1 or FRAGN fragment
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
    /// Parses the bytes as a fragment
    pub fn parse(bytes: B) -> Result<Self, B> {
        let slice = bytes.as_slice();

        let min = match slice.first().map(|byte| dispatch::classify(*byte)) {
            Some(Dispatch::Frag1) => FRAG1_HEADER_SIZE,
            Some(Dispatch::FragN) => FRAGN_HEADER_SIZE,
            _ => return Err(bytes),
        };

        if slice.len() < min {
            Err(bytes)
        } else {
            Ok(Packet { buffer: bytes })
        }
    }

    /* Getters */
    /// Is this the first fragment of the datagram?
    pub fn is_first(&self) -> bool {
        dispatch::classify(unsafe { *self.as_slice().gu(0) }) == Dispatch::Frag1
    }

    /// Reads the 'datagram_size' field
    pub fn get_datagram_size(&self) -> u16 {
        NE::read_u16(unsafe { self.as_slice().r(DATAGRAM_SIZE) }) & SIZE_MASK
    }

    /// Reads the 'datagram_tag' field
    pub fn get_datagram_tag(&self) -> u16 {
        NE::read_u16(unsafe { self.as_slice().r(DATAGRAM_TAG) })
    }

    /// Reads the 'datagram_offset' field, in 8-byte units
    ///
    /// The first fragment has an implicit offset of zero
    pub fn get_datagram_offset(&self) -> u8 {
        if self.is_first() {
            0
        } else {
            unsafe { *self.as_slice().gu(DATAGRAM_OFFSET) }
        }
    }

    /// Immutable view into the header
    pub fn header(&self) -> &[u8] {
        unsafe { self.as_slice().rt(..self.header_size()) }
    }

    /// Immutable view into the payload
    pub fn payload(&self) -> &[u8] {
        unsafe { self.as_slice().rf(self.header_size()..) }
    }

    /* Private */
    fn header_size(&self) -> usize {
        if self.is_first() {
            FRAG1_HEADER_SIZE
        } else {
            FRAGN_HEADER_SIZE
        }
    }

    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }
}

impl<B> Packet<B>
where
    B: AsMutSlice<Element = u8>,
{
    /* Constructors */
    /// Writes a FRAG1 header at the start of `buffer`; the rest of the buffer is the payload
    ///
    /// # Panics
    ///
    /// This constructor panics if `buffer` can't hold the header
    pub fn new_first(mut buffer: B, size: u16, tag: u16) -> Self {
        assert!(buffer.as_slice().len() >= FRAG1_HEADER_SIZE);

        let bytes = buffer.as_mut_slice();
        NE::write_u16(&mut bytes[DATAGRAM_SIZE], size & SIZE_MASK);
        bytes[0] |= dispatch::FRAG1;
        NE::write_u16(&mut bytes[DATAGRAM_TAG], tag);

        Packet { buffer }
    }

    /// Writes a FRAGN header at the start of `buffer`; the rest of the buffer is the payload
    ///
    /// # Panics
    ///
    /// This constructor panics if `buffer` can't hold the header
    pub fn new_subsequent(mut buffer: B, size: u16, tag: u16, offset: u8) -> Self {
        assert!(buffer.as_slice().len() >= FRAGN_HEADER_SIZE);

        let bytes = buffer.as_mut_slice();
        NE::write_u16(&mut bytes[DATAGRAM_SIZE], size & SIZE_MASK);
        bytes[0] |= dispatch::FRAGN;
        NE::write_u16(&mut bytes[DATAGRAM_TAG], tag);
        bytes[DATAGRAM_OFFSET] = offset;

        Packet { buffer }
    }

    /// Mutable view into the payload
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let start = self.header_size();
        &mut self.buffer.as_mut_slice()[start..]
    }
}

impl<B> fmt::Debug for Packet<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(if self.is_first() {
            "frag::Packet<FRAG1>"
        } else {
            "frag::Packet<FRAGN>"
        })
        .field("datagram_size", &self.get_datagram_size())
        .field("datagram_tag", &Hex(self.get_datagram_tag()))
        .field("datagram_offset", &self.get_datagram_offset())
        .field("payload_len", &self.payload().len())
        .finish()
    }
}

/// Splits a compressed packet into link-layer frames that fit in `mtu`
///
/// - `original_size` is the size of the uncompressed IPv6 packet
/// - `original_header_size` is the number of bytes of uncompressed headers that the compressed
///   headers of `packet` stand for
///
/// All the frames share the given datagram `tag`. The first one carries the compressed headers;
/// the payload of every fragment but the last one is a multiple of 8 bytes long.
pub fn fragment(
    packet: &[u8],
    original_size: usize,
    original_header_size: usize,
    mtu: u16,
    tag: u16,
) -> Result<Vec<Vec<u8>>> {
    if original_size > MAX_DATAGRAM_SIZE {
        return Err(Error::DatagramTooLarge(original_size));
    }

    let payload_size = original_size
        .checked_sub(original_header_size)
        .ok_or(Error::Malformed("6LoWPAN"))?;
    let compressed_header_size = packet
        .len()
        .checked_sub(payload_size)
        .ok_or(Error::Malformed("6LoWPAN"))?;

    let mtu_ = usize::from(mtu);
    let first = mtu_
        .checked_sub(FRAG1_HEADER_SIZE + compressed_header_size)
        .filter(|room| *room >= 8)
        .ok_or(Error::MtuTooSmall(mtu))?;
    let subsequent = mtu_
        .checked_sub(FRAGN_HEADER_SIZE)
        .filter(|room| *room >= 8)
        .ok_or(Error::MtuTooSmall(mtu))?;

    let size = original_size as u16;
    let mut frames = vec![];

    // the headers are never split
    let len = cmp::min(first / 8 * 8 + compressed_header_size, packet.len());
    let mut frame = vec![0; FRAG1_HEADER_SIZE + len];
    Packet::new_first(&mut frame[..], size, tag)
        .payload_mut()
        .copy_from_slice(&packet[..len]);
    frames.push(frame);

    let mut start = len;
    // offset into the *uncompressed* datagram
    let mut offset = len + original_header_size - compressed_header_size;

    while start < packet.len() {
        let len = cmp::min(subsequent / 8 * 8, packet.len() - start);

        let mut frame = vec![0; FRAGN_HEADER_SIZE + len];
        Packet::new_subsequent(&mut frame[..], size, tag, (offset / 8) as u8)
            .payload_mut()
            .copy_from_slice(&packet[start..start + len]);
        frames.push(frame);

        start += len;
        offset += len;
    }

    debug!(
        "fragmented datagram {:#06x} ({} bytes) into {} frames",
        tag,
        original_size,
        frames.len()
    );

    Ok(frames)
}
