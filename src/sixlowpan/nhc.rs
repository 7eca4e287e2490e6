//! LOWPAN_NHC encoding
//!
//! Headers that follow a LOWPAN_IPHC header, when its NH bit is set. Each one starts with a NHC
//! dispatch byte and the chain ends with either a UDP header or an uncompressed next header.
//!
//! ``` text
//! UDP:        1 1 1 1 0 C P P
//! Extension:  1 1 1 0 E E E N
//! ```

use core::fmt;

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::usize;
use log::{debug, trace};

use super::{
    dispatch::{self, NhcDispatch},
    iphc, Context,
};
use crate::{
    buf::Buffer,
    error::{Error, Result},
    ipv6::{self, ext, NextHeader},
    traits::UncheckedIndex,
    udp,
};

/* Header format */
const NHC: usize = 0;

bitfield!(id: u8, offset = super::c::OFFSET + super::c::SIZE, size = 5, value = 0b11110);
bitfield!(c: u8, offset = super::p::OFFSET + super::p::SIZE, size = 1);
bitfield!(p: u8, offset = 0, size = 2);
bitfield!(ext_id: u8, offset = super::eid::OFFSET + super::eid::SIZE, size = 4, value = 0b1110);
bitfield!(eid: u8, offset = super::nh::OFFSET + super::nh::SIZE, size = 3);
bitfield!(nh: u8, offset = 0, size = 1);

/// Largest LOWPAN_NHC UDP header
pub const UDP_MAX_HEADER_SIZE: usize = 1 + 4 + 2;

/// Largest extension header body that can be LOWPAN_NHC encoded
pub const MAX_BLOB_SIZE: usize = 255;

/// Extension headers that have a LOWPAN_NHC encoding
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Extension {
    /// IPv6 Hop-by-Hop Options header
    HopByHop,
    /// IPv6 Routing header
    Routing,
    /// IPv6 Fragment header
    Fragment,
    /// IPv6 Destination Options header
    DestinationOptions,
    /// IPv6 Mobility header
    Mobility,
    /// Encapsulated IPv6 header
    Ipv6,
}

impl Extension {
    /// Maps an 'Extension header ID' to an extension
    ///
    /// IDs 5 and 6 are reserved
    pub fn from_eid(eid: u8) -> Option<Self> {
        Some(match eid {
            0 => Extension::HopByHop,
            1 => Extension::Routing,
            2 => Extension::Fragment,
            3 => Extension::DestinationOptions,
            4 => Extension::Mobility,
            7 => Extension::Ipv6,
            _ => return None,
        })
    }

    /// The 'Extension header ID' of this extension
    pub fn eid(&self) -> u8 {
        match *self {
            Extension::HopByHop => 0,
            Extension::Routing => 1,
            Extension::Fragment => 2,
            Extension::DestinationOptions => 3,
            Extension::Mobility => 4,
            Extension::Ipv6 => 7,
        }
    }

    /// Maps an IPv6 'Next Header' value to an extension
    pub fn from_next_header(nh: NextHeader) -> Option<Self> {
        Some(match nh {
            NextHeader::HopByHop => Extension::HopByHop,
            NextHeader::Routing => Extension::Routing,
            NextHeader::Fragment => Extension::Fragment,
            NextHeader::DestinationOptions => Extension::DestinationOptions,
            NextHeader::Mobility => Extension::Mobility,
            NextHeader::Ipv6 => Extension::Ipv6,
            _ => return None,
        })
    }

    /// The IPv6 'Next Header' value of this extension
    pub fn next_header(&self) -> NextHeader {
        match *self {
            Extension::HopByHop => NextHeader::HopByHop,
            Extension::Routing => NextHeader::Routing,
            Extension::Fragment => NextHeader::Fragment,
            Extension::DestinationOptions => NextHeader::DestinationOptions,
            Extension::Mobility => NextHeader::Mobility,
            Extension::Ipv6 => NextHeader::Ipv6,
        }
    }
}

/// LOWPAN_NHC compressed IPv6 extension header
pub struct ExtHeader<BUFFER>
where
    BUFFER: AsSlice<Element = u8>,
{
    buffer: BUFFER,
    /// Index at which the payload starts
    payload: u16,
}

impl<B> ExtHeader<B>
where
    B: AsSlice<Element = u8>,
{
    /* Constructors */
    /// Parses the bytes as a LOWPAN_NHC compressed extension header
    ///
    /// The encapsulated IPv6 header (EID = 7) has neither an inline next header nor a length; its
    /// header is the NHC byte alone.
    pub fn parse(bytes: B) -> Result<Self, B> {
        let slice = bytes.as_slice();

        if slice.is_empty() || get!(slice[NHC], ext_id) != ext_id::VALUE {
            return Err(bytes);
        }

        let mut len = 1;
        if get!(slice[NHC], eid) != Extension::Ipv6.eid() {
            if get!(slice[NHC], nh) == 0 {
                len += 1;
            }

            // length
            len += 1;
            if slice.len() < len {
                return Err(bytes);
            }

            len += usize::from(slice[len - 1]);
        }

        if slice.len() < len {
            Err(bytes)
        } else {
            Ok(ExtHeader {
                buffer: bytes,
                payload: len as u16,
            })
        }
    }

    /* Getters */
    /// Reads the 'Extension header ID' field
    pub fn get_eid(&self) -> u8 {
        get!(self.header_(), eid)
    }

    /// Reads the 'Next Header' NHC field
    pub fn get_nh(&self) -> bool {
        get!(self.header_(), nh) != 0
    }

    /// Reads the 'Next Header' field
    ///
    /// `None` means that the next header is LOWPAN_NHC encoded as well
    pub fn get_next_header(&self) -> Option<NextHeader> {
        if self.get_nh() || self.get_eid() == Extension::Ipv6.eid() {
            None
        } else {
            Some(unsafe { *self.as_slice().gu(NHC + 1) }.into())
        }
    }

    /// The body of the extension header, without the 'Next Header' and 'Hdr Ext Len' fields
    pub fn blob(&self) -> &[u8] {
        if self.get_eid() == Extension::Ipv6.eid() {
            &[]
        } else {
            // NHC + (next header) + length
            let start = if self.get_nh() { NHC + 2 } else { NHC + 3 };
            unsafe { self.as_slice().r(start..usize::from(self.payload)) }
        }
    }

    /// Immutable view into the header
    pub fn header(&self) -> &[u8] {
        unsafe { self.as_slice().rt(..usize::from(self.payload)) }
    }

    /// Immutable view into the payload
    pub fn payload(&self) -> &[u8] {
        unsafe { self.as_slice().rf(usize::from(self.payload)..) }
    }

    /* Private */
    fn header_(&self) -> u8 {
        unsafe { *self.as_slice().gu(NHC) }
    }

    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }
}

impl<B> fmt::Debug for ExtHeader<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("nhc::ExtHeader")
            .field("eid", &self.get_eid())
            .field("nh", &(self.get_nh() as u8))
            .field("next_header", &self.get_next_header())
            .field("length", &self.blob().len())
            .finish()
    }
}

/// LOWPAN_NHC compressed UDP packet
pub struct UdpPacket<BUFFER>
where
    BUFFER: AsSlice<Element = u8>,
{
    buffer: BUFFER,
    /// Index at which the payload starts
    payload: u8,
}

impl<B> UdpPacket<B>
where
    B: AsSlice<Element = u8>,
{
    /* Constructors */
    /// Parses the bytes as a LOWPAN_NHC compressed UDP packet
    pub fn parse(buffer: B) -> Result<Self, B> {
        let mut start = 1u8; // NHC

        if buffer.as_slice().len() < usize::from(start) {
            return Err(buffer);
        }

        let mut p = UdpPacket { buffer, payload: 0 };

        // check NHC ID
        if get!(p.header_(), id) != id::VALUE {
            return Err(p.buffer);
        }

        if !p.get_c() {
            start += 2; // checksum
        }

        start += p.ports_size();

        p.payload = start;

        if p.buffer.as_slice().len() < usize::from(start) {
            Err(p.buffer)
        } else {
            Ok(p)
        }
    }

    /* Getters */
    /// Reads the (potentially compressed) 'Source Port' field
    pub fn get_source(&self) -> u16 {
        unsafe {
            match self.get_p() {
                0b00 | 0b01 => NE::read_u16(self.as_slice().r(1..3)),
                0b10 => 0xf000 + u16::from(*self.as_slice().gu(1)),
                _ => 0xf0b0 + u16::from(*self.as_slice().gu(1) >> 4),
            }
        }
    }

    /// Reads the (potentially compressed) 'Destination Port' field
    pub fn get_destination(&self) -> u16 {
        unsafe {
            match self.get_p() {
                0b00 => NE::read_u16(self.as_slice().r(3..5)),
                0b01 => 0xf000 + u16::from(*self.as_slice().gu(3)),
                0b10 => NE::read_u16(self.as_slice().r(2..4)),
                _ => 0xf0b0 + u16::from(*self.as_slice().gu(1) & 0x0f),
            }
        }
    }

    /// Reads the (potentially compressed) 'Checksum' field
    ///
    /// `None` means that the checksum has been elided by the compressor
    pub fn get_checksum(&self) -> Option<u16> {
        if !self.get_c() {
            let start = usize::from(1 + self.ports_size());
            Some(NE::read_u16(unsafe { self.as_slice().r(start..start + 2) }))
        } else {
            None
        }
    }

    /// Immutable view into the header
    pub fn header(&self) -> &[u8] {
        unsafe { self.as_slice().rt(..usize::from(self.payload)) }
    }

    /// Immutable view into the UDP payload
    pub fn payload(&self) -> &[u8] {
        let start = usize::from(self.payload);
        unsafe { self.as_slice().rf(start..) }
    }

    /// Reads the 'Checksum' NHC field
    pub fn get_c(&self) -> bool {
        get!(self.header_(), c) != 0
    }

    /// Reads the 'Ports' NHC field
    pub fn get_p(&self) -> u8 {
        get!(self.header_(), p)
    }

    /* Private */
    fn ports_size(&self) -> u8 {
        match self.get_p() {
            // source & destination uncompressed
            0b00 => 2 + 2,
            // destination compressed
            0b01 => 2 /* source */ + 1, /* destination */
            // source compressed
            0b10 => 1 /* source */ + 2, /* destination */
            // source and destination compressed
            _ => 1,
        }
    }

    fn header_(&self) -> u8 {
        unsafe { *self.as_slice().gu(NHC) }
    }

    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }
}

impl<B> UdpPacket<B>
where
    B: AsMutSlice<Element = u8>,
{
    /* Constructors */
    /// Writes a LOWPAN_NHC UDP header into `buffer`
    ///
    /// A `checksum` of `None` elides the checksum
    ///
    /// # Panics
    ///
    /// This constructor panics if `buffer` is smaller than `UDP_MAX_HEADER_SIZE`
    pub fn new(mut buffer: B, source: u16, destination: u16, checksum: Option<u16>) -> Self {
        assert!(buffer.as_slice().len() >= UDP_MAX_HEADER_SIZE);

        let bytes = buffer.as_mut_slice();

        // ports
        let (p, mut len) = if source >> 4 == 0xf0b && destination >> 4 == 0xf0b {
            bytes[1] = ((source & 0x0f) as u8) << 4 | (destination & 0x0f) as u8;
            (0b11, 2)
        } else if source >> 8 == 0xf0 {
            bytes[1] = (source & 0xff) as u8;
            NE::write_u16(&mut bytes[2..4], destination);
            (0b10, 4)
        } else if destination >> 8 == 0xf0 {
            NE::write_u16(&mut bytes[1..3], source);
            bytes[3] = (destination & 0xff) as u8;
            (0b01, 4)
        } else {
            NE::write_u16(&mut bytes[1..3], source);
            NE::write_u16(&mut bytes[3..5], destination);
            (0b00, 5)
        };

        // checksum
        let c = if let Some(cksum) = checksum {
            NE::write_u16(&mut bytes[len..len + 2], cksum);
            len += 2;
            0
        } else {
            1
        };

        bytes[NHC] = (id::VALUE << id::OFFSET) | (c << c::OFFSET) | (p << p::OFFSET);

        UdpPacket {
            buffer,
            payload: len as u8,
        }
    }
}

impl<B> fmt::Debug for UdpPacket<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("nhc::UdpPacket")
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("checksum", &self.get_checksum())
            .finish()
    }
}

/// LOWPAN_NHC compresses the `next_header` found at the start of `buffer`, and the headers that
/// follow it
///
/// `src` and `dest` are the addresses of the enclosing IPv6 header. Returns the number of bytes of
/// uncompressed headers that were replaced, or `None` if `next_header` has no LOWPAN_NHC encoding
/// (the buffer is left untouched in that case).
pub fn compress(
    buffer: &mut Buffer,
    next_header: NextHeader,
    src: ipv6::Addr,
    dest: ipv6::Addr,
    ctxt: &Context,
    omit_udp_checksum: bool,
) -> Result<Option<usize>> {
    if next_header == NextHeader::Udp {
        return compress_udp(buffer, src, dest, omit_udp_checksum).map(Some);
    }

    match Extension::from_next_header(next_header) {
        None | Some(Extension::Mobility) => Ok(None),
        Some(Extension::Ipv6) => {
            let len = iphc::compress(buffer, ctxt, omit_udp_checksum)?;
            buffer.prepend(&[extension_dispatch(Extension::Ipv6, false)]);
            Ok(Some(len))
        }
        Some(ext) => compress_extension(buffer, ext, src, dest, ctxt, omit_udp_checksum),
    }
}

/// Restores the LOWPAN_NHC encoded headers found at the start of `buffer`
///
/// `src` and `dest` are the addresses of the enclosing IPv6 header. Returns the 'Next Header'
/// value of the first restored header.
pub fn decompress(
    buffer: &mut Buffer,
    src: ipv6::Addr,
    dest: ipv6::Addr,
    ctxt: &Context,
) -> Result<NextHeader> {
    let byte = *buffer.as_slice().first().ok_or(Error::Truncated("NHC"))?;

    match dispatch::classify_nhc(byte) {
        NhcDispatch::Udp => decompress_udp(buffer, src, dest),
        NhcDispatch::Extension => {
            let eid = get!(byte, eid);

            match Extension::from_eid(eid) {
                None => Err(Error::UnknownExtension(eid)),
                Some(Extension::Mobility) => Err(Error::MobilityUnsupported),
                Some(Extension::Ipv6) => {
                    buffer.advance(1);
                    iphc::decompress(buffer, ctxt)?;
                    Ok(NextHeader::Ipv6)
                }
                Some(ext) => decompress_extension(buffer, ext, src, dest, ctxt),
            }
        }
        NhcDispatch::Unsupported => Err(Error::UnsupportedNhc(byte)),
    }
}

fn extension_dispatch(ext: Extension, nhc: bool) -> u8 {
    let mut byte = 0;
    set!(byte, ext_id, ext_id::VALUE);
    set!(byte, eid, ext.eid());
    set!(byte, nh, nhc as u8);
    byte
}

fn compress_udp(
    buffer: &mut Buffer,
    src: ipv6::Addr,
    dest: ipv6::Addr,
    omit_checksum: bool,
) -> Result<usize> {
    let mut scratch = [0; UDP_MAX_HEADER_SIZE];

    let len = {
        let udp = udp::Packet::parse(buffer.as_slice()).map_err(|_| Error::Truncated("UDP"))?;

        let checksum = if omit_checksum && udp.verify_ipv6_checksum(src, dest) {
            None
        } else {
            Some(udp.get_checksum())
        };

        let nhc = UdpPacket::new(&mut scratch[..], udp.get_source(), udp.get_destination(), checksum);
        trace!("compress: {:?}", nhc);
        nhc.header().len()
    };

    buffer.advance(usize(udp::HEADER_SIZE));
    buffer.prepend(&scratch[..len]);

    Ok(usize(udp::HEADER_SIZE))
}

fn decompress_udp(buffer: &mut Buffer, src: ipv6::Addr, dest: ipv6::Addr) -> Result<NextHeader> {
    let (len, source, destination, checksum) = {
        let nhc = UdpPacket::parse(buffer.as_slice()).map_err(|_| Error::Truncated("UDP NHC"))?;
        trace!("decompress: {:?}", nhc);

        (
            nhc.header().len(),
            nhc.get_source(),
            nhc.get_destination(),
            nhc.get_checksum(),
        )
    };

    buffer.advance(len);
    buffer.prepend(&[0; 8]);

    let mut udp = udp::Packet::new(buffer.as_mut_slice());
    udp.set_source(source);
    udp.set_destination(destination);
    match checksum {
        Some(cksum) => udp.set_checksum(cksum),
        None => udp.update_ipv6_checksum(src, dest),
    }

    Ok(NextHeader::Udp)
}

fn compress_extension(
    buffer: &mut Buffer,
    kind: Extension,
    src: ipv6::Addr,
    dest: ipv6::Addr,
    ctxt: &Context,
    omit_udp_checksum: bool,
) -> Result<Option<usize>> {
    let (len, next_header, blob) = {
        let header = ext::Header::parse(buffer.as_slice(), kind.next_header())
            .map_err(|_| Error::Truncated("extension"))?;

        if header.body().len() > MAX_BLOB_SIZE {
            debug!(
                "{:?} header too long ({} bytes); next header carried inline",
                kind,
                header.len()
            );
            return Ok(None);
        }

        (
            usize(header.len()),
            header.get_next_header(),
            header.body().to_vec(),
        )
    };

    buffer.advance(len);
    let next = compress(buffer, next_header, src, dest, ctxt, omit_udp_checksum)?;

    let mut nhc = Vec::with_capacity(3 + blob.len());
    nhc.push(extension_dispatch(kind, next.is_some()));
    if next.is_none() {
        nhc.push(next_header.into());
    }
    nhc.push(blob.len() as u8);
    nhc.extend_from_slice(&blob);
    trace!("compress: {:?}", ExtHeader::parse(&nhc[..]));

    buffer.prepend(&nhc);

    Ok(Some(len + next.unwrap_or(0)))
}

fn decompress_extension(
    buffer: &mut Buffer,
    kind: Extension,
    src: ipv6::Addr,
    dest: ipv6::Addr,
    ctxt: &Context,
) -> Result<NextHeader> {
    let (len, next_header, blob) = {
        let nhc = ExtHeader::parse(buffer.as_slice()).map_err(|_| Error::Truncated("NHC extension"))?;
        trace!("decompress: {:?}", nhc);

        (nhc.header().len(), nhc.get_next_header(), nhc.blob().to_vec())
    };

    buffer.advance(len);

    let next_header = match next_header {
        Some(nh) => nh,
        None => decompress(buffer, src, dest, ctxt)?,
    };

    let mut header = Vec::with_capacity(2 + blob.len() + 8);
    header.push(next_header.into());
    header.push(0);
    header.extend_from_slice(&blob);

    match kind {
        Extension::HopByHop | Extension::DestinationOptions => {
            ext::pad(&mut header);
            header[1] = (header.len() / 8 - 1) as u8;
        }
        Extension::Routing => {
            if header.len() % 8 != 0 {
                return Err(Error::Malformed("Routing"));
            }
            header[1] = (header.len() / 8 - 1) as u8;
        }
        _ => {
            if header.len() != usize(ext::FRAGMENT_HEADER_SIZE) {
                return Err(Error::Malformed("Fragment"));
            }
        }
    }

    buffer.prepend(&header);

    Ok(kind.next_header())
}
