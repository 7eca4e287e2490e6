//! LOWPAN_HC1 encoding
//!
//! ``` text
//!  0                   1                   2
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |0 1 0 0 0 0 1 0| SA| DA|C| NH|H|  Hop limit    | inline fields ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The inline fields follow the hop limit in this order: source prefix, source interface
//! identifier, destination prefix, destination interface identifier, traffic class + flow label
//! and next header. Each one is present only if its encoding bits say so.

use core::fmt;

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use log::trace;

use super::Context;
use crate::{
    buf::Buffer,
    error::{Error, Result},
    fmt::Binary,
    ipv6::{self, NextHeader},
    ll,
    traits::UncheckedIndex,
};

/* Header format */
const DISPATCH: usize = 0;
const ENCODING: usize = 1;
const HOP_LIMIT: usize = 2;
const INLINE: usize = 3;

/// Largest possible HC1 header
pub const MAX_HEADER_SIZE: usize = INLINE + 16 + 16 + 4 + 1;

bitfield!(sa: u8, offset = super::da::OFFSET + super::da::SIZE, size = 2);
bitfield!(da: u8, offset = super::c::OFFSET + super::c::SIZE, size = 2);
bitfield!(c: u8, offset = super::nh::OFFSET + super::nh::SIZE, size = 1);
bitfield!(nh: u8, offset = super::hc2::OFFSET + super::hc2::SIZE, size = 2);
bitfield!(hc2: u8, offset = 0, size = 1);

/* Address modes */
/// Prefix and interface identifier carried inline
const PI_II: u8 = 0b00;
/// Prefix inline, interface identifier derived from the link-layer address
const PI_IC: u8 = 0b01;
/// Link-local prefix, interface identifier inline
const PC_II: u8 = 0b10;
/// Link-local prefix, interface identifier derived from the link-layer address
const PC_IC: u8 = 0b11;

/* Next header encodings */
const NH_INLINE: u8 = 0b00;
const NH_UDP: u8 = 0b01;
const NH_ICMP: u8 = 0b10;
const NH_TCP: u8 = 0b11;

/// LOWPAN_HC1 compressed IPv6 packet
#[derive(Clone, Copy)]
pub struct Packet<BUFFER>
where
    BUFFER: AsSlice<Element = u8>,
{
    buffer: BUFFER,
    /// Index at which the payload starts
    payload: u8,
}

impl<B> Packet<B>
where
    B: AsSlice<Element = u8>,
{
    /* Constructors */
    /// Parses the bytes as a LOWPAN_HC1 compressed IPv6 packet
    ///
    /// HC2 encoded upper-layer headers are not supported and rejected
    pub fn parse(bytes: B) -> Result<Self, B> {
        let slice = bytes.as_slice();

        if slice.len() < INLINE || slice[DISPATCH] != super::dispatch::HC1 {
            return Err(bytes);
        }

        let header = Packet {
            buffer: slice,
            payload: 0,
        };

        if header.get_hc2() {
            return Err(bytes);
        }

        let len = header.traffic_class_start() + header.tf_size() + header.nh_size();

        if slice.len() < usize::from(len) {
            Err(bytes)
        } else {
            Ok(Packet {
                buffer: bytes,
                payload: len,
            })
        }
    }

    /* Accessors */
    /// Reads the 'Source address mode' field
    pub fn get_sa(&self) -> u8 {
        get!(self.as_slice()[ENCODING], sa)
    }

    /// Reads the 'Destination address mode' field
    pub fn get_da(&self) -> u8 {
        get!(self.as_slice()[ENCODING], da)
    }

    /// Reads the 'Traffic class and flow label zero' field
    pub fn get_c(&self) -> bool {
        get!(self.as_slice()[ENCODING], c) != 0
    }

    /// Reads the 'Next header' encoding field
    pub fn get_nh(&self) -> u8 {
        get!(self.as_slice()[ENCODING], nh)
    }

    /// Reads the 'HC2 encoding' field
    pub fn get_hc2(&self) -> bool {
        get!(self.as_slice()[ENCODING], hc2) != 0
    }

    /// Reads the 'Hop limit' field
    pub fn get_hop_limit(&self) -> u8 {
        unsafe { *self.as_slice().gu(HOP_LIMIT) }
    }

    /// Reads the 'Traffic class' field
    pub fn get_traffic_class(&self) -> u8 {
        if self.get_c() {
            0
        } else {
            unsafe { *self.as_slice().gu(usize::from(self.traffic_class_start())) }
        }
    }

    /// Reads the 'Flow label' field
    pub fn get_flow_label(&self) -> u32 {
        if self.get_c() {
            0
        } else {
            let start = usize::from(self.traffic_class_start()) + 1;
            NE::read_u24(unsafe { self.as_slice().r(start..start + 3) }) & 0x000f_ffff
        }
    }

    /// Reads the (potentially compressed) 'Next header' field
    pub fn get_next_header(&self) -> NextHeader {
        match self.get_nh() {
            NH_UDP => NextHeader::Udp,
            NH_ICMP => NextHeader::Ipv6Icmp,
            NH_TCP => NextHeader::Tcp,
            _ => {
                let start = self.traffic_class_start() + self.tf_size();
                NextHeader::from(unsafe { *self.as_slice().gu(usize::from(start)) })
            }
        }
    }

    /// Reads the (potentially compressed) 'Source address' field
    ///
    /// `ll_addr` is the source address of the frame that carried this packet
    pub fn get_source(&self, ll_addr: ll::Addr) -> ipv6::Addr {
        self.addr(self.get_sa(), INLINE, ll_addr)
    }

    /// Reads the (potentially compressed) 'Destination address' field
    ///
    /// `ll_addr` is the destination address of the frame that carried this packet
    pub fn get_destination(&self, ll_addr: ll::Addr) -> ipv6::Addr {
        let start = INLINE + usize::from(addr_size(self.get_sa()));
        self.addr(self.get_da(), start, ll_addr)
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
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn addr(&self, mode: u8, start: usize, ll_addr: ll::Addr) -> ipv6::Addr {
        let slice = self.as_slice();

        match mode {
            PI_II => {
                let mut bytes = [0; 16];
                bytes.copy_from_slice(unsafe { slice.r(start..start + 16) });
                ipv6::Addr(bytes)
            }
            PI_IC => {
                let mut prefix = [0; 8];
                prefix.copy_from_slice(unsafe { slice.r(start..start + 8) });
                ll_addr.global(prefix)
            }
            PC_II => {
                let mut bytes = [0; 16];
                bytes[..8].copy_from_slice(&ipv6::LINK_LOCAL_PREFIX);
                bytes[8..].copy_from_slice(unsafe { slice.r(start..start + 8) });
                ipv6::Addr(bytes)
            }
            _ => ll_addr.link_local(),
        }
    }

    fn traffic_class_start(&self) -> u8 {
        INLINE as u8 + addr_size(self.get_sa()) + addr_size(self.get_da())
    }

    fn tf_size(&self) -> u8 {
        if self.get_c() {
            0
        } else {
            4
        }
    }

    fn nh_size(&self) -> u8 {
        if self.get_nh() == NH_INLINE {
            1
        } else {
            0
        }
    }
}

impl<B> Packet<B>
where
    B: AsMutSlice<Element = u8>,
{
    /// Writes the HC1 encoding of the `ip` header into `buffer`
    ///
    /// # Panics
    ///
    /// This constructor panics if `buffer` is smaller than `MAX_HEADER_SIZE`
    pub fn new<I>(mut buffer: B, ip: &ipv6::Packet<I>, ctxt: &Context) -> Self
    where
        I: AsSlice<Element = u8>,
    {
        assert!(buffer.as_slice().len() >= MAX_HEADER_SIZE);

        let src = ip.get_source();
        let dest = ip.get_destination();
        let sa = address_mode(src, ctxt.source);
        let da = address_mode(dest, ctxt.destination);

        let tc = ip.get_traffic_class();
        let fl = ip.get_flow_label();

        let nh = match ip.get_next_header() {
            NextHeader::Udp => NH_UDP,
            NextHeader::Ipv6Icmp => NH_ICMP,
            NextHeader::Tcp => NH_TCP,
            _ => NH_INLINE,
        };

        {
            let bytes = buffer.as_mut_slice();
            bytes[DISPATCH] = super::dispatch::HC1;
            bytes[ENCODING] = 0;
            set!(bytes[ENCODING], sa, sa);
            set!(bytes[ENCODING], da, da);
            set!(bytes[ENCODING], c, (tc == 0 && fl == 0) as u8);
            set!(bytes[ENCODING], nh, nh);
            bytes[HOP_LIMIT] = ip.get_hop_limit();
        }

        let mut idx = INLINE;
        let bytes = buffer.as_mut_slice();
        for (mode, addr) in [(sa, src), (da, dest)].iter() {
            match *mode {
                PI_II => {
                    bytes[idx..idx + 16].copy_from_slice(&addr.0);
                    idx += 16;
                }
                PI_IC => {
                    bytes[idx..idx + 8].copy_from_slice(&addr.prefix());
                    idx += 8;
                }
                PC_II => {
                    bytes[idx..idx + 8].copy_from_slice(&addr.interface_id());
                    idx += 8;
                }
                _ => {}
            }
        }

        if tc != 0 || fl != 0 {
            bytes[idx] = tc;
            NE::write_u24(&mut bytes[idx + 1..idx + 4], fl & 0x000f_ffff);
            idx += 4;
        }

        if nh == NH_INLINE {
            bytes[idx] = ip.get_next_header().into();
            idx += 1;
        }

        Packet {
            buffer,
            payload: idx as u8,
        }
    }
}

impl<B> fmt::Debug for Packet<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("hc1::Packet")
            .field("sa", &Binary(self.get_sa()))
            .field("da", &Binary(self.get_da()))
            .field("c", &(self.get_c() as u8))
            .field("nh", &Binary(self.get_nh()))
            .field("hop_limit", &self.get_hop_limit())
            .field("traffic_class", &self.get_traffic_class())
            .field("flow_label", &self.get_flow_label())
            .field("next_header", &self.get_next_header())
            .finish()
    }
}

/// Compresses the IPv6 header at the start of `buffer` using LOWPAN_HC1
///
/// Returns the size of the uncompressed header. Upper-layer headers are left untouched.
pub fn compress(buffer: &mut Buffer, ctxt: &Context) -> Result<usize> {
    let header = super::ipv6_header(buffer)?;
    let ip = ipv6::Packet::parse(&header[..]).map_err(|_| Error::NotIpv6)?;

    let mut scratch = [0; MAX_HEADER_SIZE];
    let hc1 = Packet::new(&mut scratch[..], &ip, ctxt);
    trace!("compress: {:?}", hc1);

    buffer.advance(header.len());
    buffer.prepend(hc1.header());

    Ok(header.len())
}

/// Restores the IPv6 header of the LOWPAN_HC1 packet found at the start of `buffer`
pub fn decompress(buffer: &mut Buffer, ctxt: &Context) -> Result<()> {
    let (len, header) = {
        let hc1 = Packet::parse(buffer.as_slice()).map_err(parse_error)?;
        trace!("decompress: {:?}", hc1);

        let plen = cast::u16(hc1.payload().len()).map_err(|_| Error::Malformed("HC1"))?;

        let mut header = [0; 40];
        let mut ip = ipv6::Packet::new(&mut header[..]);
        ip.set_traffic_class(hc1.get_traffic_class());
        ip.set_flow_label(hc1.get_flow_label());
        ip.set_length(plen);
        ip.set_next_header(hc1.get_next_header());
        ip.set_hop_limit(hc1.get_hop_limit());
        ip.set_source(hc1.get_source(ctxt.source));
        ip.set_destination(hc1.get_destination(ctxt.destination));

        (hc1.header().len(), header)
    };

    buffer.advance(len);
    buffer.prepend(&header);

    Ok(())
}

fn parse_error(bytes: &[u8]) -> Error {
    if bytes.len() > ENCODING && bytes[DISPATCH] == super::dispatch::HC1 {
        if get!(bytes[ENCODING], hc2) != 0 {
            return Error::Hc2Unsupported;
        }
    } else if !bytes.is_empty() && bytes[DISPATCH] != super::dispatch::HC1 {
        return Error::UnsupportedDispatch(bytes[DISPATCH]);
    }

    Error::Truncated("HC1")
}

fn address_mode(addr: ipv6::Addr, ll_addr: ll::Addr) -> u8 {
    match (addr.is_link_local(), addr.interface_id() == ll_addr.interface_id()) {
        (true, true) => PC_IC,
        (true, false) => PC_II,
        (false, true) => PI_IC,
        (false, false) => PI_II,
    }
}

fn addr_size(mode: u8) -> u8 {
    match mode {
        PI_II => 16,
        PI_IC | PC_II => 8,
        _ => 0,
    }
}
