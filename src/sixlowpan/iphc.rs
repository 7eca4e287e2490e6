//! LOWPAN_IPHC encoding
//!
//! ``` text
//!   0                                       1
//!   0   1   2   3   4   5   6   7   8   9   0   1   2   3   4   5
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! | 0 | 1 | 1 |  TF   |NH | HLIM  |CID|SAC|  SAM  | M |DAC|  DAM  |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! ```
//!
//! Only stateless compression is supported: context identifiers, stateful source compression and
//! stateful destination compression are rejected.

use core::fmt;

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use log::trace;

use super::{nhc, Context};
use crate::{
    buf::Buffer,
    error::{Error, Result},
    fmt::{Binary, Quoted},
    ipv6, ll,
    traits::UncheckedIndex,
};

/* Header format */
const IPHC0: usize = 0;

bitfield!(dispatch: u8, offset = super::tf::OFFSET + super::tf::SIZE, size = 3, value = 0b011);
bitfield!(tf: u8, offset = super::nh::OFFSET + super::nh::SIZE, size = 2);
bitfield!(nh: u8, offset = super::hlim::OFFSET + super::hlim::SIZE, size = 1);
bitfield!(hlim: u8, offset = 0, size = 2);

const IPHC1: usize = 1;

bitfield!(cid: u8, offset = super::sac::OFFSET + super::sac::SIZE, size = 1);
bitfield!(sac: u8, offset = super::sam::OFFSET + super::sam::SIZE, size = 1);
bitfield!(sam: u8, offset = super::m::OFFSET + super::m::SIZE, size = 2);
bitfield!(m: u8, offset = super::dac::OFFSET + super::dac::SIZE, size = 1);
bitfield!(dac: u8, offset = super::dam::OFFSET + super::dam::SIZE, size = 1);
bitfield!(dam: u8, offset = 0, size = 2);

/// Largest IPHC header this implementation produces
pub const MAX_HEADER_SIZE: usize = 2 + 4 + 1 + 1 + 16 + 16;

/// `fe80::00ff:fe00:XXXX`: 16-bit short address mapped into an interface identifier
const SHORT_IID: [u8; 6] = [0, 0, 0, 0xff, 0xfe, 0];

/// LOWPAN_IPHC compressed IPv6 packet
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
    /// Parses the bytes as a LOWPAN_IPHC compressed IPv6 packet
    ///
    /// # Notes
    ///
    /// The following field values are not supported and treated as errors
    ///
    /// - CID = 1
    /// - SAC = 1 && SAM != 0
    /// - DAC = 1
    pub fn parse(bytes: B) -> Result<Self, B> {
        match check(bytes.as_slice()) {
            Ok(len) => Ok(Packet {
                buffer: bytes,
                payload: len,
            }),
            Err(_) => Err(bytes),
        }
    }

    /* Accessors */
    /// Reads the (potentially compressed) 'Traffic class' field
    pub fn get_traffic_class(&self) -> u8 {
        let start = usize::from(self.ip_fields_start());
        let ecn_dscp = || unsafe { *self.as_slice().gu(start) };

        let (ecn, dscp) = match self.get_tf() {
            0b00 | 0b10 => (ecn_dscp() >> 6, ecn_dscp() & 0x3f),
            0b01 => (ecn_dscp() >> 6, 0),
            _ => (0, 0),
        };

        dscp << 2 | ecn
    }

    /// Reads the (potentially compressed) 'Flow label' field
    pub fn get_flow_label(&self) -> u32 {
        let start = usize::from(self.ip_fields_start());
        let slice = self.as_slice();

        match self.get_tf() {
            // ECN + DSCP + 4-bit pad + flow label
            0b00 => NE::read_u24(unsafe { slice.r(start + 1..start + 4) }) & 0x000f_ffff,
            // ECN + 2-bit pad + flow label
            0b01 => NE::read_u24(unsafe { slice.r(start..start + 3) }) & 0x000f_ffff,
            _ => 0,
        }
    }

    /// Reads the 'Next header' field
    ///
    /// **NOTE**: This returns `None` if the next header is encoded using the LOWPAN_NHC format. In
    /// that case the slice returned by `payload` starts with a LOWPAN_NHC encoding and *must* be
    /// decoded using the `nhc` module
    pub fn get_next_header(&self) -> Option<ipv6::NextHeader> {
        if self.get_nh() {
            None
        } else {
            let start = self.ip_fields_start() + self.tf_size();

            Some(ipv6::NextHeader::from(unsafe {
                *self.as_slice().gu(usize::from(start))
            }))
        }
    }

    /// Reads the (potentially compressed) 'Hop limit' field
    pub fn get_hop_limit(&self) -> u8 {
        match self.get_hlim() {
            0b00 => {
                let start = self.ip_fields_start() + self.tf_size() + self.nh_size();

                unsafe { *self.as_slice().gu(usize::from(start)) }
            }
            0b01 => 1,
            0b10 => 64,
            _ => 255,
        }
    }

    /// Reads the (potentially compressed) 'Source Address' field
    pub fn get_source(&self) -> Addr {
        let start = usize::from(
            self.ip_fields_start() + self.tf_size() + self.nh_size() + self.hlim_size(),
        );

        if self.get_sac() {
            // `parse` rejects SAM != 0 when SAC = 1
            Addr::Complete(ipv6::Addr::UNSPECIFIED)
        } else {
            self.unicast(self.get_sam(), start)
        }
    }

    /// Reads the (potentially compressed) 'Destination Address' field
    pub fn get_destination(&self) -> Addr {
        let start = usize::from(
            self.ip_fields_start()
                + self.tf_size()
                + self.nh_size()
                + self.hlim_size()
                + self.src_addr_size(),
        );

        if !self.get_m() {
            return self.unicast(self.get_dam(), start);
        }

        let slice = self.as_slice();
        let mut bytes = [0; 16];
        bytes[0] = 0xff;

        match self.get_dam() {
            0b00 => bytes.copy_from_slice(unsafe { slice.r(start..start + 16) }),
            0b01 => {
                // ffXX::00XX:XXXX:XXXX
                bytes[1] = unsafe { *slice.gu(start) };
                bytes[11..].copy_from_slice(unsafe { slice.r(start + 1..start + 6) });
            }
            0b10 => {
                // ffXX::00XX:XXXX
                bytes[1] = unsafe { *slice.gu(start) };
                bytes[13..].copy_from_slice(unsafe { slice.r(start + 1..start + 4) });
            }
            _ => {
                // ff02::00XX
                bytes[1] = 0x02;
                bytes[15] = unsafe { *slice.gu(start) };
            }
        }

        Addr::Complete(ipv6::Addr(bytes))
    }

    /// Immutable view into the header
    pub fn header(&self) -> &[u8] {
        unsafe { self.as_slice().rt(..usize::from(self.payload)) }
    }

    /// Immutable view into the payload
    pub fn payload(&self) -> &[u8] {
        unsafe { self.as_slice().rf(usize::from(self.payload)..) }
    }

    /// Byte representation of this packet
    pub fn bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /// Reads the 'Traffic class, Flow label' field
    pub fn get_tf(&self) -> u8 {
        get!(self.header_()[IPHC0], tf)
    }

    /// Reads the 'Next Header' field
    pub fn get_nh(&self) -> bool {
        get!(self.header_()[IPHC0], nh) != 0
    }

    /// Reads the 'Hop Limit' field
    pub fn get_hlim(&self) -> u8 {
        get!(self.header_()[IPHC0], hlim)
    }

    /// Reads the 'Context IDentifier extension' field
    pub fn get_cid(&self) -> bool {
        get!(self.header_()[IPHC1], cid) != 0
    }

    /// Reads the 'Source Address Compression' field
    pub fn get_sac(&self) -> bool {
        get!(self.header_()[IPHC1], sac) != 0
    }

    /// Reads the 'Source Address Mode' field
    pub fn get_sam(&self) -> u8 {
        get!(self.header_()[IPHC1], sam)
    }

    /// Reads the 'Multicast compression' field
    pub fn get_m(&self) -> bool {
        get!(self.header_()[IPHC1], m) != 0
    }

    /// Reads the 'Destination Address Compression' field
    pub fn get_dac(&self) -> bool {
        get!(self.header_()[IPHC1], dac) != 0
    }

    /// Reads the 'Destination Address Mode' IPHC field
    pub fn get_dam(&self) -> u8 {
        get!(self.header_()[IPHC1], dam)
    }

    /* Private */
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn header_(&self) -> &[u8] {
        unsafe { self.as_slice().rt(..2) }
    }

    fn get_dispatch(&self) -> u8 {
        get!(self.header_()[IPHC0], dispatch)
    }

    fn unicast(&self, mode: u8, start: usize) -> Addr {
        let slice = self.as_slice();
        let mut bytes = [0; 16];

        match mode {
            0b00 => bytes.copy_from_slice(unsafe { slice.r(start..start + 16) }),
            0b01 => {
                bytes[..8].copy_from_slice(&ipv6::LINK_LOCAL_PREFIX);
                bytes[8..].copy_from_slice(unsafe { slice.r(start..start + 8) });
            }
            0b10 => {
                bytes[..8].copy_from_slice(&ipv6::LINK_LOCAL_PREFIX);
                bytes[8..14].copy_from_slice(&SHORT_IID);
                bytes[14..].copy_from_slice(unsafe { slice.r(start..start + 2) });
            }
            _ => return Addr::Elided(ElidedAddr { _0: () }),
        }

        Addr::Complete(ipv6::Addr(bytes))
    }

    fn cid_size(&self) -> u8 {
        if self.get_cid() {
            1
        } else {
            0
        }
    }

    fn ip_fields_start(&self) -> u8 {
        2 + self.cid_size()
    }

    fn tf_size(&self) -> u8 {
        match self.get_tf() {
            0b00 => 4,
            0b01 => 3,
            0b10 => 1,
            _ => 0,
        }
    }

    fn nh_size(&self) -> u8 {
        if self.get_nh() {
            0
        } else {
            1
        }
    }

    fn hlim_size(&self) -> u8 {
        if self.get_hlim() == 0b00 {
            1
        } else {
            0
        }
    }

    fn src_addr_size(&self) -> u8 {
        match (self.get_sac(), self.get_sam()) {
            (true, 0b00) => 0,
            (_, 0b00) => 16,
            (_, 0b01) => 8,
            (_, 0b10) => 2,
            _ => 0,
        }
    }

    fn dest_addr_size(&self) -> Result<u8> {
        let (m, dac, dam) = (self.get_m(), self.get_dac(), self.get_dam());

        Ok(match (m, dac, dam) {
            (false, false, 0b00) => 16,
            (false, _, 0b01) => 8,
            (false, _, 0b10) => 2,
            (false, _, 0b11) => 0,

            (true, false, 0b00) => 16,
            (true, false, 0b01) => 6,
            (true, false, 0b10) => 4,
            (true, false, 0b11) => 1,

            (true, true, 0b00) => 6,

            _ => return Err(Error::ReservedAddressMode { m, dac, dam }),
        })
    }
}

/// Validates an IPHC header; returns its size
fn check(bytes: &[u8]) -> Result<u8> {
    if bytes.len() < 2 {
        return Err(Error::Truncated("IPHC"));
    }

    let header = Packet {
        buffer: bytes,
        payload: 0,
    };

    if header.get_dispatch() != dispatch::VALUE {
        return Err(Error::UnsupportedDispatch(bytes[IPHC0]));
    }

    let dest_addr_size = header.dest_addr_size()?;

    // stateless compression only
    if header.get_cid() || (header.get_sac() && header.get_sam() != 0b00) || header.get_dac() {
        return Err(Error::ContextUnsupported);
    }

    let len = header.ip_fields_start()
        + header.tf_size()
        + header.nh_size()
        + header.hlim_size()
        + header.src_addr_size()
        + dest_addr_size;

    if bytes.len() < usize::from(len) {
        Err(Error::Truncated("IPHC"))
    } else {
        Ok(len)
    }
}

impl<B> Packet<B>
where
    B: AsMutSlice<Element = u8>,
{
    /// Writes the IPHC encoding of the `ip` header into `buffer`
    ///
    /// `nhc` indicates whether the next header will be LOWPAN_NHC encoded
    ///
    /// # Panics
    ///
    /// This constructor panics if `buffer` is smaller than `MAX_HEADER_SIZE`
    pub fn new<I>(buffer: B, ip: &ipv6::Packet<I>, nhc: bool, ctxt: &Context) -> Self
    where
        I: AsSlice<Element = u8>,
    {
        assert!(buffer.as_slice().len() >= MAX_HEADER_SIZE);

        let mut packet = Packet { buffer, payload: 0 };

        // DISPATCH
        packet.as_mut_slice()[IPHC0] = dispatch::VALUE << dispatch::OFFSET;
        packet.as_mut_slice()[IPHC1] = 0;

        let mut idx = 2;

        let tc = ip.get_traffic_class();
        let fl = ip.get_flow_label() & 0x000f_ffff;
        let (ecn, dscp) = (tc & 0b11, tc >> 2);

        if fl == 0 && tc == 0 {
            packet.set_tf(0b11);
        } else if fl == 0 {
            packet.set_tf(0b10);
            packet.push(&mut idx, &[ecn << 6 | dscp]);
        } else if dscp == 0 {
            packet.set_tf(0b01);
            let mut tf = [0; 3];
            NE::write_u24(&mut tf, fl);
            tf[0] |= ecn << 6;
            packet.push(&mut idx, &tf);
        } else {
            packet.set_tf(0b00);
            let mut tf = [0; 4];
            tf[0] = ecn << 6 | dscp;
            NE::write_u24(&mut tf[1..], fl);
            packet.push(&mut idx, &tf);
        }

        if nhc {
            packet.set_nh(1);
        } else {
            packet.push(&mut idx, &[ip.get_next_header().into()]);
        }

        match ip.get_hop_limit() {
            1 => packet.set_hlim(0b01),
            64 => packet.set_hlim(0b10),
            255 => packet.set_hlim(0b11),
            hop_limit => packet.push(&mut idx, &[hop_limit]),
        }

        let src = ip.get_source();
        if src.is_unspecified() {
            packet.set_sac(1);
        } else {
            let sam = packet.push_unicast(&mut idx, src, ctxt.source);
            packet.set_sam(sam);
        }

        let dest = ip.get_destination();
        if dest.is_multicast() {
            packet.set_m(1);

            if dest.0[1] == 0x02 && dest.0[2..15] == [0; 13] {
                packet.set_dam(0b11);
                packet.push(&mut idx, &dest.0[15..]);
            } else if dest.0[2..13] == [0; 11] {
                packet.set_dam(0b10);
                packet.push(&mut idx, &dest.0[1..2]);
                packet.push(&mut idx, &dest.0[13..]);
            } else if dest.0[2..11] == [0; 9] {
                packet.set_dam(0b01);
                packet.push(&mut idx, &dest.0[1..2]);
                packet.push(&mut idx, &dest.0[11..]);
            } else {
                packet.set_dam(0b00);
                packet.push(&mut idx, &dest.0);
            }
        } else {
            let dam = packet.push_unicast(&mut idx, dest, ctxt.destination);
            packet.set_dam(dam);
        }

        packet.payload = idx as u8;
        packet
    }

    /* Private */
    /// Appends inline fields
    fn push(&mut self, idx: &mut usize, bytes: &[u8]) {
        let end = *idx + bytes.len();
        self.as_mut_slice()[*idx..end].copy_from_slice(bytes);
        *idx = end;
    }

    /// Appends as few bytes of the unicast `addr` as possible; returns the address mode
    fn push_unicast(&mut self, idx: &mut usize, addr: ipv6::Addr, ll_addr: ll::Addr) -> u8 {
        if addr == ll_addr.link_local() {
            0b11
        } else if addr.is_link_local() && addr.0[8..14] == SHORT_IID {
            self.push(idx, &addr.0[14..]);
            0b10
        } else if addr.is_link_local() {
            self.push(idx, &addr.0[8..]);
            0b01
        } else {
            self.push(idx, &addr.0);
            0b00
        }
    }

    fn set_tf(&mut self, tf: u8) {
        set!(self.as_mut_slice()[IPHC0], tf, tf);
    }

    fn set_nh(&mut self, nh: u8) {
        set!(self.as_mut_slice()[IPHC0], nh, nh);
    }

    fn set_hlim(&mut self, hlim: u8) {
        set!(self.as_mut_slice()[IPHC0], hlim, hlim);
    }

    fn set_sac(&mut self, sac: u8) {
        set!(self.as_mut_slice()[IPHC1], sac, sac);
    }

    fn set_sam(&mut self, sam: u8) {
        set!(self.as_mut_slice()[IPHC1], sam, sam);
    }

    fn set_m(&mut self, m: u8) {
        set!(self.as_mut_slice()[IPHC1], m, m);
    }

    fn set_dam(&mut self, dam: u8) {
        set!(self.as_mut_slice()[IPHC1], dam, dam);
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }
}

impl<B> fmt::Debug for Packet<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("iphc::Packet");
        s.field("tf", &Binary(self.get_tf()))
            .field("nh", &(self.get_nh() as u8))
            .field("hlim", &Binary(self.get_hlim()))
            .field("cid", &(self.get_cid() as u8))
            .field("sac", &(self.get_sac() as u8))
            .field("sam", &Binary(self.get_sam()))
            .field("m", &(self.get_m() as u8))
            .field("dac", &(self.get_dac() as u8))
            .field("dam", &Binary(self.get_dam()))
            .field("next_header", &self.get_next_header())
            .field("hop_limit", &self.get_hop_limit());

        match self.get_source() {
            Addr::Complete(addr) => {
                s.field("source", &Quoted(addr));
            }
            Addr::Elided(ea) => {
                s.field("source", &Quoted(ea));
            }
        }

        match self.get_destination() {
            Addr::Complete(addr) => {
                s.field("destination", &Quoted(addr));
            }
            Addr::Elided(ea) => {
                s.field("destination", &Quoted(ea));
            }
        }

        s.finish()
    }
}

/// Maybe IPHC compressed address
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Addr {
    /// Complete address
    Complete(ipv6::Addr),
    /// Elided address
    Elided(ElidedAddr),
}

impl Addr {
    /// Completes the address, if elided, using link-layer information
    pub fn complete(self, ll_addr: ll::Addr) -> ipv6::Addr {
        match self {
            Addr::Complete(addr) => addr,
            Addr::Elided(ea) => ea.complete(ll_addr),
        }
    }
}

/// Fully elided IPv6 address
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ElidedAddr {
    _0: (),
}

impl fmt::Display for ElidedAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fe80::X:X:X:X")
    }
}

impl ElidedAddr {
    /// Complete this elided address using Link-layer information
    pub fn complete<A>(self, ll_addr: A) -> ipv6::Addr
    where
        A: Into<ll::Addr>,
    {
        ll_addr.into().link_local()
    }
}

/// Compresses the IPv6 header at the start of `buffer`, and the headers that follow it when they
/// can be LOWPAN_NHC encoded
///
/// Returns the number of bytes of uncompressed headers that were replaced.
pub fn compress(buffer: &mut Buffer, ctxt: &Context, omit_udp_checksum: bool) -> Result<usize> {
    let header = super::ipv6_header(buffer)?;
    let ip = ipv6::Packet::parse(&header[..]).map_err(|_| Error::NotIpv6)?;
    buffer.advance(header.len());

    let next = nhc::compress(
        buffer,
        ip.get_next_header(),
        ip.get_source(),
        ip.get_destination(),
        ctxt,
        omit_udp_checksum,
    )?;

    let mut scratch = [0; MAX_HEADER_SIZE];
    let iphc = Packet::new(&mut scratch[..], &ip, next.is_some(), ctxt);
    trace!("compress: {:?}", iphc);

    buffer.prepend(iphc.header());

    Ok(header.len() + next.unwrap_or(0))
}

/// Restores the IPv6 header (and the LOWPAN_NHC encoded headers that follow it) of the
/// LOWPAN_IPHC packet found at the start of `buffer`
pub fn decompress(buffer: &mut Buffer, ctxt: &Context) -> Result<()> {
    let (len, tc, fl, next_header, hop_limit, src, dest) = {
        let len = check(buffer.as_slice())?;
        let iphc = Packet {
            buffer: buffer.as_slice(),
            payload: len,
        };
        trace!("decompress: {:?}", iphc);

        (
            len,
            iphc.get_traffic_class(),
            iphc.get_flow_label(),
            iphc.get_next_header(),
            iphc.get_hop_limit(),
            iphc.get_source().complete(ctxt.source),
            iphc.get_destination().complete(ctxt.destination),
        )
    };

    buffer.advance(usize::from(len));

    let next_header = match next_header {
        Some(nh) => nh,
        None => nhc::decompress(buffer, src, dest, ctxt)?,
    };

    let plen = cast::u16(buffer.len()).map_err(|_| Error::Malformed("IPv6"))?;

    let mut header = [0; 40];
    let mut ip = ipv6::Packet::new(&mut header[..]);
    ip.set_traffic_class(tc);
    ip.set_flow_label(fl);
    ip.set_length(plen);
    ip.set_next_header(next_header);
    ip.set_hop_limit(hop_limit);
    ip.set_source(src);
    ip.set_destination(dest);

    buffer.prepend(&header);

    Ok(())
}
