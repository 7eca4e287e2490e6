//! IPv6: Internet Protocol v6
//!
//! # References
//!
//! - [RFC 8200 Internet Protocol, Version 6 (IPv6) Specification][0]
//!
//! [0]: https://tools.ietf.org/html/rfc8200
//!
//! - [RFC 4291 IP Version 6 Addressing Architecture][1]
//!
//! [1]: https://tools.ietf.org/html/rfc4291

use core::{
    fmt,
    ops::{Range, RangeFrom, RangeTo},
};

use as_slice::{AsMutSlice, AsSlice};
use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::{u32, usize};

use crate::{fmt::Quoted, traits::UncheckedIndex};

pub mod ext;

/* Packet structure */
const V: usize = 0;
bitfield!(v: u8, offset = 4, size = 4);

const TC: RangeTo<usize> = ..2;
bitfield!(tc: u16, offset = 4, size = 8);

const FLH: usize = 1;
const FLL: Range<usize> = 2..4;

const LENGTH: Range<usize> = 4..6;
const NEXT_HEADER: usize = 6;
const HOP_LIMIT: usize = 7;
const SOURCE: Range<usize> = 8..24;
const DESTINATION: Range<usize> = 24..40;
const PAYLOAD: RangeFrom<usize> = 40..;

/// Fixed header size, in bytes
pub const HEADER_SIZE: u8 = DESTINATION.end as u8;

/// Link-local prefix: `fe80::/64`
pub const LINK_LOCAL_PREFIX: [u8; 8] = [0xfe, 0x80, 0, 0, 0, 0, 0, 0];

/// IPv6 packet
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
    /// Parses bytes into an IPv6 packet
    ///
    /// NOTE the 'Payload length' field is not checked against the length of `bytes`
    pub fn parse(bytes: B) -> Result<Self, B> {
        if bytes.as_slice().len() < usize(HEADER_SIZE) {
            // smaller than header
            return Err(bytes);
        }

        let p = Packet { buffer: bytes };

        if get!(p.header()[V], v) != 6 {
            // version is not `6`
            return Err(p.buffer);
        }

        Ok(p)
    }

    /* Accessors */
    /// Reads the 'Version' field
    ///
    /// This always returns `6`
    pub fn get_version(&self) -> u8 {
        debug_assert_eq!(get!(self.header()[V], v), 6);

        6
    }

    /// Reads the 'Traffic Class' field
    pub fn get_traffic_class(&self) -> u8 {
        get!(NE::read_u16(&self.header()[TC]), tc) as u8
    }

    /// Reads the 'Flow Label' field (20 bits)
    pub fn get_flow_label(&self) -> u32 {
        let mask = (1 << 4) - 1;

        (u32(self.header()[FLH]) & mask) << 16 | u32(NE::read_u16(&self.header()[FLL]))
    }

    /// Reads the 'Payload length' field
    pub fn get_length(&self) -> u16 {
        NE::read_u16(&self.header()[LENGTH])
    }

    /// Reads the 'Next Header' field
    pub fn get_next_header(&self) -> NextHeader {
        self.header()[NEXT_HEADER].into()
    }

    /// Reads the 'Hop Limit' field
    pub fn get_hop_limit(&self) -> u8 {
        self.header()[HOP_LIMIT]
    }

    /// Reads the 'Source Address' field
    pub fn get_source(&self) -> Addr {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(&self.header()[SOURCE]);
        Addr(bytes)
    }

    /// Reads the 'Destination Address' field
    pub fn get_destination(&self) -> Addr {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(&self.header()[DESTINATION]);
        Addr(bytes)
    }

    /// Immutable view into the fixed header
    pub fn header(&self) -> &[u8] {
        unsafe { self.as_slice().rt(..usize(HEADER_SIZE)) }
    }

    /// Immutable view into the payload (extension headers included)
    pub fn payload(&self) -> &[u8] {
        unsafe { self.as_slice().rf(PAYLOAD) }
    }

    /// Returns the byte representation of this packet
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
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
    /// Transforms the given buffer into an IPv6 packet
    ///
    /// Most of the header will be filled with sensible defaults:
    ///
    /// - Version = 6
    /// - Traffic class = 0
    /// - Flow label = 0
    /// - Length = buffer.len() - HEADER_SIZE (saturated to `u16::MAX`)
    /// - Next header = No next header
    /// - Hop limit = 255
    /// - Source & destination = unspecified
    ///
    /// # Panics
    ///
    /// This constructor panics if the given `buffer` is smaller than `HEADER_SIZE`
    pub fn new(buffer: B) -> Self {
        let blen = buffer.as_slice().len();
        assert!(blen >= usize(HEADER_SIZE));

        let mut p = Packet { buffer };

        p.header_mut()[0] = 0;
        p.set_version();
        p.set_traffic_class(0);
        p.set_flow_label(0);
        p.set_length(cast::u16(blen - usize(HEADER_SIZE)).unwrap_or(u16::MAX));
        p.set_next_header(NextHeader::NoNextHeader);
        p.set_hop_limit(255);
        p.set_source(Addr::UNSPECIFIED);
        p.set_destination(Addr::UNSPECIFIED);

        p
    }

    /// Sets the 'Traffic class' field
    pub fn set_traffic_class(&mut self, tc: u8) {
        let mask = (1 << 4) - 1;

        // low nibble
        let tcl = &mut self.header_mut()[1];
        *tcl &= !(mask << 4);
        *tcl |= (tc & mask) << 4;

        // high nibble
        let tch = &mut self.header_mut()[0];
        *tch &= !mask;
        *tch |= tc >> 4;
    }

    /// Sets the 'Flow label' field
    pub fn set_flow_label(&mut self, fl: u32) {
        // low half-word
        NE::write_u16(&mut self.header_mut()[FLL], fl as u16);

        // high nibble
        let mask = (1 << 4) - 1;
        let flh = &mut self.header_mut()[FLH];
        *flh &= !mask;
        *flh |= (fl >> 16) as u8 & mask;
    }

    /// Sets the 'Payload length' field
    ///
    /// NOTE this does *not* resize the buffer
    pub fn set_length(&mut self, len: u16) {
        NE::write_u16(&mut self.header_mut()[LENGTH], len);
    }

    /// Sets the 'Next Header' field
    pub fn set_next_header(&mut self, nh: NextHeader) {
        self.header_mut()[NEXT_HEADER] = nh.into();
    }

    /// Sets the 'Hop limit' field
    pub fn set_hop_limit(&mut self, hl: u8) {
        self.header_mut()[HOP_LIMIT] = hl;
    }

    /// Sets the 'Source address' field
    pub fn set_source(&mut self, addr: Addr) {
        self.header_mut()[SOURCE].copy_from_slice(&addr.0)
    }

    /// Sets the 'Destination address' field
    pub fn set_destination(&mut self, addr: Addr) {
        self.header_mut()[DESTINATION].copy_from_slice(&addr.0)
    }

    /* Private */
    fn header_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut_slice()[..usize(HEADER_SIZE)]
    }

    fn set_version(&mut self) {
        set!(self.header_mut()[V], v, 6);
    }
}

impl<B> fmt::Debug for Packet<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ipv6::Packet")
            .field("version", &self.get_version())
            .field("traffic_class", &self.get_traffic_class())
            .field("flow_label", &self.get_flow_label())
            .field("length", &self.get_length())
            .field("next_header", &self.get_next_header())
            .field("hop_limit", &self.get_hop_limit())
            .field("source", &Quoted(self.get_source()))
            .field("destination", &Quoted(self.get_destination()))
            // .field("payload", &self.payload())
            .finish()
    }
}

full_range!(
    u8,
    /// IPv6 'Next Header' field values
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum NextHeader {
        /// Hop-by-Hop Options
        HopByHop = 0,
        /// TCP
        Tcp = 6,
        /// UDP
        Udp = 17,
        /// IPv6 encapsulation
        Ipv6 = 41,
        /// Routing header
        Routing = 43,
        /// Fragment header
        Fragment = 44,
        /// ICMPv6
        Ipv6Icmp = 58,
        /// No next header
        NoNextHeader = 59,
        /// Destination Options
        DestinationOptions = 60,
        /// Mobility header
        Mobility = 135,
    }
);

impl NextHeader {
    /// Is this an IPv6 extension header?
    pub fn is_ipv6_extension_header(&self) -> bool {
        match *self {
            NextHeader::HopByHop
            | NextHeader::Routing
            | NextHeader::Fragment
            | NextHeader::DestinationOptions
            | NextHeader::Mobility => true,
            _ => false,
        }
    }
}

/// IPv6 address
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Addr(pub [u8; 16]);

impl Addr {
    // Section 2.5.2
    /// Unspecified address
    pub const UNSPECIFIED: Self = Addr([0; 16]);

    /// All link-local nodes multicast address
    pub const ALL_NODES: Self = Addr([0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);

    /// All link-local routers multicast address
    pub const ALL_ROUTERS: Self = Addr([0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]);

    // Section 2.5.6
    /// Is this a link local address?
    pub fn is_link_local(&self) -> bool {
        self.0[..8] == LINK_LOCAL_PREFIX
    }

    // Section 2.7
    /// Is this a multicast address?
    pub fn is_multicast(&self) -> bool {
        self.0[0] == 0xff
    }

    /// Is this the unspecified address?
    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// Returns the /64 prefix of the address
    pub fn prefix(&self) -> [u8; 8] {
        let mut prefix = [0; 8];
        prefix.copy_from_slice(&self.0[..8]);
        prefix
    }

    /// Returns the interface identifier (lower 64 bits) of the address
    pub fn interface_id(&self) -> [u8; 8] {
        let mut iid = [0; 8];
        iid.copy_from_slice(&self.0[8..]);
        iid
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut is_first = true;

        for chunk in self.0.chunks(2) {
            if is_first {
                is_first = false;
            } else {
                f.write_str(":")?;
            }

            write!(f, "{:x}", NE::read_u16(chunk))?;
        }

        Ok(())
    }
}
