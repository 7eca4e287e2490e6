//! IPv6 extension headers
//!
//! Hop-by-Hop Options, Routing, Fragment and Destination Options headers share the same first two
//! bytes: 'Next Header' and 'Hdr Ext Len' (length in 8-byte units, not including the first 8
//! bytes). The Fragment header is the exception: it's always 8 bytes long and its second byte is
//! reserved.

use core::fmt;

use as_slice::AsSlice;
use cast::usize;

use super::NextHeader;
use crate::traits::UncheckedIndex;

/* Header format */
const NEXT_HEADER: usize = 0;
const LENGTH: usize = 1;
const BODY: usize = 2;

/// Size of the Fragment header
pub const FRAGMENT_HEADER_SIZE: u8 = 8;

/// 'Pad1' option type
pub const PAD1: u8 = 0;

/// 'PadN' option type
pub const PADN: u8 = 1;

/// An IPv6 extension header
#[derive(Clone, Copy)]
pub struct Header<BUFFER>
where
    BUFFER: AsSlice<Element = u8>,
{
    buffer: BUFFER,
    kind: NextHeader,
    /// Size of the header, in bytes
    len: u16,
}

impl<B> Header<B>
where
    B: AsSlice<Element = u8>,
{
    /* Constructors */
    /// Parses the start of `bytes` as an extension header of the given `kind`
    ///
    /// Bytes after the end of the header are left untouched; they are the next header
    pub fn parse(bytes: B, kind: NextHeader) -> Result<Self, B> {
        if !kind.is_ipv6_extension_header() || bytes.as_slice().len() < BODY {
            return Err(bytes);
        }

        let len = if kind == NextHeader::Fragment {
            u16::from(FRAGMENT_HEADER_SIZE)
        } else {
            (u16::from(bytes.as_slice()[LENGTH]) + 1) * 8
        };

        if bytes.as_slice().len() < usize(len) {
            return Err(bytes);
        }

        Ok(Header {
            buffer: bytes,
            kind,
            len,
        })
    }

    /* Accessors */
    /// The kind of header this is
    pub fn kind(&self) -> NextHeader {
        self.kind
    }

    /// Reads the 'Next Header' field
    pub fn get_next_header(&self) -> NextHeader {
        unsafe { *self.as_slice().gu(NEXT_HEADER) }.into()
    }

    /// Reads the 'Hdr Ext Len' field
    ///
    /// NOTE this byte is reserved in the Fragment header
    pub fn get_length(&self) -> u8 {
        unsafe { *self.as_slice().gu(LENGTH) }
    }

    /// Size of the whole header, in bytes
    pub fn len(&self) -> u16 {
        self.len
    }

    /// The header minus its first two bytes ('Next Header' and 'Hdr Ext Len')
    pub fn body(&self) -> &[u8] {
        unsafe { self.as_slice().r(BODY..usize(self.len)) }
    }

    /// Immutable view into the header
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { self.as_slice().rt(..usize(self.len)) }
    }

    /// Immutable view into what follows the header
    pub fn payload(&self) -> &[u8] {
        unsafe { self.as_slice().rf(usize(self.len)..) }
    }

    /* Private */
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }
}

impl<B> fmt::Debug for Header<B>
where
    B: AsSlice<Element = u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ext::Header")
            .field("kind", &self.kind())
            .field("next_header", &self.get_next_header())
            .field("length", &self.get_length())
            .finish()
    }
}

/// Appends padding options (RFC 8200, section 4.2) until the length of `options` is a multiple
/// of 8
///
/// A single byte of padding is a Pad1 option; more than one byte is a single PadN option.
pub fn pad(options: &mut Vec<u8>) {
    match (8 - options.len() % 8) % 8 {
        0 => {}
        1 => options.push(PAD1),
        n => {
            options.push(PADN);
            options.push(n as u8 - 2);
            options.resize(options.len() + n - 2, 0);
        }
    }
}
