//! Packet buffers

use core::cmp;

use as_slice::{AsMutSlice, AsSlice};

/// Extra room reserved in front of the data when the buffer has to grow towards the front
const HEADROOM: usize = 64;

/// Owned, growable byte buffer with cheap access to both ends
///
/// Header (de)compression works layer by layer: a codec *removes* the header it understands from
/// the front of the buffer (`advance`), lets the next codec process what follows and then *adds*
/// its own (de)compressed header back (`prepend`). `Buffer` keeps some free room in front of the
/// data so that prepending a header usually doesn't move the payload around.
///
/// ```
/// use lowpan::Buffer;
///
/// let mut buf = Buffer::from(&b"payload"[..]);
/// buf.prepend(&[0x41]);
/// buf.append(b"!");
/// assert_eq!(buf.as_slice(), b"\x41payload!");
///
/// buf.advance(1);
/// assert_eq!(buf.as_slice(), b"payload!");
/// ```
#[derive(Clone, Default, Eq, PartialEq)]
pub struct Buffer {
    bytes: Vec<u8>,
    /// Index at which the data starts
    start: usize,
}

impl Buffer {
    /// Creates an empty buffer
    pub fn new() -> Self {
        Buffer::default()
    }

    /// Creates a buffer that holds a copy of `data` and has some room in front of it
    pub fn with_headroom(data: &[u8], headroom: usize) -> Self {
        let mut bytes = Vec::with_capacity(headroom + data.len());
        bytes.resize(headroom, 0);
        bytes.extend_from_slice(data);

        Buffer {
            bytes,
            start: headroom,
        }
    }

    /// Returns the length of the data
    pub fn len(&self) -> usize {
        self.bytes.len() - self.start
    }

    /// Returns `true` if the buffer holds no data
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Immutable view into the data
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.start..]
    }

    /// Mutable view into the data
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[self.start..]
    }

    /// Adds `header` in front of the data
    pub fn prepend(&mut self, header: &[u8]) {
        let n = header.len();

        if self.start < n {
            // grow towards the front
            let extra = n - self.start + HEADROOM;
            self.bytes.splice(0..0, core::iter::repeat(0).take(extra));
            self.start += extra;
        }

        self.start -= n;
        self.bytes[self.start..self.start + n].copy_from_slice(header);
    }

    /// Adds `data` after the data
    pub fn append(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Removes (at most) `n` bytes from the front of the data
    pub fn advance(&mut self, n: usize) {
        self.start += cmp::min(n, self.len());
    }

    /// Keeps only the first `len` bytes of the data
    pub fn truncate(&mut self, len: usize) {
        let end = self.start + len;
        self.bytes.truncate(end);
    }

    /// Returns the data as a vector
    pub fn into_vec(mut self) -> Vec<u8> {
        self.bytes.drain(..self.start);
        self.bytes
    }
}

impl<'a> From<&'a [u8]> for Buffer {
    fn from(data: &'a [u8]) -> Self {
        Buffer::with_headroom(data, HEADROOM)
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Buffer { bytes, start: 0 }
    }
}

impl AsSlice for Buffer {
    type Element = u8;

    fn as_slice(&self) -> &[u8] {
        Buffer::as_slice(self)
    }
}

impl AsMutSlice for Buffer {
    fn as_mut_slice(&mut self) -> &mut [u8] {
        Buffer::as_mut_slice(self)
    }
}

impl core::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Buffer").field(&self.as_slice()).finish()
    }
}
