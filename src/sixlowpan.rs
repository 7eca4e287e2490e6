//! 6LoWPAN: IPv6 over Low-Power Wireless Personal Area Networks
//!
//! # References
//!
//! - [RFC 4944: Transmission of IPv6 Packets over IEEE 802.15.4 Networks][0]
//!
//! [0]: https://tools.ietf.org/html/rfc4944
//!
//! - [RFC 6282: Compression Format for IPv6 Datagrams over IEEE 802.15.4-Based Networks][1]
//!
//! [1]: https://tools.ietf.org/html/rfc6282

use cast::usize;

use crate::{
    buf::Buffer,
    error::{Error, Result},
    ipv6, ll,
};

pub mod adaptation;
pub mod dispatch;
pub mod frag;
pub mod hc1;
pub mod iphc;
pub mod nhc;
pub mod reassembly;

use self::dispatch::Dispatch;

/// Link-layer addresses of the frame that carries a packet
///
/// Compression elides whatever the receiver can derive from these.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Context {
    /// Source link-layer address
    pub source: ll::Addr,

    /// Destination link-layer address
    pub destination: ll::Addr,
}

/// IPv6 header compression scheme
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Encoding {
    /// LOWPAN_HC1 (RFC 4944)
    Hc1,
    /// LOWPAN_IPHC (RFC 6282)
    Iphc,
}

/// Compresses an IPv6 packet
///
/// Returns the compressed packet, dispatch included, and the number of bytes of uncompressed
/// headers that the compressed headers stand for.
pub fn compress(
    packet: &[u8],
    ctxt: &Context,
    encoding: Encoding,
    omit_udp_checksum: bool,
) -> Result<(Buffer, usize)> {
    let mut buffer = Buffer::from(packet);

    let header_size = match encoding {
        Encoding::Hc1 => hc1::compress(&mut buffer, ctxt)?,
        Encoding::Iphc => iphc::compress(&mut buffer, ctxt, omit_udp_checksum)?,
    };

    Ok((buffer, header_size))
}

/// Decompresses a frame that carries a whole IPv6 packet (IPv6, HC1 or IPHC dispatch)
pub fn decompress(frame: &[u8], ctxt: &Context) -> Result<Vec<u8>> {
    let mut buffer = Buffer::from(frame);
    decompress_in_place(&mut buffer, ctxt)?;
    Ok(buffer.into_vec())
}

pub(crate) fn decompress_in_place(buffer: &mut Buffer, ctxt: &Context) -> Result<()> {
    let byte = *buffer
        .as_slice()
        .first()
        .ok_or(Error::Truncated("6LoWPAN"))?;

    match dispatch::classify(byte) {
        Dispatch::Ipv6 => {
            buffer.advance(1);
            ipv6_header(buffer)?;
            Ok(())
        }
        Dispatch::Hc1 => hc1::decompress(buffer, ctxt),
        Dispatch::Iphc => iphc::decompress(buffer, ctxt),
        _ => Err(Error::UnsupportedDispatch(byte)),
    }
}

/// Copies out the fixed IPv6 header found at the start of `buffer`
fn ipv6_header(buffer: &Buffer) -> Result<[u8; 40]> {
    let bytes = buffer.as_slice();
    if bytes.len() < usize(ipv6::HEADER_SIZE) {
        return Err(Error::Truncated("IPv6"));
    }

    let ip = ipv6::Packet::parse(bytes).map_err(|_| Error::NotIpv6)?;

    let mut header = [0; 40];
    header.copy_from_slice(ip.header());
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::{compress, decompress, Context, Encoding};
    use crate::{error::Error, ipv6, ll};

    fn ctxt() -> Context {
        Context {
            source: ll::ShortAddr(0x0001).into(),
            destination: ll::ShortAddr(0x0002).into(),
        }
    }

    #[test]
    fn uncompressed_dispatch() {
        let mut frame = vec![0x41];
        let mut ip = [0; 44];
        ipv6::Packet::new(&mut ip[..]);
        frame.extend_from_slice(&ip);

        assert_eq!(decompress(&frame, &ctxt()).unwrap(), &ip[..]);

        // version is not 6
        frame[1] = 0x40;
        assert_eq!(decompress(&frame, &ctxt()), Err(Error::NotIpv6));
    }

    #[test]
    fn unsupported_dispatch() {
        assert_eq!(
            decompress(&[0x80, 0, 0], &ctxt()),
            Err(Error::UnsupportedDispatch(0x80))
        );
        assert_eq!(decompress(&[], &ctxt()), Err(Error::Truncated("6LoWPAN")));
    }

    #[test]
    fn not_ipv6() {
        assert_eq!(
            compress(&[0; 20], &ctxt(), Encoding::Iphc, true).err(),
            Some(Error::Truncated("IPv6"))
        );
        assert_eq!(
            compress(&[0; 40], &ctxt(), Encoding::Hc1, true).err(),
            Some(Error::NotIpv6)
        );
    }
}
