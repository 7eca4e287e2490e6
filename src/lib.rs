//! lowpan: IPv6 over IEEE 802.15.4 (6LoWPAN)
//!
//! There's no IO stuff in this crate. The adaptation layer turns IPv6 packets into link-layer
//! frames and back; getting those frames on and off the radio is up to the caller.
//!
//! The crate has two levels:
//!
//! - Header *views* (`ipv6::Packet`, `udp::Packet`, `sixlowpan::iphc::Packet`, etc.) that access
//!   the fields of a header *in place*, in the style of `smoltcp`'s wire module.
//!
//! - The [`Adaptation`] layer which compresses (LOWPAN_HC1 or LOWPAN_IPHC + LOWPAN_NHC),
//!   fragments and reassembles packets, and reports what it does to an [`Observer`].
//!
//! [`Adaptation`]: sixlowpan/adaptation/struct.Adaptation.html
//! [`Observer`]: trace/trait.Observer.html
//!
//! # Examples
//!
//! - Sending a UDP packet that doesn't fit in a single frame
//!
//! ```
//! use lowpan::{
//!     ipv6::{self, NextHeader},
//!     ll,
//!     sixlowpan::adaptation::Adaptation,
//!     time::Instant,
//!     udp, Config,
//! };
//!
//! const SRC: ll::Addr = ll::Addr::Short(ll::ShortAddr(0x0001));
//! const DEST: ll::Addr = ll::Addr::Short(ll::ShortAddr(0x0002));
//!
//! let mut bytes = vec![0; 40 + 8 + 200];
//!
//! let mut udp = udp::Packet::new(&mut bytes[40..]);
//! udp.set_source(1337);
//! udp.set_destination(5683);
//! udp.update_ipv6_checksum(SRC.link_local(), DEST.link_local());
//!
//! let mut ip = ipv6::Packet::new(&mut bytes[..]);
//! ip.set_next_header(NextHeader::Udp);
//! ip.set_source(SRC.link_local());
//! ip.set_destination(DEST.link_local());
//!
//! let mut node = Adaptation::new(Config::default(), ());
//! let frames = node.send(&bytes, SRC, DEST, 127).unwrap();
//!
//! // too large for a single 127-byte frame
//! assert!(frames.len() > 1);
//!
//! let mut peer = Adaptation::new(Config::default(), ());
//! let mut packet = None;
//! for frame in &frames {
//!     packet = peer.receive(frame, SRC, DEST, Instant::ZERO).unwrap();
//! }
//!
//! assert_eq!(packet, Some(bytes));
//! ```

#![deny(missing_docs)]
#![deny(rust_2018_compatibility)]
#![deny(rust_2018_idioms)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

#[macro_use]
mod macros;

mod fmt;
mod traits;

pub mod buf;
pub mod config;
pub mod error;
pub mod time;
pub mod timer;
pub mod trace;

// Link layer
pub mod ll;
pub mod mac;

// Network layer
pub mod ipv6;
pub mod sixlowpan;

// Transport layer
pub mod udp;

pub use crate::{
    buf::Buffer,
    config::Config,
    error::{Error, Result},
};
