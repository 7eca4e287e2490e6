//! The adaptation layer: IPv6 packets in, link-layer frames out (and vice versa)

use core::{cmp, time::Duration};

use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{
    dispatch::{self, Dispatch},
    frag,
    reassembly::Reassembly,
    Context, Encoding,
};
use crate::{
    config::Config,
    error::{Error, Result},
    ll,
    time::Instant,
    trace::{DropReason, Observer},
};

/// Smallest MTU an IPv6 link may have (RFC 8200)
pub const MIN_IPV6_MTU: u16 = 1280;

/// 6LoWPAN adaptation layer
///
/// Sits between an IPv6 stack and an IEEE 802.15.4 MAC. Doesn't do any IO: `send` returns the
/// frames to transmit and `receive` returns the packet to deliver, if any. `poll` must be called
/// every now and then to discard the datagrams that didn't complete in time.
pub struct Adaptation<O = ()>
where
    O: Observer,
{
    config: Config,
    reassembly: Reassembly,
    rng: StdRng,
    observer: O,
}

impl<O> Adaptation<O>
where
    O: Observer,
{
    /// Creates an adaptation layer that reports its events to `observer`
    pub fn new(config: Config, observer: O) -> Self {
        let rng = match config.tag_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Adaptation {
            reassembly: Reassembly::new(config.reassembly_list_size, config.expiration_timeout),
            config,
            rng,
            observer,
        }
    }

    /// Turns an IPv6 `packet`, sent from `source` to `destination`, into frames that fit in
    /// `link_mtu`
    pub fn send(
        &mut self,
        packet: &[u8],
        source: ll::Addr,
        destination: ll::Addr,
        link_mtu: u16,
    ) -> Result<Vec<Vec<u8>>> {
        let ctxt = Context {
            source,
            destination,
        };

        let encoding = if self.config.use_iphc {
            Encoding::Iphc
        } else {
            Encoding::Hc1
        };

        let (compressed, header_size) =
            super::compress(packet, &ctxt, encoding, self.config.omit_udp_checksum)?;

        let frames = if compressed.len() > usize::from(link_mtu) {
            let tag = self.rng.gen();
            frag::fragment(
                compressed.as_slice(),
                packet.len(),
                header_size,
                link_mtu,
                tag,
            )?
        } else if compressed.len() < self.config.compression_threshold {
            debug!(
                "compressed size {} is below the threshold; sending uncompressed",
                compressed.len()
            );

            let mut frame = Vec::with_capacity(1 + packet.len());
            frame.push(dispatch::IPV6);
            frame.extend_from_slice(packet);
            vec![frame]
        } else {
            vec![compressed.into_vec()]
        };

        for frame in &frames {
            self.observer.on_tx(frame);
        }

        Ok(frames)
    }

    /// Processes a `frame` that `source` sent to `destination`
    ///
    /// Returns the IPv6 packet it completes, if any. Frames that this layer doesn't process are
    /// reported as dropped and yield `Ok(None)`.
    pub fn receive(
        &mut self,
        frame: &[u8],
        source: ll::Addr,
        destination: ll::Addr,
        now: Instant,
    ) -> Result<Option<Vec<u8>>> {
        self.observer.on_rx(frame);

        let ctxt = Context {
            source,
            destination,
        };

        let res = self.process(frame, &ctxt, now);
        if let Err(e) = &res {
            warn!("discarding frame from {}: {}", source, e);
        }

        res
    }

    /// Discards the datagrams whose expiration timeout has elapsed
    pub fn poll(&mut self, now: Instant) {
        self.reassembly.poll(now, &mut self.observer);
    }

    /// Instant at which `poll` has work to do next
    pub fn poll_at(&self) -> Option<Instant> {
        self.reassembly.next_deadline()
    }

    /// Changes the maximum number of datagrams that can be reassembled at once
    pub fn set_reassembly_list_size(&mut self, list_size: usize) {
        self.config.reassembly_list_size = list_size;
        self.reassembly.set_list_size(list_size);
    }

    /// Changes the time given to a datagram to receive all its fragments
    pub fn set_expiration_timeout(&mut self, timeout: Duration) {
        self.config.expiration_timeout = timeout;
        self.reassembly.set_timeout(timeout);
    }

    /// MTU that the IPv6 layer sees over a link whose MTU is `link_mtu`
    ///
    /// Fragmentation makes up the difference (RFC 4944, section 4).
    pub fn ipv6_mtu(&self, link_mtu: u16) -> u16 {
        cmp::max(MIN_IPV6_MTU, link_mtu)
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The observer
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Mutable access to the observer
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    fn process(&mut self, frame: &[u8], ctxt: &Context, now: Instant) -> Result<Option<Vec<u8>>> {
        let byte = *frame.first().ok_or(Error::Truncated("6LoWPAN"))?;

        match dispatch::classify(byte) {
            Dispatch::Frag1 | Dispatch::FragN => {
                match self.reassembly.insert(frame, ctxt, now, &mut self.observer)? {
                    Some(packet) => super::decompress(&packet, ctxt).map(Some),
                    None => Ok(None),
                }
            }

            Dispatch::Ipv6 | Dispatch::Hc1 | Dispatch::Iphc => {
                super::decompress(frame, ctxt).map(Some)
            }

            dispatch => {
                debug!("dropping frame with {:?} dispatch ({:#04x})", dispatch, byte);

                self.observer.on_drop(DropReason::UnknownExtension, frame);
                Ok(None)
            }
        }
    }
}
