//! Reassembly of fragmented datagrams
//!
//! Fragments are grouped by `Key`. Each group gets an expiration timer when its first fragment
//! (in arrival order) shows up; the group is discarded if the timer fires before the datagram is
//! complete. Offsets and sizes are always in bytes of the *uncompressed* datagram, so the extent
//! of the first fragment is learned by decompressing its headers.

use core::{convert::TryFrom, time::Duration};
use std::collections::HashMap;

use log::debug;

use super::{frag, Context};
use crate::{
    buf::Buffer,
    error::{Error, Result},
    ll,
    time::Instant,
    timer::{self, Token},
    trace::{DropReason, Observer},
};

/// Identifies the fragments of a datagram
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Key {
    /// Link-layer source of the fragments
    pub source: ll::Addr,
    /// Link-layer destination of the fragments
    pub destination: ll::Addr,
    /// `datagram_size`
    pub size: u16,
    /// `datagram_tag`
    pub tag: u16,
}

struct Fragment {
    offset: u16,
    // extent in the uncompressed datagram; differs from `data.len()` for the first fragment
    size: u16,
    data: Vec<u8>,
}

impl Fragment {
    fn end(&self) -> u16 {
        self.offset + self.size
    }
}

struct Entry {
    // sorted by offset; no two fragments overlap
    fragments: Vec<Fragment>,
    created: Instant,
    token: Token,
}

impl Entry {
    fn is_complete(&self, size: u16) -> bool {
        let mut end = 0;
        for fragment in &self.fragments {
            if fragment.offset != end {
                return false;
            }

            end = fragment.end();
        }

        end == size
    }
}

/// Fragments of the datagrams that are being reassembled
pub struct Reassembly {
    entries: HashMap<Key, Entry>,
    timers: timer::Queue<Key>,
    list_size: usize,
    timeout: Duration,
}

impl Reassembly {
    /// Creates an empty reassembly buffer
    ///
    /// At most `list_size` datagrams are reassembled at once (zero means no limit); a datagram
    /// has `timeout` to receive all its fragments.
    pub fn new(list_size: usize, timeout: Duration) -> Self {
        Reassembly {
            entries: HashMap::new(),
            timers: timer::Queue::new(),
            list_size,
            timeout,
        }
    }

    /// Adds a FRAG1 / FRAGN frame received from `ctxt.source`
    ///
    /// Returns the compressed datagram (FRAG1 header removed, FRAGN payloads appended) once all
    /// its fragments have been received. A duplicate of an already received fragment is ignored.
    pub fn insert<O>(
        &mut self,
        frame: &[u8],
        ctxt: &Context,
        now: Instant,
        observer: &mut O,
    ) -> Result<Option<Vec<u8>>>
    where
        O: Observer + ?Sized,
    {
        let fragment = frag::Packet::parse(frame).map_err(|_| Error::Truncated("fragment"))?;

        let key = Key {
            source: ctxt.source,
            destination: ctxt.destination,
            size: fragment.get_datagram_size(),
            tag: fragment.get_datagram_tag(),
        };

        let data = fragment.payload();
        let (offset, size) = if fragment.is_first() {
            let mut buffer = Buffer::from(data);
            super::decompress_in_place(&mut buffer, ctxt)?;
            (0, buffer.len())
        } else {
            let offset = u16::from(fragment.get_datagram_offset()) * 8;

            // the first fragment is the only one that starts at offset 0; an empty fragment
            // would claim an offset that the real fragment can then never fill
            if offset == 0 || data.is_empty() {
                return Err(Error::Malformed("FRAGN"));
            }

            (offset, data.len())
        };

        let end = usize::from(offset) + size;
        if end > usize::from(key.size) {
            return Err(Error::FragmentOutOfBounds {
                offset,
                end: u16::try_from(end).unwrap_or(u16::MAX),
                size: key.size,
            });
        }
        // `end` fits in `key.size`
        let size = size as u16;
        let end = end as u16;

        if !self.entries.contains_key(&key) {
            while self.list_size != 0 && self.entries.len() >= self.list_size {
                self.evict_oldest(observer);
            }

            let token = self.timers.schedule(now + self.timeout, key);
            self.entries.insert(
                key,
                Entry {
                    fragments: vec![],
                    created: now,
                    token,
                },
            );

            debug!(
                "new reassembly {}->{} tag={:#06x} size={} (expires at {})",
                key.source,
                key.destination,
                key.tag,
                key.size,
                token.deadline()
            );
        }

        let entry = match self.entries.get_mut(&key) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        match entry
            .fragments
            .binary_search_by_key(&offset, |fragment| fragment.offset)
        {
            Ok(i) => {
                let stored = entry.fragments[i].size;
                if stored != size {
                    return Err(Error::FragmentSizeMismatch {
                        offset,
                        stored,
                        size,
                    });
                }

                debug!("duplicate fragment [{}, {}) tag={:#06x}", offset, end, key.tag);
                return Ok(None);
            }

            Err(i) => {
                let overlaps_previous = i > 0 && entry.fragments[i - 1].end() > offset;
                let overlaps_next = entry
                    .fragments
                    .get(i)
                    .map_or(false, |next| end > next.offset);

                if overlaps_previous || overlaps_next {
                    return Err(Error::FragmentOverlap { offset, end });
                }

                entry.fragments.insert(
                    i,
                    Fragment {
                        offset,
                        size,
                        data: data.to_vec(),
                    },
                );
            }
        }

        debug!(
            "fragment [{}, {}) of {} tag={:#06x}",
            offset, end, key.size, key.tag
        );

        if !entry.is_complete(key.size) {
            return Ok(None);
        }

        Ok(self.remove(&key).map(|entry| {
            debug!("reassembled datagram tag={:#06x} ({} bytes)", key.tag, key.size);

            entry
                .fragments
                .into_iter()
                .flat_map(|fragment| fragment.data)
                .collect()
        }))
    }

    /// Discards the datagrams whose expiration timeout has elapsed
    pub fn poll<O>(&mut self, now: Instant, observer: &mut O)
    where
        O: Observer + ?Sized,
    {
        while let Some((token, key)) = self.timers.pop_expired(now) {
            let live = self
                .entries
                .get(&key)
                .map_or(false, |entry| entry.token == token);

            if !live {
                continue;
            }

            if let Some(entry) = self.remove(&key) {
                debug!(
                    "reassembly of tag={:#06x} from {} timed out",
                    key.tag, key.source
                );

                report(entry, DropReason::FragmentTimeout, observer);
            }
        }
    }

    /// Changes the maximum number of concurrent reassemblies; zero means no limit
    ///
    /// Takes effect the next time a new datagram starts.
    pub fn set_list_size(&mut self, list_size: usize) {
        self.list_size = list_size;
    }

    /// Changes the expiration timeout of the datagrams that start from now on
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Returns `true` if fragments of the datagram identified by `key` are being held
    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of datagrams being reassembled
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no datagram is being reassembled
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Instant at which the next reassembly expires
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    fn evict_oldest<O>(&mut self, observer: &mut O)
    where
        O: Observer + ?Sized,
    {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.created, entry.token))
            .map(|(key, _)| *key);

        if let Some(entry) = oldest.and_then(|key| self.remove(&key)) {
            debug!("reassembly buffer full; evicting the oldest datagram");

            report(entry, DropReason::FragmentBufferFull, observer);
        }
    }

    // NOTE every path that discards an entry goes through here
    fn remove(&mut self, key: &Key) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.timers.cancel(entry.token);
        Some(entry)
    }
}

fn report<O>(entry: Entry, reason: DropReason, observer: &mut O)
where
    O: Observer + ?Sized,
{
    for fragment in entry.fragments {
        observer.on_drop(reason, &fragment.data);
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::{Key, Reassembly};
    use crate::{
        error::Error,
        ipv6::{self, NextHeader},
        ll,
        sixlowpan::{self, frag, Context, Encoding},
        time::Instant,
        trace::{DropReason, Recorder},
        udp,
    };

    fn ctxt() -> Context {
        Context {
            source: ll::ShortAddr(0x0001).into(),
            destination: ll::ShortAddr(0x0002).into(),
        }
    }

    fn packet(ctxt: &Context, len: usize) -> Vec<u8> {
        let src = ctxt.source.link_local();
        let dest = ctxt.destination.link_local();

        let mut bytes = vec![0; 40 + 8 + len];
        for (i, byte) in bytes[48..].iter_mut().enumerate() {
            *byte = i as u8;
        }

        let mut udp = udp::Packet::new(&mut bytes[40..]);
        udp.set_source(0xf0b1);
        udp.set_destination(5683);
        udp.update_ipv6_checksum(src, dest);

        let mut ip = ipv6::Packet::new(&mut bytes[..]);
        ip.set_next_header(NextHeader::Udp);
        ip.set_hop_limit(64);
        ip.set_source(src);
        ip.set_destination(dest);

        bytes
    }

    fn frames(ctxt: &Context, original: &[u8], tag: u16) -> Vec<Vec<u8>> {
        let (compressed, header_size) =
            sixlowpan::compress(original, ctxt, Encoding::Iphc, true).unwrap();

        frag::fragment(compressed.as_slice(), original.len(), header_size, 40, tag).unwrap()
    }

    fn key(ctxt: &Context, size: usize, tag: u16) -> Key {
        Key {
            source: ctxt.source,
            destination: ctxt.destination,
            size: size as u16,
            tag,
        }
    }

    fn reassembly() -> Reassembly {
        Reassembly::new(0, Duration::from_secs(60))
    }

    #[test]
    fn in_order() {
        let ctxt = ctxt();
        let original = packet(&ctxt, 100);
        let frames = frames(&ctxt, &original, 7);
        assert!(frames.len() > 2);

        let mut r = reassembly();
        let mut obs = Recorder::new();

        let (last, rest) = frames.split_last().unwrap();
        for frame in rest {
            assert_eq!(r.insert(frame, &ctxt, Instant::ZERO, &mut obs), Ok(None));
        }
        assert!(r.contains(&key(&ctxt, original.len(), 7)));

        let compressed = r
            .insert(last, &ctxt, Instant::ZERO, &mut obs)
            .unwrap()
            .unwrap();

        assert_eq!(sixlowpan::decompress(&compressed, &ctxt).unwrap(), original);
        assert!(r.is_empty());
        assert_eq!(r.next_deadline(), None);
        assert!(obs.events.is_empty());
    }

    #[test]
    fn reversed() {
        let ctxt = ctxt();
        let original = packet(&ctxt, 150);
        let mut frames = frames(&ctxt, &original, 8);
        frames.reverse();

        let mut r = reassembly();
        let mut output = None;
        for frame in &frames {
            assert!(output.is_none());
            output = r.insert(frame, &ctxt, Instant::ZERO, &mut ()).unwrap();
        }

        let compressed = output.unwrap();
        assert_eq!(sixlowpan::decompress(&compressed, &ctxt).unwrap(), original);
        assert!(r.is_empty());
    }

    #[test]
    fn duplicates() {
        let ctxt = ctxt();
        let original = packet(&ctxt, 60);
        let frames = frames(&ctxt, &original, 9);
        assert_eq!(frames.len(), 3);

        let mut r = reassembly();
        assert_eq!(r.insert(&frames[1], &ctxt, Instant::ZERO, &mut ()), Ok(None));
        assert_eq!(r.insert(&frames[1], &ctxt, Instant::ZERO, &mut ()), Ok(None));
        assert_eq!(r.insert(&frames[0], &ctxt, Instant::ZERO, &mut ()), Ok(None));
        assert_eq!(r.insert(&frames[0], &ctxt, Instant::ZERO, &mut ()), Ok(None));

        let compressed = r
            .insert(&frames[2], &ctxt, Instant::ZERO, &mut ())
            .unwrap()
            .unwrap();
        assert_eq!(sixlowpan::decompress(&compressed, &ctxt).unwrap(), original);
    }

    #[test]
    fn size_mismatch() {
        let ctxt = ctxt();
        let mut r = reassembly();

        let mut frame = vec![0; 5 + 16];
        frag::Packet::new_subsequent(&mut frame[..], 200, 1, 4);
        assert_eq!(r.insert(&frame, &ctxt, Instant::ZERO, &mut ()), Ok(None));

        frame.truncate(5 + 8);
        assert_eq!(
            r.insert(&frame, &ctxt, Instant::ZERO, &mut ()),
            Err(Error::FragmentSizeMismatch {
                offset: 32,
                stored: 16,
                size: 8,
            })
        );
    }

    #[test]
    fn overlap() {
        let ctxt = ctxt();
        let mut r = reassembly();

        // [32, 56)
        let mut frame = vec![0; 5 + 24];
        frag::Packet::new_subsequent(&mut frame[..], 200, 1, 4);
        assert_eq!(r.insert(&frame, &ctxt, Instant::ZERO, &mut ()), Ok(None));

        // [48, 64) overlaps the end of the stored fragment
        let mut frame = vec![0; 5 + 16];
        frag::Packet::new_subsequent(&mut frame[..], 200, 1, 6);
        assert_eq!(
            r.insert(&frame, &ctxt, Instant::ZERO, &mut ()),
            Err(Error::FragmentOverlap { offset: 48, end: 64 })
        );

        // [24, 40) overlaps the start of the stored fragment
        let mut frame = vec![0; 5 + 16];
        frag::Packet::new_subsequent(&mut frame[..], 200, 1, 3);
        assert_eq!(
            r.insert(&frame, &ctxt, Instant::ZERO, &mut ()),
            Err(Error::FragmentOverlap { offset: 24, end: 40 })
        );

        // adjacent fragments are fine
        let mut frame = vec![0; 5 + 8];
        frag::Packet::new_subsequent(&mut frame[..], 200, 1, 7);
        assert_eq!(r.insert(&frame, &ctxt, Instant::ZERO, &mut ()), Ok(None));
    }

    #[test]
    fn empty_fragment() {
        let ctxt = ctxt();
        let original = packet(&ctxt, 100);
        let frames = frames(&ctxt, &original, 5);

        let offset = frag::Packet::parse(&frames[1][..])
            .unwrap()
            .get_datagram_offset();
        let mut empty = [0; 5];
        frag::Packet::new_subsequent(&mut empty[..], original.len() as u16, 5, offset);

        let mut r = reassembly();
        assert_eq!(
            r.insert(&empty, &ctxt, Instant::ZERO, &mut ()),
            Err(Error::Malformed("FRAGN"))
        );
        assert!(r.is_empty());

        let mut output = None;
        for frame in &frames {
            output = r.insert(frame, &ctxt, Instant::ZERO, &mut ()).unwrap();
        }

        let compressed = output.unwrap();
        assert_eq!(sixlowpan::decompress(&compressed, &ctxt).unwrap(), original);
    }

    #[test]
    fn out_of_bounds() {
        let ctxt = ctxt();
        let mut r = reassembly();

        let mut frame = vec![0; 5 + 16];
        frag::Packet::new_subsequent(&mut frame[..], 40, 1, 4);
        assert_eq!(
            r.insert(&frame, &ctxt, Instant::ZERO, &mut ()),
            Err(Error::FragmentOutOfBounds {
                offset: 32,
                end: 48,
                size: 40,
            })
        );
        assert!(r.is_empty());

        frag::Packet::new_subsequent(&mut frame[..], 40, 1, 0);
        assert_eq!(
            r.insert(&frame, &ctxt, Instant::ZERO, &mut ()),
            Err(Error::Malformed("FRAGN"))
        );
    }

    #[test]
    fn eviction() {
        let ctxt = ctxt();
        let original = packet(&ctxt, 100);

        let mut r = Reassembly::new(2, Duration::from_secs(60));
        let mut obs = Recorder::new();

        for (tag, now) in [(1, 0), (2, 1), (3, 2)].iter() {
            let frames = frames(&ctxt, &original, *tag);
            r.insert(&frames[1], &ctxt, Instant::from_millis(*now), &mut obs)
                .unwrap();
        }

        assert_eq!(r.len(), 2);
        assert_eq!(obs.drops(), vec![DropReason::FragmentBufferFull]);
        assert!(!r.contains(&key(&ctxt, original.len(), 1)));
        assert!(r.contains(&key(&ctxt, original.len(), 2)));
        assert!(r.contains(&key(&ctxt, original.len(), 3)));
    }

    #[test]
    fn timeout() {
        let ctxt = ctxt();
        let original = packet(&ctxt, 100);
        let frames = frames(&ctxt, &original, 42);

        let mut r = Reassembly::new(0, Duration::from_secs(5));
        let mut obs = Recorder::new();

        r.insert(&frames[0], &ctxt, Instant::ZERO, &mut obs).unwrap();
        r.insert(&frames[1], &ctxt, Instant::from_secs(1), &mut obs)
            .unwrap();
        assert_eq!(r.next_deadline(), Some(Instant::from_secs(5)));

        r.poll(Instant::from_millis(4_999), &mut obs);
        assert_eq!(r.len(), 1);

        r.poll(Instant::from_secs(5), &mut obs);
        assert!(r.is_empty());
        assert_eq!(
            obs.drops(),
            vec![DropReason::FragmentTimeout, DropReason::FragmentTimeout]
        );

        // a late fragment starts over
        r.insert(&frames[2], &ctxt, Instant::from_secs(6), &mut obs)
            .unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r.next_deadline(), Some(Instant::from_secs(11)));
    }

    #[test]
    fn completion_cancels_timer() {
        let ctxt = ctxt();
        let original = packet(&ctxt, 60);

        let mut r = Reassembly::new(0, Duration::from_secs(5));
        let mut obs = Recorder::new();

        for frame in &frames(&ctxt, &original, 3) {
            r.insert(frame, &ctxt, Instant::ZERO, &mut obs).unwrap();
        }

        assert!(r.is_empty());
        assert_eq!(r.next_deadline(), None);

        r.poll(Instant::from_secs(10), &mut obs);
        assert!(obs.drops().is_empty());
    }

    #[test]
    fn different_sources() {
        let ctxt = ctxt();
        let other = Context {
            source: ll::ShortAddr(0x0003).into(),
            destination: ctxt.destination,
        };

        let original = packet(&ctxt, 100);
        let frames = frames(&ctxt, &original, 1);

        let mut r = reassembly();
        r.insert(&frames[0], &ctxt, Instant::ZERO, &mut ()).unwrap();
        r.insert(&frames[1], &other, Instant::ZERO, &mut ()).unwrap();

        assert_eq!(r.len(), 2);
    }
}
