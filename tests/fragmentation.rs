use core::time::Duration;

use lowpan::{
    ipv6::{self, NextHeader},
    ll,
    sixlowpan::{adaptation::Adaptation, dispatch, frag},
    time::Instant,
    trace::{DropReason, Recorder},
    udp, Config,
};
use pretty_assertions::assert_eq;
use quickcheck_macros::quickcheck;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

const SRC: ll::Addr = ll::Addr::Extended(ll::ExtendedAddr(0x0012_4b00_0001_0203));
const DEST: ll::Addr = ll::Addr::Short(ll::ShortAddr(0x0002));

fn config() -> Config {
    Config {
        tag_seed: Some(0x1337),
        ..Config::default()
    }
}

fn packet(len: usize) -> Vec<u8> {
    let src = SRC.link_local();
    let dest = DEST.link_local();

    let mut bytes = vec![0; 48 + len];
    for (i, byte) in bytes[48..].iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }

    let mut udp = udp::Packet::new(&mut bytes[40..]);
    udp.set_source(0xf0b3);
    udp.set_destination(0xf0b4);
    udp.update_ipv6_checksum(src, dest);

    let mut ip = ipv6::Packet::new(&mut bytes[..]);
    ip.set_next_header(NextHeader::Udp);
    ip.set_hop_limit(64);
    ip.set_source(src);
    ip.set_destination(dest);

    bytes
}

fn deliver(frames: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let mut rx = Adaptation::new(config(), ());

    frames
        .iter()
        .filter_map(|frame| rx.receive(frame, SRC, DEST, Instant::ZERO).unwrap())
        .collect()
}

#[test]
fn in_order() {
    let original = packet(1000);

    let mut tx = Adaptation::new(config(), ());
    let frames = tx.send(&original, SRC, DEST, 127).unwrap();
    assert!(frames.len() > 8);

    assert_eq!(deliver(&frames), vec![original]);
}

#[test]
fn reversed() {
    let original = packet(1000);

    let mut tx = Adaptation::new(config(), ());
    let mut frames = tx.send(&original, SRC, DEST, 127).unwrap();
    frames.reverse();

    assert_eq!(deliver(&frames), vec![original]);
}

#[test]
fn shuffled() {
    let original = packet(1000);

    let mut tx = Adaptation::new(config(), ());
    let frames = tx.send(&original, SRC, DEST, 127).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..16 {
        let mut frames = frames.clone();
        frames.shuffle(&mut rng);

        assert_eq!(deliver(&frames), vec![original.clone()]);
    }
}

#[test]
fn interleaved() {
    let a = packet(500);
    let b = packet(600);

    let mut tx = Adaptation::new(config(), ());
    let fa = tx.send(&a, SRC, DEST, 80).unwrap();
    let fb = tx.send(&b, SRC, DEST, 80).unwrap();

    let mut frames = vec![];
    for i in 0..fa.len().max(fb.len()) {
        frames.extend(fa.get(i).cloned());
        frames.extend(fb.get(i).cloned());
    }

    assert_eq!(deliver(&frames), vec![a, b]);
}

#[test]
fn headers() {
    let original = packet(300);

    let mut tx = Adaptation::new(config(), ());
    let frames = tx.send(&original, SRC, DEST, 100).unwrap();

    let first = frag::Packet::parse(&frames[0][..]).unwrap();
    assert!(first.is_first());
    assert_eq!(usize::from(first.get_datagram_size()), original.len());
    assert_eq!(first.payload()[0] >> 5, dispatch::IPHC >> 5);

    let tag = first.get_datagram_tag();
    let mut offset = 0;
    for frame in &frames[1..] {
        let fragment = frag::Packet::parse(&frame[..]).unwrap();
        assert!(!fragment.is_first());
        assert_eq!(fragment.get_datagram_tag(), tag);
        assert!(fragment.get_datagram_offset() > offset);
        offset = fragment.get_datagram_offset();
    }
}

#[test]
fn eviction() {
    let mut tx = Adaptation::new(config(), ());
    let mut rx = Adaptation::new(
        Config {
            reassembly_list_size: 3,
            ..config()
        },
        Recorder::new(),
    );

    let datagrams = (0..4)
        .map(|i| tx.send(&packet(200 + i * 8), SRC, DEST, 64).unwrap())
        .collect::<Vec<_>>();

    for frames in &datagrams {
        assert_eq!(rx.receive(&frames[0], SRC, DEST, Instant::ZERO), Ok(None));
    }
    assert_eq!(rx.observer().drops(), vec![DropReason::FragmentBufferFull]);

    // the first datagram is gone; the last one can still be completed
    let last = datagrams.last().unwrap();
    let mut packets = vec![];
    for frame in &last[1..] {
        packets.extend(rx.receive(frame, SRC, DEST, Instant::ZERO).unwrap());
    }
    assert_eq!(packets, vec![packet(200 + 3 * 8)]);
}

#[test]
fn timeout() {
    let original = packet(400);

    let mut tx = Adaptation::new(config(), ());
    let mut rx = Adaptation::new(
        Config {
            expiration_timeout: Duration::from_secs(30),
            ..config()
        },
        Recorder::new(),
    );

    let frames = tx.send(&original, SRC, DEST, 127).unwrap();
    let (last, rest) = frames.split_last().unwrap();

    for frame in rest {
        assert_eq!(rx.receive(frame, SRC, DEST, Instant::ZERO), Ok(None));
    }

    rx.poll(Instant::from_secs(29));
    assert!(rx.observer().drops().is_empty());

    rx.poll(Instant::from_secs(30));
    assert_eq!(
        rx.observer().drops(),
        vec![DropReason::FragmentTimeout; rest.len()]
    );

    // the late fragment starts a new reassembly that never completes
    assert_eq!(rx.receive(last, SRC, DEST, Instant::from_secs(31)), Ok(None));
    assert_eq!(rx.poll_at(), Some(Instant::from_secs(61)));
}

#[test]
fn mesh_and_broadcast_headers() {
    let mut rx = Adaptation::new(config(), Recorder::new());

    assert_eq!(
        rx.receive(&[0xbf, 0x00, 0x01, 0x00, 0x02], SRC, DEST, Instant::ZERO),
        Ok(None)
    );
    assert_eq!(
        rx.receive(&[dispatch::BC0, 0x2a], SRC, DEST, Instant::ZERO),
        Ok(None)
    );
    assert_eq!(
        rx.observer().drops(),
        vec![DropReason::UnknownExtension, DropReason::UnknownExtension]
    );
}

#[quickcheck]
fn any_size_any_mtu(len: u16, mtu: u8, seed: u64) {
    let len = usize::from(len % 1500);
    let mtu = 40 + u16::from(mtu % 88);
    let original = packet(len);

    let mut tx = Adaptation::new(config(), ());
    let mut frames = tx.send(&original, SRC, DEST, mtu).unwrap();
    assert!(frames.iter().all(|frame| frame.len() <= usize::from(mtu)));

    frames.shuffle(&mut StdRng::seed_from_u64(seed));
    assert_eq!(deliver(&frames), vec![original]);
}
