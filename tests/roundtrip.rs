use lowpan::{
    ipv6::{self, NextHeader},
    ll,
    sixlowpan::{self, dispatch, iphc, Context, Encoding},
    udp,
};
use pretty_assertions::assert_eq;
use quickcheck_macros::quickcheck;

fn ctxt() -> Context {
    Context {
        source: ll::ShortAddr(0x0001).into(),
        destination: ll::ExtendedAddr(0x0012_4b00_0a0b_0c0d).into(),
    }
}

struct Udp {
    source: u16,
    destination: u16,
    payload: Vec<u8>,
}

struct Ip {
    traffic_class: u8,
    flow_label: u32,
    hop_limit: u8,
    source: ipv6::Addr,
    destination: ipv6::Addr,
}

fn packet(ip: &Ip, udp: &Udp) -> Vec<u8> {
    let mut bytes = vec![0; 48 + udp.payload.len()];
    bytes[48..].copy_from_slice(&udp.payload);

    let mut u = udp::Packet::new(&mut bytes[40..]);
    u.set_source(udp.source);
    u.set_destination(udp.destination);
    u.update_ipv6_checksum(ip.source, ip.destination);

    let mut p = ipv6::Packet::new(&mut bytes[..]);
    p.set_traffic_class(ip.traffic_class);
    p.set_flow_label(ip.flow_label);
    p.set_next_header(NextHeader::Udp);
    p.set_hop_limit(ip.hop_limit);
    p.set_source(ip.source);
    p.set_destination(ip.destination);

    bytes
}

fn addr(hi: u64, lo: u64) -> ipv6::Addr {
    let mut bytes = [0; 16];
    bytes[..8].copy_from_slice(&hi.to_be_bytes());
    bytes[8..].copy_from_slice(&lo.to_be_bytes());
    ipv6::Addr(bytes)
}

// picks one of the address forms that the codecs treat differently
fn pick(ll: ll::Addr, selector: u8, hi: u64, lo: u64) -> ipv6::Addr {
    match selector % 8 {
        0 => ll.link_local(),
        1 => addr(0xfe80 << 48, 0x0000_00ff_fe00_0000 | (lo & 0xffff)),
        2 => addr(0xfe80 << 48, lo),
        3 => addr(0xff02 << 48, lo & 0xff),
        4 => addr(hi | (0xff00 << 48), lo & 0xff_ffff_ffff),
        5 => addr(hi | (0xff00 << 48), lo & 0xffff_ffff),
        6 => ll.global([0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0]),
        _ => addr(hi, lo),
    }
}

fn roundtrip(original: &[u8], encoding: Encoding) {
    let ctxt = ctxt();

    let (compressed, header_size) = sixlowpan::compress(original, &ctxt, encoding, true).unwrap();
    assert!(header_size >= 40);
    assert!(compressed.len() <= original.len() + 1);

    let decompressed = sixlowpan::decompress(compressed.as_slice(), &ctxt).unwrap();
    assert_eq!(decompressed, original);
}

#[quickcheck]
fn iphc(
    (traffic_class, flow_label, hop_limit): (u8, u32, u8),
    (src, src_hi, src_lo): (u8, u64, u64),
    (dest, dest_hi, dest_lo): (u8, u64, u64),
    (source, destination): (u16, u16),
    payload: Vec<u8>,
) {
    let ctxt = ctxt();
    let ip = Ip {
        traffic_class,
        flow_label: flow_label & 0x000f_ffff,
        hop_limit,
        source: pick(ctxt.source, src, src_hi, src_lo),
        destination: pick(ctxt.destination, dest, dest_hi, dest_lo),
    };
    let udp = Udp {
        source,
        destination,
        payload,
    };

    roundtrip(&packet(&ip, &udp), Encoding::Iphc);
}

#[quickcheck]
fn hc1(
    (traffic_class, flow_label, hop_limit): (u8, u32, u8),
    (src, src_hi, src_lo): (u8, u64, u64),
    (dest, dest_hi, dest_lo): (u8, u64, u64),
    payload: Vec<u8>,
) {
    let ctxt = ctxt();
    let ip = Ip {
        traffic_class,
        flow_label: flow_label & 0x000f_ffff,
        hop_limit,
        source: pick(ctxt.source, src, src_hi, src_lo),
        destination: pick(ctxt.destination, dest, dest_hi, dest_lo),
    };
    let udp = Udp {
        source: 1024,
        destination: 5683,
        payload,
    };

    roundtrip(&packet(&ip, &udp), Encoding::Hc1);
}

#[quickcheck]
fn classification_is_total(byte: u8) -> bool {
    // every byte maps to exactly one class; the fragment ranges don't overlap IPHC
    let class = dispatch::classify(byte);
    class == dispatch::classify(byte)
        && (class != dispatch::Dispatch::Iphc || byte >> 5 == 0b011)
        && (class != dispatch::Dispatch::Frag1 || byte >> 3 == 0b11000)
        && (class != dispatch::Dispatch::FragN || byte >> 3 == 0b11100)
}

#[test]
fn traffic_class_flow_label() {
    let ctxt = ctxt();
    let udp = Udp {
        source: 1,
        destination: 2,
        payload: vec![0xaa; 4],
    };

    // (traffic class, flow label) -> TF
    for &(tc, fl, tf) in &[
        (0, 0, 0b11),
        (0b1010_1101, 0, 0b10),
        (0b0000_0001, 0xabcde, 0b01),
        (0b1010_1101, 0xabcde, 0b00),
    ] {
        let ip = Ip {
            traffic_class: tc,
            flow_label: fl,
            hop_limit: 64,
            source: ctxt.source.link_local(),
            destination: ctxt.destination.link_local(),
        };
        let original = packet(&ip, &udp);

        let (compressed, _) =
            sixlowpan::compress(&original, &ctxt, Encoding::Iphc, true).unwrap();
        let iphc = iphc::Packet::parse(compressed.as_slice()).unwrap();
        assert_eq!(iphc.get_tf(), tf);
        assert_eq!(iphc.get_traffic_class(), tc);
        assert_eq!(iphc.get_flow_label(), fl);

        assert_eq!(
            sixlowpan::decompress(compressed.as_slice(), &ctxt).unwrap(),
            original
        );
    }
}

#[test]
fn documentation_prefix() {
    // 2001:db8::1 -> 2001:db8::2, UDP, hop limit 64
    let ctxt = ctxt();
    let ip = Ip {
        traffic_class: 0,
        flow_label: 0,
        hop_limit: 64,
        source: addr(0x2001_0db8 << 32, 1),
        destination: addr(0x2001_0db8 << 32, 2),
    };
    let udp = Udp {
        source: 1234,
        destination: 5678,
        payload: b"Hello".to_vec(),
    };
    let original = packet(&ip, &udp);

    let (compressed, header_size) =
        sixlowpan::compress(&original, &ctxt, Encoding::Iphc, true).unwrap();
    assert_eq!(header_size, 48);

    let iphc = iphc::Packet::parse(compressed.as_slice()).unwrap();
    assert_eq!(iphc.get_tf(), 0b11);
    assert!(iphc.get_nh());
    assert_eq!(iphc.get_hlim(), 0b10);
    assert_eq!(iphc.get_sam(), 0b00);
    assert!(!iphc.get_m());
    assert_eq!(iphc.get_dam(), 0b00);

    let bytes = compressed.as_slice();
    assert_eq!(&bytes[..2], &[0x7e, 0x00]);
    assert_eq!(&bytes[2..18], &ip.source.0[..]);
    assert_eq!(&bytes[18..34], &ip.destination.0[..]);
    // UDP NHC: checksum elided, both ports inline
    assert_eq!(bytes[34], 0xf4);
    assert_eq!(&bytes[35..39], &[0x04, 0xd2, 0x16, 0x2e]);
    assert_eq!(&bytes[39..], b"Hello");

    assert_eq!(sixlowpan::decompress(bytes, &ctxt).unwrap(), original);
}

#[test]
fn udp_port_ranges() {
    let ctxt = ctxt();

    // (source, destination) -> compressed UDP header size (checksum elided)
    for &(source, destination, size) in &[
        (0xf0b0, 0xf0bf, 2),
        (0xf0bf, 0xf0b0, 2),
        (0xf0c0, 0xf0b0, 4),
        (0xf0af, 0xf0bf, 4),
        (0xf012, 0x1234, 4),
        (0x1234, 0xf012, 4),
        (0x1234, 0x5678, 5),
    ] {
        let ip = Ip {
            traffic_class: 0,
            flow_label: 0,
            hop_limit: 64,
            source: ctxt.source.link_local(),
            destination: ctxt.destination.link_local(),
        };
        let udp = Udp {
            source,
            destination,
            payload: vec![1, 2, 3],
        };
        let original = packet(&ip, &udp);

        let (compressed, _) =
            sixlowpan::compress(&original, &ctxt, Encoding::Iphc, true).unwrap();
        // IPHC (2 bytes) + UDP NHC + payload
        assert_eq!(compressed.len(), 2 + size + 3);

        assert_eq!(
            sixlowpan::decompress(compressed.as_slice(), &ctxt).unwrap(),
            original
        );
    }
}

#[test]
fn inline_checksum() {
    let ctxt = ctxt();
    let ip = Ip {
        traffic_class: 0,
        flow_label: 0,
        hop_limit: 255,
        source: ctxt.source.link_local(),
        destination: ipv6::Addr::ALL_NODES,
    };
    let udp = Udp {
        source: 0xf0b1,
        destination: 0xf0b2,
        payload: vec![0; 10],
    };
    let original = packet(&ip, &udp);

    let (compressed, _) = sixlowpan::compress(&original, &ctxt, Encoding::Iphc, false).unwrap();
    let decompressed = sixlowpan::decompress(compressed.as_slice(), &ctxt).unwrap();
    assert_eq!(decompressed, original);

    let ip = ipv6::Packet::parse(&decompressed[..]).unwrap();
    let udp = udp::Packet::parse(ip.payload()).unwrap();
    assert!(udp.verify_ipv6_checksum(ip.get_source(), ip.get_destination()));
}
