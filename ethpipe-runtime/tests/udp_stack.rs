use ethpipe_packets::{IpProtocol, MacAddr, UdpHeader, IPV4_ETHER_TYPE};
use ethpipe_runtime::config::{ArpConfig, InterfaceConfig, StackConfig};
use ethpipe_runtime::ip::IpRecord;
use ethpipe_runtime::stack::UdpStack;
use ethpipe_runtime::stream::{Beat, Channel, Frame, PortSink, PortSource};
use ethpipe_runtime::udp::UdpRecord;
use std::net::Ipv4Addr;

fn address(host: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 7, host)
}

fn stack(host: u8) -> UdpStack {
    // A request and its reply take a few hundred steps on a byte-wide link.
    let arp = ArpConfig {
        retry_interval: 1000,
        request_timeout: 1000,
        ..ArpConfig::default()
    };
    let interface = InterfaceConfig::new(MacAddr::new([2, 0, 0, 0, 7, host]), address(host));
    UdpStack::new(StackConfig::new(interface).arp(arp)).unwrap()
}

fn datagram(destination: Ipv4Addr, src_port: u16, dest_port: u16) -> UdpRecord {
    let mut record = UdpRecord::default();
    record.ip.destination = destination;
    record.udp = UdpHeader::new(src_port, dest_port);
    record
}

/// The cable between two stacks. Optionally flips one bit in the first byte of the UDP payload
/// of the next IPv4 frame that crosses it.
#[derive(Default)]
struct Wire {
    offset: usize,
    ether_type: u16,
    corrupt_next: bool,
}

impl Wire {
    const UDP_PAYLOAD: usize = 14 + 20 + 8;

    fn step(&mut self, from: &mut Channel<Beat>, to: &mut Channel<Beat>) {
        if !to.is_ready() {
            return;
        }
        let mut beat = match from.accept() {
            Some(beat) => beat,
            None => return,
        };
        match self.offset {
            12 => self.ether_type = u16::from(beat.data) << 8,
            13 => self.ether_type |= u16::from(beat.data),
            Self::UDP_PAYLOAD if self.corrupt_next && self.ether_type == IPV4_ETHER_TYPE => {
                beat.data ^= 0x10;
                self.corrupt_next = false;
            }
            _ => {}
        }
        self.offset = if beat.last { 0 } else { self.offset + 1 };
        assert!(to.offer(beat).is_ok());
    }
}

struct Bench {
    a: UdpStack,
    b: UdpStack,
    a_out: Channel<Beat>,
    a_in: Channel<Beat>,
    b_out: Channel<Beat>,
    b_in: Channel<Beat>,
    a_to_b: Wire,
    b_to_a: Wire,
}

impl Bench {
    fn new() -> Self {
        Bench {
            a: stack(1),
            b: stack(2),
            a_out: Channel::new(),
            a_in: Channel::new(),
            b_out: Channel::new(),
            b_in: Channel::new(),
            a_to_b: Wire::default(),
            b_to_a: Wire::default(),
        }
    }

    fn step(&mut self) {
        self.a_to_b.step(&mut self.a_out, &mut self.b_in);
        self.b_to_a.step(&mut self.b_out, &mut self.a_in);
        self.a.step(&mut self.a_in, &mut self.a_out);
        self.b.step(&mut self.b_in, &mut self.b_out);
    }
}

#[test]
fn datagrams_cross_in_both_directions() {
    let mut bench = Bench::new();
    let mut from_a = PortSource::new();
    let mut from_b = PortSource::new();
    for n in 0..4u8 {
        from_a.push(
            datagram(address(2), 5000, 53),
            Frame::new(vec![n; 10 + usize::from(n)]),
        );
        from_b.push(
            datagram(address(1), 53, 5000),
            Frame::new(vec![0xF0 | n; 3]),
        );
    }
    let (mut at_a, mut at_b) = (PortSink::new(), PortSink::new());

    for _ in 0..5000 {
        at_a.step(bench.a.udp_rx());
        at_b.step(bench.b.udp_rx());
        bench.step();
        from_a.step(bench.a.udp_tx());
        from_b.step(bench.b.udp_tx());
    }

    let received = at_b.take_received();
    assert_eq!(received.len(), 4);
    for (n, (record, payload)) in received.iter().enumerate() {
        assert_eq!(payload, &Frame::new(vec![n as u8; 10 + n]));
        assert_eq!(record.ip.source, address(1));
        assert_eq!(record.eth.src_mac, MacAddr::new([2, 0, 0, 0, 7, 1]));
        assert_eq!((record.udp.src_port, record.udp.dest_port), (5000, 53));
    }
    let received = at_a.take_received();
    assert_eq!(received.len(), 4);
    for (n, (record, payload)) in received.iter().enumerate() {
        assert_eq!(payload, &Frame::new(vec![0xF0 | n as u8; 3]));
        assert_eq!(record.ip.source, address(2));
    }

    let (a, b) = (bench.a.status(), bench.b.status());
    assert!(!a.busy() && !b.busy());
    // Both sides start sending at once, so each resolves the other with a single request.
    assert_eq!(a.ip.arp.requests_sent, 1, "{:?}", a.ip.arp);
    assert_eq!(b.ip.arp.requests_sent, 1, "{:?}", b.ip.arp);
    assert_eq!(a.udp_rx.invalid_checksum + b.udp_rx.invalid_checksum, 0);
    assert_eq!(a.checksum_gen.map(|c| c.frames), Some(4));
}

#[test]
fn corrupted_payload_is_flagged() {
    let mut bench = Bench::new();
    let mut source = PortSource::new();
    source.push(datagram(address(2), 1, 2), Frame::new(vec![0x55; 16]));
    source.push(datagram(address(2), 1, 2), Frame::new(vec![0x66; 16]));
    let mut sink = PortSink::new();
    bench.a_to_b.corrupt_next = true;

    for _ in 0..3000 {
        sink.step(bench.b.udp_rx());
        bench.step();
        source.step(bench.a.udp_tx());
    }

    let received = sink.take_received();
    assert_eq!(received.len(), 2);
    assert!(received[0].1.error);
    assert!(!received[1].1.error);
    assert_eq!(received[1].1, Frame::new(vec![0x66; 16]));
    assert_eq!(bench.b.status().udp_rx.invalid_checksum, 1);
}

#[test]
fn other_protocols_use_the_raw_port() {
    let mut bench = Bench::new();
    let mut source = PortSource::new();
    let mut record = IpRecord::default();
    record.ip.protocol = IpProtocol::ICMP;
    record.ip.destination = address(2);
    source.push(record, Frame::new(vec![8, 0, 0, 0, 1, 2, 3, 4]));
    let (mut raw, mut udp) = (PortSink::new(), PortSink::<UdpRecord>::new());

    for _ in 0..3000 {
        raw.step(bench.b.raw_ip_rx());
        udp.step(bench.b.udp_rx());
        bench.step();
        source.step(bench.a.raw_ip_tx());
    }

    let received = raw.take_received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0.ip.protocol, IpProtocol::ICMP);
    assert_eq!(received[0].0.ip.source, address(1));
    assert_eq!(received[0].1, Frame::new(vec![8, 0, 0, 0, 1, 2, 3, 4]));
    assert!(udp.received().is_empty());
}

#[test]
fn unreachable_destinations_are_dropped() {
    let mut bench = Bench::new();
    let mut source = PortSource::new();
    source.push(datagram(Ipv4Addr::new(8, 8, 8, 8), 1, 2), Frame::new(vec![1, 2, 3]));
    source.push(datagram(address(2), 1, 2), Frame::new(vec![4, 5, 6]));
    let mut sink = PortSink::new();

    for _ in 0..3000 {
        sink.step(bench.b.udp_rx());
        bench.step();
        source.step(bench.a.udp_tx());
    }

    let received = sink.take_received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].1, Frame::new(vec![4, 5, 6]));
    assert_eq!(bench.a.status().ip.resolver.no_route, 1);
}

#[test]
fn largest_configured_payload_goes_through() {
    let mut bench = Bench::new();
    let max = bench.a.config().max_payload_len;
    let payload: Vec<u8> = (0..max).map(|n| n as u8).collect();
    let mut source = PortSource::new();
    source.push(datagram(address(2), 7, 9), Frame::new(payload.clone()));
    let mut sink = PortSink::new();

    for _ in 0..12_000 {
        sink.step(bench.b.udp_rx());
        bench.step();
        source.step(bench.a.udp_tx());
    }

    let received = sink.take_received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].1, Frame::new(payload));
    assert_eq!(usize::from(received[0].0.udp.length), 8 + max);
    assert_eq!(usize::from(received[0].0.ip.total_length), 28 + max);
    let status = bench.a.status();
    assert_eq!(status.ip.resolver.oversize, 0);
    assert_eq!(status.ip.resolver.frames, 1);
    assert_eq!(bench.b.status().udp_rx.invalid_checksum, 0);
}
