use crate::stream::{Beat, Channel, Cut, LayerPort, PayloadCut};
use ethpipe_packets::EthernetHeader;
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EthRxCounters {
    pub frames: u64,
    /// Frames that ended inside the header.
    pub header_early_termination: u64,
    /// Frames that were exactly one header long.
    pub invalid_header: u64,
}

/// Splits raw link frames into header records and payloads.
#[derive(Debug, Default)]
pub struct EthRx {
    header: [u8; EthernetHeader::LEN],
    len: usize,
    in_payload: bool,
    cut: PayloadCut,
    counters: EthRxCounters,
}

impl EthRx {
    pub fn new() -> Self {
        EthRx::default()
    }

    pub fn counters(&self) -> EthRxCounters {
        self.counters
    }

    pub fn busy(&self) -> bool {
        self.len > 0 || self.in_payload
    }

    pub fn step(&mut self, input: &mut Channel<Beat>, output: &mut LayerPort<EthernetHeader>) {
        if self.in_payload {
            if self.cut.step(input, &mut output.payload, |_, _| {}) == Cut::Ended {
                self.in_payload = false;
                self.counters.frames += 1;
            }
            return;
        }

        // The header goes out with its last byte, so wait for room before taking that byte.
        if self.len + 1 == EthernetHeader::LEN && !output.header.is_ready() {
            return;
        }
        let beat = match input.accept() {
            Some(beat) => beat,
            None => return,
        };
        self.header[self.len] = beat.data;
        self.len += 1;

        if beat.last {
            if self.len < EthernetHeader::LEN {
                warn!(len = self.len, "frame ended inside the Ethernet header");
                self.counters.header_early_termination += 1;
            } else {
                warn!("Ethernet frame without payload");
                self.counters.invalid_header += 1;
            }
            self.len = 0;
            return;
        }

        if self.len == EthernetHeader::LEN {
            self.len = 0;
            match EthernetHeader::parse(&self.header) {
                Ok(header) => {
                    trace!(
                        ether_type = header.ether_type,
                        src = %header.src_mac,
                        "Ethernet header"
                    );
                    output.header.fill(header);
                    self.cut.start(None);
                    self.in_payload = true;
                }
                Err(err) => {
                    // The buffer always holds a full header here.
                    warn!(error = %err, "Ethernet header did not parse");
                    self.counters.invalid_header += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Frame, FrameSource, PortSink};
    use ethpipe_packets::{MacAddr, IPV4_ETHER_TYPE};
    use rand::{thread_rng, Rng};

    fn frame(payload: &[u8]) -> Frame {
        let header = EthernetHeader::new(
            MacAddr::BROADCAST,
            MacAddr::new([2, 0, 0, 0, 0, 1]),
            IPV4_ETHER_TYPE,
        );
        let mut data = header.to_bytes().to_vec();
        data.extend_from_slice(payload);
        Frame::new(data)
    }

    fn run(frames: Vec<Frame>) -> (Vec<(EthernetHeader, Frame)>, EthRxCounters) {
        let mut source = FrameSource::new();
        frames.into_iter().for_each(|f| source.push(f));
        let mut input = Channel::new();
        let mut output = LayerPort::new();
        let mut rx = EthRx::new();
        let mut sink = PortSink::new();
        let mut rng = thread_rng();
        for _ in 0..2000 {
            if rng.gen_bool(0.5) {
                sink.step(&mut output);
            }
            rx.step(&mut input, &mut output);
            source.step(&mut input);
        }
        assert!(!rx.busy());
        (sink.take_received(), rx.counters())
    }

    #[test]
    fn splits_header_from_payload() {
        let (received, counters) = run(vec![
            frame(&[1, 2, 3]),
            frame(&[4]),
            frame(&[5, 6]).with_error(true),
        ]);
        assert_eq!(received.len(), 3);
        assert_eq!(received[0].0.ether_type, IPV4_ETHER_TYPE);
        assert_eq!(received[0].1, Frame::new(vec![1, 2, 3]));
        assert_eq!(received[1].1, Frame::new(vec![4]));
        assert_eq!(received[2].1, Frame::new(vec![5, 6]).with_error(true));
        assert_eq!(counters.frames, 3);
    }

    #[test]
    fn short_frames_are_counted_and_dropped() {
        let (received, counters) = run(vec![
            Frame::new(vec![1, 2, 3]),
            frame(&[]),
            frame(&[7, 8]),
        ]);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].1, Frame::new(vec![7, 8]));
        assert_eq!(counters.header_early_termination, 1);
        assert_eq!(counters.invalid_header, 1);
    }
}
