use crate::classifier::Classifier;
use crate::stream::{forward, LayerPort};
use crate::switch::SwitchCounters;
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PortDemuxState {
    Idle,
    Forward(usize),
    Drop,
}

/// Routes header/payload pairs to one of N layer ports using a `Classifier`. The classifier runs
/// once per header; the payload follows it to the same port. Headers the classifier has no port
/// for are consumed along with their payload.
pub struct PortDemux<C: Classifier> {
    classifier: C,
    outputs: usize,
    state: PortDemuxState,
    counters: SwitchCounters,
}

impl<C: Classifier> PortDemux<C> {
    pub fn new(classifier: C, outputs: usize) -> Self {
        assert!(outputs > 0, "PortDemux needs at least one output");
        PortDemux {
            classifier,
            outputs,
            state: PortDemuxState::Idle,
            counters: SwitchCounters::default(),
        }
    }

    pub fn busy(&self) -> bool {
        self.state != PortDemuxState::Idle
    }

    pub fn counters(&self) -> SwitchCounters {
        self.counters
    }

    pub fn step(
        &mut self,
        input: &mut LayerPort<C::Header>,
        outputs: &mut [LayerPort<C::Header>],
    ) {
        assert_eq!(outputs.len(), self.outputs, "PortDemux output count");

        if self.state == PortDemuxState::Idle {
            let decision = match input.header.peek() {
                Some(header) => self.classifier.classify(header),
                None => return,
            };
            match decision {
                Some(port) if port < self.outputs => {
                    if !outputs[port].header.is_ready() {
                        return;
                    }
                    if let Some(header) = input.header.accept() {
                        trace!(port, "port demux frame start");
                        outputs[port].header.fill(header);
                        self.counters.frames += 1;
                        self.state = PortDemuxState::Forward(port);
                    }
                }
                _ => {
                    warn!("no port for header, dropping frame");
                    input.header.accept();
                    self.counters.dropped += 1;
                    self.state = PortDemuxState::Drop;
                }
            }
        }

        let moved = match self.state {
            PortDemuxState::Forward(port) => {
                forward(&mut input.payload, &mut outputs[port].payload)
            }
            PortDemuxState::Drop => input.payload.accept(),
            PortDemuxState::Idle => None,
        };
        if let Some(beat) = moved {
            if beat.last {
                self.state = PortDemuxState::Idle;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::EtherTypeClassifier;
    use crate::stream::{Frame, PortSink, PortSource};
    use ethpipe_packets::{EthernetHeader, MacAddr, ARP_ETHER_TYPE, IPV4_ETHER_TYPE};

    fn header(ether_type: u16) -> EthernetHeader {
        EthernetHeader::new(MacAddr::BROADCAST, MacAddr::ZERO, ether_type)
    }

    #[test]
    fn splits_by_ether_type() {
        let classifier = EtherTypeClassifier::new(vec![(ARP_ETHER_TYPE, 0), (IPV4_ETHER_TYPE, 1)]);
        let mut demux = PortDemux::new(classifier, 2);
        let mut source = PortSource::new();
        source.push(header(IPV4_ETHER_TYPE), Frame::new(vec![1, 2, 3]));
        source.push(header(0x86DD), Frame::new(vec![9, 9]));
        source.push(header(ARP_ETHER_TYPE), Frame::new(vec![4]));
        source.push(header(IPV4_ETHER_TYPE), Frame::new(vec![5, 6]));

        let mut input = LayerPort::new();
        let mut outputs = vec![LayerPort::new(), LayerPort::new()];
        let mut sinks = vec![PortSink::new(), PortSink::new()];
        for _ in 0..40 {
            for (sink, output) in sinks.iter_mut().zip(outputs.iter_mut()) {
                sink.step(output);
            }
            demux.step(&mut input, &mut outputs);
            source.step(&mut input);
        }

        assert_eq!(
            sinks[0].received(),
            &[(header(ARP_ETHER_TYPE), Frame::new(vec![4]))]
        );
        assert_eq!(
            sinks[1].received(),
            &[
                (header(IPV4_ETHER_TYPE), Frame::new(vec![1, 2, 3])),
                (header(IPV4_ETHER_TYPE), Frame::new(vec![5, 6]))
            ]
        );
        assert_eq!(demux.counters().dropped, 1);
        assert_eq!(demux.counters().frames, 3);
    }
}
