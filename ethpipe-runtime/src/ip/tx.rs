use crate::ip::IpRecord;
use crate::stream::{Cut, LayerPort, PayloadCut, Prefix};
use ethpipe_packets::{EthernetHeader, Ipv4Header};
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IpTxCounters {
    pub frames: u64,
    /// Payloads that ended before the declared total length. The frame goes out flagged bad.
    pub payload_early_termination: u64,
    /// Payloads that ran past the declared total length. The frame is cut there and flagged bad.
    pub payload_overrun: u64,
    /// Records whose total length leaves no room for a payload. The frame is consumed.
    pub invalid_header: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IpTxState {
    Idle,
    Header,
    Payload,
    Drop,
}

/// Writes a twenty byte IPv4 header in front of each payload and hands the result to the Ethernet
/// layer. The record's total length is trusted and the payload is cut to match it; the header
/// checksum is recomputed here, so records may arrive with it unset.
pub struct IpTx {
    state: IpTxState,
    prefix: Prefix,
    cut: PayloadCut,
    counters: IpTxCounters,
}

impl IpTx {
    pub fn new() -> Self {
        IpTx {
            state: IpTxState::Idle,
            prefix: Prefix::new(),
            cut: PayloadCut::default(),
            counters: IpTxCounters::default(),
        }
    }

    pub fn counters(&self) -> IpTxCounters {
        self.counters
    }

    pub fn busy(&self) -> bool {
        self.state != IpTxState::Idle
    }

    pub fn step(
        &mut self,
        input: &mut LayerPort<IpRecord>,
        output: &mut LayerPort<EthernetHeader>,
    ) {
        if self.state == IpTxState::Idle {
            if !output.header.is_ready() {
                return;
            }
            let mut record = match input.header.accept() {
                Some(record) => record,
                None => return,
            };
            if usize::from(record.ip.total_length) <= Ipv4Header::LEN {
                warn!(total_length = record.ip.total_length, "IPv4 record without payload");
                self.counters.invalid_header += 1;
                self.state = IpTxState::Drop;
                return;
            }

            record.ip.ihl = 5;
            record.ip.header_checksum = record.ip.compute_checksum();
            trace!(
                dst = %record.ip.destination,
                total_length = record.ip.total_length,
                "IPv4 datagram out"
            );
            output.header.fill(record.eth);
            self.prefix.start(&record.ip.to_bytes());
            self.cut
                .start(Some(usize::from(record.ip.total_length) - Ipv4Header::LEN));
            self.state = IpTxState::Header;
        }

        match self.state {
            IpTxState::Header => {
                if self.prefix.step(&mut output.payload) {
                    self.state = IpTxState::Payload;
                }
            }
            IpTxState::Payload => {
                let cut = self.cut.step(&mut input.payload, &mut output.payload, |beat, cut| {
                    if cut == Cut::Excess {
                        beat.error = true;
                    }
                });
                match cut {
                    Cut::Ended => {
                        self.counters.frames += 1;
                        self.state = IpTxState::Idle;
                    }
                    Cut::Truncated => {
                        warn!("IPv4 payload shorter than total length");
                        self.counters.payload_early_termination += 1;
                        self.state = IpTxState::Idle;
                    }
                    Cut::Excess => {
                        warn!("IPv4 payload longer than total length");
                        self.counters.payload_overrun += 1;
                    }
                    Cut::Drained { last: true } => self.state = IpTxState::Idle,
                    _ => {}
                }
            }
            IpTxState::Drop => {
                if let Some(beat) = input.payload.accept() {
                    if beat.last {
                        self.state = IpTxState::Idle;
                    }
                }
            }
            IpTxState::Idle => {}
        }
    }
}

impl Default for IpTx {
    fn default() -> Self {
        IpTx::new()
    }
}
