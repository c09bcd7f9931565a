use crate::stream::{Beat, LayerPort};
use crate::udp::UdpRecord;
use ethpipe_packets::{Checksum, IpProtocol, Ipv4Header, UdpHeader};
use std::net::Ipv4Addr;
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UdpChecksumGenCounters {
    pub frames: u64,
    /// Payloads that arrived flagged bad.
    pub payload_early_termination: u64,
    /// Payloads longer than the buffer.
    pub oversize: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GenState {
    Idle,
    Collect,
    Header,
    Emit(usize),
    Drop,
}

/// Completes UDP headers on transmit.
///
/// A UDP checksum covers the length field, so nothing can be sent before the whole payload has
/// been seen. The payload is summed as it is buffered; once its last beat is in, the length and
/// checksum fields are filled, the IPv4 total length and protocol follow from them, and the record
/// goes out ahead of the buffered payload. An unspecified source address is replaced with the
/// local one first, since the checksum covers it.
#[derive(Debug)]
pub struct UdpChecksumGen {
    local_ip: Ipv4Addr,
    state: GenState,
    record: UdpRecord,
    payload: Vec<u8>,
    max_len: usize,
    running: Checksum,
    counters: UdpChecksumGenCounters,
}

impl UdpChecksumGen {
    pub fn new(local_ip: Ipv4Addr, max_len: usize) -> Self {
        assert!(max_len > 0, "UdpChecksumGen max_len must be > 0");
        UdpChecksumGen {
            local_ip,
            state: GenState::Idle,
            record: UdpRecord::default(),
            payload: Vec::with_capacity(max_len),
            max_len,
            running: Checksum::new(),
            counters: UdpChecksumGenCounters::default(),
        }
    }

    pub fn counters(&self) -> UdpChecksumGenCounters {
        self.counters
    }

    pub fn busy(&self) -> bool {
        self.state != GenState::Idle
    }

    pub fn step(&mut self, input: &mut LayerPort<UdpRecord>, output: &mut LayerPort<UdpRecord>) {
        match self.state {
            GenState::Idle => {
                if let Some(record) = input.header.accept() {
                    self.record = record;
                    self.payload.clear();
                    self.running = Checksum::new();
                    self.state = GenState::Collect;
                }
            }
            GenState::Collect => self.collect(input),
            GenState::Header => {
                if output.header.offer(self.record).is_ok() {
                    self.state = GenState::Emit(0);
                    self.emit(output);
                }
            }
            GenState::Emit(_) => self.emit(output),
            GenState::Drop => {
                if let Some(beat) = input.payload.accept() {
                    if beat.last {
                        self.state = GenState::Idle;
                    }
                }
            }
        }
    }

    fn collect(&mut self, input: &mut LayerPort<UdpRecord>) {
        let beat = match input.payload.accept() {
            Some(beat) => beat,
            None => return,
        };
        if self.payload.len() == self.max_len {
            warn!(max = self.max_len, "UDP payload too long, dropping");
            self.counters.oversize += 1;
            self.state = if beat.last { GenState::Idle } else { GenState::Drop };
            return;
        }
        self.payload.push(beat.data);
        self.running.add_byte(beat.data);
        if !beat.last {
            return;
        }
        if beat.error {
            warn!("UDP payload ended early, dropping");
            self.counters.payload_early_termination += 1;
            self.state = GenState::Idle;
            return;
        }

        let record = &mut self.record;
        if record.ip.source.is_unspecified() {
            record.ip.source = self.local_ip;
        }
        record.udp.length = (UdpHeader::LEN + self.payload.len()) as u16;
        // The payload starts on an even offset, so its sum folds into the header's unchanged.
        let mut sum = record.udp.checksum_seed(record.ip.source, record.ip.destination);
        sum.add_word(self.running.sum());
        record.udp.checksum = UdpHeader::finish_checksum(&sum);
        record.ip.protocol = IpProtocol::UDP;
        record.ip.total_length = (Ipv4Header::LEN + usize::from(record.udp.length)) as u16;
        trace!(length = record.udp.length, checksum = record.udp.checksum, "UDP checksum ready");
        self.state = GenState::Header;
    }

    fn emit(&mut self, output: &mut LayerPort<UdpRecord>) {
        let index = match self.state {
            GenState::Emit(index) => index,
            _ => return,
        };
        let last = index + 1 == self.payload.len();
        if output
            .payload
            .offer(Beat::new(self.payload[index]).with_last(last))
            .is_err()
        {
            return;
        }
        self.state = if last {
            self.counters.frames += 1;
            GenState::Idle
        } else {
            GenState::Emit(index + 1)
        };
    }
}
