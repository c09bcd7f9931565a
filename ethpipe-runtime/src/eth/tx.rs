use crate::stream::{Beat, Channel, Cut, LayerPort, PayloadCut, Prefix};
use ethpipe_packets::EthernetHeader;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EthTxState {
    Idle,
    Header,
    Payload,
}

/// Joins a header record and its payload into one link frame: the fourteen header bytes, then the
/// payload, with no gap between them.
pub struct EthTx {
    state: EthTxState,
    prefix: Prefix,
    cut: PayloadCut,
    frames: u64,
}

impl EthTx {
    pub fn new() -> Self {
        EthTx {
            state: EthTxState::Idle,
            prefix: Prefix::new(),
            cut: PayloadCut::default(),
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn busy(&self) -> bool {
        self.state != EthTxState::Idle
    }

    pub fn step(&mut self, input: &mut LayerPort<EthernetHeader>, output: &mut Channel<Beat>) {
        if self.state == EthTxState::Idle {
            match input.header.accept() {
                Some(header) => {
                    trace!(
                        dest = %header.dest_mac,
                        ether_type = header.ether_type,
                        "Ethernet frame out"
                    );
                    self.prefix.start(&header.to_bytes());
                    self.cut.start(None);
                    self.state = EthTxState::Header;
                }
                None => return,
            }
        }

        match self.state {
            EthTxState::Header => {
                if self.prefix.step(output) {
                    self.state = EthTxState::Payload;
                }
            }
            EthTxState::Payload => {
                if self.cut.step(&mut input.payload, output, |_, _| {}) == Cut::Ended {
                    self.state = EthTxState::Idle;
                    self.frames += 1;
                }
            }
            EthTxState::Idle => {}
        }
    }
}

impl Default for EthTx {
    fn default() -> Self {
        EthTx::new()
    }
}
