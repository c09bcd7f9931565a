use crate::arbiter::{Arbiter, ArbiterPolicy};
use crate::stream::{forward, LayerPort};
use crate::switch::SwitchCounters;
use tracing::trace;

/// Merges N layer ports into one. A blocking arbiter picks the next input with a header on offer;
/// that input keeps the output until its payload's last beat.
#[derive(Clone, Debug)]
pub struct PortArbMux {
    arbiter: Arbiter,
    active: Option<usize>,
    counters: SwitchCounters,
}

impl PortArbMux {
    pub fn new(inputs: usize, policy: ArbiterPolicy) -> Self {
        PortArbMux {
            arbiter: Arbiter::new(inputs, policy),
            active: None,
            counters: SwitchCounters::default(),
        }
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn counters(&self) -> SwitchCounters {
        self.counters
    }

    pub fn step<H>(&mut self, inputs: &mut [LayerPort<H>], output: &mut LayerPort<H>) {
        if self.active.is_none() && output.header.is_ready() {
            let requests: Vec<bool> = inputs.iter().map(|port| port.header.is_valid()).collect();
            if let Some(winner) = self.arbiter.arbitrate(&requests) {
                if let Some(header) = inputs[winner].header.accept() {
                    trace!(input = winner, "port mux frame start");
                    output.header.fill(header);
                    self.active = Some(winner);
                    self.counters.frames += 1;
                }
            }
        }

        if let Some(active) = self.active {
            if let Some(beat) = forward(&mut inputs[active].payload, &mut output.payload) {
                if beat.last {
                    self.arbiter.release();
                    self.active = None;
                }
            }
        }
    }
}
