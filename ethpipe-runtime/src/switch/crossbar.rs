use crate::arbiter::{Arbiter, ArbiterPolicy};
use crate::stream::{forward, Beat, Channel};
use crate::switch::{tag_as_index, Route, SwitchCounters};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputState {
    Idle,
    /// Waiting for the output's arbiter.
    Requesting(usize),
    Granted(usize),
    Drop,
}

/// N inputs to M outputs. Each input's frame is routed by the tag of its first beat; each output
/// runs its own blocking arbiter over the inputs requesting it, so an output stays locked to one
/// input for the whole frame. A losing input keeps its beat on offer, untouched, until it wins.
pub struct StreamSwitch {
    inputs: usize,
    outputs: usize,
    route: Route,
    states: Vec<InputState>,
    arbiters: Vec<Arbiter>,
    counters: SwitchCounters,
}

impl StreamSwitch {
    pub fn new(inputs: usize, outputs: usize) -> Self {
        assert!(inputs > 0, "StreamSwitch needs at least one input");
        assert!(outputs > 0, "StreamSwitch needs at least one output");
        StreamSwitch {
            inputs,
            outputs,
            route: tag_as_index(),
            states: vec![InputState::Idle; inputs],
            arbiters: (0..outputs)
                .map(|_| Arbiter::new(inputs, ArbiterPolicy::RoundRobin))
                .collect(),
            counters: SwitchCounters::default(),
        }
    }

    pub fn route(self, route: Route) -> Self {
        StreamSwitch { route, ..self }
    }

    /// Changes the arbitration policy of every output, default value is round robin.
    pub fn arbiter_policy(self, policy: ArbiterPolicy) -> Self {
        let inputs = self.inputs;
        StreamSwitch {
            arbiters: (0..self.outputs)
                .map(|_| Arbiter::new(inputs, policy))
                .collect(),
            ..self
        }
    }

    /// The input currently holding `output`.
    pub fn grant(&self, output: usize) -> Option<usize> {
        self.arbiters[output].grant()
    }

    pub fn counters(&self) -> SwitchCounters {
        self.counters
    }

    pub fn step(&mut self, inputs: &mut [Channel<Beat>], outputs: &mut [Channel<Beat>]) {
        assert_eq!(inputs.len(), self.inputs, "StreamSwitch input count");
        assert_eq!(outputs.len(), self.outputs, "StreamSwitch output count");

        for (index, input) in inputs.iter().enumerate() {
            if self.states[index] != InputState::Idle {
                continue;
            }
            if let Some(beat) = input.peek() {
                self.states[index] = match (self.route)(beat.tag) {
                    Some(output) if output < self.outputs => InputState::Requesting(output),
                    _ => {
                        warn!(input = index, tag = beat.tag, "switch tag has no destination");
                        self.counters.bad_frames += 1;
                        InputState::Drop
                    }
                };
            }
        }

        for output in 0..self.outputs {
            if self.arbiters[output].grant().is_some() {
                continue;
            }
            let requests: Vec<bool> = self
                .states
                .iter()
                .map(|state| *state == InputState::Requesting(output))
                .collect();
            if let Some(winner) = self.arbiters[output].arbitrate(&requests) {
                debug!(input = winner, output, "switch grant");
                self.states[winner] = InputState::Granted(output);
                self.counters.frames += 1;
            }
        }

        for (index, input) in inputs.iter_mut().enumerate() {
            let moved = match self.states[index] {
                InputState::Granted(output) => forward(input, &mut outputs[output]),
                InputState::Drop => input.accept(),
                _ => None,
            };
            if let Some(beat) = moved {
                if beat.last {
                    if let InputState::Granted(output) = self.states[index] {
                        self.arbiters[output].release();
                    }
                    self.states[index] = InputState::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Frame, FrameSink, FrameSource};
    use rand::{thread_rng, Rng};

    #[test]
    fn contention_serializes_whole_frames() {
        let mut switch = StreamSwitch::new(2, 1);
        let mut inputs = vec![Channel::new(), Channel::new()];
        let mut outputs = vec![Channel::new()];
        let mut sources = vec![FrameSource::new(), FrameSource::new()];
        let mut sink = FrameSink::new();

        let a = Frame::new((0..10).collect());
        let b = Frame::new((100..110).collect());
        sources[0].push(a.clone());
        sources[1].push(b.clone());
        sources[0].step(&mut inputs[0]);
        sources[1].step(&mut inputs[1]);

        switch.step(&mut inputs, &mut outputs);
        assert_eq!(switch.grant(0), Some(0));
        assert_eq!(inputs[1].peek(), Some(&b.beat(0)));

        for _ in 0..40 {
            sink.step(&mut outputs[0]);
            switch.step(&mut inputs, &mut outputs);
            sources[0].step(&mut inputs[0]);
            sources[1].step(&mut inputs[1]);
        }
        assert_eq!(sink.frames(), &[a, b]);
        assert_eq!(switch.counters().frames, 2);
    }

    #[test]
    fn random_traffic_keeps_per_flow_order() {
        let mut rng = thread_rng();
        let (n, m) = (3, 2);
        let mut switch = StreamSwitch::new(n, m);
        let mut inputs: Vec<Channel<Beat>> = (0..n).map(|_| Channel::new()).collect();
        let mut outputs: Vec<Channel<Beat>> = (0..m).map(|_| Channel::new()).collect();
        let mut sources: Vec<FrameSource> = (0..n).map(|_| FrameSource::new()).collect();
        let mut sinks: Vec<FrameSink> = (0..m)
            .map(|_| FrameSink::with_ready(Box::new(|| thread_rng().gen_bool(0.6))))
            .collect();

        let mut sent = vec![vec![]; n];
        for (input, source) in sources.iter_mut().enumerate() {
            for seq in 0..30u8 {
                let dest = rng.gen_range(0, m as u16);
                let len = rng.gen_range(1, 12);
                let mut data = vec![input as u8, seq];
                data.extend((0..len).map(|_| rng.gen::<u8>()));
                let frame = Frame::new(data).with_tag(dest);
                sent[input].push(frame.clone());
                source.push(frame);
            }
        }

        for _ in 0..20_000 {
            for (sink, output) in sinks.iter_mut().zip(outputs.iter_mut()) {
                sink.step(output);
            }
            switch.step(&mut inputs, &mut outputs);
            for (source, input) in sources.iter_mut().zip(inputs.iter_mut()) {
                source.step(input);
            }
        }

        for (dest, sink) in sinks.iter().enumerate() {
            for input in 0..n {
                let expected: Vec<&Frame> = sent[input]
                    .iter()
                    .filter(|f| usize::from(f.tag) == dest)
                    .collect();
                let got: Vec<&Frame> = sink
                    .frames()
                    .iter()
                    .filter(|f| usize::from(f.data[0]) == input)
                    .collect();
                assert_eq!(got, expected);
            }
        }
    }

    #[test]
    fn unroutable_frames_are_dropped() {
        let mut switch = StreamSwitch::new(1, 1);
        let mut inputs = vec![Channel::new()];
        let mut outputs = vec![Channel::new()];
        inputs[0].offer(Beat::last(1).with_tag(9)).unwrap();
        switch.step(&mut inputs, &mut outputs);
        assert!(!inputs[0].is_valid());
        assert!(!outputs[0].is_valid());
        assert_eq!(switch.counters().bad_frames, 1);
    }
}
