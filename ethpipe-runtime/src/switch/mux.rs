use crate::stream::{Beat, Channel};
use crate::switch::SwitchCounters;
use tracing::{trace, warn};

/// What `StreamMux` does when its select changes while a frame is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectChange {
    /// Finish the frame from the latched input and switch afterwards.
    Ignore,
    /// Finish the frame from the latched input, but flag its last beat as bad.
    MarkBad,
}

impl Default for SelectChange {
    fn default() -> Self {
        SelectChange::Ignore
    }
}

/// N inputs to one output, chosen by an external select. The select is latched at the first beat
/// of a frame so a frame is never spliced with another input's beats.
#[derive(Debug)]
pub struct StreamMux {
    inputs: usize,
    select: usize,
    on_select_change: SelectChange,
    latched: Option<usize>,
    select_changed: bool,
    counters: SwitchCounters,
}

impl StreamMux {
    pub fn new(inputs: usize) -> Self {
        assert!(inputs > 0, "StreamMux needs at least one input");
        StreamMux {
            inputs,
            select: 0,
            on_select_change: SelectChange::default(),
            latched: None,
            select_changed: false,
            counters: SwitchCounters::default(),
        }
    }

    /// Changes the mid-frame select policy, default value is `SelectChange::Ignore`.
    pub fn on_select_change(self, on_select_change: SelectChange) -> Self {
        StreamMux {
            on_select_change,
            ..self
        }
    }

    pub fn set_select(&mut self, select: usize) {
        if let Some(latched) = self.latched {
            if latched != select {
                self.select_changed = true;
            }
        }
        self.select = select;
    }

    pub fn select(&self) -> usize {
        self.select
    }

    /// The input the current frame is coming from.
    pub fn latched(&self) -> Option<usize> {
        self.latched
    }

    pub fn counters(&self) -> SwitchCounters {
        self.counters
    }

    pub fn step(&mut self, inputs: &mut [Channel<Beat>], output: &mut Channel<Beat>) {
        assert_eq!(inputs.len(), self.inputs, "StreamMux input count");

        if self.latched.is_none() {
            if self.select >= self.inputs {
                return;
            }
            if !inputs[self.select].is_valid() {
                return;
            }
            trace!(input = self.select, "mux frame start");
            self.latched = Some(self.select);
            self.select_changed = false;
            self.counters.frames += 1;
        }

        let port = match self.latched {
            Some(port) => port,
            None => return,
        };
        if !output.is_ready() {
            return;
        }
        if let Some(mut beat) = inputs[port].accept() {
            if beat.last {
                if self.select_changed && self.on_select_change == SelectChange::MarkBad {
                    warn!(input = port, "mux select changed mid-frame, marking frame bad");
                    beat.error = true;
                    self.counters.bad_frames += 1;
                }
                self.latched = None;
                self.select_changed = false;
            }
            output.fill(beat);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Frame, FrameSink, FrameSource};

    struct Bench {
        sources: Vec<FrameSource>,
        inputs: Vec<Channel<Beat>>,
        output: Channel<Beat>,
        sink: FrameSink,
    }

    impl Bench {
        fn new(inputs: usize) -> Self {
            Bench {
                sources: (0..inputs).map(|_| FrameSource::new()).collect(),
                inputs: (0..inputs).map(|_| Channel::new()).collect(),
                output: Channel::new(),
                sink: FrameSink::new(),
            }
        }

        fn step(&mut self, mux: &mut StreamMux) {
            self.sink.step(&mut self.output);
            mux.step(&mut self.inputs, &mut self.output);
            for (source, input) in self.sources.iter_mut().zip(self.inputs.iter_mut()) {
                source.step(input);
            }
        }
    }

    #[test]
    fn forwards_selected_input_only() {
        let mut mux = StreamMux::new(2);
        let mut bench = Bench::new(2);
        bench.sources[0].push(Frame::new(vec![1, 2]));
        bench.sources[1].push(Frame::new(vec![3, 4]));

        mux.set_select(1);
        for _ in 0..10 {
            bench.step(&mut mux);
        }
        assert_eq!(bench.sink.frames(), &[Frame::new(vec![3, 4])]);
        assert!(bench.inputs[0].is_valid());
    }

    #[test]
    fn select_change_mid_frame_completes_latched_frame() {
        let mut mux = StreamMux::new(2).on_select_change(SelectChange::MarkBad);
        let mut bench = Bench::new(2);
        bench.sources[0].push(Frame::new(vec![1, 2, 3, 4]));
        bench.sources[1].push(Frame::new(vec![5, 6]));

        bench.step(&mut mux);
        bench.step(&mut mux);
        assert_eq!(mux.latched(), Some(0));
        mux.set_select(1);
        for _ in 0..20 {
            bench.step(&mut mux);
        }

        assert_eq!(
            bench.sink.frames(),
            &[
                Frame::new(vec![1, 2, 3, 4]).with_error(true),
                Frame::new(vec![5, 6])
            ]
        );
        assert_eq!(mux.counters().bad_frames, 1);
        assert_eq!(mux.counters().frames, 2);
    }

    #[test]
    fn select_change_ignored_by_default() {
        let mut mux = StreamMux::new(2);
        let mut bench = Bench::new(2);
        bench.sources[0].push(Frame::new(vec![1, 2, 3]));

        bench.step(&mut mux);
        bench.step(&mut mux);
        mux.set_select(1);
        for _ in 0..10 {
            bench.step(&mut mux);
        }
        assert_eq!(bench.sink.frames(), &[Frame::new(vec![1, 2, 3])]);
        assert_eq!(mux.counters().bad_frames, 0);
    }

    #[test]
    #[should_panic]
    fn input_count_is_checked() {
        let mut mux = StreamMux::new(3);
        let mut inputs = vec![Channel::new()];
        mux.step(&mut inputs, &mut Channel::new());
    }
}
