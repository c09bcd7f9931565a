use crate::stream::{forward, Beat, Channel};
use crate::switch::{tag_as_index, DropPolicy, Route, SwitchCounters};
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DemuxState {
    Idle,
    Forward(usize),
    Drop,
}

/// One input to N outputs. The destination is decoded from the tag of a frame's first beat and
/// held until its last beat. Frames whose tag decodes to no output are drained and counted as bad.
pub struct StreamDemux {
    outputs: usize,
    route: Route,
    policy: DropPolicy,
    state: DemuxState,
    counters: SwitchCounters,
}

impl StreamDemux {
    /// Creates a demux whose tag is the output index.
    pub fn new(outputs: usize) -> Self {
        assert!(outputs > 0, "StreamDemux needs at least one output");
        StreamDemux {
            outputs,
            route: tag_as_index(),
            policy: DropPolicy::default(),
            state: DemuxState::Idle,
            counters: SwitchCounters::default(),
        }
    }

    pub fn route(self, route: Route) -> Self {
        StreamDemux { route, ..self }
    }

    /// Changes the drop policy, default value is `DropPolicy::Block`.
    pub fn drop_policy(self, policy: DropPolicy) -> Self {
        StreamDemux { policy, ..self }
    }

    /// The output the current frame is going to, if a frame is in flight.
    pub fn selected(&self) -> Option<usize> {
        match self.state {
            DemuxState::Forward(port) => Some(port),
            _ => None,
        }
    }

    pub fn busy(&self) -> bool {
        self.state != DemuxState::Idle
    }

    pub fn counters(&self) -> SwitchCounters {
        self.counters
    }

    pub fn step(&mut self, input: &mut Channel<Beat>, outputs: &mut [Channel<Beat>]) {
        assert_eq!(outputs.len(), self.outputs, "StreamDemux output count");

        let first = match input.peek() {
            Some(beat) => *beat,
            None => return,
        };

        if self.state == DemuxState::Idle {
            self.state = match (self.route)(first.tag) {
                Some(port) if port < self.outputs => {
                    if self.policy == DropPolicy::DropWhenFull && !outputs[port].is_ready() {
                        warn!(port, tag = first.tag, "demux output full, dropping frame");
                        self.counters.dropped += 1;
                        DemuxState::Drop
                    } else {
                        trace!(port, tag = first.tag, "demux frame start");
                        self.counters.frames += 1;
                        DemuxState::Forward(port)
                    }
                }
                _ => {
                    warn!(tag = first.tag, "demux tag has no destination, dropping frame");
                    self.counters.bad_frames += 1;
                    DemuxState::Drop
                }
            };
        }

        let moved = match self.state {
            DemuxState::Forward(port) => forward(input, &mut outputs[port]),
            DemuxState::Drop => input.accept(),
            DemuxState::Idle => None,
        };
        if let Some(beat) = moved {
            if beat.last {
                self.state = DemuxState::Idle;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Frame, FrameSink, FrameSource};
    use rand::{thread_rng, Rng};

    fn run(demux: &mut StreamDemux, frames: Vec<Frame>, sinks: &mut [FrameSink], steps: usize) {
        let mut source = FrameSource::new();
        frames.into_iter().for_each(|f| source.push(f));
        let mut input = Channel::new();
        let mut outputs: Vec<Channel<Beat>> = (0..sinks.len()).map(|_| Channel::new()).collect();
        for _ in 0..steps {
            for (sink, output) in sinks.iter_mut().zip(outputs.iter_mut()) {
                sink.step(output);
            }
            demux.step(&mut input, &mut outputs);
            source.step(&mut input);
        }
    }

    #[test]
    fn routes_whole_frames_by_tag() {
        let mut rng = thread_rng();
        let frames: Vec<Frame> = (0..60)
            .map(|_| {
                let len = rng.gen_range(1, 20);
                Frame::new((0..len).map(|_| rng.gen()).collect()).with_tag(rng.gen_range(0, 3))
            })
            .collect();

        let mut demux = StreamDemux::new(3);
        let mut sinks: Vec<FrameSink> = (0..3)
            .map(|_| FrameSink::with_ready(Box::new(|| thread_rng().gen_bool(0.5))))
            .collect();
        run(&mut demux, frames.clone(), &mut sinks, 10_000);

        for (port, sink) in sinks.iter().enumerate() {
            let expected: Vec<Frame> = frames
                .iter()
                .filter(|f| usize::from(f.tag) == port)
                .cloned()
                .collect();
            assert_eq!(sink.frames(), &expected[..]);
        }
        assert_eq!(demux.counters().frames, 60);
        assert!(!demux.busy());
    }

    #[test]
    fn bad_tags_are_drained() {
        let mut demux = StreamDemux::new(2);
        let mut sinks = vec![FrameSink::new(), FrameSink::new()];
        let frames = vec![
            Frame::new(vec![1, 2]).with_tag(5),
            Frame::new(vec![3, 4]).with_tag(1),
        ];
        run(&mut demux, frames, &mut sinks, 20);

        assert!(sinks[0].frames().is_empty());
        assert_eq!(sinks[1].frames(), &[Frame::new(vec![3, 4]).with_tag(1)]);
        assert_eq!(demux.counters().bad_frames, 1);
    }

    #[test]
    fn custom_route() {
        let mut demux = StreamDemux::new(2).route(Box::new(|tag| Some(usize::from(tag >> 8))));
        let mut sinks = vec![FrameSink::new(), FrameSink::new()];
        run(
            &mut demux,
            vec![Frame::new(vec![7]).with_tag(0x0105)],
            &mut sinks,
            5,
        );
        assert_eq!(sinks[1].frames().len(), 1);
    }

    #[test]
    fn drop_when_full_drops_whole_frame() {
        let mut demux = StreamDemux::new(1).drop_policy(DropPolicy::DropWhenFull);
        let mut input = Channel::new();
        let mut outputs = vec![Channel::new()];
        outputs[0].offer(Beat::last(0xAA)).unwrap();

        input.offer(Beat::new(1)).unwrap();
        demux.step(&mut input, &mut outputs);
        input.offer(Beat::last(2)).unwrap();
        demux.step(&mut input, &mut outputs);

        assert_eq!(demux.counters().dropped, 1);
        assert!(!demux.busy());
        assert_eq!(outputs[0].accept(), Some(Beat::last(0xAA)));
        assert_eq!(outputs[0].accept(), None);
    }
}
