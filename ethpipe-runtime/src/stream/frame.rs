use crate::stream::{Beat, Channel};
use std::collections::VecDeque;
use std::fmt;

/// A whole frame, as seen by host-facing code: its bytes, its tag and whether it was
/// marked bad on its last beat.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub tag: u16,
    pub error: bool,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Frame {
            data,
            tag: 0,
            error: false,
        }
    }

    pub fn with_tag(self, tag: u16) -> Self {
        Frame { tag, ..self }
    }

    pub fn with_error(self, error: bool) -> Self {
        Frame { error, ..self }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The `index`th beat of this frame. Every beat carries the frame's tag; only the last one
    /// carries `last` and the error flag.
    pub fn beat(&self, index: usize) -> Beat {
        let last = index + 1 == self.data.len();
        Beat::new(self.data[index])
            .with_tag(self.tag)
            .with_last(last)
            .with_error(last && self.error)
    }

    pub fn beats(&self) -> impl Iterator<Item = Beat> + '_ {
        (0..self.data.len()).map(move |index| self.beat(index))
    }
}

/// Rebuilds frames out of a beat sequence.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    data: Vec<u8>,
    tag: u16,
}

impl FrameAssembler {
    pub fn new() -> Self {
        FrameAssembler::default()
    }

    /// Returns the completed frame when `beat` is its last beat.
    pub fn push(&mut self, beat: Beat) -> Option<Frame> {
        if self.data.is_empty() {
            self.tag = beat.tag;
        }
        self.data.push(beat.data);
        if beat.last {
            let data = std::mem::replace(&mut self.data, vec![]);
            Some(Frame {
                data,
                tag: self.tag,
                error: beat.error,
            })
        } else {
            None
        }
    }

    pub fn in_frame(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Producer that offers queued frames one beat per step, re-offering the same beat until it is
/// accepted.
#[derive(Debug, Default)]
pub struct FrameSource {
    queue: VecDeque<Frame>,
    current: Option<(Frame, usize)>,
}

impl FrameSource {
    pub fn new() -> Self {
        FrameSource::default()
    }

    pub fn push(&mut self, frame: Frame) {
        assert!(!frame.is_empty(), "frames carry at least one byte");
        self.queue.push_back(frame);
    }

    /// True once every queued frame has been fully accepted downstream.
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    pub fn step(&mut self, output: &mut Channel<Beat>) {
        if self.current.is_none() {
            self.current = self.queue.pop_front().map(|frame| (frame, 0));
        }
        let mut finished = false;
        if let Some((frame, index)) = self.current.as_mut() {
            if output.offer(frame.beat(*index)).is_ok() {
                *index += 1;
                finished = *index == frame.len();
            }
        }
        if finished {
            self.current = None;
        }
    }
}

/// Consumer that collects whole frames. An optional readiness pattern decides, step by step,
/// whether the sink takes a beat.
#[derive(Default)]
pub struct FrameSink {
    assembler: FrameAssembler,
    frames: Vec<Frame>,
    ready: Option<Box<dyn FnMut() -> bool + Send>>,
}

impl FrameSink {
    pub fn new() -> Self {
        FrameSink::default()
    }

    pub fn with_ready(ready: Box<dyn FnMut() -> bool + Send>) -> Self {
        FrameSink {
            ready: Some(ready),
            ..FrameSink::default()
        }
    }

    pub fn step(&mut self, input: &mut Channel<Beat>) {
        if let Some(ready) = self.ready.as_mut() {
            if !ready() {
                return;
            }
        }
        if let Some(beat) = input.accept() {
            if let Some(frame) = self.assembler.push(beat) {
                self.frames.push(frame);
            }
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn take_frames(&mut self) -> Vec<Frame> {
        std::mem::replace(&mut self.frames, vec![])
    }

    pub fn in_frame(&self) -> bool {
        self.assembler.in_frame()
    }
}

impl fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FrameSink")
            .field("frames", &self.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{thread_rng, Rng};

    #[test]
    fn beats_mark_only_the_last() {
        let frame = Frame::new(vec![1, 2, 3]).with_tag(7).with_error(true);
        let beats: Vec<Beat> = frame.beats().collect();
        assert_eq!(beats.len(), 3);
        assert!(beats.iter().all(|b| b.tag == 7));
        assert!(!beats[0].last && !beats[0].error);
        assert!(beats[2].last && beats[2].error);
    }

    #[test]
    fn assembler_rebuilds_frames() {
        let frames = vec![
            Frame::new(vec![9]),
            Frame::new(vec![1, 2, 3, 4]).with_tag(3),
            Frame::new(vec![5, 6]).with_error(true),
        ];
        let mut assembler = FrameAssembler::new();
        let rebuilt: Vec<Frame> = frames
            .iter()
            .flat_map(|f| f.beats().collect::<Vec<_>>())
            .filter_map(|beat| assembler.push(beat))
            .collect();
        assert_eq!(rebuilt, frames);
        assert!(!assembler.in_frame());
    }

    #[test]
    fn source_to_sink_under_backpressure() {
        let mut rng = thread_rng();
        let frames: Vec<Frame> = (0..50)
            .map(|n| Frame::new((0..rng.gen_range(1, 40)).map(|b| b as u8).collect()).with_tag(n))
            .collect();

        let mut source = FrameSource::new();
        frames.iter().cloned().for_each(|f| source.push(f));
        let mut sink = FrameSink::with_ready(Box::new(|| thread_rng().gen_bool(0.3)));
        let mut channel = Channel::new();

        while !source.is_idle() || channel.is_valid() {
            sink.step(&mut channel);
            source.step(&mut channel);
        }
        assert_eq!(sink.frames(), &frames[..]);
    }

    #[test]
    #[should_panic]
    fn empty_frames_are_refused() {
        FrameSource::new().push(Frame::new(vec![]));
    }
}
