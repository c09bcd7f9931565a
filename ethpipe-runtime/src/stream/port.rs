use crate::stream::{Beat, Channel, Frame, FrameAssembler};
use std::collections::VecDeque;

/// A header record channel paired with its payload channel. This is the interface between
/// protocol layers: a producer offers one header, then the payload beats of that header's frame.
/// Consumers take the header first and then read payload until the last beat.
#[derive(Debug)]
pub struct LayerPort<H> {
    pub header: Channel<H>,
    pub payload: Channel<Beat>,
}

impl<H> LayerPort<H> {
    pub fn new() -> Self {
        LayerPort {
            header: Channel::new(),
            payload: Channel::new(),
        }
    }

    /// Nothing is on offer in either channel.
    pub fn is_empty(&self) -> bool {
        !self.header.is_valid() && !self.payload.is_valid()
    }
}

impl<H> Default for LayerPort<H> {
    fn default() -> Self {
        LayerPort::new()
    }
}

/// Host-side producer for a `LayerPort`: offers queued header/payload pairs in order.
#[derive(Debug)]
pub struct PortSource<H> {
    queue: VecDeque<(H, Frame)>,
    current: Option<(Frame, usize)>,
}

impl<H> PortSource<H> {
    pub fn new() -> Self {
        PortSource {
            queue: VecDeque::new(),
            current: None,
        }
    }

    pub fn push(&mut self, header: H, payload: Frame) {
        assert!(!payload.is_empty(), "payloads carry at least one byte");
        self.queue.push_back((header, payload));
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    /// Queued pairs whose header has not been offered yet.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn step(&mut self, port: &mut LayerPort<H>) {
        if self.current.is_none() && port.header.is_ready() {
            if let Some((header, payload)) = self.queue.pop_front() {
                if let Err(header) = port.header.offer(header) {
                    self.queue.push_front((header, payload));
                } else {
                    self.current = Some((payload, 0));
                }
            }
        }

        let mut finished = false;
        if let Some((payload, index)) = self.current.as_mut() {
            if port.payload.offer(payload.beat(*index)).is_ok() {
                *index += 1;
                finished = *index == payload.len();
            }
        }
        if finished {
            self.current = None;
        }
    }
}

impl<H> Default for PortSource<H> {
    fn default() -> Self {
        PortSource::new()
    }
}

/// Host-side consumer for a `LayerPort`: collects header/payload pairs.
#[derive(Debug)]
pub struct PortSink<H> {
    header: Option<H>,
    assembler: FrameAssembler,
    received: Vec<(H, Frame)>,
}

impl<H> PortSink<H> {
    pub fn new() -> Self {
        PortSink {
            header: None,
            assembler: FrameAssembler::new(),
            received: vec![],
        }
    }

    pub fn step(&mut self, port: &mut LayerPort<H>) {
        if self.header.is_none() {
            self.header = port.header.accept();
        }
        if self.header.is_some() {
            if let Some(beat) = port.payload.accept() {
                if let Some(frame) = self.assembler.push(beat) {
                    if let Some(header) = self.header.take() {
                        self.received.push((header, frame));
                    }
                }
            }
        }
    }

    pub fn received(&self) -> &[(H, Frame)] {
        &self.received
    }

    pub fn take_received(&mut self) -> Vec<(H, Frame)> {
        std::mem::replace(&mut self.received, vec![])
    }
}

impl<H> Default for PortSink<H> {
    fn default() -> Self {
        PortSink::new()
    }
}
