use crate::stream::{Beat, Channel};

/// What one `PayloadCut::step` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Cut {
    /// Nothing moved.
    Stalled,
    /// A beat inside the payload moved.
    Forwarded,
    /// The payload ended where it was expected to.
    Ended,
    /// The input frame ended before the declared length. The output's last beat carries `error`.
    Truncated,
    /// The declared length was reached before the input frame ended. The output frame has been
    /// closed and the rest of the input is being drained.
    Excess,
    /// A beat past the declared length was discarded.
    Drained { last: bool },
}

/// Forwards one payload from an input frame to an output frame, cutting the output at a declared
/// length when there is one. The output always receives a well formed frame end.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PayloadCut {
    remaining: Option<usize>,
    draining: bool,
}

impl PayloadCut {
    /// Starts a payload of `len` beats, or one that runs to the input's last beat when `None`.
    pub fn start(&mut self, len: Option<usize>) {
        debug_assert!(len != Some(0), "payloads carry at least one beat");
        self.remaining = len;
        self.draining = false;
    }

    /// Moves at most one beat. `inspect` sees each beat that is about to be emitted, along with
    /// what the move means for the frame, and may change it.
    pub fn step<F>(
        &mut self,
        input: &mut Channel<Beat>,
        output: &mut Channel<Beat>,
        inspect: F,
    ) -> Cut
    where
        F: FnOnce(&mut Beat, Cut),
    {
        if self.draining {
            return match input.accept() {
                Some(beat) => {
                    if beat.last {
                        self.draining = false;
                    }
                    Cut::Drained { last: beat.last }
                }
                None => Cut::Stalled,
            };
        }

        if !output.is_ready() {
            return Cut::Stalled;
        }
        let mut beat = match input.accept() {
            Some(beat) => beat,
            None => return Cut::Stalled,
        };

        let cut = match self.remaining {
            Some(1) if beat.last => Cut::Ended,
            Some(1) => {
                self.draining = true;
                beat.last = true;
                Cut::Excess
            }
            Some(_) if beat.last => {
                beat.error = true;
                Cut::Truncated
            }
            Some(remaining) => {
                self.remaining = Some(remaining - 1);
                Cut::Forwarded
            }
            None if beat.last => Cut::Ended,
            None => Cut::Forwarded,
        };
        inspect(&mut beat, cut);
        output.fill(beat);
        cut
    }
}

/// Emits a run of header bytes, one beat per step, ahead of a payload.
#[derive(Clone, Copy)]
pub(crate) struct Prefix {
    bytes: [u8; 60],
    len: usize,
    next: usize,
}

impl Prefix {
    pub fn new() -> Self {
        Prefix {
            bytes: [0; 60],
            len: 0,
            next: 0,
        }
    }

    pub fn start(&mut self, bytes: &[u8]) {
        self.bytes[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
        self.next = 0;
    }

    pub fn is_done(&self) -> bool {
        self.next == self.len
    }

    /// Offers the next header byte. Returns true once the last one has been placed.
    pub fn step(&mut self, output: &mut Channel<Beat>) -> bool {
        if !self.is_done() && output.is_ready() {
            output.fill(Beat::new(self.bytes[self.next]));
            self.next += 1;
        }
        self.is_done()
    }
}
