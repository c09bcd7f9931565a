/// One data unit on a frame channel: a single byte plus its side-band.
///
/// A frame is the run of beats up to and including the one with `last`
/// set; the beat after a `last` beat starts the next frame. `error` is only
/// meaningful on the last beat and marks the whole frame as known-bad.
/// `tag` carries the routing/flow identifier and is sampled by routing
/// stages from the first beat of a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Beat {
    pub data: u8,
    pub last: bool,
    pub error: bool,
    pub tag: u16,
}

impl Beat {
    pub fn new(data: u8) -> Self {
        Beat {
            data,
            last: false,
            error: false,
            tag: 0,
        }
    }

    pub fn last(data: u8) -> Self {
        Beat {
            last: true,
            ..Beat::new(data)
        }
    }

    pub fn with_tag(self, tag: u16) -> Self {
        Beat { tag, ..self }
    }

    pub fn with_error(self, error: bool) -> Self {
        Beat { error, ..self }
    }

    pub fn with_last(self, last: bool) -> Self {
        Beat { last, ..self }
    }
}
