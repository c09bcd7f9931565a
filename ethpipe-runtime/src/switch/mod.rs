//! Frame routing stages. Beat-level stages (`StreamDemux`, `StreamMux`, `StreamSwitch`) route raw
//! frames by their tag or by an external select; record-level stages (`PortDemux`, `PortArbMux`)
//! route header/payload pairs between protocol layers. All of them decide a frame's route once,
//! at its first beat or header, and hold it until the last beat has passed.

mod demux;
pub use self::demux::*;

mod mux;
pub use self::mux::*;

mod crossbar;
pub use self::crossbar::*;

mod port_demux;
pub use self::port_demux::*;

mod port_mux;
pub use self::port_mux::*;

/// Decodes a frame tag into an output index; `None` means no valid destination.
pub type Route = Box<dyn Fn(u16) -> Option<usize> + Send>;

/// What a routing stage does when the chosen output cannot take a new frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropPolicy {
    /// Hold the frame until the output is ready.
    Block,
    /// Drop the whole frame if the output is not ready when the frame starts. Once a frame has
    /// started it always completes.
    DropWhenFull,
}

impl Default for DropPolicy {
    fn default() -> Self {
        DropPolicy::Block
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwitchCounters {
    /// Frames routed to an output.
    pub frames: u64,
    /// Frames whose tag or select decoded to no destination, or that were flagged bad while
    /// passing through.
    pub bad_frames: u64,
    /// Frames dropped because the output was not ready, or because no classifier route matched.
    pub dropped: u64,
}

pub(crate) fn tag_as_index() -> Route {
    Box::new(|tag| Some(usize::from(tag)))
}
