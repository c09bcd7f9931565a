//! The frame transport primitive. Every stage in the pipeline moves bytes as `Beat`s over
//! `Channel`s, and every protocol layer hands a header record plus its payload to the next layer
//! over a `LayerPort`. Stages are plain structs with a `step` function; a stage that cannot make
//! progress leaves its channels as they are and tries again on the next step.

mod beat;
pub use self::beat::*;

mod channel;
pub use self::channel::*;

mod frame;
pub use self::frame::*;

mod port;
pub use self::port::*;

mod cut;
pub(crate) use self::cut::*;
