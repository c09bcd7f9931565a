//! Ethernet framing. `EthRx` splits a raw frame into an `EthernetHeader` and its payload; `EthTx`
//! joins them back into one frame. Neither looks at the frame check sequence, which belongs to the
//! link below.

mod rx;
pub use self::rx::*;

mod tx;
pub use self::tx::*;
