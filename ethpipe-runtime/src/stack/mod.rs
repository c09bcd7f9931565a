//! The stacks wire the protocol components into complete receive and transmit pipelines for one
//! interface. `IpStack` covers Ethernet, ARP and IPv4; `UdpStack` puts UDP on top of it and keeps a
//! raw IPv4 port for every other protocol.
//!
//! A stack is driven like any other component: call `step` once per tick with the link channels,
//! and read or write the host ports in between. Internally each tick steps the stages downstream
//! first, so a unit accepted in one stage can be refilled by its producer in the same tick.

mod ip_stack;
pub use self::ip_stack::*;

mod udp_stack;
pub use self::udp_stack::*;
