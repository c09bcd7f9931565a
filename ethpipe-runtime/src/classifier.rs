//! # What are they for?
//!
//! Classifiers decide which output port a frame belongs to from its header record alone. They take
//! the header by reference and are not able to modify it. They are used by `PortDemux`, which
//! evaluates the classifier once per frame, when the header arrives, and holds that decision until
//! the frame's last payload beat has passed. `None` means the frame has no valid destination and
//! is dropped.
use crate::ip::IpRecord;
use ethpipe_packets::{EthernetHeader, IpProtocol};

pub trait Classifier {
    type Header: Send;

    fn classify(&self, header: &Self::Header) -> Option<usize>;
}

/// Dispatches Ethernet frames on their ether type.
#[derive(Clone, Debug)]
pub struct EtherTypeClassifier {
    routes: Vec<(u16, usize)>,
}

impl EtherTypeClassifier {
    pub fn new(routes: Vec<(u16, usize)>) -> Self {
        EtherTypeClassifier { routes }
    }
}

impl Classifier for EtherTypeClassifier {
    type Header = EthernetHeader;

    fn classify(&self, header: &EthernetHeader) -> Option<usize> {
        self.routes
            .iter()
            .find(|(ether_type, _)| *ether_type == header.ether_type)
            .map(|(_, port)| *port)
    }
}

/// Dispatches IPv4 datagrams on their protocol field, with an optional port for everything else.
#[derive(Clone, Debug)]
pub struct IpProtocolClassifier {
    routes: Vec<(IpProtocol, usize)>,
    default_port: Option<usize>,
}

impl IpProtocolClassifier {
    pub fn new(routes: Vec<(IpProtocol, usize)>, default_port: Option<usize>) -> Self {
        IpProtocolClassifier {
            routes,
            default_port,
        }
    }
}

impl Classifier for IpProtocolClassifier {
    type Header = IpRecord;

    fn classify(&self, header: &IpRecord) -> Option<usize> {
        self.routes
            .iter()
            .find(|(protocol, _)| *protocol == header.ip.protocol)
            .map(|(_, port)| *port)
            .or(self.default_port)
    }
}
