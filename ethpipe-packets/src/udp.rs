use crate::*;
use std::net::Ipv4Addr;

/// UDP header record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dest_port: u16,
    /// Header plus payload length in bytes.
    pub length: u16,
    pub checksum: u16,
}

impl UdpHeader {
    pub const LEN: usize = 8;

    pub fn new(src_port: u16, dest_port: u16) -> Self {
        UdpHeader {
            src_port,
            dest_port,
            length: 0,
            checksum: 0,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        ensure_len(data, Self::LEN)?;
        let length = u16::from_be_bytes([data[4], data[5]]);
        if usize::from(length) < Self::LEN {
            return Err(HeaderError::BadLength(length));
        }
        Ok(UdpHeader {
            src_port: u16::from_be_bytes([data[0], data[1]]),
            dest_port: u16::from_be_bytes([data[2], data[3]]),
            length,
            checksum: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut bytes = [0; Self::LEN];
        bytes[0..2].copy_from_slice(&self.src_port.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.dest_port.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.length.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.checksum.to_be_bytes());
        bytes
    }

    pub fn payload_len(&self) -> usize {
        usize::from(self.length).saturating_sub(Self::LEN)
    }

    /// Starts a checksum over the pseudo-header and this header with its
    /// checksum field taken as zero. Feed the payload to complete it.
    pub fn checksum_seed(&self, src: Ipv4Addr, dst: Ipv4Addr) -> Checksum {
        let mut seed =
            Checksum::ipv4_pseudo_header(src, dst, u8::from(IpProtocol::UDP), self.length);
        let mut bytes = self.to_bytes();
        bytes[6] = 0;
        bytes[7] = 0;
        seed.add_bytes(&bytes);
        seed
    }

    /// Final checksum field value; a computed zero is sent as all-ones since
    /// zero means "no checksum".
    pub fn finish_checksum(running: &Checksum) -> u16 {
        match running.finish() {
            0 => 0xFFFF,
            value => value,
        }
    }

    /// Sets length and checksum for the given payload.
    pub fn finalize(&mut self, src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) {
        self.length = (Self::LEN + payload.len()) as u16;
        let mut running = self.checksum_seed(src, dst);
        running.add_bytes(payload);
        self.checksum = UdpHeader::finish_checksum(&running);
    }

    /// Checks a received checksum. A zero checksum field was never computed
    /// by the sender and always passes.
    pub fn verify(&self, src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> bool {
        if self.checksum == 0 {
            return true;
        }
        let mut running = self.checksum_seed(src, dst);
        running.add_word(self.checksum);
        running.add_bytes(payload);
        running.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn udp_header() {
        let data: Vec<u8> = vec![0, 99, 0, 88, 0, 19, 0xDE, 0xAD, 0, 1, 2];
        let header = UdpHeader::parse(&data).unwrap();
        assert_eq!(header.src_port, 99);
        assert_eq!(header.dest_port, 88);
        assert_eq!(header.length, 19);
        assert_eq!(header.checksum, 0xDEAD);
        assert_eq!(header.payload_len(), 11);
        assert_eq!(&header.to_bytes()[..], &data[..8]);
    }

    #[test]
    fn length_below_header() {
        assert_eq!(
            UdpHeader::parse(&[0, 1, 0, 2, 0, 7, 0, 0]),
            Err(HeaderError::BadLength(7))
        );
    }

    #[test]
    fn checksum_round_trip() {
        let src = Ipv4Addr::new(10, 0, 0, 1);
        let dst = Ipv4Addr::new(10, 0, 0, 2);
        let payload = b"hello, wire";
        let mut header = UdpHeader::new(5000, 6000);
        header.finalize(src, dst, payload);

        assert_eq!(header.length, 8 + payload.len() as u16);
        assert_ne!(header.checksum, 0);
        assert!(header.verify(src, dst, payload));
        assert!(!header.verify(src, Ipv4Addr::new(10, 0, 0, 3), payload));
        assert!(!header.verify(src, dst, b"hello, wirf"));
    }

    #[test]
    fn zero_checksum_is_not_checked() {
        let header = UdpHeader {
            src_port: 1,
            dest_port: 2,
            length: 9,
            checksum: 0,
        };
        assert!(header.verify(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, &[7]));
    }
}
