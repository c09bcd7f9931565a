use crate::*;
use std::net::Ipv4Addr;

/// IPv4 header record.
///
/// Options are accepted when parsing (they are covered by the header
/// checksum) but not retained; headers are always emitted with IHL 5.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Header length in 32-bit words, as received.
    pub ihl: u8,
    pub dscp: u8,
    pub ecn: u8,
    pub total_length: u16,
    pub identification: u16,
    pub dont_fragment: bool,
    pub more_fragments: bool,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: IpProtocol,
    pub header_checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Default for Ipv4Header {
    fn default() -> Self {
        Ipv4Header {
            ihl: 5,
            dscp: 0,
            ecn: 0,
            total_length: 0,
            identification: 0,
            dont_fragment: false,
            more_fragments: false,
            fragment_offset: 0,
            ttl: 64,
            protocol: IpProtocol::default(),
            header_checksum: 0,
            source: Ipv4Addr::UNSPECIFIED,
            destination: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl Ipv4Header {
    pub const LEN: usize = 20;
    pub const MAX_LEN: usize = 60;

    /// Checks the version/IHL byte and returns the header length in bytes.
    /// Streaming receivers call this on the first header byte to learn how
    /// many bytes belong to the header.
    pub fn header_len(version_ihl: u8) -> Result<usize, HeaderError> {
        let version = version_ihl >> 4;
        if version != 4 {
            return Err(HeaderError::UnsupportedVersion(version));
        }
        let ihl = version_ihl & 0x0F;
        if ihl < 5 {
            return Err(HeaderError::BadHeaderLength(ihl));
        }
        Ok(usize::from(ihl) * 4)
    }

    /// Decodes and structurally validates a header. The checksum is not
    /// verified here; see `verify_checksum`.
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        ensure_len(data, 1)?;
        let header_len = Ipv4Header::header_len(data[0])?;
        ensure_len(data, header_len)?;

        let total_length = u16::from_be_bytes([data[2], data[3]]);
        if usize::from(total_length) < header_len {
            return Err(HeaderError::BadTotalLength {
                declared: total_length,
                header_len,
            });
        }

        Ok(Ipv4Header {
            ihl: data[0] & 0x0F,
            dscp: data[1] >> 2,
            ecn: data[1] & 0x03,
            total_length,
            identification: u16::from_be_bytes([data[4], data[5]]),
            dont_fragment: data[6] & 0x40 != 0,
            more_fragments: data[6] & 0x20 != 0,
            fragment_offset: u16::from_be_bytes([data[6] & 0x1F, data[7]]),
            ttl: data[8],
            protocol: IpProtocol::from(data[9]),
            header_checksum: u16::from_be_bytes([data[10], data[11]]),
            source: read_ipv4(data, 12),
            destination: read_ipv4(data, 16),
        })
    }

    /// Verifies the checksum of a received header, options included.
    pub fn verify_checksum(data: &[u8]) -> bool {
        let version_ihl = match data.first() {
            Some(&version_ihl) => version_ihl,
            None => return false,
        };
        match Ipv4Header::header_len(version_ihl) {
            Ok(len) if data.len() >= len => verify_checksum(&data[..len]),
            _ => false,
        }
    }

    /// Number of bytes following the header, according to the header.
    pub fn payload_len(&self) -> usize {
        usize::from(self.total_length).saturating_sub(usize::from(self.ihl) * 4)
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut bytes = [0; Self::LEN];
        bytes[0] = 0x45;
        bytes[1] = (self.dscp << 2) | (self.ecn & 0x03);
        bytes[2..4].copy_from_slice(&self.total_length.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.identification.to_be_bytes());
        let mut flags_offset = self.fragment_offset & 0x1FFF;
        if self.dont_fragment {
            flags_offset |= 0x4000;
        }
        if self.more_fragments {
            flags_offset |= 0x2000;
        }
        bytes[6..8].copy_from_slice(&flags_offset.to_be_bytes());
        bytes[8] = self.ttl;
        bytes[9] = u8::from(self.protocol);
        bytes[10..12].copy_from_slice(&self.header_checksum.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.source.octets());
        bytes[16..20].copy_from_slice(&self.destination.octets());
        bytes
    }

    /// Calculates what the checksum should be set to given the current
    /// header, ignoring whatever the checksum field holds.
    pub fn compute_checksum(&self) -> u16 {
        let mut bytes = self.to_bytes();
        bytes[10] = 0;
        bytes[11] = 0;
        checksum(&bytes)
    }

    /// Fills the derived fields for transmission: IHL, total length from the
    /// payload length, and the header checksum. Nothing else is touched.
    pub fn finalize(&mut self, payload_len: usize) {
        self.ihl = 5;
        self.total_length = (Self::LEN + payload_len) as u16;
        self.header_checksum = self.compute_checksum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: [u8; 20] = [
        0x45, 0x00, 0x00, 0x14, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xb8, 0xc0, 0xc0, 0xa8, 0x00,
        0x01, 0xc0, 0xa8, 0x00, 0xc7,
    ];

    #[test]
    fn ipv4_header() {
        let header = Ipv4Header::parse(&VALID).unwrap();
        assert_eq!(header.source, Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(header.destination, Ipv4Addr::new(192, 168, 0, 199));
        assert_eq!(header.ihl, 5);
        assert_eq!(header.protocol, IpProtocol::UDP);
        assert_eq!(header.total_length, 20);
        assert_eq!(header.payload_len(), 0);
        assert_eq!(header.ttl, 64);
        assert!(header.dont_fragment);
        assert!(!header.more_fragments);
        assert_eq!(header.header_checksum, 0xb8c0);
        assert_eq!(header.to_bytes(), VALID);
    }

    #[test]
    fn validate_checksum() {
        assert!(Ipv4Header::verify_checksum(&VALID));
        let mut invalid = VALID;
        invalid[11] = 0x61;
        assert!(!Ipv4Header::verify_checksum(&invalid));
    }

    #[test]
    fn short_headers_fail_verification() {
        assert!(!Ipv4Header::verify_checksum(&[]));
        assert!(!Ipv4Header::verify_checksum(&VALID[..19]));
    }

    #[test]
    fn finalize_sets_length_and_checksum() {
        let mut header = Ipv4Header::parse(&VALID).unwrap();
        header.header_checksum = 0;
        header.finalize(100);
        assert_eq!(header.total_length, 120);
        assert!(verify_checksum(&header.to_bytes()));
        assert_eq!(header.compute_checksum(), header.header_checksum);
    }

    #[test]
    fn structural_errors() {
        let mut bad_version = VALID;
        bad_version[0] = 0x65;
        assert_eq!(
            Ipv4Header::parse(&bad_version),
            Err(HeaderError::UnsupportedVersion(6))
        );

        let mut bad_ihl = VALID;
        bad_ihl[0] = 0x44;
        assert_eq!(
            Ipv4Header::parse(&bad_ihl),
            Err(HeaderError::BadHeaderLength(4))
        );

        let mut options_missing = VALID;
        options_missing[0] = 0x46;
        assert!(matches!(
            Ipv4Header::parse(&options_missing),
            Err(HeaderError::Truncated { needed: 24, .. })
        ));

        let mut short_total = VALID;
        short_total[3] = 0x10;
        assert_eq!(
            Ipv4Header::parse(&short_total),
            Err(HeaderError::BadTotalLength {
                declared: 16,
                header_len: 20
            })
        );
    }

    #[test]
    fn options_are_skipped() {
        let mut with_options = vec![0x46];
        with_options.extend_from_slice(&VALID[1..]);
        with_options.extend_from_slice(&[1, 1, 1, 0]);
        with_options[3] = 24;
        let header = Ipv4Header::parse(&with_options).unwrap();
        assert_eq!(header.ihl, 6);
        assert_eq!(header.payload_len(), 0);
        assert_eq!(header.destination, Ipv4Addr::new(192, 168, 0, 199));
    }
}
