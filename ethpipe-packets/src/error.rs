use thiserror::Error;

/// Structural problems found while decoding a fixed-layout header.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header needs {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("unsupported IP version {0}")]
    UnsupportedVersion(u8),

    #[error("header length field {0} is below the fixed header size")]
    BadHeaderLength(u8),

    #[error("total length {declared} is inconsistent with header length {header_len}")]
    BadTotalLength { declared: u16, header_len: usize },

    #[error("length field {0} is below the fixed header size")]
    BadLength(u16),

    #[error("unsupported ARP packet: {0}")]
    UnsupportedArp(&'static str),
}

pub(crate) fn ensure_len(data: &[u8], needed: usize) -> Result<(), HeaderError> {
    if data.len() < needed {
        return Err(HeaderError::Truncated {
            needed,
            available: data.len(),
        });
    }
    Ok(())
}
