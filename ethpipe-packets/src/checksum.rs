use std::net::Ipv4Addr;

/// Running Internet checksum (RFC 1071) accumulator.
///
/// Bytes may be fed in arbitrarily sized pieces as they stream past; an odd
/// byte is held until its partner arrives, so splitting the input never
/// changes the result. When the input ends on an odd byte, that byte is
/// padded with a zero low byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checksum {
    sum: u32,
    pending: Option<u8>,
}

impl Checksum {
    pub fn new() -> Self {
        Checksum::default()
    }

    /// Seeds an accumulator with the IPv4 pseudo-header used by UDP and TCP.
    pub fn ipv4_pseudo_header(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, length: u16) -> Self {
        let mut checksum = Checksum::new();
        checksum.add_bytes(&src.octets());
        checksum.add_bytes(&dst.octets());
        checksum.add_word(u16::from(protocol));
        checksum.add_word(length);
        checksum
    }

    pub fn add_word(&mut self, word: u16) {
        self.sum += u32::from(word);
        self.sum = fold(self.sum);
    }

    pub fn add_byte(&mut self, byte: u8) {
        match self.pending.take() {
            Some(high) => self.add_word(u16::from_be_bytes([high, byte])),
            None => self.pending = Some(byte),
        }
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        if self.pending.is_some() {
            match rest.split_first() {
                Some((first, tail)) => {
                    self.add_byte(*first);
                    rest = tail;
                }
                None => return,
            }
        }
        let mut words = rest.chunks_exact(2);
        for word in &mut words {
            self.add_word(u16::from_be_bytes([word[0], word[1]]));
        }
        if let [last] = words.remainder() {
            self.pending = Some(*last);
        }
    }

    /// Folded ones'-complement sum of everything fed so far.
    pub fn sum(&self) -> u16 {
        let mut sum = self.sum;
        if let Some(high) = self.pending {
            sum = fold(sum + (u32::from(high) << 8));
        }
        sum as u16
    }

    /// The value to place in a checksum field.
    pub fn finish(&self) -> u16 {
        !self.sum()
    }

    /// True when the bytes fed, including their checksum field, sum to
    /// all-ones.
    pub fn is_valid(&self) -> bool {
        self.sum() == 0xFFFF
    }
}

fn fold(mut sum: u32) -> u32 {
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum
}

/// One-shot checksum over a byte range.
pub fn checksum(data: &[u8]) -> u16 {
    let mut checksum = Checksum::new();
    checksum.add_bytes(data);
    checksum.finish()
}

/// Recomputes the checksum of a range that embeds its own checksum field.
pub fn verify_checksum(data: &[u8]) -> bool {
    let mut checksum = Checksum::new();
    checksum.add_bytes(data);
    checksum.is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Example header from RFC 1071 discussions, checksum field zeroed.
    const HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8, 0x00,
        0x01, 0xc0, 0xa8, 0x00, 0xc7,
    ];

    #[test]
    fn known_header_checksum() {
        assert_eq!(checksum(&HEADER), 0xb861);

        let mut with_checksum = HEADER;
        with_checksum[10] = 0xb8;
        with_checksum[11] = 0x61;
        assert!(verify_checksum(&with_checksum));
    }

    #[test]
    fn odd_length_pads_low_byte() {
        assert_eq!(checksum(&[0x01]), !0x0100);
        assert_eq!(checksum(&[0x01, 0x02, 0x03]), !(0x0102 + 0x0300));
    }

    #[test]
    fn split_feeding_matches_one_shot() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1001).collect();
        let expected = checksum(&data);
        for split in &[0, 1, 2, 3, 500, 999, 1000, 1001] {
            let mut running = Checksum::new();
            running.add_bytes(&data[..*split]);
            running.add_bytes(&data[*split..]);
            assert_eq!(running.finish(), expected, "split at {}", split);
        }

        let mut bytewise = Checksum::new();
        data.iter().for_each(|b| bytewise.add_byte(*b));
        assert_eq!(bytewise.finish(), expected);
    }

    #[test]
    fn carries_fold_back() {
        let mut running = Checksum::new();
        running.add_word(0xFFFF);
        running.add_word(0x0001);
        assert_eq!(running.sum(), 0x0001);
    }

    #[test]
    fn pseudo_header_seed() {
        let src = Ipv4Addr::new(192, 168, 0, 1);
        let dst = Ipv4Addr::new(192, 168, 0, 199);
        let seeded = Checksum::ipv4_pseudo_header(src, dst, 17, 8);

        let mut manual = Checksum::new();
        manual.add_bytes(&[192, 168, 0, 1, 192, 168, 0, 199, 0, 17, 0, 8]);
        assert_eq!(seeded.sum(), manual.sum());
    }

    #[test]
    fn swapped_words_are_a_blind_spot() {
        let mut swapped = HEADER;
        swapped.swap(12, 16);
        swapped.swap(13, 17);
        assert_eq!(checksum(&swapped), checksum(&HEADER));
    }
}
