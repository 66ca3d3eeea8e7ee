use crate::{address, NUM_LINES, WORDS_PER_LINE, WORD_SIZE};
use bitvec::{field::BitField, order::Lsb0, view::BitView};
use std::ops::Range;

/// Word offset within a line: bits `[5:2]`.
pub const OFFSET_BITS: Range<usize> = 2..6;
/// Line index: bits `[11:6]`.
pub const INDEX_BITS: Range<usize> = 6..12;
/// Tag: bits `[31:12]`.
pub const TAG_BITS: Range<usize> = 12..32;

/// Number of tag bits stored per line.
pub const TAG_WIDTH: usize = TAG_BITS.end - TAG_BITS.start;

const _: () = assert!(1 << (OFFSET_BITS.end - OFFSET_BITS.start) == WORDS_PER_LINE);
const _: () = assert!(1 << (INDEX_BITS.end - INDEX_BITS.start) == NUM_LINES);
const _: () = assert!(1 << OFFSET_BITS.start == WORD_SIZE);

/// An address split into its cache fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecodedAddress {
    pub tag: u32,
    pub index: usize,
    pub offset: usize,
}

impl std::fmt::Display for DecodedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tag={:#07x} line={:>2} word={:>2}",
            self.tag, self.index, self.offset
        )
    }
}

impl DecodedAddress {
    /// Base address of the line this address falls into.
    #[must_use]
    pub fn line_addr(&self) -> address {
        line_addr(self.tag, self.index)
    }
}

#[inline]
#[must_use]
pub fn decode(addr: address) -> DecodedAddress {
    let bits = addr.view_bits::<Lsb0>();
    DecodedAddress {
        tag: bits[TAG_BITS].load_le::<u32>(),
        index: bits[INDEX_BITS].load_le::<usize>(),
        offset: bits[OFFSET_BITS].load_le::<usize>(),
    }
}

#[inline]
#[must_use]
pub fn line_index(addr: address) -> usize {
    decode(addr).index
}

/// Reassemble the base address of a line from its tag and index.
#[inline]
#[must_use]
pub fn line_addr(tag: u32, index: usize) -> address {
    debug_assert!(index < NUM_LINES);
    debug_assert!(tag < 1 << TAG_WIDTH);
    (tag << TAG_BITS.start) | ((index as address) << INDEX_BITS.start)
}

/// Line index selected by the payload of a flush command.
///
/// The payload carries the index in the same bit positions an address would.
#[inline]
#[must_use]
pub fn flush_line_index(payload: u32) -> usize {
    payload.view_bits::<Lsb0>()[INDEX_BITS].load_le::<usize>()
}

/// Payload of a flush command selecting line `index`.
#[inline]
#[must_use]
pub fn flush_payload(index: usize) -> u32 {
    debug_assert!(index < NUM_LINES);
    (index as u32) << INDEX_BITS.start
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_splits_fields() {
        let decoded = decode(0x1234_5678);
        assert_eq!(decoded.tag, 0x12345);
        assert_eq!(decoded.index, (0x678 >> 6) & 0x3f);
        assert_eq!(decoded.offset, (0x78 >> 2) & 0xf);
    }

    #[test]
    fn conflicting_addresses_share_index() {
        for addr in [0xA000, 0xB000, 0xC000] {
            assert_eq!(line_index(addr), 0);
        }
        assert_eq!(line_index(0x10050), 1);
        assert_eq!(line_index(0x20050), 1);
        assert_ne!(decode(0x10050).tag, decode(0x20050).tag);
    }

    #[test]
    fn line_addr_round_trips() {
        let decoded = decode(0xDEAD_BEEC);
        assert_eq!(decoded.line_addr(), 0xDEAD_BEC0);
        assert_eq!(line_addr(decoded.tag, decoded.index), 0xDEAD_BEC0);
    }

    #[test]
    fn flush_payload_selects_line() {
        assert_eq!(flush_line_index(0), 0);
        assert_eq!(flush_line_index(63 << 6), 63);
        assert_eq!(flush_line_index(0xFFFF_F07F), 1);
        assert_eq!(flush_line_index(flush_payload(42)), 42);
    }
}
