use super::request::{merge_bytes, ByteMask};
use super::{NUM_LINES, WORDS_PER_LINE};

/// Data storage contract.
///
/// Keyed by `(line index, word offset)`, with per-byte write enables.
pub trait Access {
    #[must_use]
    fn read(&self, index: usize, offset: usize) -> u32;

    fn write(&mut self, index: usize, offset: usize, data: u32, byte_mask: &ByteMask);

    /// Zero the whole array.
    fn clear(&mut self);
}

/// Data array of `NUM_LINES` lines with `WORDS_PER_LINE` words each.
#[derive(Clone, PartialEq, Eq)]
pub struct DataArray {
    words: Vec<[u32; WORDS_PER_LINE]>,
}

impl std::fmt::Debug for DataArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self
            .words
            .iter()
            .enumerate()
            .filter(|(_, line)| line.iter().any(|word| *word != 0));
        f.debug_map().entries(non_zero).finish()
    }
}

impl Default for DataArray {
    fn default() -> Self {
        Self::new()
    }
}

impl DataArray {
    #[must_use]
    pub fn new() -> Self {
        Self {
            words: vec![[0; WORDS_PER_LINE]; NUM_LINES],
        }
    }
}

impl Access for DataArray {
    #[inline]
    fn read(&self, index: usize, offset: usize) -> u32 {
        self.words[index][offset]
    }

    #[inline]
    fn write(&mut self, index: usize, offset: usize, data: u32, byte_mask: &ByteMask) {
        let word = &mut self.words[index][offset];
        *word = merge_bytes(*word, data, byte_mask);
        log::trace!(
            "data_array::write(line={index}, word={offset}, data={data:#010x}) => {:#010x}",
            *word
        );
    }

    fn clear(&mut self) {
        self.words.fill([0; WORDS_PER_LINE]);
    }
}
