use super::address;
use bitvec::{array::BitArray, field::BitField, BitArr};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Per-byte write enables of a 32-bit word.
pub type ByteMask = BitArr!(for 4, in u8);

/// All four bytes of a word.
pub const FULL_MASK: ByteMask = BitArray {
    _ord: PhantomData,
    data: [0b1111],
};

#[must_use]
pub fn byte_mask(bits: u8) -> ByteMask {
    let mut mask = ByteMask::ZERO;
    mask[..4].store(bits & 0b1111);
    mask
}

/// Merge `data` into `word`, keeping the bytes not enabled by `mask`.
#[must_use]
pub fn merge_bytes(word: u32, data: u32, mask: &ByteMask) -> u32 {
    mask.iter_ones().fold(word, |word, byte| {
        let lane = 0xFFu32 << (byte * 8);
        (word & !lane) | (data & lane)
    })
}

/// Direction of a requester transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    READ,
    WRITE,
}

/// Signals driven by the requester into the controller.
///
/// The requester must keep every field stable while `valid` is asserted and the
/// request has not completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Request {
    pub valid: bool,
    pub kind: Kind,
    pub byte_mask: ByteMask,
    pub addr: address,
    pub data: u32,
}

impl Default for Request {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.valid {
            return write!(f, "Request(none)");
        }
        write!(f, "{:?}@{:#010x}", self.kind, self.addr)?;
        if self.kind == Kind::WRITE {
            write!(
                f,
                "={:#010x}/{:04b}",
                self.data,
                self.byte_mask[..4].load::<u8>()
            )?;
        }
        Ok(())
    }
}

impl Request {
    /// Request line deasserted.
    #[must_use]
    pub fn none() -> Self {
        Self {
            valid: false,
            kind: Kind::READ,
            byte_mask: ByteMask::ZERO,
            addr: 0,
            data: 0,
        }
    }

    #[must_use]
    pub fn read(addr: address) -> Self {
        Self {
            valid: true,
            kind: Kind::READ,
            byte_mask: FULL_MASK,
            addr,
            data: 0,
        }
    }

    #[must_use]
    pub fn write(addr: address, data: u32, byte_mask: ByteMask) -> Self {
        Self {
            valid: true,
            kind: Kind::WRITE,
            byte_mask,
            addr,
            data,
        }
    }

    #[must_use]
    pub fn is_write(&self) -> bool {
        self.kind == Kind::WRITE
    }
}

/// Signals driven by the controller back to the requester.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Response {
    pub stall: bool,
    /// Valid only while `stall` is low in a lookup cycle of a read.
    pub read_data: u32,
}

impl Response {
    #[must_use]
    pub fn stalled() -> Self {
        Self {
            stall: true,
            read_data: 0,
        }
    }
}
