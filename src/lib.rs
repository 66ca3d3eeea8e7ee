#![allow(
    clippy::upper_case_acronyms,
    non_camel_case_types,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::too_many_lines,
    clippy::cast_possible_truncation
)]

//! Cycle-level model of a direct-mapped, write-back, write-allocate data cache
//! with a single outstanding miss, sitting between an in-order requester and a
//! burst memory behind a ready/valid bus.

pub mod addrdec;
pub mod bus;
pub mod cache;
pub mod config;
pub mod data_array;
pub mod dram;
pub mod mshr;
pub mod request;
pub mod sim;
pub mod tag_array;
pub mod trace;

#[cfg(test)]
pub mod testing;

pub use cache::Controller;
pub use config::Config;
pub use sim::Simulator;

/// Byte address on the requester and backing-store side.
pub type address = u32;

/// Number of lines in the cache.
pub const NUM_LINES: usize = 64;

/// Number of 32-bit words per line.
pub const WORDS_PER_LINE: usize = 16;

/// Number of bytes per word.
pub const WORD_SIZE: u32 = 4;
