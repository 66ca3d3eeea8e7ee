//! Requester workloads.

use crate::{
    address, addrdec,
    bus::BackingStore,
    request,
    sim::{Error, Simulator},
    NUM_LINES, WORDS_PER_LINE, WORD_SIZE,
};
use color_eyre::eyre::{self, WrapErr};
use rand::{rngs::SmallRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn full_mask() -> u8 {
    0b1111
}

/// One requester transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Command {
    Read {
        addr: address,
        /// Value the read must return.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<u32>,
    },
    Write {
        addr: address,
        data: u32,
        /// Byte enables, bit `i` enables byte `i`.
        #[serde(default = "full_mask")]
        mask: u8,
    },
    Flush {
        index: usize,
    },
    /// Keep the request deasserted for a number of cycles.
    Idle {
        cycles: u64,
    },
}

/// Workload shapes that do not fit the cache geometry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkloadError {
    #[error("{lines} line indices requested, the cache has {}", NUM_LINES)]
    Lines { lines: usize },

    #[error("{tags} tags requested, at most {} fit in the tag field", MAX_TAGS)]
    Tags { tags: u32 },
}

/// Tags `1..=MAX_TAGS` are all representable; tag zero is left out.
pub const MAX_TAGS: u32 = (1 << addrdec::TAG_WIDTH) - 1;

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { addr, expect: None } => write!(f, "READ({addr:#010x})"),
            Self::Read {
                addr,
                expect: Some(expect),
            } => write!(f, "READ({addr:#010x}) == {expect:#010x}"),
            Self::Write { addr, data, mask } => {
                write!(f, "WRITE({addr:#010x}, {data:#010x}, {mask:04b})")
            }
            Self::Flush { index } => write!(f, "FLUSH(line={index})"),
            Self::Idle { cycles } => write!(f, "IDLE({cycles})"),
        }
    }
}

/// Parse a trace, JSON if the file ends in `.json` and YAML otherwise.
pub fn parse_commands(path: impl AsRef<Path>) -> eyre::Result<Vec<Command>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("could not open trace {}", path.display()))?;
    let reader = std::io::BufReader::new(file);
    let commands: Vec<Command> = match path.extension().and_then(std::ffi::OsStr::to_str) {
        Some("json") => serde_json::from_reader(reader)
            .wrap_err_with(|| format!("could not parse trace {}", path.display()))?,
        _ => serde_yaml::from_reader(reader)
            .wrap_err_with(|| format!("could not parse trace {}", path.display()))?,
    };
    Ok(commands)
}

/// Execute commands in order, checking every read that carries an expectation.
///
/// Returns the number of checked reads.
pub fn run<M>(sim: &mut Simulator<M>, commands: &[Command]) -> Result<usize, Error>
where
    M: BackingStore,
{
    let mut checked = 0;
    for command in commands {
        log::debug!("{command}");
        match *command {
            Command::Read { addr, expect } => {
                let actual = sim.read(addr)?;
                if let Some(expected) = expect {
                    if actual != expected {
                        return Err(Error::Mismatch {
                            addr,
                            expected,
                            actual,
                        });
                    }
                    checked += 1;
                }
            }
            Command::Write { addr, data, mask } => {
                sim.write_masked(addr, data, request::byte_mask(mask))?;
            }
            Command::Flush { index } => sim.flush(index)?,
            Command::Idle { cycles } => sim.idle(cycles),
        }
    }
    Ok(checked)
}

/// Golden model of the memory as seen by the requester.
///
/// Flat word storage without any caching; words never written read as zero.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShadowMemory {
    words: HashMap<address, u32>,
}

impl ShadowMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn read(&self, addr: address) -> u32 {
        self.words.get(&word_addr(addr)).copied().unwrap_or(0)
    }

    pub fn write(&mut self, addr: address, data: u32, mask: u8) {
        let addr = word_addr(addr);
        let word = request::merge_bytes(self.read(addr), data, &request::byte_mask(mask));
        self.words.insert(addr, word);
    }

    /// Apply a command, filling in the expectation of reads.
    pub fn apply(&mut self, command: &mut Command) {
        match command {
            Command::Read { addr, expect } => *expect = Some(self.read(*addr)),
            Command::Write { addr, data, mask } => self.write(*addr, *data, *mask),
            Command::Flush { .. } | Command::Idle { .. } => {}
        }
    }
}

fn word_addr(addr: address) -> address {
    addr & !(WORD_SIZE - 1)
}

/// Word addresses spread over `lines` line indices with `tags` conflicting tags each.
///
/// # Errors
/// If `lines` exceeds the number of cache lines or `tags` exceeds [`MAX_TAGS`].
pub fn conflicting_addresses(lines: usize, tags: u32) -> Result<Vec<address>, WorkloadError> {
    if lines > NUM_LINES {
        return Err(WorkloadError::Lines { lines });
    }
    if tags > MAX_TAGS {
        return Err(WorkloadError::Tags { tags });
    }
    let addresses = (1..=tags)
        .flat_map(|tag| {
            (0..lines).map(move |index| {
                let offset = (index * 5) % WORDS_PER_LINE;
                addrdec::line_addr(tag, index) + offset as address * WORD_SIZE
            })
        })
        .collect();
    Ok(addresses)
}

/// Seeded random workload over `addresses`.
///
/// Every read carries the value a flat memory would return.
#[must_use]
pub fn generate(seed: u64, ops: usize, addresses: &[address]) -> Vec<Command> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut shadow = ShadowMemory::new();
    let mut commands = Vec::with_capacity(ops);
    for _ in 0..ops {
        let Some(&addr) = addresses.choose(&mut rng) else {
            break;
        };
        let mut command = match rng.gen_range(0..20) {
            0..=8 => Command::Read { addr, expect: None },
            9..=17 => Command::Write {
                addr,
                data: rng.gen(),
                mask: if rng.gen_bool(0.5) {
                    full_mask()
                } else {
                    rng.gen_range(1..=0b1111)
                },
            },
            _ => Command::Flush {
                index: addrdec::line_index(addr),
            },
        };
        shadow.apply(&mut command);
        commands.push(command);
    }
    commands
}
