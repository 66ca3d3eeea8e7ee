//! Behavioural model of the burst memory behind the bus.

use super::{address, bus, request, WORD_SIZE};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Backing-store timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cycles an address request is held before it is granted.
    pub grant_latency: u32,
    /// Cycles from a read grant to the first data beat.
    pub read_latency: u32,
    /// Cycles from the last write beat to the write acknowledgment.
    pub write_response_latency: u32,
    /// Probability of withholding data valid (reads) or ready (writes) in a cycle.
    pub bubble_probability: f64,
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grant_latency: 1,
            read_latency: 4,
            write_response_latency: 2,
            bubble_probability: 0.0,
            seed: 0,
        }
    }
}

/// Transaction observed by the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    ReadAddr { addr: address, cycle: u64 },
    WriteAddr { addr: address, cycle: u64 },
    WriteResponse { cycle: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReadBurst {
    burst: bus::Burst,
    beat: usize,
    latency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WriteBurst {
    burst: bus::Burst,
    beat: usize,
}

/// Main memory.
///
/// Sparse word storage; words never written read as zero. Serves one burst per
/// channel at a time.
#[derive(Debug)]
pub struct Memory {
    config: Config,
    words: HashMap<address, u32>,
    read: Option<ReadBurst>,
    write: Option<WriteBurst>,
    /// Countdown to the write acknowledgment.
    write_response: Option<u32>,
    read_addr_wait: u32,
    write_addr_wait: u32,
    /// Data beats are withheld in the current cycle.
    bubble: bool,
    rng: SmallRng,
    events: Vec<Event>,
    stats: stats::DRAM,
    cycle: u64,
}

impl Memory {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let rng = SmallRng::seed_from_u64(config.seed);
        Self {
            config,
            words: HashMap::new(),
            read: None,
            write: None,
            write_response: None,
            read_addr_wait: 0,
            write_addr_wait: 0,
            bubble: false,
            rng,
            events: Vec::new(),
            stats: stats::DRAM::default(),
            cycle: 0,
        }
    }

    /// Word stored at `addr`, bypassing the bus.
    #[must_use]
    pub fn peek(&self, addr: address) -> u32 {
        debug_assert_eq!(addr % WORD_SIZE, 0);
        self.words.get(&addr).copied().unwrap_or(0)
    }

    /// Store a word at `addr`, bypassing the bus.
    pub fn poke(&mut self, addr: address, data: u32) {
        debug_assert_eq!(addr % WORD_SIZE, 0);
        self.words.insert(addr, data);
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    #[must_use]
    pub fn stats(&self) -> &stats::DRAM {
        &self.stats
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.read.is_some() || self.write.is_some() || self.write_response.is_some()
    }
}

impl bus::BackingStore for Memory {
    fn outputs(&self) -> bus::Response {
        let grant_latency = self.config.grant_latency;
        let write_idle = self.write.is_none() && self.write_response.is_none();
        let read_data = match &self.read {
            Some(read) if read.latency == 0 && !self.bubble => Some(bus::ReadBeat {
                data: self.peek(read.burst.beat_addr(read.beat)),
                last: read.beat + 1 == read.burst.beats(),
            }),
            _ => None,
        };
        bus::Response {
            read_addr_ready: self.read.is_none() && self.read_addr_wait >= grant_latency,
            write_addr_ready: write_idle && self.write_addr_wait >= grant_latency,
            write_data_ready: self.write.is_some() && !self.bubble,
            read_data,
            write_response: self.write_response == Some(0),
        }
    }

    fn cycle(&mut self, req: &bus::Request) {
        let out = self.outputs();

        // read data
        if let Some(read) = &mut self.read {
            match out.read_data {
                Some(beat) if req.read_ready => {
                    self.stats.read_beats += 1;
                    read.beat += 1;
                    if beat.last {
                        self.read = None;
                    }
                }
                Some(_) => {}
                None if read.latency > 0 => read.latency -= 1,
                None => self.stats.bubbles += 1,
            }
        }

        // write response
        match self.write_response {
            Some(0) if req.write_response_ready => {
                self.events.push(Event::WriteResponse { cycle: self.cycle });
                self.write_response = None;
            }
            Some(ref mut latency) if *latency > 0 => *latency -= 1,
            _ => {}
        }

        // write data
        if let (Some(write), Some(beat)) = (&mut self.write, req.write_data) {
            if out.write_data_ready {
                let addr = write.burst.beat_addr(write.beat);
                let old = self.words.get(&addr).copied().unwrap_or(0);
                let word = request::merge_bytes(old, beat.data, &beat.strobe);
                self.words.insert(addr, word);
                self.stats.write_beats += 1;
                write.beat += 1;
                let expect_last = write.beat == write.burst.beats();
                if beat.last != expect_last {
                    log::warn!(
                        "write beat {} of {} carried last={}",
                        write.beat,
                        write.burst,
                        beat.last
                    );
                }
                if beat.last || expect_last {
                    self.write = None;
                    self.write_response = Some(self.config.write_response_latency);
                }
            } else {
                self.stats.bubbles += 1;
            }
        }

        // read address
        match req.read_addr {
            Some(burst) if out.read_addr_ready => {
                log::trace!("dram: read {burst} at cycle {}", self.cycle);
                self.events.push(Event::ReadAddr {
                    addr: burst.addr,
                    cycle: self.cycle,
                });
                self.stats.read_bursts += 1;
                self.read = Some(ReadBurst {
                    burst,
                    beat: 0,
                    latency: self.config.read_latency,
                });
                self.read_addr_wait = 0;
            }
            Some(_) => self.read_addr_wait += 1,
            None => self.read_addr_wait = 0,
        }

        // write address
        match req.write_addr {
            Some(burst) if out.write_addr_ready => {
                log::trace!("dram: write {burst} at cycle {}", self.cycle);
                self.events.push(Event::WriteAddr {
                    addr: burst.addr,
                    cycle: self.cycle,
                });
                self.stats.write_bursts += 1;
                self.write = Some(WriteBurst { burst, beat: 0 });
                self.write_addr_wait = 0;
            }
            Some(_) => self.write_addr_wait += 1,
            None => self.write_addr_wait = 0,
        }

        self.bubble = self.config.bubble_probability > 0.0
            && self.rng.gen_bool(self.config.bubble_probability.min(1.0));
        self.cycle += 1;
    }

    fn reset(&mut self) {
        if self.is_busy() {
            log::debug!("dram: abandoning bursts in flight");
        }
        self.read = None;
        self.write = None;
        self.write_response = None;
        self.read_addr_wait = 0;
        self.write_addr_wait = 0;
        self.bubble = false;
    }
}
