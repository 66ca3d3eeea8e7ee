//! Simulation driver.
//!
//! Wires an in-order requester, the cache controller and a backing store together
//! and advances all of them by one clock edge at a time.

use crate::{
    address, addrdec,
    bus::BackingStore,
    cache::{Controller, State},
    config::Config,
    dram,
    request::{self, ByteMask, FULL_MASK},
    NUM_LINES,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{request} did not complete within {cycles} cycles (controller in {state})")]
    Timeout {
        request: request::Request,
        cycles: u64,
        state: State,
    },

    #[error("read of {addr:#010x} returned {actual:#010x}, expected {expected:#010x}")]
    Mismatch {
        addr: address,
        expected: u32,
        actual: u32,
    },

    #[error("cannot flush line {index}, the cache has {} lines", NUM_LINES)]
    LineOutOfRange { index: usize },
}

#[derive(Debug)]
pub struct Simulator<M = dram::Memory> {
    config: Config,
    controller: Controller,
    memory: M,
    stats: stats::Sim,
}

impl Simulator<dram::Memory> {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let memory = dram::Memory::new(config.backing_store.clone());
        Self::with_memory(config, memory)
    }

    #[must_use]
    pub fn stats(&self) -> stats::Stats {
        stats::Stats {
            sim: self.stats.clone(),
            cache: self.controller.stats().clone(),
            dram: self.memory.stats().clone(),
        }
    }
}

impl<M> Simulator<M>
where
    M: BackingStore,
{
    #[must_use]
    pub fn with_memory(config: Config, memory: M) -> Self {
        let controller = Controller::new(&config);
        Self {
            config,
            controller,
            memory,
            stats: stats::Sim::default(),
        }
    }

    #[must_use]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    #[must_use]
    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    #[must_use]
    pub fn sim_stats(&self) -> &stats::Sim {
        &self.stats
    }

    /// Advance every component by one clock edge.
    ///
    /// Both sides sample the signals the other drives from registered state
    /// before either is clocked.
    pub fn cycle(&mut self, core: &request::Request) -> request::Response {
        let bus_resp = self.memory.outputs();
        let bus_req = self.controller.bus_request();
        let resp = self.controller.cycle(core, &bus_resp);
        self.memory.cycle(&bus_req);

        self.stats.cycles += 1;
        if resp.stall {
            self.stats.stall_cycles += 1;
        }
        resp
    }

    /// Run `cycles` cycles with the request line deasserted.
    pub fn idle(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.cycle(&request::Request::none());
        }
    }

    /// Drive one transaction to completion.
    ///
    /// The request is held until stall drops after it was accepted and is then
    /// deasserted for one cycle.
    pub fn transact(&mut self, req: request::Request) -> Result<request::Response, Error> {
        debug_assert!(req.valid);
        let mut accepted = false;
        for _ in 0..self.config.max_transaction_cycles {
            let resp = self.cycle(&req);
            if accepted && !resp.stall {
                self.cycle(&request::Request::none());
                match req.kind {
                    request::Kind::READ => self.stats.reads += 1,
                    request::Kind::WRITE if req.addr == self.config.flush_addr => {
                        self.stats.flushes += 1;
                    }
                    request::Kind::WRITE => self.stats.writes += 1,
                }
                log::trace!("{req} completed");
                return Ok(resp);
            }
            accepted |= resp.stall;
        }
        Err(Error::Timeout {
            request: req,
            cycles: self.config.max_transaction_cycles,
            state: self.controller.state(),
        })
    }

    pub fn read(&mut self, addr: address) -> Result<u32, Error> {
        let resp = self.transact(request::Request::read(addr))?;
        Ok(resp.read_data)
    }

    pub fn write(&mut self, addr: address, data: u32) -> Result<(), Error> {
        self.write_masked(addr, data, FULL_MASK)
    }

    pub fn write_masked(
        &mut self,
        addr: address,
        data: u32,
        byte_mask: ByteMask,
    ) -> Result<(), Error> {
        self.transact(request::Request::write(addr, data, byte_mask))?;
        Ok(())
    }

    /// Write back line `index` if it is dirty.
    pub fn flush(&mut self, index: usize) -> Result<(), Error> {
        if index >= NUM_LINES {
            return Err(Error::LineOutOfRange { index });
        }
        let payload = addrdec::flush_payload(index);
        self.transact(request::Request::write(self.config.flush_addr, payload, FULL_MASK))?;
        Ok(())
    }

    /// Reset the controller and the backing store.
    ///
    /// Memory contents and simulation statistics are kept.
    pub fn reset(&mut self) {
        self.controller.reset();
        self.memory.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, Simulator};
    use crate::{
        bus::{self, BackingStore},
        cache::{block, State},
        config::{Config, FLUSH_ADDR},
        dram::{self, Event},
        request::{byte_mask, Request},
        testing,
    };
    use color_eyre::eyre;
    use stats::cache::Counter;

    fn assert_write_back_precedes_refill(events: &[Event]) {
        let mut unacknowledged = None;
        for event in events {
            match *event {
                Event::WriteAddr { addr, .. } => unacknowledged = Some(addr),
                Event::WriteResponse { .. } => unacknowledged = None,
                Event::ReadAddr { addr, cycle } => assert!(
                    unacknowledged.is_none(),
                    "read of {addr:#010x} at cycle {cycle} before write-back of {unacknowledged:x?} was acknowledged"
                ),
            }
        }
    }

    fn count_write_backs(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, Event::WriteAddr { .. }))
            .count()
    }

    fn read_after_write(backing_store: dram::Config) -> eyre::Result<()> {
        let mut sim = testing::simulator(backing_store);
        sim.memory_mut().poke(0x2000, 9);

        // write miss, then read of the now resident line
        sim.write(0x100, 5)?;
        assert_eq!(sim.read(0x100)?, 5);
        // write hit
        sim.write(0x100, 6)?;
        assert_eq!(sim.read(0x100)?, 6);
        // never written by the requester
        assert_eq!(sim.read(0x2000)?, 9);
        Ok(())
    }

    fn byte_lanes_compose(backing_store: dram::Config) -> eyre::Result<()> {
        let mut sim = testing::simulator(backing_store);
        sim.write_masked(0x4000, 0x0000_00EF, byte_mask(0b0001))?;
        sim.write_masked(0x4000, 0x0000_BE00, byte_mask(0b0010))?;
        sim.write_masked(0x4000, 0x00AD_0000, byte_mask(0b0100))?;
        sim.write_masked(0x4000, 0xDE00_0000, byte_mask(0b1000))?;
        assert_eq!(sim.read(0x4000)?, 0xDEAD_BEEF);
        Ok(())
    }

    fn evicted_line_survives(backing_store: dram::Config) -> eyre::Result<()> {
        let mut sim = testing::simulator(backing_store);
        sim.write(0xA000, 0xCAFE_BABE)?;
        sim.read(0xB000)?;
        assert_eq!(sim.memory().peek(0xA000), 0xCAFE_BABE);
        sim.read(0xC000)?;
        assert_eq!(sim.read(0xA000)?, 0xCAFE_BABE);
        assert_write_back_precedes_refill(sim.memory().events());
        Ok(())
    }

    fn thrashing_pair(backing_store: dram::Config) -> eyre::Result<()> {
        let mut sim = testing::simulator(backing_store);
        for round in 0..8 {
            sim.write(0x10050, round)?;
            sim.write(0x20050, round + 100)?;
            assert_eq!(sim.read(0x10050)?, round);
            assert_eq!(sim.read(0x20050)?, round + 100);
        }
        assert_eq!(sim.memory().peek(0x10050), 7);
        assert_write_back_precedes_refill(sim.memory().events());
        Ok(())
    }

    fn flush_is_idempotent(backing_store: dram::Config) -> eyre::Result<()> {
        let mut sim = testing::simulator(backing_store);

        // clean line: no traffic
        sim.read(0x40)?;
        sim.memory_mut().clear_events();
        sim.flush(1)?;
        assert!(sim.memory().events().is_empty());

        // dirty line: exactly one write-back
        sim.write(0x80, 0x1234)?;
        sim.memory_mut().clear_events();
        sim.flush(2)?;
        sim.flush(2)?;
        assert_eq!(count_write_backs(sim.memory().events()), 1);
        assert_eq!(sim.memory().peek(0x80), 0x1234);

        // the line stays resident and clean
        let (line, word) = sim.controller().resident(0x80).unwrap();
        assert_eq!(line.status, block::Status::VALID);
        assert_eq!(word, 0x1234);
        assert_eq!(sim.read(0x80)?, 0x1234);
        Ok(())
    }

    fn deferred_write_merges_with_refill(backing_store: dram::Config) -> eyre::Result<()> {
        let mut sim = testing::simulator(backing_store);
        for i in 0..16 {
            sim.memory_mut().poke(0x3000 + 4 * i, 100 + i);
        }
        sim.write_masked(0x3004, 0xABCD_0000, byte_mask(0b1100))?;

        let (line, word) = sim.controller().resident(0x3004).unwrap();
        assert_eq!(line.status, block::Status::MODIFIED);
        assert_eq!(word, 0xABCD_0065);
        assert_eq!(sim.read(0x3004)?, 0xABCD_0065);
        assert_eq!(sim.read(0x3008)?, 102);
        assert_eq!(sim.read(0x303C)?, 115);
        Ok(())
    }

    macro_rules! backing_store_checks {
        ($($name:ident: $config:expr,)*) => {
            $(
                paste::paste! {
                    #[test]
                    fn [<read_after_write_ $name>]() -> eyre::Result<()> {
                        testing::init_logging();
                        read_after_write($config)
                    }

                    #[test]
                    fn [<byte_lanes_compose_ $name>]() -> eyre::Result<()> {
                        testing::init_logging();
                        byte_lanes_compose($config)
                    }

                    #[test]
                    fn [<evicted_line_survives_ $name>]() -> eyre::Result<()> {
                        testing::init_logging();
                        evicted_line_survives($config)
                    }

                    #[test]
                    fn [<thrashing_pair_ $name>]() -> eyre::Result<()> {
                        testing::init_logging();
                        thrashing_pair($config)
                    }

                    #[test]
                    fn [<flush_is_idempotent_ $name>]() -> eyre::Result<()> {
                        testing::init_logging();
                        flush_is_idempotent($config)
                    }

                    #[test]
                    fn [<deferred_write_merges_with_refill_ $name>]() -> eyre::Result<()> {
                        testing::init_logging();
                        deferred_write_merges_with_refill($config)
                    }
                }
            )*
        }
    }

    backing_store_checks! {
        immediate: dram::Config {
            grant_latency: 0,
            read_latency: 0,
            write_response_latency: 0,
            ..dram::Config::default()
        },
        default_timing: dram::Config::default(),
        slow: dram::Config {
            grant_latency: 5,
            read_latency: 12,
            write_response_latency: 7,
            ..dram::Config::default()
        },
        bubbly: dram::Config {
            bubble_probability: 0.3,
            seed: 7,
            ..dram::Config::default()
        },
        congested: dram::Config {
            grant_latency: 3,
            read_latency: 8,
            write_response_latency: 5,
            bubble_probability: 0.5,
            seed: 42,
        },
    }

    #[test]
    fn uninitialized_memory_reads_zero() -> eyre::Result<()> {
        testing::init_logging();
        let mut sim = testing::simulator(dram::Config::default());
        assert_eq!(sim.read(0x7777_0000)?, 0);
        assert_eq!(sim.read(0x7777_003C)?, 0);
        Ok(())
    }

    #[test]
    fn read_of_flush_address_is_a_plain_read() -> eyre::Result<()> {
        testing::init_logging();
        let mut sim = testing::simulator(dram::Config::default());
        sim.memory_mut().poke(FLUSH_ADDR, 3);
        assert_eq!(sim.read(FLUSH_ADDR)?, 3);
        assert_eq!(sim.sim_stats().reads, 1);
        assert_eq!(sim.sim_stats().flushes, 0);
        Ok(())
    }

    #[test]
    fn flush_of_never_resident_line_is_silent() -> eyre::Result<()> {
        testing::init_logging();
        let mut sim = testing::simulator(dram::Config::default());
        sim.flush(5)?;
        assert!(sim.memory().events().is_empty());
        assert_eq!(sim.sim_stats().flushes, 1);
        assert_eq!(sim.controller().state(), State::IDLE);
        assert!(sim.controller().resident(0x140).is_none());
        Ok(())
    }

    #[test]
    fn flush_of_line_outside_the_cache_is_rejected() -> eyre::Result<()> {
        testing::init_logging();
        let mut sim = testing::simulator(dram::Config::default());
        assert_eq!(sim.flush(64), Err(Error::LineOutOfRange { index: 64 }));
        assert_eq!(sim.flush(usize::MAX), Err(Error::LineOutOfRange { index: usize::MAX }));
        assert_eq!(sim.sim_stats().cycles, 0);
        sim.flush(63)?;
        assert_eq!(sim.sim_stats().flushes, 1);
        Ok(())
    }

    #[test]
    fn read_hit_takes_two_cycles() -> eyre::Result<()> {
        testing::init_logging();
        let mut sim = testing::simulator(dram::Config::default());
        sim.read(0x100)?;

        assert!(sim.cycle(&Request::read(0x104)).stall);
        let resp = sim.cycle(&Request::read(0x104));
        assert!(!resp.stall);
        assert_eq!(resp.read_data, 0);
        assert!(!sim.cycle(&Request::none()).stall);
        assert_eq!(sim.controller().state(), State::IDLE);
        assert!(sim.controller().pending().is_none());
        Ok(())
    }

    #[test]
    fn counters_track_lookups() -> eyre::Result<()> {
        testing::init_logging();
        let mut sim = testing::simulator(dram::Config::default());
        sim.read(0x100)?; // miss, then hit on the re-lookup
        sim.read(0x104)?; // hit
        sim.write(0x108, 1)?; // hit, line now dirty
        sim.read(0x1100)?; // conflicting miss with eviction

        let stats = sim.stats();
        let cache = &stats.cache;
        assert_eq!(cache.get(Counter::LOOKUP_HIT), 4);
        assert_eq!(cache.get(Counter::LOOKUP_MISS), 2);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.evictions(), 1);
        assert_eq!(stats.sim.reads, 3);
        assert_eq!(stats.sim.writes, 1);
        assert_eq!(stats.dram.read_bursts, 2);
        assert_eq!(stats.dram.write_bursts, 1);
        assert_eq!(stats.dram.read_beats, 32);
        assert_eq!(stats.dram.write_beats, 16);
        Ok(())
    }

    #[test]
    fn lookup_counters_ignore_miss_service_cycles() -> eyre::Result<()> {
        testing::init_logging();
        let mut sim = testing::simulator(dram::Config {
            read_latency: 20,
            ..dram::Config::default()
        });
        sim.read(0x100)?;

        let stats = sim.stats();
        assert!(stats.sim.cycles > 20);
        assert_eq!(stats.cache.get(Counter::LOOKUP_MISS), 1);
        assert_eq!(stats.cache.get(Counter::LOOKUP_HIT), 1);
        assert_eq!(stats.cache.misses(), 1);
        assert_eq!(stats.cache.hits(), 0);
        Ok(())
    }

    #[test]
    fn reset_during_refill() -> eyre::Result<()> {
        testing::init_logging();
        let mut sim = testing::simulator(dram::Config {
            read_latency: 20,
            ..dram::Config::default()
        });
        sim.memory_mut().poke(0x500, 77);
        sim.write(0x900, 1)?;

        let req = Request::read(0x500);
        for _ in 0..100 {
            if sim.controller().state() == State::REFILL {
                break;
            }
            sim.cycle(&req);
        }
        assert_eq!(sim.controller().state(), State::REFILL);

        sim.reset();
        let ctrl = sim.controller();
        assert_eq!(ctrl.state(), State::IDLE);
        assert!(ctrl.pending().is_none());
        assert!(ctrl.miss_context().is_none());
        assert!(ctrl.deferred_write().is_none());
        assert_eq!(ctrl.burst_counter(), 0);
        assert!(ctrl.resident(0x500).is_none());
        assert!(ctrl.resident(0x900).is_none());
        assert_eq!(ctrl.stats().misses(), 0);

        assert_eq!(sim.read(0x500)?, 77);
        Ok(())
    }

    #[derive(Debug, Default)]
    struct Unresponsive;

    impl BackingStore for Unresponsive {
        fn outputs(&self) -> bus::Response {
            bus::Response::default()
        }

        fn cycle(&mut self, _req: &bus::Request) {}

        fn reset(&mut self) {}
    }

    #[test]
    fn unresponsive_backing_store_times_out() {
        testing::init_logging();
        let config = Config {
            max_transaction_cycles: 50,
            ..Config::default()
        };
        let mut sim = Simulator::with_memory(config, Unresponsive);
        let err = sim.read(0x40).unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                cycles: 50,
                state: State::SEND_READ_ADDR,
                ..
            }
        ));
    }
}
