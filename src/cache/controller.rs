use super::{
    block,
    classifier::{self, Lookup, Probe},
    pipeline,
};
use crate::{
    addrdec, address,
    bus::{self, Adapter, Handshake, Intent},
    config,
    data_array::{self, DataArray},
    mshr, request,
    tag_array::{self, TagArray},
};
use stats::cache::Counter;

/// Controller state.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    strum::EnumIter,
    strum::Display,
)]
pub enum State {
    #[default]
    IDLE,
    /// Latch the line named by a flush command.
    PUSH_LOOKUP,
    /// Open the write-back burst of the line under service.
    PUSH_ADDR,
    /// Stream the line to the backing store.
    PUSH_DATA,
    WAIT_WRITE_RESPONSE,
    /// Open the refill burst of the line under service.
    SEND_READ_ADDR,
    REFILL,
    /// One settle cycle; commits a deferred write.
    WAIT,
}

/// Cache controller.
///
/// Direct-mapped, write-back, write-allocate, with a single outstanding miss.
/// Storage is reached only through the `tag_array::Access` and
/// `data_array::Access` contracts.
#[derive(Debug, Clone)]
pub struct Controller<T = TagArray, D = DataArray> {
    state: State,
    capture: pipeline::Capture,
    mshr: mshr::Entry,
    /// Ordinal of the next beat of the burst in progress.
    burst: usize,
    tags: T,
    data: D,
    stats: stats::Cache,
    cycle: u64,
}

impl Controller {
    #[must_use]
    pub fn new(config: &config::Config) -> Self {
        Self::with_storage(config.flush_addr, TagArray::new(), DataArray::new())
    }
}

impl<T, D> Controller<T, D>
where
    T: tag_array::Access,
    D: data_array::Access,
{
    #[must_use]
    pub fn with_storage(flush_addr: address, tags: T, data: D) -> Self {
        Self {
            state: State::IDLE,
            capture: pipeline::Capture::new(flush_addr),
            mshr: mshr::Entry::new(),
            burst: 0,
            tags,
            data,
            stats: stats::Cache::default(),
            cycle: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn stats(&self) -> &stats::Cache {
        &self.stats
    }

    #[must_use]
    pub fn pending(&self) -> Option<&pipeline::PendingRequest> {
        self.capture.pending()
    }

    #[must_use]
    pub fn miss_context(&self) -> Option<&mshr::MissContext> {
        self.mshr.context()
    }

    #[must_use]
    pub fn deferred_write(&self) -> Option<&mshr::DeferredWrite> {
        self.mshr.deferred()
    }

    #[must_use]
    pub fn burst_counter(&self) -> usize {
        self.burst
    }

    /// Word held for `addr`, if its line is resident.
    #[must_use]
    pub fn resident(&self, addr: address) -> Option<(block::Line, u32)> {
        let decoded = addrdec::decode(addr);
        let line = self.tags.read(decoded.index);
        (line.is_valid() && line.tag == decoded.tag)
            .then(|| (line, self.data.read(decoded.index, decoded.offset)))
    }

    /// Power-on reset.
    ///
    /// Abandons any burst in flight without protocol cleanup.
    pub fn reset(&mut self) {
        log::debug!("reset in state {} at cycle {}", self.state, self.cycle);
        self.state = State::IDLE;
        self.capture.clear();
        self.mshr.clear();
        self.burst = 0;
        self.tags.invalidate();
        self.data.clear();
        self.stats = stats::Cache::default();
        self.cycle = 0;
    }

    /// Line under service; only valid outside of idle.
    fn context(&self) -> mshr::MissContext {
        *self
            .mshr
            .context()
            .unwrap_or_else(|| panic!("no line under service in state {}", self.state))
    }

    /// What the controller asks of the bus this cycle.
    ///
    /// Depends only on registered state.
    #[must_use]
    pub fn intent(&self) -> Intent {
        match self.state {
            State::IDLE | State::PUSH_LOOKUP | State::WAIT => Intent::IDLE,
            State::PUSH_ADDR => {
                let ctx = self.context();
                let victim = self.tags.read(ctx.index);
                if victim.is_dirty() {
                    Intent::OPEN_WRITE(addrdec::line_addr(victim.tag, ctx.index))
                } else {
                    Intent::IDLE
                }
            }
            State::PUSH_DATA => Intent::WRITE_BEAT {
                ordinal: self.burst,
                data: self.data.read(self.context().index, self.burst),
            },
            State::WAIT_WRITE_RESPONSE => Intent::AWAIT_WRITE_RESPONSE,
            State::SEND_READ_ADDR => Intent::OPEN_READ(self.context().line_addr()),
            State::REFILL => Intent::READ_BEAT {
                ordinal: self.burst,
            },
        }
    }

    /// Signals driven towards the backing store this cycle.
    #[must_use]
    pub fn bus_request(&self) -> bus::Request {
        Adapter::drive(self.intent())
    }

    /// Advance one clock edge.
    ///
    /// `core` and `bus` are the signals sampled in this cycle. Returns the signals
    /// presented to the requester in this cycle.
    pub fn cycle(&mut self, core: &request::Request, bus: &bus::Response) -> request::Response {
        let handshake = Adapter::observe(self.intent(), bus);
        let (next, response) = match self.state {
            State::IDLE => self.idle(core),
            State::PUSH_LOOKUP => self.push_lookup(),
            State::PUSH_ADDR => self.push_addr(handshake),
            State::PUSH_DATA => self.push_data(handshake),
            State::WAIT_WRITE_RESPONSE => self.wait_write_response(handshake),
            State::SEND_READ_ADDR => self.send_read_addr(handshake),
            State::REFILL => self.refill(handshake),
            State::WAIT => self.wait(),
        };
        if next != self.state {
            log::trace!(
                "cycle {:>6}: {} => {} ({:?})",
                self.cycle,
                self.state,
                next,
                handshake
            );
        }
        if next != State::IDLE {
            debug_assert!(!self.mshr.is_empty() || next == State::PUSH_LOOKUP);
        }
        if !matches!(next, State::PUSH_DATA | State::REFILL) {
            self.burst = 0;
        }
        self.state = next;
        self.cycle += 1;
        response
    }

    fn idle(&mut self, core: &request::Request) -> (State, request::Response) {
        let Some(pending) = self.capture.pending().copied() else {
            // capture cycle: accepted but not yet looked up
            let accepted = self.capture.capture(core);
            return (
                State::IDLE,
                request::Response {
                    stall: accepted,
                    read_data: 0,
                },
            );
        };

        if pending.is_read() && !core.valid {
            self.capture.clear();
            return (State::IDLE, request::Response::default());
        }

        let index = pending.index();
        let decoded = pending.decoded();
        let stored = self.tags.read(index);
        let probe = Probe {
            tag: decoded.tag,
            flush: pending.is_flush(),
        };

        match classifier::classify(&stored, Some(probe)) {
            Lookup::HIT => {
                self.stats.inc(Counter::LOOKUP_HIT);
                if !pending.served && !pending.missed {
                    self.stats.inc(Counter::HIT);
                }
                if pending.is_write() {
                    self.data.write(index, decoded.offset, pending.data, &pending.byte_mask);
                    self.tags.write(index, block::Line::modified(decoded.tag));
                    self.capture.clear();
                    return (State::IDLE, request::Response::default());
                }
                if let Some(pending) = self.capture.pending_mut() {
                    pending.served = true;
                }
                let read_data = self.data.read(index, decoded.offset);
                (
                    State::IDLE,
                    request::Response {
                        stall: false,
                        read_data,
                    },
                )
            }
            Lookup::MISS => {
                self.stats.inc(Counter::LOOKUP_MISS);
                self.stats.inc(Counter::MISS);
                if let Some(pending) = self.capture.pending_mut() {
                    pending.missed = true;
                }
                let ctx = mshr::MissContext {
                    tag: decoded.tag,
                    index,
                    flush: false,
                };
                let deferred = pending.is_write().then_some(mshr::DeferredWrite {
                    byte_mask: pending.byte_mask,
                    data: pending.data,
                    offset: decoded.offset,
                });
                log::debug!(
                    "{pending} missed line {index} holding {stored} (deferred write: {})",
                    deferred.is_some()
                );
                self.mshr.allocate(ctx, deferred);
                let next = if stored.is_dirty() {
                    State::PUSH_ADDR
                } else {
                    State::SEND_READ_ADDR
                };
                (next, request::Response::stalled())
            }
            Lookup::FLUSH => {
                log::debug!("{pending}: line {index} holds {stored}");
                (State::PUSH_LOOKUP, request::Response::stalled())
            }
            Lookup::NONE => unreachable!("lookup without a pending request"),
        }
    }

    fn push_lookup(&mut self) -> (State, request::Response) {
        let index = self
            .capture
            .pending()
            .and_then(|pending| pending.flush_index)
            .expect("flush lookup without a flush command");
        let stored = self.tags.read(index);
        self.mshr.allocate(
            mshr::MissContext {
                tag: stored.tag,
                index,
                flush: true,
            },
            None,
        );
        (State::PUSH_ADDR, request::Response::stalled())
    }

    fn push_addr(&mut self, handshake: Handshake) -> (State, request::Response) {
        let ctx = self.context();
        let victim = self.tags.read(ctx.index);
        if !victim.is_dirty() {
            log::debug!("{ctx}: line is clean, skipping write-back");
            let next = if ctx.flush {
                State::WAIT
            } else {
                State::SEND_READ_ADDR
            };
            return (next, request::Response::stalled());
        }
        match handshake {
            Handshake::GRANTED => {
                log::debug!(
                    "{ctx}: evicting {:#010x}",
                    addrdec::line_addr(victim.tag, ctx.index)
                );
                self.stats.inc(Counter::EVICTION);
                (State::PUSH_DATA, request::Response::stalled())
            }
            _ => (State::PUSH_ADDR, request::Response::stalled()),
        }
    }

    fn push_data(&mut self, handshake: Handshake) -> (State, request::Response) {
        match handshake {
            Handshake::WRITTEN { last: true } => {
                let ctx = self.context();
                let victim = self.tags.read(ctx.index);
                self.tags.write(ctx.index, victim.cleaned());
                (State::WAIT_WRITE_RESPONSE, request::Response::stalled())
            }
            Handshake::WRITTEN { last: false } => {
                self.burst += 1;
                (State::PUSH_DATA, request::Response::stalled())
            }
            _ => (State::PUSH_DATA, request::Response::stalled()),
        }
    }

    fn wait_write_response(&mut self, handshake: Handshake) -> (State, request::Response) {
        if handshake != Handshake::ACKNOWLEDGED {
            return (State::WAIT_WRITE_RESPONSE, request::Response::stalled());
        }
        let next = if self.context().flush {
            State::WAIT
        } else {
            State::SEND_READ_ADDR
        };
        (next, request::Response::stalled())
    }

    fn send_read_addr(&mut self, handshake: Handshake) -> (State, request::Response) {
        if handshake != Handshake::GRANTED {
            return (State::SEND_READ_ADDR, request::Response::stalled());
        }
        let ctx = self.context();
        let victim = self.tags.read(ctx.index);
        debug_assert!(!victim.is_dirty(), "refilling over dirty {victim}");
        // the old tag no longer names the data being streamed in
        self.tags.write(ctx.index, block::Line::invalid());
        (State::REFILL, request::Response::stalled())
    }

    fn refill(&mut self, handshake: Handshake) -> (State, request::Response) {
        let Handshake::READ { data, last } = handshake else {
            return (State::REFILL, request::Response::stalled());
        };
        let ctx = self.context();
        self.data.write(ctx.index, self.burst, data, &request::FULL_MASK);
        if last {
            log::debug!("{ctx}: refill complete");
            self.tags.write(ctx.index, block::Line::clean(ctx.tag));
            return (State::WAIT, request::Response::stalled());
        }
        self.burst += 1;
        (State::REFILL, request::Response::stalled())
    }

    fn wait(&mut self) -> (State, request::Response) {
        let (ctx, deferred) = self.mshr.release();
        let ctx = ctx.expect("wait state without a line under service");
        if let Some(write) = deferred {
            log::debug!(
                "{ctx}: committing deferred write of {:#010x} to word {}",
                write.data,
                write.offset
            );
            self.data.write(ctx.index, write.offset, write.data, &write.byte_mask);
            self.tags.write(ctx.index, block::Line::modified(ctx.tag));
        }

        // a read completes on its next lookup; writes and flushes are done now
        let completed = self
            .capture
            .pending()
            .map_or(true, |pending| !pending.is_read());
        if completed {
            self.capture.clear();
            (State::IDLE, request::Response::default())
        } else {
            (State::IDLE, request::Response::stalled())
        }
    }
}
