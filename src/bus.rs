//! Split-channel ready/valid bus towards the backing store.
//!
//! Five channels: read address, read data, write address, write data and write
//! response. A transfer on a channel happens in the cycle where both its valid
//! and its ready are high.

use super::{address, request, WORDS_PER_LINE, WORD_SIZE};

/// Number of beats in every burst.
pub const BURST_LEN: usize = WORDS_PER_LINE;

/// Bytes transferred per beat.
pub const BEAT_SIZE: u32 = WORD_SIZE;

/// Ordinal of the final beat of a burst.
pub const LAST_BEAT: usize = BURST_LEN - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BurstKind {
    /// Every beat addresses the next word.
    INCR,
}

/// Opening request of a burst, as carried on an address channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Burst {
    pub addr: address,
    /// Number of beats minus one.
    pub len: u8,
    /// Bytes per beat.
    pub size: u32,
    pub kind: BurstKind,
}

impl std::fmt::Display for Burst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Burst({:#010x}, {} beats)", self.addr, self.beats())
    }
}

impl Burst {
    /// The only burst shape the controller issues: one full line.
    #[must_use]
    pub fn line(addr: address) -> Self {
        Self {
            addr,
            len: LAST_BEAT as u8,
            size: BEAT_SIZE,
            kind: BurstKind::INCR,
        }
    }

    #[must_use]
    pub fn beats(&self) -> usize {
        usize::from(self.len) + 1
    }

    /// Address of the `ordinal`-th beat.
    #[must_use]
    pub fn beat_addr(&self, ordinal: usize) -> address {
        debug_assert!(ordinal < self.beats());
        match self.kind {
            BurstKind::INCR => self.addr + ordinal as address * self.size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteBeat {
    pub data: u32,
    pub strobe: request::ByteMask,
    pub last: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadBeat {
    pub data: u32,
    pub last: bool,
}

/// Signals driven by the controller. `Some` means the channel's valid is high.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Request {
    pub read_addr: Option<Burst>,
    pub write_addr: Option<Burst>,
    pub write_data: Option<WriteBeat>,
    pub read_ready: bool,
    pub write_response_ready: bool,
}

impl Request {
    /// No channel is active.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        *self == Self::default()
    }
}

/// Signals driven by the backing store. `Some` means the channel's valid is high.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Response {
    pub read_addr_ready: bool,
    pub write_addr_ready: bool,
    pub write_data_ready: bool,
    pub read_data: Option<ReadBeat>,
    pub write_response: bool,
}

/// External backing-store device.
///
/// The device must honor the handshake contract of every channel, may take any
/// number of cycles to grant, deliver or acknowledge, and may withhold valid or
/// ready on any beat.
pub trait BackingStore {
    /// Signals for the current cycle.
    ///
    /// Must only depend on state registered at the previous clock edge.
    #[must_use]
    fn outputs(&self) -> Response;

    /// Advance one clock edge, observing the controller's signals of this cycle.
    fn cycle(&mut self, req: &Request);

    /// Abandon every burst in flight.
    fn reset(&mut self);
}

/// What the controller wants from the bus in the current cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    #[default]
    IDLE,
    /// Open a write burst for the line at this address.
    OPEN_WRITE(address),
    /// Offer one word of the write burst.
    WRITE_BEAT { ordinal: usize, data: u32 },
    AWAIT_WRITE_RESPONSE,
    /// Open a read burst for the line at this address.
    OPEN_READ(address),
    /// Accept one word of the read burst.
    READ_BEAT { ordinal: usize },
}

/// Transfer completed on the bus in the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handshake {
    NONE,
    /// The opening request of a burst was granted.
    GRANTED,
    /// A write beat was accepted.
    WRITTEN { last: bool },
    /// A read beat arrived.
    READ { data: u32, last: bool },
    /// The write burst was acknowledged as complete.
    ACKNOWLEDGED,
}

/// Maps burst intents onto channel signals and back.
///
/// Burst shape is fixed: `BURST_LEN` beats of `BEAT_SIZE` bytes, incrementing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Adapter;

impl Adapter {
    /// Signals to drive for an intent.
    #[must_use]
    pub fn drive(intent: Intent) -> Request {
        match intent {
            Intent::IDLE => Request::default(),
            Intent::OPEN_WRITE(addr) => Request {
                write_addr: Some(Burst::line(addr)),
                ..Request::default()
            },
            Intent::WRITE_BEAT { ordinal, data } => {
                debug_assert!(ordinal <= LAST_BEAT);
                Request {
                    write_data: Some(WriteBeat {
                        data,
                        strobe: request::FULL_MASK,
                        last: ordinal == LAST_BEAT,
                    }),
                    ..Request::default()
                }
            }
            Intent::AWAIT_WRITE_RESPONSE => Request {
                write_response_ready: true,
                ..Request::default()
            },
            Intent::OPEN_READ(addr) => Request {
                read_addr: Some(Burst::line(addr)),
                ..Request::default()
            },
            Intent::READ_BEAT { .. } => Request {
                read_ready: true,
                ..Request::default()
            },
        }
    }

    /// Transfer that completes for an intent given the backing store's signals.
    #[must_use]
    pub fn observe(intent: Intent, resp: &Response) -> Handshake {
        match intent {
            Intent::IDLE => Handshake::NONE,
            Intent::OPEN_WRITE(_) if resp.write_addr_ready => Handshake::GRANTED,
            Intent::OPEN_READ(_) if resp.read_addr_ready => Handshake::GRANTED,
            Intent::WRITE_BEAT { ordinal, .. } if resp.write_data_ready => Handshake::WRITTEN {
                last: ordinal == LAST_BEAT,
            },
            Intent::AWAIT_WRITE_RESPONSE if resp.write_response => Handshake::ACKNOWLEDGED,
            Intent::READ_BEAT { ordinal } => match resp.read_data {
                Some(beat) => {
                    let last = ordinal == LAST_BEAT;
                    if beat.last != last {
                        log::warn!(
                            "read beat {ordinal} arrived with last={}, expected last={last}",
                            beat.last
                        );
                    }
                    Handshake::READ {
                        data: beat.data,
                        last,
                    }
                }
                None => Handshake::NONE,
            },
            _ => Handshake::NONE,
        }
    }
}
