//! Single-entry miss status tracking.
//!
//! Unlike a general miss status handling register table, the controller services
//! exactly one line at a time, so the table degenerates to one optional entry plus
//! one optional deferred write.

use super::{address, addrdec, request};

/// Line under service by a miss or flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MissContext {
    pub tag: u32,
    pub index: usize,
    pub flush: bool,
}

impl std::fmt::Display for MissContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}(line={}, tag={:#07x})",
            if self.flush { "Flush" } else { "Miss" },
            self.index,
            self.tag
        )
    }
}

impl MissContext {
    /// Base address of the line being brought in.
    #[must_use]
    pub fn line_addr(&self) -> address {
        addrdec::line_addr(self.tag, self.index)
    }
}

/// A write that missed, applied once its line has been refilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredWrite {
    pub byte_mask: request::ByteMask,
    pub data: u32,
    pub offset: usize,
}

/// Miss status holding register with room for a single line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Entry {
    context: Option<MissContext>,
    deferred: Option<DeferredWrite>,
}

impl Entry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start servicing a line.
    ///
    /// # Panics
    /// If another line is still under service.
    pub fn allocate(&mut self, context: MissContext, deferred: Option<DeferredWrite>) {
        if let Some(outstanding) = self.context {
            panic!("allocating {context} while {outstanding} is outstanding");
        }
        debug_assert!(!(context.flush && deferred.is_some()));
        self.context = Some(context);
        self.deferred = deferred;
    }

    #[must_use]
    pub fn context(&self) -> Option<&MissContext> {
        self.context.as_ref()
    }

    #[must_use]
    pub fn deferred(&self) -> Option<&DeferredWrite> {
        self.deferred.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.context.is_none()
    }

    /// Release the line and hand back the deferred write, if any.
    pub fn release(&mut self) -> (Option<MissContext>, Option<DeferredWrite>) {
        (self.context.take(), self.deferred.take())
    }

    pub fn clear(&mut self) {
        self.context = None;
        self.deferred = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{DeferredWrite, Entry, MissContext};
    use crate::request::FULL_MASK;

    #[test]
    fn holds_one_line() {
        let mut entry = Entry::new();
        assert!(entry.is_empty());

        let ctx = MissContext {
            tag: 0xA,
            index: 0,
            flush: false,
        };
        let write = DeferredWrite {
            byte_mask: FULL_MASK,
            data: 0xCAFE_BABE,
            offset: 0,
        };
        entry.allocate(ctx, Some(write));
        assert_eq!(entry.context(), Some(&ctx));
        assert_eq!(entry.context().unwrap().line_addr(), 0xA000);

        assert_eq!(entry.release(), (Some(ctx), Some(write)));
        assert!(entry.is_empty());
        assert_eq!(entry.deferred(), None);
    }

    #[test]
    #[should_panic(expected = "outstanding")]
    fn rejects_second_miss() {
        let mut entry = Entry::new();
        let ctx = MissContext {
            tag: 1,
            index: 1,
            flush: false,
        };
        entry.allocate(ctx, None);
        entry.allocate(ctx, None);
    }
}
