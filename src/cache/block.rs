use crate::addrdec;

/// Status bits of a line as held in the tag array.
///
/// `MODIFIED` is the only dirty status and is only reachable for a valid line.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    #[default]
    INVALID = 0,
    VALID,
    MODIFIED,
}

/// Tag array entry: `{dirty, valid, tag}`.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Line {
    pub tag: u32,
    pub status: Status,
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("tag", &format_args!("{:#07x}", self.tag))
            .field("status", &self.status)
            .finish()
    }
}

impl Line {
    #[must_use]
    pub fn invalid() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn clean(tag: u32) -> Self {
        debug_assert!(tag < 1 << addrdec::TAG_WIDTH);
        Self {
            tag,
            status: Status::VALID,
        }
    }

    #[must_use]
    pub fn modified(tag: u32) -> Self {
        debug_assert!(tag < 1 << addrdec::TAG_WIDTH);
        Self {
            tag,
            status: Status::MODIFIED,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self.status, Status::VALID | Status::MODIFIED)
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.status == Status::MODIFIED
    }

    /// Same line with the dirty bit cleared.
    #[must_use]
    pub fn cleaned(self) -> Self {
        match self.status {
            Status::INVALID => self,
            Status::VALID | Status::MODIFIED => Self::clean(self.tag),
        }
    }
}
