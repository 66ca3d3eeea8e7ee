use crate::{address, addrdec, request};

/// Latched copy of an accepted requester transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingRequest {
    pub kind: request::Kind,
    pub addr: address,
    pub byte_mask: request::ByteMask,
    pub data: u32,
    /// Line selected by a flush command.
    pub flush_index: Option<usize>,
    /// The lookup of this request has missed at least once.
    pub missed: bool,
    /// The request has completed towards the requester.
    pub served: bool,
}

impl std::fmt::Display for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.flush_index {
            Some(index) => write!(f, "FLUSH(line={index})"),
            None => write!(f, "{:?}@{:#010x}", self.kind, self.addr),
        }
    }
}

impl PendingRequest {
    #[must_use]
    pub fn is_flush(&self) -> bool {
        self.flush_index.is_some()
    }

    #[must_use]
    pub fn is_write(&self) -> bool {
        self.kind == request::Kind::WRITE && !self.is_flush()
    }

    #[must_use]
    pub fn is_read(&self) -> bool {
        self.kind == request::Kind::READ
    }

    #[must_use]
    pub fn decoded(&self) -> addrdec::DecodedAddress {
        addrdec::decode(self.addr)
    }

    /// Line this request operates on.
    #[must_use]
    pub fn index(&self) -> usize {
        self.flush_index.unwrap_or_else(|| self.decoded().index)
    }
}

/// Capture stage in front of the lookup.
///
/// Holds at most one request; nothing new is accepted while one is captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    flush_addr: address,
    pending: Option<PendingRequest>,
}

impl Capture {
    #[must_use]
    pub fn new(flush_addr: address) -> Self {
        Self {
            flush_addr,
            pending: None,
        }
    }

    /// Latch the request if the stage is empty.
    ///
    /// Returns whether the request was accepted.
    pub fn capture(&mut self, req: &request::Request) -> bool {
        if self.pending.is_some() || !req.valid {
            return false;
        }
        let flush_index = (req.is_write() && req.addr == self.flush_addr)
            .then(|| addrdec::flush_line_index(req.data));
        let pending = PendingRequest {
            kind: req.kind,
            addr: req.addr,
            byte_mask: req.byte_mask,
            data: req.data,
            flush_index,
            missed: false,
            served: false,
        };
        log::trace!("capture: {pending}");
        self.pending = Some(pending);
        true
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn pending_mut(&mut self) -> Option<&mut PendingRequest> {
        self.pending.as_mut()
    }

    pub fn clear(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::trace!("capture: release {pending}");
        }
    }
}
