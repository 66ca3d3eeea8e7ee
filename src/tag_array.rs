use super::cache::block;
use super::NUM_LINES;

/// Tag storage contract.
///
/// A single-port array keyed by line index. Writes take effect at the clock edge;
/// a read returns the value stored before the current edge.
pub trait Access {
    /// Read the entry of a line.
    #[must_use]
    fn read(&self, index: usize) -> block::Line;

    /// Write the entry of a line.
    fn write(&mut self, index: usize, line: block::Line);

    /// Invalidates all tags stored in this array.
    ///
    /// This effectively resets the tag array.
    fn invalidate(&mut self);
}

/// Tag array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagArray {
    lines: Vec<block::Line>,
}

impl Default for TagArray {
    fn default() -> Self {
        Self::new()
    }
}

impl TagArray {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: vec![block::Line::invalid(); NUM_LINES],
        }
    }
}

impl Access for TagArray {
    #[inline]
    fn read(&self, index: usize) -> block::Line {
        self.lines[index]
    }

    #[inline]
    fn write(&mut self, index: usize, line: block::Line) {
        let old = std::mem::replace(&mut self.lines[index], line);
        log::trace!("tag_array::write(line={index}): {old} => {line}");
    }

    fn invalidate(&mut self) {
        self.lines.fill(block::Line::invalid());
    }
}
