use serde::{Deserialize, Serialize};

/// Traffic observed at the backing store.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DRAM {
    pub read_bursts: u64,
    pub write_bursts: u64,
    pub read_beats: u64,
    pub write_beats: u64,
    /// Cycles in which a data beat was withheld.
    pub bubbles: u64,
}

impl std::ops::AddAssign for DRAM {
    fn add_assign(&mut self, other: Self) {
        self.read_bursts += other.read_bursts;
        self.write_bursts += other.write_bursts;
        self.read_beats += other.read_beats;
        self.write_beats += other.write_beats;
        self.bubbles += other.bubbles;
    }
}
