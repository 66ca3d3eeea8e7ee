use serde::{Deserialize, Serialize};

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sim {
    pub cycles: u64,
    /// Cycles in which the requester saw stall asserted.
    pub stall_cycles: u64,
    pub reads: u64,
    pub writes: u64,
    pub flushes: u64,
}

impl Sim {
    #[must_use]
    pub fn transactions(&self) -> u64 {
        self.reads + self.writes + self.flushes
    }
}

impl std::ops::AddAssign for Sim {
    fn add_assign(&mut self, other: Self) {
        self.cycles += other.cycles;
        self.stall_cycles += other.stall_cycles;
        self.reads += other.reads;
        self.writes += other.writes;
        self.flushes += other.flushes;
    }
}
