#![allow(non_camel_case_types, clippy::upper_case_acronyms)]

pub mod cache;
pub mod dram;
pub mod sim;

pub use cache::Cache;
pub use dram::DRAM;
pub use sim::Sim;

use serde::{Deserialize, Serialize};

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub sim: Sim,
    pub cache: Cache,
    pub dram: DRAM,
}

impl std::ops::AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.sim += other.sim;
        self.cache += other.cache;
        self.dram += other.dram;
    }
}
