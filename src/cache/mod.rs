pub mod block;
pub mod classifier;
pub mod controller;
pub mod pipeline;

pub use controller::{Controller, State};
