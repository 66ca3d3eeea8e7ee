use crate::{config::Config, dram, sim::Simulator};

static LOGGER: std::sync::Once = std::sync::Once::new();

pub fn init_logging() {
    LOGGER.call_once(|| {
        env_logger::builder().is_test(true).init();
    });
}

/// Simulator with the default controller configuration in front of `backing_store`.
#[must_use]
pub fn simulator(backing_store: dram::Config) -> Simulator {
    Simulator::new(Config {
        backing_store,
        ..Config::default()
    })
}
