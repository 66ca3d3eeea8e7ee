use super::{address, dram};
use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default reserved flush-control address.
pub const FLUSH_ADDR: address = 0xFFFF_FFF0;

/// Simulator configuration.
///
/// The cache geometry and burst shape are fixed; only the flush address, the
/// behaviour of the backing store and the driver watchdog are configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Writes to this address are flush commands.
    pub flush_addr: address,
    /// Cycles a single requester transaction may take before the driver gives up.
    ///
    /// The controller itself never times out.
    pub max_transaction_cycles: u64,
    pub backing_store: dram::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flush_addr: FLUSH_ADDR,
            max_transaction_cycles: 100_000,
            backing_store: dram::Config::default(),
        }
    }
}

impl Config {
    pub fn from_reader(reader: impl std::io::Read) -> eyre::Result<Self> {
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("could not open config {}", path.display()))?;
        let reader = std::io::BufReader::new(file);
        Self::from_reader(reader)
            .wrap_err_with(|| format!("could not parse config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;

    #[test]
    fn empty_yaml_is_default() -> eyre::Result<()> {
        diff::assert_eq!(Config::from_reader("{}".as_bytes())?, Config::default());
        Ok(())
    }

    #[test]
    fn partial_yaml_overrides_fields() -> eyre::Result<()> {
        let yaml = r"
flush_addr: 32768
backing_store:
  read_latency: 7
  bubble_probability: 0.25
";
        let config = Config::from_reader(yaml.as_bytes())?;
        assert_eq!(config.flush_addr, 0x8000);
        assert_eq!(config.backing_store.read_latency, 7);
        assert!((config.backing_store.bubble_probability - 0.25).abs() < f64::EPSILON);
        assert_eq!(
            config.backing_store.grant_latency,
            Config::default().backing_store.grant_latency
        );
        Ok(())
    }
}
