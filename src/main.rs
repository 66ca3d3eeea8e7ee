use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, WrapErr};
use console::style;
use dmcache::{trace, Config, Simulator};
use itertools::Itertools;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Execute a trace of requester commands (JSON or YAML)
    Run {
        #[arg(short, long, value_name = "TRACE")]
        trace: PathBuf,
    },
    /// Execute a seeded random workload checked against a flat memory
    Stress {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 10_000)]
        ops: usize,
        /// Number of distinct line indices touched
        #[arg(long, default_value_t = 8)]
        lines: usize,
        /// Number of conflicting tags per line index
        #[arg(long, default_value_t = 3)]
        tags: u32,
    },
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Options {
    /// Simulator configuration (YAML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Write statistics as JSON to this path
    #[arg(long, value_name = "STATS")]
    stats: Option<PathBuf>,
    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,
    #[command(subcommand)]
    command: Command,
}

fn init_logging(debug: u8) {
    let level = match debug {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn print_summary(stats: &stats::Stats, checked: usize, dur: Duration) {
    let sim = &stats.sim;
    let cache = &stats.cache;
    let dram = &stats.dram;
    println!("{}", style("simulation complete").green().bold());
    println!(
        "  transactions   {:>10} ({} reads, {} writes, {} flushes)",
        sim.transactions(),
        sim.reads,
        sim.writes,
        sim.flushes
    );
    println!("  checked reads  {checked:>10}");
    println!("  cycles         {:>10} ({} stalled)", sim.cycles, sim.stall_cycles);
    println!(
        "  counters       {}",
        cache
            .flatten()
            .into_iter()
            .map(|(counter, count)| format!("{counter}={count}"))
            .join(", ")
    );
    match cache.hit_rate() {
        Some(rate) => println!("  hit rate       {:>9.2}%", rate * 100.0),
        None => println!("  hit rate       {:>10}", style("n/a").dim()),
    }
    println!(
        "  bursts         {:>10} read, {} write ({} bubbles)",
        dram.read_bursts, dram.write_bursts, dram.bubbles
    );
    println!("  took           {dur:>10?}");
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let options = Options::parse();
    init_logging(options.debug);

    let config = match &options.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    log::debug!("{config:#?}");

    let commands = match options.command {
        Command::Run { trace: ref path } => trace::parse_commands(path)?,
        Command::Stress {
            seed,
            ops,
            lines,
            tags,
        } => {
            let addresses = trace::conflicting_addresses(lines, tags)
                .wrap_err("invalid stress workload")?;
            trace::generate(seed, ops, &addresses)
        }
    };

    let mut sim = Simulator::new(config);
    let start = Instant::now();
    let result = trace::run(&mut sim, &commands);
    let dur = start.elapsed();

    let stats = sim.stats();
    if let Some(path) = &options.stats {
        let file = std::fs::File::create(path)
            .wrap_err_with(|| format!("could not create {}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &stats)?;
    }

    match result {
        Ok(checked) => {
            print_summary(&stats, checked, dur);
            Ok(())
        }
        Err(err) => {
            eprintln!(
                "{} after {} cycles",
                style("simulation failed").red().bold(),
                stats.sim.cycles
            );
            Err(err.into())
        }
    }
}
