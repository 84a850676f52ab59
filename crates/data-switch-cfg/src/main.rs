//! configure-data-switches entry point.
//!
//! Loads the cluster definition, aggregates the data switch topology and
//! then prints it (`gather`), applies it (default) or tears it down
//! (`deconfigure`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use data_switch_cfg::{ClusterConfig, Reconciler, StdinConfirm, TopologyAggregator};
use netcfg_switch::SwitchFactory;

/// Configure cluster data switches
#[derive(Parser, Debug)]
#[command(name = "configure-data-switches")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cluster definition file
    #[arg(long, env = "DATA_SWITCH_CONFIG", default_value = "config.yml")]
    config: PathBuf,

    /// Action and log level words
    #[arg(value_enum)]
    words: Vec<Word>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Word {
    /// Print the aggregated topology and exit
    Gather,
    /// Tear down the data switch configuration
    #[value(alias = "deconfig", alias = "de")]
    Deconfigure,
    /// Log at info level (default)
    Info,
    /// Log at debug level
    Debug,
    /// Log warnings and errors only
    Warning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Gather,
    Configure,
    Deconfigure,
}

impl Args {
    fn action(&self) -> Action {
        if self.words.contains(&Word::Gather) {
            Action::Gather
        } else if self.words.contains(&Word::Deconfigure) {
            Action::Deconfigure
        } else {
            Action::Configure
        }
    }

    /// Last level word wins.
    fn log_level(&self) -> Level {
        self.words
            .iter()
            .rev()
            .find_map(|word| match word {
                Word::Info => Some(Level::INFO),
                Word::Debug => Some(Level::DEBUG),
                Word::Warning => Some(Level::WARN),
                Word::Gather | Word::Deconfigure => None,
            })
            .unwrap_or(Level::INFO)
    }
}

/// Initialize tracing/logging.
fn init_logging(level: Level) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let config = ClusterConfig::from_path(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let topology = TopologyAggregator::new(&config)
        .build()
        .context("Failed to aggregate data switch topology")?;

    let action = args.action();
    if action == Action::Gather {
        let text = serde_yaml::to_string(&topology).context("Failed to render topology")?;
        println!("{}", text);
        return Ok(());
    }

    let mut reconciler = Reconciler::connect(&config, &SwitchFactory::with_builtin())
        .context("Failed to create switch drivers")?;
    match action {
        Action::Deconfigure => {
            info!("Deconfiguring data switches");
            let mut confirm = StdinConfirm::stdin();
            reconciler
                .deconfigure(&topology, &mut confirm)
                .await
                .context("Data switch deconfiguration failed")?;
        }
        _ => {
            info!("Configuring data switches");
            reconciler
                .configure(&topology)
                .await
                .context("Data switch configuration failed")?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.log_level()) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(words: &[&str]) -> Args {
        Args::parse_from(std::iter::once("configure-data-switches").chain(words.iter().copied()))
    }

    #[test]
    fn test_action_selection() {
        assert_eq!(parse(&[]).action(), Action::Configure);
        assert_eq!(parse(&["debug"]).action(), Action::Configure);
        assert_eq!(parse(&["de"]).action(), Action::Deconfigure);
        assert_eq!(parse(&["deconfig", "debug"]).action(), Action::Deconfigure);
        assert_eq!(parse(&["deconfigure", "gather"]).action(), Action::Gather);
    }

    #[test]
    fn test_log_level() {
        assert_eq!(parse(&[]).log_level(), Level::INFO);
        assert_eq!(parse(&["gather", "debug"]).log_level(), Level::DEBUG);
        assert_eq!(parse(&["warning"]).log_level(), Level::WARN);
    }

    #[test]
    fn test_config_path() {
        let args = parse(&["--config", "/tmp/cluster.yml", "gather"]);
        assert_eq!(args.config, PathBuf::from("/tmp/cluster.yml"));
    }
}
