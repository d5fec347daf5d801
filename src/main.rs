use anyhow::Context;
use clap::Parser;
use std::io::{self, IsTerminal, Write};
use substory_tracker::cli::{self, Cli, Command, TablePrinter};
use substory_tracker::config::AppPaths;
use substory_tracker::logging::{init_tracing, LogConfig, StderrFormat};
use substory_tracker::schema::DatasetRegistry;
use substory_tracker::session::TomlSessionStore;
use substory_tracker::store::JsonFileStore;
use substory_tracker::theme::apply_theme;
use substory_tracker::tracker::Tracker;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {:#}", error);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = AppPaths::resolve(cli.data_dir.as_deref());
    paths.ensure_dirs().context("failed to prepare data directory")?;

    let stderr = if cli.log_stderr {
        StderrFormat::Compact
    } else {
        StderrFormat::Off
    };
    let log_config = LogConfig::new(&paths.log_dir)
        .with_verbosity(cli.verbose)
        .with_stderr(stderr);
    if let Err(error) = init_tracing(&log_config) {
        eprintln!("warning: logging disabled: {}", error);
    }
    tracing::debug!(data_dir = %paths.data_dir.display(), "resolved data directory");

    let registry = DatasetRegistry::load_or_builtin(&paths.registry_path)
        .with_context(|| format!("failed to load {}", paths.registry_path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Command::Datasets = cli.command {
        cli::print_datasets(&registry, None, &mut out)?;
        return Ok(());
    }

    let mut tracker = Tracker::open(
        registry,
        Box::new(JsonFileStore::new(&paths.datasets_dir)),
        Box::new(TomlSessionStore::new(&paths.session_path)),
    )
    .with_context(|| format!("failed to open datasets in {}", paths.datasets_dir.display()))?;

    cli::report_startup(&tracker, &mut io::stderr())?;

    let mut printer = TablePrinter::new(!cli.no_color && io::stdout().is_terminal());
    apply_theme(tracker.dark_mode(), &mut [&mut printer]);

    let outcome = cli::execute(&mut tracker, cli.command, &mut printer, &mut out);
    out.flush()?;
    let shutdown = tracker.shutdown();
    outcome?;
    shutdown.context("failed to save session")?;
    Ok(())
}
