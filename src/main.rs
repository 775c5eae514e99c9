//! CLI entry point for `mailstash`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};

use mailstash::archive::postprocess::CommandPostProcessor;
use mailstash::archive::processor::MessageProcessor;
use mailstash::archive::service::ArchiveService;
use mailstash::config::{self, Config};
use mailstash::gateway::imap::ImapGateway;

#[derive(Parser)]
#[command(name = "mailstash", version, about = "Automated IMAP mailbox archiver")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file (defaults to $MAILSTASH_CONFIG or
    /// the standard config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the mailbox until interrupted (default)
    Run,
    /// Run a single poll cycle and exit
    Check,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Completions and manpage need no config
    match cli.command {
        Some(Commands::Completions { shell }) => return cmd_completions(shell),
        Some(Commands::Manpage) => return cmd_manpage(),
        _ => {}
    }

    let config = config::load_config(cli.config.as_deref())?;

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Check) => cmd_check(&config),
        Some(Commands::Run) | None => cmd_run(&config),
        Some(Commands::Completions { .. }) | Some(Commands::Manpage) => unreachable!(),
    }
}

/// Build the service: connect, log in, select the inbox.
fn build_service(config: &Config) -> anyhow::Result<ArchiveService<ImapGateway>> {
    let gateway = ImapGateway::connect(&config.server)?;

    let mut processor = MessageProcessor::new(&config.archive.base_dir)?;
    if let Some(convert) = &config.archive.convert_path {
        processor = processor.with_post_processor(Box::new(CommandPostProcessor::new(convert)));
    }

    let service = ArchiveService::new(
        gateway,
        processor,
        &config.mailboxes.inbox,
        config.mailboxes.outbox.clone(),
        Duration::from_secs(config.general.poll_interval_secs),
    )?;
    Ok(service)
}

/// Poll until SIGINT. The handler sets the flag; the loop exits at the next
/// sleep boundary with a clean logout.
fn cmd_run(config: &Config) -> anyhow::Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;

    let mut service = build_service(config)?;
    tracing::info!(
        inbox = %config.mailboxes.inbox,
        outbox = %config.mailboxes.outbox,
        interval_secs = config.general.poll_interval_secs,
        "Starting poll loop"
    );
    service.run(&cancel)?;
    Ok(())
}

/// Run one poll cycle and exit.
fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let mut service = build_service(config)?;
    let result = service.run_once();
    if let Err(e) = service.shutdown() {
        tracing::warn!(error = %e, "Logout failed");
    }
    let stats = result?;
    println!("Archived {} message(s)", stats.archived);
    Ok(())
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailstash.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailstash", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
