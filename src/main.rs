//! Picon Updater - Main entry point
//!
//! Without a subcommand the interactive browser starts. The other
//! subcommands run the same operations headless, logging to stderr.

use anyhow::{bail, Context, Result};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use piconupdater::app::App;
use piconupdater::catalogue::Catalogue;
use piconupdater::cli::{Cli, Commands, InstallArgs};
use piconupdater::config::Settings;
use piconupdater::installer::Installer;
use piconupdater::package_manager::Opkg;
use piconupdater::{process_guard, updater};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io::stdout;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing; `RUST_LOG` overrides the default `info` level.
///
/// With a log file the output goes there so it cannot corrupt the TUI.
fn init_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let file = log_file.and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("Cannot open log file {}: {}", path.display(), e))
            .ok()
    });

    match file {
        Some(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let settings = Settings::discover(cli.config.as_deref())?;

    let tui = matches!(cli.command, None | Some(Commands::Browse));
    init_logging(tui.then_some(settings.log_file.as_path()));
    info!("Picon Updater {} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    debug!("Signal handlers initialized");

    let allow_restart = settings.restart_host && !cli.no_restart;

    match cli.command {
        None | Some(Commands::Browse) => run_browser(settings, allow_restart),
        Some(Commands::List) => list_catalogue(&settings),
        Some(Commands::Install(args)) => run_install(&settings, args, allow_restart),
        Some(Commands::CheckUpdate) => check_update(&settings),
        Some(Commands::SelfUpdate { force, snapshot }) => {
            run_self_update(&settings, force, snapshot, allow_restart)
        }
        Some(Commands::ValidateCatalogue { path }) => validate_catalogue(&path),
    }
}

/// Run the interactive browser
fn run_browser(settings: Settings, allow_restart: bool) -> Result<()> {
    let catalogue = Catalogue::load_or_degraded(&settings.catalogue_path());
    let version = updater::current_version(&settings.version_path());

    enable_raw_mode().context("Failed to enable raw mode")?;
    crossterm::execute!(stdout(), crossterm::terminal::EnterAlternateScreen)
        .context("Failed to enter alternate screen")?;

    let mut app = App::new(settings, catalogue, version, allow_restart);
    let result = (|| {
        let backend = CrosstermBackend::new(stdout());
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        app.run(&mut terminal).context("Browser loop failed")
    })();

    // Always attempt cleanup, even if the app failed
    let _ = disable_raw_mode();
    let _ = crossterm::execute!(stdout(), crossterm::terminal::LeaveAlternateScreen);

    app.shutdown();
    result
}

fn list_catalogue(settings: &Settings) -> Result<()> {
    let catalogue = Catalogue::load(&settings.catalogue_path())?;
    for (idx, category) in catalogue.categories().enumerate() {
        let entries = catalogue.entries(idx);
        println!("{} ({})", category, entries.len());
        for entry in entries {
            let url = entry.archive_url().unwrap_or("-");
            println!("  {:<40} {}", entry.name, url);
        }
    }
    Ok(())
}

fn run_install(settings: &Settings, args: InstallArgs, allow_restart: bool) -> Result<()> {
    let opkg = Opkg::new(settings.package_manager.clone());
    let installer = Installer::new(settings, &opkg);

    let report = match (args.name, args.archive) {
        (Some(name), _) => {
            let catalogue = Catalogue::load(&settings.catalogue_path())?;
            let Some(entry) = catalogue.find(&name) else {
                bail!("No catalogue entry named {:?}", name);
            };
            installer.install_entry(entry)?
        }
        (None, Some(archive)) => installer.install(&archive)?,
        (None, None) => bail!("Either --name or --archive is required"),
    };

    match (&report.package, &report.target) {
        (Some(package), _) => println!("✓ Installed package {}", package),
        (None, Some(target)) => println!(
            "✓ Installed {} items into {} ({} skipped)",
            report.moved,
            target.display(),
            report.skipped
        ),
        (None, None) => println!("✓ Installed"),
    }

    restart_if_allowed(settings, allow_restart);
    Ok(())
}

fn check_update(settings: &Settings) -> Result<()> {
    let status = updater::check_for_update(settings)?;
    if status.available {
        println!("Update available: {} -> {}", status.current, status.remote);
    } else {
        println!("Picon Updater {} is up to date", status.current);
    }
    Ok(())
}

fn run_self_update(settings: &Settings, force: bool, snapshot: bool, allow_restart: bool) -> Result<()> {
    if !force {
        let status = updater::check_for_update(settings)?;
        if !status.available {
            println!("Picon Updater {} is up to date (use --force to reinstall)", status.current);
            return Ok(());
        }
    }

    let source = updater::UpdateSource::from_settings(settings, snapshot);
    let outcome = updater::self_update(settings, &source).context("Self-update failed")?;
    println!("✓ Updated {} files, now at version {}", outcome.files, outcome.version);

    restart_if_allowed(settings, allow_restart);
    Ok(())
}

fn validate_catalogue(path: &Path) -> Result<()> {
    let catalogue = Catalogue::load(path)
        .with_context(|| format!("Catalogue {} is invalid", path.display()))?;
    println!(
        "✓ Catalogue is valid: {} entries in {} categories",
        catalogue.total_entries(),
        catalogue.category_count()
    );
    for (idx, category) in catalogue.categories().enumerate() {
        let missing = catalogue
            .entries(idx)
            .iter()
            .filter(|e| e.archive_url().is_none())
            .count();
        if missing > 0 {
            println!("  ⚠ {}: {} entries without URL", category, missing);
        }
    }
    Ok(())
}

fn restart_if_allowed(settings: &Settings, allow_restart: bool) {
    if !allow_restart {
        info!("Host restart disabled");
        return;
    }
    let killed = process_guard::restart_host(&settings.host_process, settings.restart_delay());
    println!("Restarted {} ({} processes signalled)", settings.host_process, killed);
}
