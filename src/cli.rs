use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Picon Updater - browse and install picon packs on an enigma2 receiver
#[derive(Parser)]
#[command(name = "picon-updater")]
#[command(about = "Browse, install and update picon packs for enigma2 receivers")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to <data_dir>/settings.json when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Never restart the host GUI, even after a successful install
    #[arg(long, global = true)]
    pub no_restart: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the interactive browser (default)
    Browse,
    /// Print the catalogue grouped by category
    List,
    /// Install a pack from the catalogue or a local archive
    Install(InstallArgs),
    /// Compare the installed version with the remote one
    CheckUpdate,
    /// Download and install the newest application files
    SelfUpdate {
        /// Reinstall even if the remote version matches
        #[arg(short, long)]
        force: bool,
        /// Use the zip snapshot instead of individual files
        #[arg(long)]
        snapshot: bool,
    },
    /// Validate a catalogue file
    ValidateCatalogue {
        /// Path to the catalogue JSON
        path: PathBuf,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct InstallArgs {
    /// Catalogue entry name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Local .ipk / .tar.xz / .tar.gz archive (consumed by the install)
    #[arg(short, long)]
    pub archive: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_is_browse() {
        let cli = Cli::try_parse_from(["picon-updater"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.no_restart);
    }

    #[test]
    fn test_install_requires_exactly_one_source() {
        assert!(Cli::try_parse_from(["picon-updater", "install"]).is_err());
        assert!(Cli::try_parse_from([
            "picon-updater",
            "install",
            "--name",
            "Astra",
            "--archive",
            "/tmp/a.tar.xz"
        ])
        .is_err());

        let cli = Cli::try_parse_from(["picon-updater", "--no-restart", "install", "-n", "Astra"])
            .unwrap();
        assert!(cli.no_restart);
        match cli.command {
            Some(Commands::Install(args)) => assert_eq!(args.name.as_deref(), Some("Astra")),
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_self_update_flags() {
        let cli = Cli::try_parse_from(["picon-updater", "self-update", "--force", "--snapshot"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::SelfUpdate {
                force: true,
                snapshot: true
            })
        ));
    }
}
