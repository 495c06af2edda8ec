use clap::{Args, Parser, Subcommand};
use hoard_import::AssetType;
use std::path::PathBuf;

/// Content-addressable asset registry.
#[derive(Parser, Debug)]
#[command(name = "hoard", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to config.toml in the platform config directory).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Database file, overriding the configured one.
    #[arg(long, global = true, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// More logging; repeat for more detail. Overrides RUST_LOG.
    #[arg(short, long, global = true, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Less logging. Overrides RUST_LOG.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import files, or every asset file below a directory.
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        options: ImportArgs,
    },
    /// List assets, optionally filtered.
    List(ListArgs),
    /// Show an asset's metadata and format details.
    Show { id: String },
    /// Write an asset's bytes to a file.
    Export { id: String, dest: PathBuf },
    /// Delete assets.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Row counts and per-type totals.
    Stats,
    /// Delete every asset.
    Clear {
        /// Confirm.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct ImportArgs {
    /// Category for every imported file, instead of the per-type default.
    #[arg(long)]
    pub category: Option<String>,
    /// Tag for every imported file, instead of the per-type defaults. Repeatable.
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    #[arg(long = "type", value_name = "TYPE", value_parser = parse_asset_type)]
    pub asset_type: Option<AssetType>,
    #[arg(long)]
    pub category: Option<String>,
    /// Required tag. Repeatable; all must match.
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// Case-insensitive substring of the name.
    #[arg(long)]
    pub name: Option<String>,
}

fn parse_asset_type(value: &str) -> Result<AssetType, String> {
    value.parse().map_err(|err: hoard_import::error::Error| (*err).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_filters() {
        let cli = Cli::parse_from(["hoard", "list", "--type", "model", "--tag", "a", "--tag", "b", "--name", "kn"]);
        let Command::List(args) = cli.command else { panic!("expected list") };
        assert_eq!(args.asset_type, Some(AssetType::Model));
        assert_eq!(args.tags, ["a", "b"]);
        assert_eq!(args.name.as_deref(), Some("kn"));
    }

    #[rstest]
    #[case(&["hoard", "stats"], 0, 0)]
    #[case(&["hoard", "-vv", "stats"], 2, 0)]
    #[case(&["hoard", "stats", "-q"], 0, 1)]
    fn test_verbosity(#[case] argv: &[&str], #[case] verbose: u8, #[case] quiet: u8) {
        let cli = Cli::parse_from(argv);
        assert_eq!((cli.verbose, cli.quiet), (verbose, quiet));
    }

    #[test]
    fn test_import_requires_paths() {
        assert!(Cli::try_parse_from(["hoard", "import"]).is_err());
        assert!(Cli::try_parse_from(["hoard", "clear"]).is_ok());
    }
}
