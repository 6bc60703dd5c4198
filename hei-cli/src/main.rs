use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "hei", about = "Load hei modules and open files through them")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage modules
    Plugin(commands::plugin::PluginArgs),
    /// Open a package or image
    Open(commands::open::OpenArgs),
    /// List graphics backends
    Backends(commands::backends::BackendsArgs),
    /// List module log channels
    Channels(commands::backends::ChannelsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = config::ConfigLoader::load()?;

    match cli.command {
        Commands::Plugin(args) => commands::plugin::run(args, &config),
        Commands::Open(args) => commands::open::run(args, &config),
        Commands::Backends(args) => commands::backends::run(args, &config),
        Commands::Channels(args) => commands::backends::run_channels(args, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_verbose() {
        let cli = Cli::parse_from(["hei", "plugin", "list", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Plugin(_)));
    }

    #[test]
    fn test_cli_parses_open() {
        let cli = Cli::parse_from(["hei", "open", "pak0.pak", "--kind", "package"]);
        match cli.command {
            Commands::Open(args) => {
                assert_eq!(args.path, "pak0.pak");
                assert_eq!(args.kind, commands::open::OpenKind::Package);
            }
            _ => panic!("expected open"),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
