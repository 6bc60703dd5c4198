//! Module management commands

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use hei_core::plugins::{CapabilityInfo, ModuleState, ModuleSummary};

use super::host;
use crate::config::HeiConfig;

/// Module management arguments
#[derive(Args)]
pub struct PluginArgs {
    #[command(subcommand)]
    pub command: PluginCommands,
}

/// Module subcommands
#[derive(Subcommand)]
pub enum PluginCommands {
    /// List loaded modules
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Enable a module
    Enable {
        /// Module name to enable
        name: String,
    },
    /// Disable a module
    Disable {
        /// Module name to disable
        name: String,
    },
    /// Show module details
    Info {
        /// Module name
        name: String,
    },
    /// List registered capabilities
    Caps {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Run module command
pub fn run(args: PluginArgs, config: &HeiConfig) -> Result<()> {
    match args.command {
        PluginCommands::List { json } => list_modules(config, json),
        PluginCommands::Enable { name } => enable_module(config, &name),
        PluginCommands::Disable { name } => disable_module(config, &name),
        PluginCommands::Info { name } => show_module_info(config, &name),
        PluginCommands::Caps { json } => list_capabilities(config, json),
    }
}

fn list_modules(config: &HeiConfig, json: bool) -> Result<()> {
    let host = host::start(config)?;
    let modules = host.registry.modules();

    if json {
        println!("{}", serde_json::to_string_pretty(&modules)?);
        return Ok(());
    }

    if modules.is_empty() && host.report.failed.is_empty() {
        println!("No modules installed");
        println!();
        println!("Module directory: {}", config.plugins.user_dir.display());
        println!();
        println!("To install a module:");
        println!("  1. Create a module directory: mkdir -p <module dir>/my_module");
        println!("  2. Copy the library: cp libmy_module.so <module dir>/my_module/");
        return Ok(());
    }

    if !modules.is_empty() {
        println!("{}", module_table(&modules));
    }

    for name in &host.report.skipped {
        println!("○ {name} (disabled)");
    }
    for failure in &host.report.failed {
        println!("✗ {}: {}", failure.path.display(), failure.error);
    }

    Ok(())
}

fn module_table(modules: &[ModuleSummary]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Module").fg(Color::Cyan),
        Cell::new("Version").fg(Color::Cyan),
        Cell::new("Interface").fg(Color::Cyan),
        Cell::new("Registered").fg(Color::Cyan),
        Cell::new("Description").fg(Color::Cyan),
    ]);

    for m in modules {
        let registered = if m.rejected.is_empty() {
            m.registered.len().to_string()
        } else {
            format!("{} ({} rejected)", m.registered.len(), m.rejected.len())
        };
        table.add_row(vec![
            Cell::new(&m.info.name),
            Cell::new(m.info.version),
            Cell::new(m.info.interface),
            Cell::new(registered),
            Cell::new(&m.info.description),
        ]);
    }

    table
}

fn enable_module(config: &HeiConfig, name: &str) -> Result<()> {
    host::idle(config).enable_module(name)?;
    println!("Enabled module: {}", name);
    println!("Run 'hei plugin list' to verify the module loads correctly.");
    Ok(())
}

fn disable_module(config: &HeiConfig, name: &str) -> Result<()> {
    host::idle(config).disable_module(name)?;
    println!("Disabled module: {}", name);
    Ok(())
}

fn show_module_info(config: &HeiConfig, name: &str) -> Result<()> {
    let host = host::start(config)?;

    let Some(summary) = host.registry.find(name).and_then(|id| host.registry.module(id)) else {
        if !host.registry.is_module_enabled(name)? {
            bail!("Module '{}' is disabled; run 'hei plugin enable {}'", name, name);
        }
        bail!("Module '{}' not found", name);
    };

    let info = &summary.info;
    println!("Name:        {}", info.name);
    println!("Version:     {}", info.version);
    println!("Interface:   {}", info.interface);
    println!("Description: {}", info.description);
    if let Some(path) = &info.path {
        println!("Path:        {}", path.display());
    }
    println!(
        "Status:      {}",
        match summary.state {
            ModuleState::Loaded => "Loaded",
            ModuleState::Initialized => "Initialized",
        }
    );

    if !summary.registered.is_empty() {
        println!();
        println!("Registered:");
        for key in &summary.registered {
            println!("  {key}");
        }
    }

    if !summary.rejected.is_empty() {
        println!();
        println!("Rejected:");
        for message in &summary.rejected {
            println!("  {message}");
        }
    }

    Ok(())
}

fn list_capabilities(config: &HeiConfig, json: bool) -> Result<()> {
    let host = host::start(config)?;
    let caps = host.registry.capabilities();

    if json {
        println!("{}", serde_json::to_string_pretty(&caps)?);
        return Ok(());
    }

    if caps.is_empty() {
        println!("No capabilities registered");
        return Ok(());
    }

    println!("{}", capability_table(&caps));
    Ok(())
}

fn capability_table(caps: &[CapabilityInfo]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Kind").fg(Color::Cyan),
        Cell::new("Key").fg(Color::Cyan),
        Cell::new("Module").fg(Color::Cyan),
    ]);
    for cap in caps {
        table.add_row(vec![
            Cell::new(cap.kind),
            Cell::new(&cap.key),
            Cell::new(&cap.module),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use hei_core::plugins::CapabilityKind;
    use tempfile::TempDir;

    #[test]
    fn test_plugin_args_parsing() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(subcommand)]
            cmd: PluginCommands,
        }

        let cli = TestCli::parse_from(["test", "list"]);
        assert!(matches!(cli.cmd, PluginCommands::List { json: false }));

        let cli = TestCli::parse_from(["test", "list", "--json"]);
        assert!(matches!(cli.cmd, PluginCommands::List { json: true }));

        let cli = TestCli::parse_from(["test", "enable", "classic_formats"]);
        assert!(matches!(cli.cmd, PluginCommands::Enable { name } if name == "classic_formats"));

        let cli = TestCli::parse_from(["test", "disable", "classic_formats"]);
        assert!(matches!(cli.cmd, PluginCommands::Disable { name } if name == "classic_formats"));

        let cli = TestCli::parse_from(["test", "info", "classic_formats"]);
        assert!(matches!(cli.cmd, PluginCommands::Info { name } if name == "classic_formats"));

        let cli = TestCli::parse_from(["test", "caps"]);
        assert!(matches!(cli.cmd, PluginCommands::Caps { json: false }));
    }

    fn config(dir: &TempDir) -> HeiConfig {
        let mut config = HeiConfig::default();
        config.plugins.user_dir = dir.path().to_path_buf();
        config.plugins.project_dir = None;
        config
    }

    #[test]
    fn test_enable_disable_roundtrip() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        disable_module(&config, "classic_formats").unwrap();
        assert!(!host::idle(&config).is_module_enabled("classic_formats").unwrap());

        enable_module(&config, "classic_formats").unwrap();
        assert!(host::idle(&config).is_module_enabled("classic_formats").unwrap());
    }

    #[test]
    fn test_info_unknown_module() {
        let dir = TempDir::new().unwrap();
        let err = show_module_info(&config(&dir), "missing").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_capability_table_rows() {
        let caps = vec![CapabilityInfo {
            kind: CapabilityKind::PackageLoader,
            key: "pak".to_string(),
            module: "classic_formats".to_string(),
        }];
        let rendered = capability_table(&caps).to_string();
        assert!(rendered.contains("package loader"));
        assert!(rendered.contains("classic_formats"));
    }
}
