//! Graphics backends and module log channels

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use hei_core::BackendInfo;
use hei_core::plugins::LogChannelInfo;

use super::host;
use crate::config::HeiConfig;

#[derive(Args)]
pub struct BackendsArgs {
    /// Create a device on this backend to check it works
    #[arg(long, value_name = "BACKEND")]
    pub probe: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: BackendsArgs, config: &HeiConfig) -> Result<()> {
    let host = host::start(config)?;

    if let Some(name) = args.probe {
        let backend = host.dispatcher.graphics_backend(&name)?;
        let device = backend.create_device(640, 480)?;
        println!("{}: created 640x480 device ({:p})", backend.name(), device.as_ptr());
        return Ok(());
    }

    let backends: Vec<BackendInfo> = host
        .dispatcher
        .graphics_backends()
        .iter()
        .map(|b| b.info())
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&backends)?);
        return Ok(());
    }

    if backends.is_empty() {
        println!("No graphics backends registered");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Backend").fg(Color::Cyan),
        Cell::new("Priority").fg(Color::Cyan),
        Cell::new("Module").fg(Color::Cyan),
        Cell::new("Devices").fg(Color::Cyan),
    ]);
    for (i, b) in backends.iter().enumerate() {
        let name = if i == 0 {
            Cell::new(format!("{} *", b.name)).fg(Color::Green)
        } else {
            Cell::new(&b.name)
        };
        table.add_row(vec![
            name,
            Cell::new(b.priority),
            Cell::new(&b.module),
            Cell::new(if b.can_create_devices { "yes" } else { "no" }),
        ]);
    }
    println!("{table}");
    println!("* preferred");
    Ok(())
}

#[derive(Args)]
pub struct ChannelsArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run_channels(args: ChannelsArgs, config: &HeiConfig) -> Result<()> {
    let host = host::start(config)?;
    let channels: Vec<LogChannelInfo> = host
        .registry
        .services()
        .capabilities()
        .log_levels
        .describe();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&channels)?);
        return Ok(());
    }

    if channels.is_empty() {
        println!("No log channels registered");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Id").fg(Color::Cyan),
        Cell::new("Channel").fg(Color::Cyan),
        Cell::new("Colour").fg(Color::Cyan),
        Cell::new("Enabled").fg(Color::Cyan),
    ]);
    for c in &channels {
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(&c.name),
            Cell::new(&c.colour),
            Cell::new(if c.enabled { "yes" } else { "no" }),
        ]);
    }
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_backends_args_parsing() {
        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: BackendsArgs,
        }

        let cli = TestCli::parse_from(["test"]);
        assert!(cli.args.probe.is_none());

        let cli = TestCli::parse_from(["test", "--probe", "null", "--json"]);
        assert_eq!(cli.args.probe.as_deref(), Some("null"));
        assert!(cli.args.json);
    }
}
