//! Open a package or image through whichever module handles it

use anyhow::Result;
use clap::{Args, ValueEnum};
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use hei_core::Dispatcher;
use hei_plugin_api::{Image, Package};

use super::host;
use crate::config::HeiConfig;

#[derive(Args)]
pub struct OpenArgs {
    /// File to open, absolute or relative to the search roots
    pub path: String,

    /// What to open the file as
    #[arg(long, value_enum, default_value_t = OpenKind::Auto)]
    pub kind: OpenKind,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OpenKind {
    /// Package if a package loader claims the extension, otherwise image
    Auto,
    Package,
    Image,
}

enum Opened {
    Package(Package),
    Image(Image),
}

pub fn run(args: OpenArgs, config: &HeiConfig) -> Result<()> {
    let host = host::start(config)?;
    let opened = open(&host.dispatcher, &args.path, args.kind)?;

    match (opened, args.json) {
        (Opened::Package(package), true) => println!("{}", serde_json::to_string_pretty(&package)?),
        (Opened::Image(image), true) => println!("{}", serde_json::to_string_pretty(&image)?),
        (Opened::Package(package), false) => print_package(&args.path, &package),
        (Opened::Image(image), false) => print_image(&args.path, &image),
    }
    Ok(())
}

fn open(dispatcher: &Dispatcher, path: &str, kind: OpenKind) -> Result<Opened> {
    let kind = match kind {
        OpenKind::Auto if dispatcher.supports_image(path) && !dispatcher.supports_package(path) => {
            OpenKind::Image
        }
        OpenKind::Auto => OpenKind::Package,
        other => other,
    };

    Ok(match kind {
        OpenKind::Image => Opened::Image(dispatcher.open_image(path)?),
        _ => Opened::Package(dispatcher.open_package(path)?),
    })
}

fn print_package(path: &str, package: &Package) {
    println!(
        "{}: {} entries, {} bytes",
        path,
        package.len(),
        package.total_size()
    );
    if package.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Offset").fg(Color::Cyan),
        Cell::new("Size").fg(Color::Cyan),
    ]);
    for entry in &package.entries {
        table.add_row(vec![
            Cell::new(&entry.name),
            Cell::new(entry.offset).set_alignment(CellAlignment::Right),
            Cell::new(entry.size).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}

fn print_image(path: &str, image: &Image) {
    println!("{path}");
    println!("  Size:    {}x{}x{}", image.width, image.height, image.depth);
    println!("  Mips:    {}", image.mip_count);
    println!(
        "  Format:  {:?}{}",
        image.format,
        if image.format.is_compressed() { " (block compressed)" } else { "" }
    );
    println!("  Payload: {} bytes", image.data.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use hei_core::DispatchError;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: OpenArgs,
    }

    #[test]
    fn test_open_args_parsing() {
        let cli = TestCli::parse_from(["test", "id1/pak0.pak"]);
        assert_eq!(cli.args.path, "id1/pak0.pak");
        assert_eq!(cli.args.kind, OpenKind::Auto);
        assert!(!cli.args.json);

        let cli = TestCli::parse_from(["test", "sky.dds", "--kind", "image", "--json"]);
        assert_eq!(cli.args.kind, OpenKind::Image);
        assert!(cli.args.json);
    }

    #[test]
    fn test_open_without_modules_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let mut config = HeiConfig::default();
        config.plugins.user_dir = dir.path().to_path_buf();
        config.plugins.project_dir = None;
        let host = host::start(&config).unwrap();

        let err = open(&host.dispatcher, "pak0.pak", OpenKind::Auto)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<DispatchError>(),
            Some(DispatchError::UnsupportedFormat { .. })
        ));
    }
}
