mod app;
mod report;

use anyhow::Context;
use clap::Parser;
use coderemover::pipeline::{
    config::{RemovalMode, RemoverConfig},
    CodeRemover,
};

use crate::{app::Cli, report::RemovalReport};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Show coderemover info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("coderemover", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    let config = build_config(&cli);
    let remover = CodeRemover::new(config.clone());
    let result = remover
        .process_file(&cli.input, &cli.output)
        .with_context(|| format!("removal failed: {}", cli.input.display()))?;

    let report = RemovalReport::new(&cli.input, &cli.output, &config, &result);
    if cli.global.json {
        let json = serde_json::to_string_pretty(&report)?;
        println!("{json}");
    } else {
        report.display();
    }

    Ok(())
}

fn build_config(cli: &Cli) -> RemoverConfig {
    let mode = if cli.remove_only {
        RemovalMode::RemoveOnly
    } else {
        RemovalMode::Full
    };
    RemoverConfig::default()
        .with_mode(mode)
        .with_marker(&cli.marker)
        .with_strict(cli.strict)
}
