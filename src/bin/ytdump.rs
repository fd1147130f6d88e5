use std::io::{self, Read};

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use serde_json::Value;

use yttool::page::load_json_arg;
use yttool::walker::dump_renderers;

/// Lists the renderers in youtube JSON documents and reports unexpected nesting.
#[derive(Parser, Debug)]
#[command(name = "ytdump", version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long)]
    debug: bool,

    /// JSON files, or JSON text. Reads stdin when none are given.
    inputs: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.debug { "warn,yttool=debug" } else { "warn" };
    env_logger::init_from_env(Env::default().default_filter_or(level));

    if cli.inputs.is_empty() {
        let mut data = String::new();
        io::stdin().read_to_string(&mut data).context("Failed to read stdin")?;
        let doc: Value = serde_json::from_str(&data).context("stdin is not JSON")?;
        print!("{}", dump_renderers(&doc));
        return Ok(());
    }

    for arg in &cli.inputs {
        match load_json_arg(arg) {
            Ok((label, doc)) => {
                println!("==> {} <==", label);
                print!("{}", dump_renderers(&doc));
            }
            Err(e) => eprintln!("ERROR reading {}: {}", arg, e),
        }
    }
    Ok(())
}
