mod report;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use env_logger::Env;
use flame_cat_core::parsers::{ImportResult, import_auto, import_reader};
use log::info;

enum Output {
    Tree,
    Folded,
    Json,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (output, input) = match args.as_slice() {
        [input] => (Output::Tree, input),
        [flag, input] if flag == "--folded" => (Output::Folded, input),
        [flag, input] if flag == "--json" => (Output::Json, input),
        _ => {
            eprintln!("Usage: flame-cat [--folded | --json] <profile.txt | ->");
            std::process::exit(1);
        }
    };

    let result = if input == "-" {
        import_reader(io::stdin().lock())?
    } else {
        let path = PathBuf::from(input);
        let data = std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        import_auto(data.as_slice())
    };

    let ImportResult::Recognized(group) = result else {
        bail!("unrecognized profile format: {input}");
    };
    info!("{} profile(s) imported from {input}", group.profiles.len());

    let mut out = io::stdout().lock();
    match output {
        Output::Tree => report::write_group(&mut out, &group)?,
        Output::Folded => {
            for profile in &group.profiles {
                for line in profile.folded_stacks() {
                    writeln!(out, "{line}")?;
                }
            }
        }
        Output::Json => {
            serde_json::to_writer_pretty(&mut out, &group)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}
