//! kvs-keva: build a .keva store from a delimited key/value list.
//!
//! Each line splits on the delimiter into a key and a decimal u64 value;
//! lines that do not are skipped. Writes `<input>.keva` beside the source.
//! Tuning comes from the environment (`DENSITY`, `WIDTH`, `DELIMITER`) or
//! flags.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use kvs::Keva;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "build a .keva store from a delimited key,value list"
)]
struct Cli {
    /// Input file, one key<delimiter>value pair per line; output lands at
    /// <file>.keva
    file: PathBuf,

    /// Bucket padding in thousandths
    #[arg(long, env = "DENSITY", default_value_t = 5)]
    density: u64,

    /// Slots per bucket
    #[arg(long, env = "WIDTH", default_value_t = 3)]
    width: u64,

    /// Field separator between key and value
    #[arg(long, env = "DELIMITER", default_value = ",")]
    delimiter: String,
}

fn split(line: &str, delimiter: &str) -> Option<(String, u64)> {
    let (key, value) = line.split_once(delimiter)?;
    if key.is_empty() {
        return None;
    }
    let value = value.trim().parse().ok()?;
    Some((key.to_string(), value))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let input = match fs::read_to_string(&cli.file) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("kvs-keva: {}: {err}", cli.file.display());
            return ExitCode::FAILURE;
        }
    };

    let entries: Vec<(String, u64)> = input
        .lines()
        .filter_map(|line| split(line, &cli.delimiter))
        .collect();
    let count = entries.len() as u64;
    if count == 0 {
        eprintln!("kvs-keva: {}: no entries", cli.file.display());
        return ExitCode::FAILURE;
    }

    let mut store = match Keva::builder()
        .capacity(count)
        .density(cli.density)
        .width(cli.width)
        .build()
    {
        Ok(store) => store,
        Err(err) => {
            eprintln!("kvs-keva: {err}");
            return ExitCode::FAILURE;
        }
    };

    for (key, value) in &entries {
        if store.insert(key.as_bytes(), *value).no_space {
            eprintln!(
                "kvs-keva: failure: count[{count}] density[{}] width[{}]",
                cli.density, cli.width
            );
            return ExitCode::FAILURE;
        }
    }

    let mut output = cli.file.into_os_string();
    output.push(".keva");
    let output = PathBuf::from(output);
    if let Err(err) = store.save(&output) {
        eprintln!("kvs-keva: {}: {err}", output.display());
        return ExitCode::FAILURE;
    }
    println!(
        "kvs-keva: wrote {} ({} entries)",
        output.display(),
        store.len()
    );
    ExitCode::SUCCESS
}
