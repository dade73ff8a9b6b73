//! kvs-keon: build a .keon membership store from a newline-delimited list.
//!
//! Reads every non-empty line of the input as one key, sizes the store to
//! the line count, and writes `<input>.keon` beside the source. Tuning
//! comes from the environment (`DENSITY`, `WIDTH`) or flags.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use kvs::Keon;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "build a .keon store from a newline-delimited key list"
)]
struct Cli {
    /// Input file, one key per line; output lands at <file>.keon
    file: PathBuf,

    /// Bucket padding in thousandths
    #[arg(long, env = "DENSITY", default_value_t = 5)]
    density: u64,

    /// Slots per bucket
    #[arg(long, env = "WIDTH", default_value_t = 3)]
    width: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let input = match fs::read_to_string(&cli.file) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("kvs-keon: {}: {err}", cli.file.display());
            return ExitCode::FAILURE;
        }
    };
    let count = input.lines().filter(|line| !line.is_empty()).count() as u64;
    if count == 0 {
        eprintln!("kvs-keon: {}: no keys", cli.file.display());
        return ExitCode::FAILURE;
    }

    let mut store = match Keon::builder()
        .capacity(count)
        .density(cli.density)
        .width(cli.width)
        .build()
    {
        Ok(store) => store,
        Err(err) => {
            eprintln!("kvs-keon: {err}");
            return ExitCode::FAILURE;
        }
    };

    for line in input.lines().filter(|line| !line.is_empty()) {
        if store.insert(line.as_bytes()).no_space {
            eprintln!(
                "kvs-keon: failure: count[{count}] density[{}] width[{}]",
                cli.density, cli.width
            );
            return ExitCode::FAILURE;
        }
    }

    let mut output = cli.file.into_os_string();
    output.push(".keon");
    let output = PathBuf::from(output);
    if let Err(err) = store.save(&output) {
        eprintln!("kvs-keon: {}: {err}", output.display());
        return ExitCode::FAILURE;
    }
    println!("kvs-keon: wrote {} ({} keys)", output.display(), store.len());
    ExitCode::SUCCESS
}
