//! kvs: inspect keon/keva store files and serve ad-hoc lookups.
//!
//! With a path alone, prints the store's header metadata. With a second
//! argument, treats it as comma-separated keys and prints one lookup result
//! per key; the store kind comes from the header signature, never from the
//! file extension.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use twox_hash::XxHash64;

use kvs::{info, Keon, Keva, Kind};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "inspect and query keon/keva store files"
)]
struct Cli {
    /// Path to a store file
    file: PathBuf,

    /// Comma-separated keys to look up; omit to print store metadata
    keys: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let header = match info(&cli.file) {
        Ok(header) => header,
        Err(_) => {
            eprintln!("kvs: invalid resource");
            return ExitCode::FAILURE;
        }
    };

    let Some(keys) = cli.keys else {
        let name = cli
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let slots = header.slots();
        println!();
        println!("  {name}");
        println!("---------------------------------");
        println!("checksum   : {}", header.checksum);
        println!("timestamp  : {}", header.timestamp);
        println!("capacity   : {}", header.max);
        println!("count      : {}", header.count);
        println!("format     : {} x {}", header.depth, header.width);
        println!(
            "density    : {} {} [{}]",
            header.density,
            slots,
            slots - header.count
        );
        println!("shuffler   : {} x {}", header.shuffler, header.tracker);
        println!();
        return ExitCode::SUCCESS;
    };

    match header.kind() {
        Some(Kind::Keon) => {
            let store = match Keon::<XxHash64>::load(&cli.file) {
                Ok(store) => store,
                Err(err) => {
                    eprintln!("kvs: {err}");
                    return ExitCode::FAILURE;
                }
            };
            for key in keys.split(',') {
                println!("lookup: {key} {}", store.lookup(key.as_bytes()));
            }
        }
        Some(Kind::Keva) => {
            let store = match Keva::<XxHash64>::load(&cli.file) {
                Ok(store) => store,
                Err(err) => {
                    eprintln!("kvs: {err}");
                    return ExitCode::FAILURE;
                }
            };
            for key in keys.split(',') {
                match store.lookup(key.as_bytes()) {
                    Some(value) => println!("lookup: {key} true {value}"),
                    None => println!("lookup: {key} false"),
                }
            }
        }
        None => {
            eprintln!("kvs: invalid resource");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
