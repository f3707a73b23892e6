//! # cdb - constant database shell
//!
//! A REPL-style command-line interface for building and querying constant
//! databases. Reads commands from stdin, runs them, and prints results to
//! stdout. Works interactively or scripted (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! OPEN path             Open a database for queries
//! GET key               First value for key (prints value or "(nil)")
//! ALL key               Every value for key, in insertion order
//! DUMP                  Every record in file order
//! STATS                 Record and hash table statistics
//! MAKE dest tmp         Start building dest, writing to tmp
//! PUT key value [mode]  Add to the database being built
//!                       (mode: add | replace | replace0 | insert)
//! FINISH                Finish and atomically publish dest
//! ABANDON               Stop building; tmp stays on disk
//! EXIT / QUIT           Leave the shell
//! ```
//!
//! ## Configuration
//!
//! ```text
//! CDB_LOAD_MODE       mmap | read               (default: "mmap")
//! CDB_WRITE_BUFFER_KB maker write buffer in KiB (default: 64)
//! CDB_SYNC_DIR        fsync dir after publish   (default: "true")
//! RUST_LOG            log filter for stderr     (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! cdb shell (load=mmap, write_buffer=64KiB, sync_dir=true)
//! > MAKE fruit.cdb fruit.tmp
//! OK
//! > PUT apple red
//! OK
//! > FINISH
//! OK (1 records, 1 live, 2080 bytes)
//! > OPEN fruit.cdb
//! OK (2080 bytes)
//! > GET apple
//! red
//! > EXIT
//! bye
//! ```

mod shell;

use anyhow::Result;
use cdb::CdbConfig;
use shell::{Flow, Shell};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays scriptable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut shell = Shell::new(CdbConfig::from_env());
    let config = shell.config();
    println!(
        "cdb shell (load={}, write_buffer={}KiB, sync_dir={})",
        config.load_mode,
        config.write_buffer_bytes / 1024,
        config.sync_dir
    );
    println!("Commands: OPEN path | GET key | ALL key | DUMP | STATS");
    println!("          MAKE dest tmp | PUT key value [mode] | FINISH | ABANDON | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if shell.handle_line(&line, &mut stdout)? == Flow::Exit {
            break;
        }
        print!("> ");
        stdout.flush().ok();
    }

    Ok(())
}
