//! Command dispatch for the `cdb` shell.
//!
//! Each input line is one command. Output goes to the supplied writer so the
//! dispatcher can be driven from tests as well as from stdin.

use std::io::Write;

use anyhow::{bail, Context, Result};
use cdb::{CdbConfig, Maker, PutMode, Store};
use tracing::warn;

/// What the read loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Shell state: at most one open store and one maker in progress.
#[derive(Debug)]
pub struct Shell {
    config: CdbConfig,
    store: Option<Store>,
    maker: Option<Maker>,
}

impl Shell {
    pub fn new(config: CdbConfig) -> Self {
        Self {
            config,
            store: None,
            maker: None,
        }
    }

    pub fn config(&self) -> &CdbConfig {
        &self.config
    }

    /// Runs one line and prints its result. Failures are printed as
    /// `ERR <context>: <cause>` and never end the loop.
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        match self.execute(line, out) {
            Ok(flow) => Ok(flow),
            Err(e) => {
                writeln!(out, "ERR {:#}", e)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return Ok(Flow::Continue);
        };
        let args: Vec<&str> = parts.collect();

        match cmd.to_uppercase().as_str() {
            "OPEN" => {
                let [path] = args[..] else {
                    bail!("usage: OPEN path");
                };
                let store = Store::open_with(path, self.config.load_mode)
                    .with_context(|| format!("open {} failed", path))?;
                writeln!(out, "OK ({} bytes)", store.len_bytes())?;
                self.store = Some(store);
            }
            "GET" => {
                let [key] = args[..] else {
                    bail!("usage: GET key");
                };
                let store = self.store()?;
                match store.find_first(key.as_bytes()).context("get failed")? {
                    Some(v) => writeln!(out, "{}", String::from_utf8_lossy(v))?,
                    None => writeln!(out, "(nil)")?,
                }
            }
            "ALL" => {
                let [key] = args[..] else {
                    bail!("usage: ALL key");
                };
                let store = self.store()?;
                let mut count = 0usize;
                for value in store.find_all(key.as_bytes()) {
                    let value = value.context("lookup failed")?;
                    writeln!(out, "{}", String::from_utf8_lossy(value))?;
                    count += 1;
                }
                writeln!(out, "({} values)", count)?;
            }
            "DUMP" => {
                if !args.is_empty() {
                    bail!("usage: DUMP");
                }
                let store = self.store()?;
                let mut count = 0usize;
                for record in store.iter() {
                    let (k, v) = record.context("scan failed")?;
                    writeln!(
                        out,
                        "{} -> {}",
                        String::from_utf8_lossy(k),
                        String::from_utf8_lossy(v)
                    )?;
                    count += 1;
                }
                writeln!(out, "({} records)", count)?;
            }
            "STATS" => {
                let store = self.store()?;
                let stats = store.stats().context("stats failed")?;
                writeln!(out, "file bytes:      {}", stats.file_bytes)?;
                writeln!(out, "record bytes:    {}", stats.record_bytes)?;
                writeln!(out, "records:         {}", stats.records)?;
                writeln!(out, "indexed records: {}", stats.indexed_records)?;
                writeln!(out, "tables used:     {}/256", stats.tables_used)?;
                writeln!(out, "slots:           {}", stats.slots)?;
                writeln!(out, "direct hits:     {}", stats.direct_hits)?;
                writeln!(out, "max probe:       {}", stats.max_probe)?;
            }
            "MAKE" => {
                let [dest, tmp] = args[..] else {
                    bail!("usage: MAKE dest tmp");
                };
                if let Some(active) = &self.maker {
                    bail!(
                        "maker already active for {} (FINISH or ABANDON first)",
                        active.dest().display()
                    );
                }
                let maker = Maker::start_with(dest, tmp, &self.config)
                    .with_context(|| format!("make {} failed", dest))?;
                self.maker = Some(maker);
                writeln!(out, "OK")?;
            }
            "PUT" => {
                let (key, value, mode) = match args[..] {
                    [key, value] => (key, value, PutMode::Add),
                    [key, value, mode] => {
                        let mode = mode.parse::<PutMode>().map_err(anyhow::Error::msg)?;
                        (key, value, mode)
                    }
                    _ => bail!("usage: PUT key value [add|replace|replace0|insert]"),
                };
                let maker = self.maker.as_mut().context("no active maker (use MAKE dest tmp)")?;
                maker
                    .put(key.as_bytes(), value.as_bytes(), mode)
                    .context("put failed")?;
                writeln!(out, "OK")?;
            }
            "FINISH" => {
                let maker = self.maker.take().context("no active maker (use MAKE dest tmp)")?;
                let dest = maker.dest().to_path_buf();
                let stats = maker
                    .finish()
                    .with_context(|| format!("finish {} failed", dest.display()))?;
                writeln!(
                    out,
                    "OK ({} records, {} live, {} bytes)",
                    stats.records, stats.live_records, stats.file_bytes
                )?;
            }
            "ABANDON" => {
                let maker = self.maker.take().context("no active maker")?;
                let tmp = maker.abandon();
                writeln!(out, "OK (left {})", tmp.display())?;
            }
            "EXIT" | "QUIT" => {
                if let Some(maker) = self.maker.take() {
                    warn!(tmp = %maker.tmp().display(), "exiting with an unfinished maker");
                }
                writeln!(out, "bye")?;
                return Ok(Flow::Exit);
            }
            other => {
                writeln!(out, "unknown command: {}", other)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn store(&self) -> Result<&Store> {
        self.store.as_ref().context("no store open (use OPEN path)")
    }
}
