//! Line-oriented interactive session
//!
//! Reads commands from any async line source and writes results to any
//! writer, so the same loop drives stdin/stdout and tests.

use crate::console::table::{hint_for, render_report, render_table};
use crate::export::{write_csv, DEFAULT_EXPORT_FILE};
use crate::models::MatchMode;
use crate::services::batch_runner::BatchRunner;
use crate::services::passkit_client::MemberDirectory;
use crate::session::Session;
use anyhow::{Context, Result};
use pkid_common::names::{split_batch, MAX_BATCH_SIZE};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

const PROMPT: &str = "pkid> ";

const HELP: &str = "\
Commands:
  add <name>        add a name to the batch (one per line, max 50)
  names             list the names in the batch
  reset-names       empty the batch
  search            look up the batch
  show              show the last results
  mark <id|row#>    flag a member id as copied
  clear             remove all copied flags
  mode exact|contains
  export [path]     write the last results as CSV
  help
  quit";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Names,
    ResetNames,
    Search,
    Show,
    Mark(String),
    Clear,
    Mode(MatchMode),
    Export(Option<PathBuf>),
    Help,
    Quit,
}

impl Command {
    /// Parse a line; `Ok(None)` for blank lines
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "add" if !rest.is_empty() => Command::Add(rest.to_string()),
            "add" => return Err("usage: add <name>".to_string()),
            "names" => Command::Names,
            "reset-names" | "reset" => Command::ResetNames,
            "search" | "run" => Command::Search,
            "show" => Command::Show,
            "mark" if !rest.is_empty() => Command::Mark(rest.to_string()),
            "mark" => return Err("usage: mark <id|row#>".to_string()),
            "clear" => Command::Clear,
            "mode" => Command::Mode(rest.parse().map_err(|e: pkid_common::Error| e.to_string())?),
            "export" if rest.is_empty() => Command::Export(None),
            "export" => Command::Export(Some(PathBuf::from(rest))),
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("unknown command '{}' (try 'help')", other)),
        };
        Ok(Some(command))
    }
}

/// Interactive session over one directory
pub struct Repl<D> {
    runner: BatchRunner<D>,
    session: Session,
    watch_interrupt: bool,
}

impl<D: MemberDirectory> Repl<D> {
    pub fn new(runner: BatchRunner<D>) -> Self {
        let session = Session::new(runner.match_mode());
        Self {
            runner,
            session,
            watch_interrupt: true,
        }
    }

    /// Disable the Ctrl-C watcher (for non-terminal input)
    pub fn without_interrupt_watch(mut self) -> Self {
        self.watch_interrupt = false;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until `quit` or end of input
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        writeln!(out, "Type 'help' for commands.")?;

        loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            let Some(line) = lines.next_line().await.context("Failed to read input")? else {
                writeln!(out)?;
                break;
            };

            match Command::parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => {
                    if let Err(e) = self.execute(command, out).await {
                        tracing::error!(error = %e, "Command failed");
                        writeln!(out, "Error: {:#}", e)?;
                    }
                }
                Err(message) => writeln!(out, "{}", message)?,
            }
        }
        Ok(())
    }

    async fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> Result<()> {
        match command {
            Command::Add(name) => {
                self.session.add_name(&name);
                let count = split_batch(&self.session.names_text, usize::MAX).len();
                if count > MAX_BATCH_SIZE {
                    writeln!(out, "{} names entered; only the first {} are searched", count, MAX_BATCH_SIZE)?;
                }
            }
            Command::Names => {
                let names = split_batch(&self.session.names_text, MAX_BATCH_SIZE);
                if names.is_empty() {
                    writeln!(out, "No names entered.")?;
                }
                for (i, name) in names.iter().enumerate() {
                    writeln!(out, "{:>2}. {}", i + 1, name)?;
                }
            }
            Command::ResetNames => {
                self.session.reset_names();
                writeln!(out, "Names cleared.")?;
            }
            Command::Search => self.search(out).await?,
            Command::Show => match self.session.last_outcome() {
                Some(outcome) => render_table(out, &outcome.found, &self.session.copies)?,
                None => writeln!(out, "No search yet.")?,
            },
            Command::Mark(target) => match self.session.mark(&target) {
                Some(id) => writeln!(out, "Marked {} as copied.", id)?,
                None => writeln!(out, "Nothing to mark.")?,
            },
            Command::Clear => {
                self.session.copies.clear();
                writeln!(out, "Copied flags cleared.")?;
            }
            Command::Mode(mode) => {
                self.session.mode = mode;
                self.runner.set_match_mode(mode);
                writeln!(out, "Match mode: {}", mode)?;
            }
            Command::Export(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE));
                let found = self.session.last_found();
                if found.is_empty() {
                    writeln!(out, "Nothing to export.")?;
                } else {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    write_csv(found, BufWriter::new(file), true)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    writeln!(out, "Wrote {} rows to {}", found.len(), path.display())?;
                }
            }
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => {}
        }
        Ok(())
    }

    async fn search<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let names = split_batch(&self.session.names_text, MAX_BATCH_SIZE);
        if names.is_empty() {
            writeln!(out, "No names entered.")?;
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let watcher = self.watch_interrupt.then(|| {
            let token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, cancelling remaining names");
                    token.cancel();
                }
            })
        });

        let result = self
            .runner
            .run(&names, &cancel, |progress| {
                let _ = writeln!(out, "  {}", progress);
            })
            .await;

        if let Some(handle) = watcher {
            handle.abort();
        }

        match result {
            Ok(report) => {
                render_report(out, &report, &self.session.copies)?;
                self.session.record_outcome(report.outcome);
            }
            Err(error) => {
                tracing::error!(error = %error, "Search failed");
                writeln!(out, "Search failed: {}", error)?;
                if let Some(hint) = hint_for(&error) {
                    writeln!(out, "  hint: {}", hint)?;
                }
            }
        }
        Ok(())
    }
}
