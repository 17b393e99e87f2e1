//! Terminal front end: results rendering and the interactive session

pub mod repl;
pub mod table;

pub use repl::{Command, Repl};
pub use table::{render_report, render_table};
