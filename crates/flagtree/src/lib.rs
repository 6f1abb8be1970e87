//! Command-line argument parsing over a tree of commands, option groups and
//! positional slots.
//!
//! A [`Command`] tree is built with the builder API (or loaded from JSON by
//! `flagtree-schema`), validated once by [`Parser::new`], and then parsed as
//! often as needed. Each parse resets every value to its default before
//! scanning, so the parser is reusable.
//!
//! Supported syntax:
//! - short flags `-v`, clusters `-abc`, attached values `-ofile` / `-o=file`
//! - long flags `--name value` / `--name=value`, unique-prefix abbreviations
//! - sub-commands by name or alias, each with its own flags and positionals;
//!   ancestor flags stay usable inside sub-commands
//! - `--` to end option parsing
//!
//! Help and version requests are reported as sentinel errors
//! ([`ErrorKind::Help`], [`ErrorKind::Version`]) carrying the text to print.
//!
//! ```
//! use flagtree::{Command, ErrorKind, Flag, Parser, Positional};
//!
//! let app = Command::new("app")
//!     .flag(Flag::new("verbose").short('v').long("verbose").help("Verbose output"))
//!     .subcommand(
//!         Command::new("add")
//!             .about("Add a file")
//!             .positional(Positional::new("file").required(true)),
//!     );
//! let mut parser = Parser::new(app).unwrap();
//!
//! parser.parse(["-v", "add", "notes.txt"]).unwrap();
//! assert_eq!(parser.active_path(), vec!["app", "add"]);
//! let m = parser.matches();
//! let (_, add) = m.subcommand().unwrap();
//! assert_eq!(add.get_str("file"), Some("notes.txt"));
//!
//! let err = parser.parse(["add", "--help"]).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Help);
//! assert!(err.message().starts_with("Usage:\n  app [OPTIONS] add file\n"));
//! ```

mod command;
mod error;
mod flag;
mod group;
mod help;
mod matcher;
mod matches;
mod options;
mod parser;
mod registry;
mod session;
mod token;
pub mod value;

pub use command::{Command, Positional, command, positional};
pub use error::{Error, ErrorKind, Result};
pub use flag::{Flag, ValueSource, flag};
pub use group::{Group, group};
pub use help::wrap_text;
pub use matches::Matches;
pub use options::ParserOptions;
pub use parser::Parser;
pub use value::{ConvertError, Value, ValueKind, register_converter};
