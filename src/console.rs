//! Line-oriented operator console.
//!
//! Drives rotation iterators and target switches from a serial monitor or
//! a terminal.
//!
//! # Commands
//!
//! - `next <iterator>` - Advance an iterator
//! - `prev <iterator>` - Step an iterator back
//! - `jump <iterator> <index>` - Move an iterator to an index
//! - `reset <iterator>` - Return an iterator to its first item
//! - `enable <target>` / `disable <target>` - Switch probing of a target
//! - `list` - Show iterators and their current items
//! - `status` - Show reachability of every ping component
//! - `help` - Show available commands
//!
//! # Example Session
//!
//! ```text
//! > list
//! Iterators:
//!   pages: clock [0/3] (rotation display)
//!
//! > next pages
//! pages: weather [1/3]
//!
//! > jump pages 7
//! pages: index 7 out of range for rotation of 3 items
//! ```

use crate::error::ConfigError;
use crate::rotation::RingIterator;
use log::error;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// Item handle stored in configured rotations.
pub type Item = Arc<str>;

/// Parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Advance an iterator.
    Next { iterator: String },
    /// Step an iterator back.
    Prev { iterator: String },
    /// Move an iterator to an index.
    Jump { iterator: String, index: usize },
    /// Return an iterator to its first item.
    Reset { iterator: String },
    /// Resume probing a target.
    Enable { target: String },
    /// Stop probing a target.
    Disable { target: String },
    /// List iterators.
    List,
    /// Show reachability.
    Status,
    /// Show help.
    Help,
    /// Unknown or invalid command.
    Unknown(String),
}

impl Command {
    /// Parse a command from an input line.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Command::Unknown(String::new());
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let name = parts.next().map(str::to_string);
        let extra = parts.next();

        match (cmd.to_lowercase().as_str(), name) {
            ("next" | "n", Some(iterator)) => Command::Next { iterator },
            ("prev" | "p", Some(iterator)) => Command::Prev { iterator },
            ("reset", Some(iterator)) => Command::Reset { iterator },
            ("jump" | "j", Some(iterator)) => match extra.map(str::parse::<usize>) {
                Some(Ok(index)) => Command::Jump { iterator, index },
                _ => Command::Unknown("Usage: jump <iterator> <index>".to_string()),
            },
            ("enable", Some(target)) => Command::Enable { target },
            ("disable", Some(target)) => Command::Disable { target },
            ("next" | "n" | "prev" | "p" | "reset", None) => {
                Command::Unknown(format!("Usage: {} <iterator>", cmd))
            }
            ("jump" | "j", None) => {
                Command::Unknown("Usage: jump <iterator> <index>".to_string())
            }
            ("enable" | "disable", None) => Command::Unknown(format!("Usage: {} <target>", cmd)),
            ("list" | "ls" | "l", _) => Command::List,
            ("status" | "stat" | "s", _) => Command::Status,
            ("help" | "h" | "?", _) => Command::Help,
            _ => Command::Unknown(format!(
                "Unknown command: {}. Type 'help' for commands.",
                cmd
            )),
        }
    }
}

/// Help text for available commands.
pub const HELP_TEXT: &str = r#"
Available commands:
  next <iterator>          Advance an iterator
  prev <iterator>          Step an iterator back
  jump <iterator> <index>  Move an iterator to an index
  reset <iterator>         Return an iterator to its first item
  enable <target>          Resume probing a target
  disable <target>         Stop probing a target
  list                     Show iterators
  status                   Show reachability
  help                     Show this help

Shortcuts: n=next, p=prev, j=jump, l=list, s=status, h=help
"#;

struct NamedIterator {
    rotation: String,
    iterator: RingIterator<Item>,
}

/// Named iterators over configured rotations.
#[derive(Default)]
pub struct IteratorSet {
    iterators: BTreeMap<String, NamedIterator>,
}

impl IteratorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an iterator. Names are unique across all rotations.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        rotation: impl Into<String>,
        iterator: RingIterator<Item>,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if self.iterators.contains_key(&name) {
            return Err(ConfigError::DuplicateName(name));
        }
        self.iterators.insert(
            name,
            NamedIterator {
                rotation: rotation.into(),
                iterator,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RingIterator<Item>> {
        self.iterators.get(name).map(|n| &n.iterator)
    }

    pub fn len(&self) -> usize {
        self.iterators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterators.is_empty()
    }

    /// Apply a rotation command and describe the result.
    ///
    /// Returns `None` for commands that do not move an iterator.
    pub fn apply(&mut self, command: &Command) -> Option<String> {
        let (name, moved) = match command {
            Command::Next { iterator } => (iterator, Move::Advance),
            Command::Prev { iterator } => (iterator, Move::Retreat),
            Command::Jump { iterator, index } => (iterator, Move::Jump(*index)),
            Command::Reset { iterator } => (iterator, Move::Reset),
            _ => return None,
        };

        let Some(entry) = self.iterators.get_mut(name) else {
            return Some(format!("Unknown iterator: {}", name));
        };
        let it = &mut entry.iterator;
        let result = match moved {
            Move::Advance => Ok(it.advance()),
            Move::Retreat => Ok(it.retreat()),
            Move::Jump(index) => it.jump(index),
            Move::Reset => Ok(it.reset()),
        }
        .map(|_| ());
        Some(match result {
            Ok(_) => format!("{}: {}", name, describe(it)),
            Err(e) => format!("{}: {}", name, e),
        })
    }

    /// Format every iterator with its current item.
    pub fn format_list(&self) -> String {
        if self.iterators.is_empty() {
            return "No iterators configured.".to_string();
        }

        let mut output = String::from("Iterators:\n");
        for (name, entry) in &self.iterators {
            output.push_str(&format!(
                "  {}: {} (rotation {})\n",
                name,
                describe(&entry.iterator),
                entry.rotation
            ));
        }
        output
    }
}

/// Forward lines from `input` to `lines` on a detached thread.
///
/// The thread ends at end of input or once the receiver is dropped. A
/// thread blocked on a read holds neither the runtime nor process exit.
pub fn spawn_line_reader<R>(input: R, lines: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    std::thread::spawn(move || {
        for line in input.lines() {
            match line {
                Ok(line) => {
                    if lines.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Console read error: {}", e);
                    break;
                }
            }
        }
    })
}

enum Move {
    Advance,
    Retreat,
    Jump(usize),
    Reset,
}

fn describe(it: &RingIterator<Item>) -> String {
    format!(
        "{} [{}/{}]",
        it.current(),
        it.position(),
        it.ring().len()
    )
}
