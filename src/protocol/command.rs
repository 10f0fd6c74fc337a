//! Command definitions
//!
//! Represents commands read from clients.

use bytes::Bytes;

/// Which of the two client encodings a command arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEncoding {
    /// `*<N>\r\n` followed by N bulk strings
    MultiBulk,

    /// One whitespace-separated line
    Inline,
}

/// A decoded client command
#[derive(Debug, Clone)]
pub struct Command {
    /// Command name, uppercased
    pub name: String,

    /// Arguments after the name, uninterpreted
    pub args: Vec<Bytes>,

    /// Every byte consumed for this command, framing included
    pub raw: Bytes,

    pub encoding: CommandEncoding,

    /// Parts on the wire, name included
    pub argc: usize,
}

impl Command {
    /// True for a blank inline line or `*0`
    ///
    /// Servers skip these without replying.
    pub fn is_empty(&self) -> bool {
        self.argc == 0
    }

    /// Arguments as (lossy) UTF-8 strings, for display
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| String::from_utf8_lossy(arg).into_owned())
            .collect()
    }

    /// Parse the database index of a `SELECT <n>` command
    pub fn selected_db(&self) -> Option<u32> {
        if self.name != "SELECT" || self.args.len() != 1 {
            return None;
        }
        std::str::from_utf8(&self.args[0]).ok()?.trim().parse().ok()
    }
}
