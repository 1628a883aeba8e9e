//! Chat command parsing

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Status,
    Score,
    HitRate,
    Unknown(String),
}

impl Command {
    /// Parse a chat message; `None` when it is not a command at all.
    ///
    /// Accepts `/cmd`, `/cmd@botname` and trailing arguments, any case.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.trim().split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or_default().to_lowercase();
        if name.is_empty() {
            return None;
        }

        Some(match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "status" => Command::Status,
            "score" => Command::Score,
            "hitrate" => Command::HitRate,
            _ => Command::Unknown(format!("/{}", name)),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => f.write_str("/start"),
            Command::Help => f.write_str("/help"),
            Command::Status => f.write_str("/status"),
            Command::Score => f.write_str("/score"),
            Command::HitRate => f.write_str("/hitrate"),
            Command::Unknown(name) => f.write_str(name),
        }
    }
}
