//! Line parsing for the interactive harness.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// `<id>: <text>`
    Issue { id: String, text: String },
    Spawn(String),
    Drop(String),
    /// Stop heartbeats but stay registered until the sweep evicts.
    Stall(String),
    List,
    State(String),
    Last,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command /{0} (try /help)")]
    UnknownCommand(String),
    #[error("/{0} needs an instance id")]
    MissingId(&'static str),
    #[error("expected `<id>: <command text>`")]
    MissingSeparator,
    #[error("instance id is empty")]
    EmptyId,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::to_string);
        let command = match name {
            "spawn" => ReplCommand::Spawn(arg.ok_or(ParseError::MissingId("spawn"))?),
            "drop" => ReplCommand::Drop(arg.ok_or(ParseError::MissingId("drop"))?),
            "stall" => ReplCommand::Stall(arg.ok_or(ParseError::MissingId("stall"))?),
            "state" => ReplCommand::State(arg.ok_or(ParseError::MissingId("state"))?),
            "list" => ReplCommand::List,
            "last" => ReplCommand::Last,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        };
        return Ok(Some(command));
    }

    let (id, text) = line.split_once(':').ok_or(ParseError::MissingSeparator)?;
    let id = id.trim();
    if id.is_empty() {
        return Err(ParseError::EmptyId);
    }
    Ok(Some(ReplCommand::Issue {
        id: id.to_string(),
        text: text.trim().to_string(),
    }))
}

pub const HELP: &str = "\
<id>: <text>   send a command to an instance (e.g. `a: add some shimmer`)
/spawn <id>    attach a new instance
/drop <id>     detach an instance
/stall <id>    stop an instance's heartbeat (the sweep evicts it)
/list          live instances
/state <id>    an instance's current state
/last          most recent snapshot record
/quit          exit";
