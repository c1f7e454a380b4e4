//! Stdin control surface: one command per line.

use sync_engine::EngineCommand;

/// Parsed operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlInput {
    Engine(EngineCommand),
    Quit,
    Help,
    Empty,
    Unknown(String),
}

/// Parse one stdin line (case-insensitive, surrounding whitespace ignored)
pub fn parse_control_line(line: &str) -> ControlInput {
    let word = line.trim();
    match word.to_ascii_lowercase().as_str() {
        "" => ControlInput::Empty,
        "start" => ControlInput::Engine(EngineCommand::Start),
        "stop" => ControlInput::Engine(EngineCommand::Stop),
        "status" | "refresh" => ControlInput::Engine(EngineCommand::RefreshStatus),
        "quit" | "exit" | "q" => ControlInput::Quit,
        "help" | "?" => ControlInput::Help,
        _ => ControlInput::Unknown(word.to_string()),
    }
}

pub const HELP: &str = "commands: start | stop | status | quit";
