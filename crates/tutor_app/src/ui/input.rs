use tutor_core::{Msg, Quality};

pub const HELP: &str = "\
Type a question and press Enter to ask the tutor.
  /regen <job-id>     render a finished or failed animation again
  /quality low|high   switch render quality
  /help               show this help
  /quit               leave the conversation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Regenerate(String),
    Quality(Quality),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_line(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    match (name, arg) {
        ("quit" | "exit", None) => Command::Quit,
        ("help", None) => Command::Help,
        ("regen" | "regenerate", Some(job_id)) => Command::Regenerate(job_id.to_string()),
        ("quality", Some("low")) => Command::Quality(Quality::Low),
        ("quality", Some("high")) => Command::Quality(Quality::High),
        _ => Command::Unknown(line.to_string()),
    }
}

impl Command {
    /// Messages this command sends to the state machine.
    pub fn into_msgs(self) -> Vec<Msg> {
        match self {
            Command::Say(text) => vec![Msg::InputChanged(text), Msg::MessageSubmitted],
            Command::Regenerate(job_id) => vec![Msg::RegenerateClicked { job_id }],
            Command::Quality(quality) => vec![Msg::QualitySelected(quality)],
            Command::Quit => vec![Msg::ViewClosed],
            Command::Help | Command::Empty | Command::Unknown(_) => Vec::new(),
        }
    }
}
