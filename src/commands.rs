use std::str::FromStr;

use crate::models::{AnswerKey, HelpKind};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Answer(AnswerKey),
    Help(HelpKind),
    TakeMoney,
    NewGame,
    Status,
    History,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim().to_lowercase();

        if let Ok(key) = input.parse::<AnswerKey>() {
            return Ok(Command::Answer(key));
        }

        if let Ok(kind) = input.parse::<HelpKind>() {
            return Ok(Command::Help(kind));
        }

        match input.as_str() {
            "50" | "50/50" | "fifty" => Ok(Command::Help(HelpKind::FiftyFifty)),
            "audience" => Ok(Command::Help(HelpKind::AudienceHelp)),
            "friend" | "call" => Ok(Command::Help(HelpKind::FriendCall)),
            "take" | "money" => Ok(Command::TakeMoney),
            "new" => Ok(Command::NewGame),
            "status" | "" => Ok(Command::Status),
            "history" => Ok(Command::History),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            _ => Err(format!("unknown command `{}`", s.trim())),
        }
    }
}
