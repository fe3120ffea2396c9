use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::error::GameError;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub question: Vec<Question>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Question {
    pub level: u8,
    pub text: String,
    pub correct: String,
    pub incorrect: Vec<String>,
}

impl Question {
    /// All answers, the correct one first.
    pub fn answers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.correct.as_str()).chain(self.incorrect.iter().map(|a| a.as_str()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKey {
    A,
    B,
    C,
    D,
}

impl AnswerKey {
    pub const ALL: [AnswerKey; 4] = [AnswerKey::A, AnswerKey::B, AnswerKey::C, AnswerKey::D];

    pub fn as_str(self) -> &'static str {
        match self {
            AnswerKey::A => "a",
            AnswerKey::B => "b",
            AnswerKey::C => "c",
            AnswerKey::D => "d",
        }
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerKey {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        AnswerKey::ALL
            .iter()
            .copied()
            .find(|k| key.eq_ignore_ascii_case(k.as_str()))
            .ok_or_else(|| GameError::UnknownAnswerKey(s.into()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpKind {
    FiftyFifty,
    AudienceHelp,
    FriendCall,
}

impl HelpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HelpKind::FiftyFifty => "fifty_fifty",
            HelpKind::AudienceHelp => "audience_help",
            HelpKind::FriendCall => "friend_call",
        }
    }
}

impl fmt::Display for HelpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HelpKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fifty_fifty" => Ok(HelpKind::FiftyFifty),
            "audience_help" => Ok(HelpKind::AudienceHelp),
            "friend_call" => Ok(HelpKind::FriendCall),
            other => Err(GameError::UnknownHelpType(other.into())),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct FriendCall {
    pub friend: String,
    pub suggested: AnswerKey,
}

impl fmt::Display for FriendCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} thinks the answer is {}",
            self.friend,
            self.suggested.as_str().to_uppercase()
        )
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HelpPayload {
    FiftyFifty(Vec<AnswerKey>),
    AudienceHelp(BTreeMap<AnswerKey, u8>),
    FriendCall(FriendCall),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GameQuestion {
    pub level: u8,
    pub question: Question,
    /// Index into `Question::answers` shown under each key.
    pub variants: BTreeMap<AnswerKey, u8>,
    #[serde(default)]
    pub help_hash: BTreeMap<HelpKind, HelpPayload>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub balance: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    InProgress,
    Won,
    Fail,
    Timeout,
    Money,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            GameStatus::InProgress => "in_progress",
            GameStatus::Won => "won",
            GameStatus::Fail => "fail",
            GameStatus::Timeout => "timeout",
            GameStatus::Money => "money",
        };
        f.write_str(status)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Game {
    pub id: GameId,
    pub user_id: UserId,
    pub current_level: u8,
    pub prize: u32,
    pub is_failed: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub fifty_fifty_used: bool,
    pub audience_help_used: bool,
    pub friend_call_used: bool,
    pub game_questions: Vec<GameQuestion>,
}

/// One finished game, as written to the results log.
#[derive(Clone, Debug, Serialize)]
pub struct GameRecord {
    pub game_id: GameId,
    pub user_id: UserId,
    pub user_name: String,
    pub status: GameStatus,
    pub level: u8,
    pub prize: u32,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
