use thiserror::Error;

use crate::models::{GameId, HelpKind, UserId};

/// Conditions a caller is expected to recover from, usually by showing a
/// message and sending the player back to a sensible page.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GameError {
    #[error("user {user_id} already has game {game_id} in progress")]
    GameAlreadyInProgress { user_id: UserId, game_id: GameId },

    #[error("question bank has no question for level {0}")]
    InsufficientQuestionBank(u8),

    #[error("game {0} is already finished")]
    GameAlreadyFinished(GameId),

    #[error("hint {0} was already used in this game")]
    HintAlreadyUsed(HelpKind),

    #[error("no game in progress")]
    NoGameInProgress,

    #[error("game {0} not found")]
    GameNotFound(GameId),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("unknown help type `{0}`")]
    UnknownHelpType(String),

    #[error("unknown answer key `{0}`")]
    UnknownAnswerKey(String),

    #[error("storage failure: {0}")]
    Storage(String),
}
