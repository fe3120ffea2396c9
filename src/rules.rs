//! Prize ladder and time policy shared by every game.

use chrono::Duration;
use std::ops::RangeInclusive;

pub const QUESTION_LEVELS: RangeInclusive<u8> = 0..=14;

pub const MAX_LEVEL: u8 = 14;

/// Money earned for answering each level, indexed by level.
pub const PRIZES: [u32; 15] = [
    100, 200, 300, 500, 1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 64_000, 125_000, 250_000,
    500_000, 1_000_000,
];

/// Paid out for answering the last question.
pub const JACKPOT: u32 = 1_000_000;

/// Levels whose prize is kept even if a later question is failed.
pub const FIREPROOF_LEVELS: [u8; 3] = [4, 9, 14];

const TIME_LIMIT_MINUTES: i64 = 35;

pub fn time_limit() -> Duration {
    Duration::minutes(TIME_LIMIT_MINUTES)
}

pub fn prize_for_level(level: u8) -> u32 {
    PRIZES.get(level as usize).copied().unwrap_or(0)
}

/// The guaranteed prize once `answered` has been completed, or 0 if no
/// checkpoint was passed yet.
pub fn fireproof_prize(answered: Option<u8>) -> u32 {
    let answered = match answered {
        None => return 0,
        Some(answered) => answered,
    };

    FIREPROOF_LEVELS
        .iter()
        .rev()
        .find(|&&level| level <= answered)
        .map(|&level| prize_for_level(level))
        .unwrap_or(0)
}
