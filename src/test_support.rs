//! Shared helpers for unit tests.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, Once};
use tracing_subscriber::{fmt, EnvFilter};

use crate::clock::Clock;

static INIT_LOGGING: Once = Once::new();

/// Quiet logging for tests, `TEST_LOG` or `RUST_LOG` raise the level.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .try_init()
            .ok();
    });
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> ManualClock {
        ManualClock {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub mod fixtures {
    use chrono::{DateTime, Utc};

    use crate::models::{Game, GameId, GameQuestion, Question, UserId};
    use crate::rules::QUESTION_LEVELS;

    pub fn question(level: u8) -> Question {
        Question {
            level,
            text: format!("Question for level {}?", level),
            correct: format!("Right {}", level),
            incorrect: vec![
                format!("Wrong {} one", level),
                format!("Wrong {} two", level),
                format!("Wrong {} three", level),
            ],
        }
    }

    /// `count` questions spread evenly over all levels.
    pub fn generate_questions(count: usize) -> Vec<Question> {
        let levels = QUESTION_LEVELS.count();
        (0..count)
            .map(|i| {
                let mut question = question((i % levels) as u8);
                question.text = format!("{} #{}", question.text, i);
                question
            })
            .collect()
    }

    /// A fresh game whose correct answer is always under key `d`.
    pub fn game_with_questions(id: GameId, user_id: UserId, created_at: DateTime<Utc>) -> Game {
        let game_questions = QUESTION_LEVELS
            .map(|level| GameQuestion::with_order(question(level), [3, 2, 1, 0]))
            .collect();

        Game::new(id, user_id, game_questions, created_at)
    }
}
