use anyhow::{ensure, Result};
use rand::prelude::*;
use std::collections::BTreeMap;

use crate::models::Question;
use crate::rules::{MAX_LEVEL, QUESTION_LEVELS};

/// Source of questions for new games.
pub trait QuestionBank {
    /// A random question of the given difficulty, or `None` if there is none.
    fn fetch_question(&self, level: u8) -> Option<Question>;
}

#[derive(Clone, Debug, Default)]
pub struct QuestionPool {
    by_level: BTreeMap<u8, Vec<Question>>,
}

impl QuestionPool {
    pub fn new<'a>(questions: impl Iterator<Item = &'a Question>) -> Result<QuestionPool> {
        let mut by_level: BTreeMap<u8, Vec<Question>> = BTreeMap::new();

        for question in questions {
            ensure!(
                question.level <= MAX_LEVEL,
                "question {:?} has level {}, expected at most {}",
                question.text,
                question.level,
                MAX_LEVEL
            );
            ensure!(
                question.incorrect.len() == 3,
                "question {:?} needs exactly 3 incorrect answers, got {}",
                question.text,
                question.incorrect.len()
            );

            by_level
                .entry(question.level)
                .or_default()
                .push(question.clone());
        }

        Ok(QuestionPool { by_level })
    }

    pub fn len(&self) -> usize {
        self.by_level.values().map(|questions| questions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Levels no game could be built for.
    pub fn missing_levels(&self) -> Vec<u8> {
        QUESTION_LEVELS
            .filter(|level| !self.by_level.contains_key(level))
            .collect()
    }
}

impl QuestionBank for QuestionPool {
    fn fetch_question(&self, level: u8) -> Option<Question> {
        let questions = self.by_level.get(&level)?;

        let mut rng = thread_rng();
        questions.choose(&mut rng).cloned()
    }
}
