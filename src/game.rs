use chrono::{DateTime, Utc};
use rand::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::GameError;
use crate::help;
use crate::models::{
    AnswerKey, Game, GameId, GameQuestion, GameStatus, HelpKind, HelpPayload, Question, UserId,
};
use crate::rules::{self, JACKPOT, MAX_LEVEL};

impl GameQuestion {
    /// Binds `question` to a game, spreading its answers over the keys a-d
    /// in random order.
    pub fn shuffled<R: Rng + ?Sized>(question: Question, rng: &mut R) -> GameQuestion {
        let mut order = [0u8, 1, 2, 3];
        order.shuffle(rng);
        GameQuestion::with_order(question, order)
    }

    /// `order[i]` is the answer index shown under the i-th key.
    pub fn with_order(question: Question, order: [u8; 4]) -> GameQuestion {
        let variants = AnswerKey::ALL
            .iter()
            .copied()
            .zip(order.iter().copied())
            .collect();

        GameQuestion {
            level: question.level,
            question,
            variants,
            help_hash: BTreeMap::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.question.text
    }

    pub fn correct_answer_key(&self) -> AnswerKey {
        self.variants
            .iter()
            .find(|entry| *entry.1 == 0)
            .map(|entry| *entry.0)
            .unwrap_or(AnswerKey::A)
    }

    pub fn correct_answer(&self) -> &str {
        &self.question.correct
    }

    /// Answer texts keyed by the letter the player sees.
    pub fn variants(&self) -> BTreeMap<AnswerKey, &str> {
        let answers = self.question.answers().collect::<Vec<_>>();
        self.variants
            .iter()
            .filter_map(|(&key, &index)| answers.get(index as usize).map(|&text| (key, text)))
            .collect()
    }

    pub fn answer_correct(&self, letter: &str) -> bool {
        letter
            .trim()
            .eq_ignore_ascii_case(self.correct_answer_key().as_str())
    }

    pub fn help(&self, kind: HelpKind) -> Option<&HelpPayload> {
        self.help_hash.get(&kind)
    }

    fn add_help<R: Rng + ?Sized>(&mut self, kind: HelpKind, rng: &mut R) -> &HelpPayload {
        let correct = self.correct_answer_key();
        let payload = match kind {
            HelpKind::FiftyFifty => HelpPayload::FiftyFifty(help::fifty_fifty(correct, rng)),
            HelpKind::AudienceHelp => {
                HelpPayload::AudienceHelp(help::audience_distribution(correct, rng))
            }
            HelpKind::FriendCall => HelpPayload::FriendCall(help::friend_call(correct, rng)),
        };

        self.help_hash.entry(kind).or_insert(payload)
    }
}

impl Game {
    pub fn new(
        id: GameId,
        user_id: UserId,
        game_questions: Vec<GameQuestion>,
        created_at: DateTime<Utc>,
    ) -> Game {
        Game {
            id,
            user_id,
            current_level: 0,
            prize: 0,
            is_failed: false,
            created_at,
            finished_at: None,
            fifty_fifty_used: false,
            audience_help_used: false,
            friend_call_used: false,
            game_questions,
        }
    }

    pub fn finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn status(&self) -> GameStatus {
        let finished_at = match self.finished_at {
            None => return GameStatus::InProgress,
            Some(finished_at) => finished_at,
        };

        if self.current_level > MAX_LEVEL {
            GameStatus::Won
        } else if self.is_failed && finished_at - self.created_at > rules::time_limit() {
            GameStatus::Timeout
        } else if self.is_failed {
            GameStatus::Fail
        } else {
            GameStatus::Money
        }
    }

    pub fn current_game_question(&self) -> Option<&GameQuestion> {
        self.game_questions
            .iter()
            .find(|q| q.level == self.current_level)
    }

    fn current_game_question_mut(&mut self) -> Option<&mut GameQuestion> {
        let level = self.current_level;
        self.game_questions.iter_mut().find(|q| q.level == level)
    }

    /// The last level answered correctly, if any.
    pub fn previous_level(&self) -> Option<u8> {
        self.current_level.checked_sub(1)
    }

    pub fn time_out(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > rules::time_limit()
    }

    pub fn help_used(&self, kind: HelpKind) -> bool {
        match kind {
            HelpKind::FiftyFifty => self.fifty_fifty_used,
            HelpKind::AudienceHelp => self.audience_help_used,
            HelpKind::FriendCall => self.friend_call_used,
        }
    }

    /// Returns `true` if the answer was correct and the game goes on or was
    /// won. A wrong answer, an expired timer or a finished game all give
    /// `false`.
    pub fn answer_current_question(&mut self, letter: &str, now: DateTime<Utc>) -> bool {
        if self.finished() {
            return false;
        }

        if self.fail_on_timeout(now) {
            return false;
        }

        let correct = match self.current_game_question() {
            None => return false,
            Some(question) => question.answer_correct(letter),
        };

        if !correct {
            let prize = rules::fireproof_prize(self.previous_level());
            info!(game_id = %self.id, level = self.current_level, prize, "wrong answer");
            self.finish(prize, true, now);
            return false;
        }

        let answered = self.current_level;
        self.current_level += 1;

        if answered == MAX_LEVEL {
            info!(game_id = %self.id, prize = JACKPOT, "game won");
            self.finish(JACKPOT, false, now);
        } else {
            self.prize = rules::prize_for_level(answered);
            debug!(game_id = %self.id, level = self.current_level, prize = self.prize, "correct answer");
        }

        true
    }

    /// Ends the game with the prize of the last answered level and returns it.
    pub fn take_money(&mut self, now: DateTime<Utc>) -> Result<u32, GameError> {
        if self.finished() {
            return Err(GameError::GameAlreadyFinished(self.id));
        }

        if self.fail_on_timeout(now) {
            return Ok(self.prize);
        }

        let prize = self.previous_level().map(rules::prize_for_level).unwrap_or(0);
        info!(game_id = %self.id, prize, "money taken");
        self.finish(prize, false, now);

        Ok(prize)
    }

    pub fn use_help<R: Rng + ?Sized>(
        &mut self,
        kind: HelpKind,
        rng: &mut R,
    ) -> Result<&HelpPayload, GameError> {
        if self.finished() {
            return Err(GameError::GameAlreadyFinished(self.id));
        }

        if self.help_used(kind) {
            return Err(GameError::HintAlreadyUsed(kind));
        }

        if self.current_game_question().is_none() {
            return Err(GameError::GameAlreadyFinished(self.id));
        }

        match kind {
            HelpKind::FiftyFifty => self.fifty_fifty_used = true,
            HelpKind::AudienceHelp => self.audience_help_used = true,
            HelpKind::FriendCall => self.friend_call_used = true,
        }

        let game_id = self.id;
        let question = self
            .current_game_question_mut()
            .ok_or(GameError::GameAlreadyFinished(game_id))?;

        info!(%game_id, level = question.level, help = %kind, "help used");
        Ok(question.add_help(kind, rng))
    }

    fn fail_on_timeout(&mut self, now: DateTime<Utc>) -> bool {
        if !self.time_out(now) {
            return false;
        }

        let prize = rules::fireproof_prize(self.previous_level());
        info!(game_id = %self.id, prize, "time limit exceeded");
        self.finish(prize, true, now);
        true
    }

    fn finish(&mut self, prize: u32, failed: bool, now: DateTime<Utc>) {
        self.finished_at = Some(now);
        self.is_failed = failed;
        self.prize = prize;
    }
}
