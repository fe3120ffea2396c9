use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rand::prelude::*;
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{error, info, warn};

use crate::bank::QuestionBank;
use crate::clock::Clock;
use crate::error::GameError;
use crate::models::{Game, GameId, GameQuestion, GameRecord, HelpKind, User, UserId};
use crate::rules::QUESTION_LEVELS;
use crate::store::Storage;

#[derive(Clone)]
pub struct GameController {
    bank: Arc<dyn QuestionBank + Send + Sync>,
    clock: Arc<dyn Clock + Send + Sync>,
    storage: Arc<Mutex<Storage>>,
    snapshot: Option<PathBuf>,
    result_writer: Option<ResultWriter>,
}

impl GameController {
    pub fn new(
        bank: Arc<dyn QuestionBank + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
        storage: Storage,
    ) -> GameController {
        GameController {
            bank,
            clock,
            storage: Arc::new(Mutex::new(storage)),
            snapshot: None,
            result_writer: None,
        }
    }

    /// Persist every committed change to `path`.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> GameController {
        self.snapshot = Some(path.into());
        self
    }

    /// Log each finished game to `result_writer`.
    pub fn with_result_writer(mut self, result_writer: ResultWriter) -> GameController {
        self.result_writer = Some(result_writer);
        self
    }

    pub fn register_user(&self, name: &str) -> Result<User, GameError> {
        self.write(|storage, _now| {
            let user = storage.insert_user(name);
            info!(user_id = %user.id, name, "user registered");
            Ok(user)
        })
    }

    pub fn find_or_register_user(&self, name: &str) -> Result<User, GameError> {
        let existing = self.read(|storage| storage.user_by_name(name).cloned())?;
        match existing {
            Some(user) => Ok(user),
            None => self.register_user(name),
        }
    }

    pub fn user(&self, user_id: UserId) -> Result<User, GameError> {
        self.read(|storage| storage.user(user_id).cloned())?
            .ok_or(GameError::UserNotFound(user_id))
    }

    /// A game owned by `user_id`. Somebody else's game is reported as missing.
    pub fn game(&self, user_id: UserId, game_id: GameId) -> Result<Game, GameError> {
        self.read(|storage| owned_game(storage, user_id, game_id).cloned())?
    }

    pub fn games_for_user(&self, user_id: UserId) -> Result<Vec<Game>, GameError> {
        self.read(|storage| {
            storage
                .games_for_user(user_id)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    pub fn in_progress_game(&self, user_id: UserId) -> Result<Option<Game>, GameError> {
        self.read(|storage| storage.in_progress_game(user_id).cloned())
    }

    pub fn create_game_for_user(&self, user_id: UserId) -> Result<Game, GameError> {
        self.write(|storage, now| {
            if storage.user(user_id).is_none() {
                return Err(GameError::UserNotFound(user_id));
            }

            if let Some(game) = storage.in_progress_game(user_id) {
                warn!(%user_id, game_id = %game.id, "game already in progress");
                return Err(GameError::GameAlreadyInProgress {
                    user_id,
                    game_id: game.id,
                });
            }

            let mut rng = thread_rng();
            let game_questions = QUESTION_LEVELS
                .map(|level| {
                    self.bank
                        .fetch_question(level)
                        .map(|question| GameQuestion::shuffled(question, &mut rng))
                        .ok_or(GameError::InsufficientQuestionBank(level))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let game = Game::new(storage.next_game_id(), user_id, game_questions, now);
            storage.put_game(game.clone());

            info!(%user_id, game_id = %game.id, "game created");
            Ok(game)
        })
    }

    /// Returns whether the answer was correct, along with the updated game.
    pub fn answer_current_question(
        &self,
        user_id: UserId,
        game_id: GameId,
        letter: &str,
    ) -> Result<(bool, Game), GameError> {
        self.transaction(user_id, game_id, |game, now| {
            Ok(game.answer_current_question(letter, now))
        })
    }

    pub fn take_money(&self, user_id: UserId, game_id: GameId) -> Result<Game, GameError> {
        self.transaction(user_id, game_id, |game, now| game.take_money(now))
            .map(|(_prize, game)| game)
    }

    pub fn use_help(
        &self,
        user_id: UserId,
        game_id: GameId,
        kind: HelpKind,
    ) -> Result<Game, GameError> {
        self.transaction(user_id, game_id, |game, _now| {
            let mut rng = thread_rng();
            game.use_help(kind, &mut rng).map(|_payload| ())
        })
        .map(|((), game)| game)
    }

    /// Applies `f` to a copy of the game. The updated game, the owner's
    /// balance and the snapshot are committed together, or not at all.
    fn transaction<T>(
        &self,
        user_id: UserId,
        game_id: GameId,
        f: impl FnOnce(&mut Game, DateTime<Utc>) -> Result<T, GameError>,
    ) -> Result<(T, Game), GameError> {
        let (value, game, record) = self.write(|storage, now| {
            let mut game = owned_game(storage, user_id, game_id)?.clone();
            let was_finished = game.finished();

            let value = f(&mut game, now)?;

            let mut record = None;
            if !was_finished && game.finished() {
                let balance = storage
                    .credit_balance(user_id, game.prize)
                    .ok_or(GameError::UserNotFound(user_id))?;
                info!(%user_id, %game_id, status = %game.status(), prize = game.prize, balance, "game finished");

                record = storage.user(user_id).map(|user| game_record(&game, user));
            }

            storage.put_game(game.clone());
            Ok((value, game, record))
        })?;

        if let (Some(result_writer), Some(record)) = (&self.result_writer, record) {
            if let Err(err) = result_writer.write(record) {
                error!(%game_id, "couldn't write game result: {:#}", err);
            }
        }

        Ok((value, game))
    }

    fn read<T>(&self, f: impl FnOnce(&Storage) -> T) -> Result<T, GameError> {
        let storage = self
            .storage
            .lock()
            .map_err(|_err| GameError::Storage("couldn't lock storage".into()))?;
        Ok(f(&storage))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Storage, DateTime<Utc>) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let mut storage = self
            .storage
            .lock()
            .map_err(|_err| GameError::Storage("couldn't lock storage".into()))?;

        let mut next = storage.clone();
        let value = f(&mut next, self.clock.now())?;

        if let Some(path) = &self.snapshot {
            next.save(path).map_err(|err| {
                error!("couldn't save snapshot: {:#}", err);
                GameError::Storage(format!("{:#}", err))
            })?;
        }

        *storage = next;
        Ok(value)
    }
}

fn owned_game(storage: &Storage, user_id: UserId, game_id: GameId) -> Result<&Game, GameError> {
    storage
        .game(game_id)
        .filter(|game| game.user_id == user_id)
        .ok_or(GameError::GameNotFound(game_id))
}

fn game_record(game: &Game, user: &User) -> GameRecord {
    GameRecord {
        game_id: game.id,
        user_id: user.id,
        user_name: user.name.clone(),
        status: game.status(),
        level: game.current_level,
        prize: game.prize,
        created_at: game.created_at,
        finished_at: game.finished_at.unwrap_or(game.created_at),
    }
}

/// Appends finished games to a CSV file.
#[derive(Clone, Debug)]
pub struct ResultWriter {
    writer: Arc<Mutex<csv::Writer<File>>>,
}

impl ResultWriter {
    pub fn new(path: impl AsRef<Path>) -> Result<ResultWriter> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let writer = Arc::new(Mutex::new(writer));

        Ok(ResultWriter { writer })
    }

    pub fn write(&self, record: GameRecord) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_err| anyhow!("couldn't lock writer"))?;
        writer.serialize(record)?;
        writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::QuestionPool;
    use crate::models::{AnswerKey, GameStatus, HelpPayload};
    use crate::test_support::{fixtures, init_logging, ManualClock};
    use chrono::Duration;
    use std::fs;

    struct Setup {
        controller: GameController,
        clock: Arc<ManualClock>,
        user: User,
    }

    fn setup_with(questions: usize) -> Setup {
        init_logging();

        let pool = QuestionPool::new(fixtures::generate_questions(questions).iter()).unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let controller = GameController::new(Arc::new(pool), clock.clone(), Storage::default());
        let user = controller.register_user("Alex").unwrap();

        Setup {
            controller,
            clock,
            user,
        }
    }

    fn setup() -> Setup {
        setup_with(60)
    }

    fn counts(controller: &GameController) -> (usize, usize) {
        controller
            .read(|storage| (storage.game_count(), storage.game_question_count()))
            .unwrap()
    }

    fn correct_key(game: &Game) -> AnswerKey {
        game.current_game_question().unwrap().correct_answer_key()
    }

    #[test]
    fn creates_game() {
        let Setup {
            controller, user, ..
        } = setup();

        let game = controller.create_game_for_user(user.id).unwrap();

        assert_eq!(counts(&controller), (1, 15));
        assert_eq!(game.user_id, user.id);
        assert_eq!(game.status(), GameStatus::InProgress);
        assert!(!game.finished());
        assert_eq!(
            game.game_questions.iter().map(|q| q.level).collect::<Vec<_>>(),
            (0..=14).collect::<Vec<u8>>()
        );
        assert_eq!(controller.game(user.id, game.id).unwrap(), game);
    }

    #[test]
    fn refuses_second_game() {
        let Setup {
            controller, user, ..
        } = setup();
        let first = controller.create_game_for_user(user.id).unwrap();

        let err = controller.create_game_for_user(user.id).unwrap_err();

        assert_eq!(
            err,
            GameError::GameAlreadyInProgress {
                user_id: user.id,
                game_id: first.id
            }
        );
        assert_eq!(counts(&controller), (1, 15));
        assert_eq!(controller.game(user.id, first.id).unwrap(), first);
    }

    #[test]
    fn new_game_after_finishing() {
        let Setup {
            controller, user, ..
        } = setup();
        let first = controller.create_game_for_user(user.id).unwrap();
        controller.take_money(user.id, first.id).unwrap();

        let second = controller.create_game_for_user(user.id).unwrap();

        assert_ne!(second.id, first.id);
        assert_eq!(counts(&controller), (2, 30));
        assert_eq!(controller.games_for_user(user.id).unwrap().len(), 2);
    }

    #[test]
    fn refuses_game_without_enough_questions() {
        let Setup {
            controller, user, ..
        } = setup_with(10);

        assert_eq!(
            controller.create_game_for_user(user.id),
            Err(GameError::InsufficientQuestionBank(10))
        );
        assert_eq!(counts(&controller), (0, 0));
    }

    #[test]
    fn refuses_unknown_user() {
        let Setup { controller, .. } = setup();

        assert_eq!(
            controller.create_game_for_user(UserId(42)),
            Err(GameError::UserNotFound(UserId(42)))
        );
    }

    #[test]
    fn answers_correct() {
        let Setup {
            controller, user, ..
        } = setup();
        let game = controller.create_game_for_user(user.id).unwrap();

        let (correct, game) = controller
            .answer_current_question(user.id, game.id, correct_key(&game).as_str())
            .unwrap();

        assert!(correct);
        assert!(!game.finished());
        assert_eq!(game.current_level, 1);
        assert_eq!(game.prize, 100);
        assert_eq!(controller.game(user.id, game.id).unwrap(), game);
    }

    #[test]
    fn answers_incorrect() {
        let Setup {
            controller, user, ..
        } = setup();
        let game = controller.create_game_for_user(user.id).unwrap();

        let (correct, game) = controller
            .answer_current_question(user.id, game.id, "")
            .unwrap();

        assert!(!correct);
        assert!(game.finished());
        assert_eq!(game.status(), GameStatus::Fail);
        assert_eq!(controller.user(user.id).unwrap().balance, 0);
    }

    #[test]
    fn answer_after_time_limit_times_out() {
        let Setup {
            controller,
            clock,
            user,
        } = setup();
        let game = controller.create_game_for_user(user.id).unwrap();
        clock.advance(Duration::hours(1));

        let (correct, game) = controller
            .answer_current_question(user.id, game.id, correct_key(&game).as_str())
            .unwrap();

        assert!(!correct);
        assert_eq!(game.status(), GameStatus::Timeout);
    }

    #[test]
    fn takes_money() {
        let Setup {
            controller, user, ..
        } = setup();
        let mut game = controller.create_game_for_user(user.id).unwrap();
        for _ in 0..2 {
            let key = correct_key(&game);
            let (correct, next) = controller
                .answer_current_question(user.id, game.id, key.as_str())
                .unwrap();
            assert!(correct);
            game = next;
        }
        assert_eq!(game.current_level, 2);

        let game = controller.take_money(user.id, game.id).unwrap();

        assert!(game.finished());
        assert_eq!(game.status(), GameStatus::Money);
        assert_eq!(game.prize, 200);
        assert_eq!(controller.user(user.id).unwrap().balance, 200);
    }

    #[test]
    fn take_money_twice_pays_once() {
        let Setup {
            controller, user, ..
        } = setup();
        let game = controller.create_game_for_user(user.id).unwrap();
        let key = correct_key(&game);
        controller
            .answer_current_question(user.id, game.id, key.as_str())
            .unwrap();
        controller.take_money(user.id, game.id).unwrap();

        assert_eq!(
            controller.take_money(user.id, game.id),
            Err(GameError::GameAlreadyFinished(game.id))
        );
        assert_eq!(controller.user(user.id).unwrap().balance, 100);
    }

    #[test]
    fn jackpot_is_credited() {
        let Setup {
            controller, user, ..
        } = setup();
        let mut game = controller.create_game_for_user(user.id).unwrap();

        while !game.finished() {
            let key = correct_key(&game);
            let (correct, next) = controller
                .answer_current_question(user.id, game.id, key.as_str())
                .unwrap();
            assert!(correct);
            game = next;
        }

        assert_eq!(game.status(), GameStatus::Won);
        assert_eq!(controller.user(user.id).unwrap().balance, 1_000_000);
    }

    #[test]
    fn uses_help() {
        let Setup {
            controller, user, ..
        } = setup();
        let game = controller.create_game_for_user(user.id).unwrap();
        let correct = correct_key(&game);

        let game = controller
            .use_help(user.id, game.id, HelpKind::FiftyFifty)
            .unwrap();

        assert!(game.fifty_fifty_used);
        assert!(!game.finished());
        match game.current_game_question().unwrap().help(HelpKind::FiftyFifty) {
            Some(HelpPayload::FiftyFifty(keys)) => {
                assert_eq!(keys.len(), 2);
                assert!(keys.contains(&correct));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn second_help_leaves_game_untouched() {
        let Setup {
            controller, user, ..
        } = setup();
        let game = controller.create_game_for_user(user.id).unwrap();
        let game = controller
            .use_help(user.id, game.id, HelpKind::AudienceHelp)
            .unwrap();

        assert_eq!(
            controller.use_help(user.id, game.id, HelpKind::AudienceHelp),
            Err(GameError::HintAlreadyUsed(HelpKind::AudienceHelp))
        );
        assert_eq!(controller.game(user.id, game.id).unwrap(), game);
    }

    #[test]
    fn hides_other_users_games() {
        let Setup {
            controller, user, ..
        } = setup();
        let other = controller.register_user("Sam").unwrap();
        let game = controller.create_game_for_user(other.id).unwrap();

        assert_eq!(
            controller.game(user.id, game.id),
            Err(GameError::GameNotFound(game.id))
        );
        assert_eq!(
            controller.take_money(user.id, game.id),
            Err(GameError::GameNotFound(game.id))
        );
        assert!(!controller.game(other.id, game.id).unwrap().finished());
    }

    #[test]
    fn finds_registered_user_by_name() {
        let Setup {
            controller, user, ..
        } = setup();

        assert_eq!(controller.find_or_register_user("Alex").unwrap(), user);
        assert_ne!(controller.find_or_register_user("Sam").unwrap().id, user.id);
    }

    #[test]
    fn failed_snapshot_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let Setup {
            controller, user, ..
        } = setup();
        let controller = controller.with_snapshot(dir.path().join("missing").join("games.json"));

        assert!(matches!(
            controller.create_game_for_user(user.id),
            Err(GameError::Storage(_))
        ));
        assert_eq!(counts(&controller), (0, 0));
    }

    #[test]
    fn snapshot_is_written_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        let Setup {
            controller, user, ..
        } = setup();
        let controller = controller.with_snapshot(&path);

        let game = controller.create_game_for_user(user.id).unwrap();

        let storage = Storage::load(&path).unwrap();
        assert_eq!(storage.game(game.id), Some(&game));
    }

    #[test]
    fn writes_finished_games() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let Setup {
            controller, user, ..
        } = setup();
        let controller = controller.with_result_writer(ResultWriter::new(&path).unwrap());

        let game = controller.create_game_for_user(user.id).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        controller.take_money(user.id, game.id).unwrap();

        let results = fs::read_to_string(&path).unwrap();
        let line = results.lines().next().unwrap();
        assert!(line.starts_with(&format!("{},{},Alex,money,0,0,", game.id, user.id)));
        assert_eq!(results.lines().count(), 1);
    }
}
