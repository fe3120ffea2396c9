use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, io, path::Path};

use crate::models::{Game, GameId, User, UserId};

/// Everything the game keeps between runs.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Storage {
    next_user_id: u64,
    next_game_id: u64,
    users: BTreeMap<UserId, User>,
    games: BTreeMap<GameId, Game>,
}

impl Storage {
    /// Reads a snapshot written by [`Storage::save`]. A missing file is an
    /// empty storage.
    pub fn load(path: impl AsRef<Path>) -> Result<Storage> {
        let path = path.as_ref();
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Storage::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("couldn't read {}", path.display()))
            }
        };

        let storage = serde_json::from_str(&data)
            .with_context(|| format!("couldn't parse {}", path.display()))?;
        Ok(storage)
    }

    /// Writes to a temporary file first so a crash never leaves half a
    /// snapshot behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");

        let data = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp, data).with_context(|| format!("couldn't write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("couldn't replace {}", path.display()))?;

        Ok(())
    }

    pub fn insert_user(&mut self, name: &str) -> User {
        self.next_user_id += 1;
        let user = User {
            id: UserId(self.next_user_id),
            name: name.into(),
            balance: 0,
        };
        self.users.insert(user.id, user.clone());
        user
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users.values().find(|user| user.name == name)
    }

    pub fn next_game_id(&mut self) -> GameId {
        self.next_game_id += 1;
        GameId(self.next_game_id)
    }

    pub fn game(&self, id: GameId) -> Option<&Game> {
        self.games.get(&id)
    }

    pub fn put_game(&mut self, game: Game) {
        self.games.insert(game.id, game);
    }

    pub fn in_progress_game(&self, user_id: UserId) -> Option<&Game> {
        self.games
            .values()
            .find(|game| game.user_id == user_id && !game.finished())
    }

    /// Newest first.
    pub fn games_for_user(&self, user_id: UserId) -> Vec<&Game> {
        let mut games = self
            .games
            .values()
            .filter(|game| game.user_id == user_id)
            .collect::<Vec<_>>();
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        games
    }

    pub fn credit_balance(&mut self, user_id: UserId, amount: u32) -> Option<u64> {
        let user = self.users.get_mut(&user_id)?;
        user.balance += amount as u64;
        Some(user.balance)
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn game_question_count(&self) -> usize {
        self.games.values().map(|game| game.game_questions.len()).sum()
    }
}
