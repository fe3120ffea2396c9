use anyhow::{bail, Result};
use std::{
    env, fs,
    io::{self, BufRead, Write},
    sync::Arc,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bank::QuestionPool;
use clock::SystemClock;
use commands::Command;
use controllers::{GameController, ResultWriter};
use error::GameError;
use models::{Config, Game, GameStatus, HelpKind, HelpPayload, User};
use store::Storage;

mod bank;
mod clock;
mod commands;
mod controllers;
mod error;
mod game;
mod help;
mod models;
mod rules;
mod store;
#[cfg(test)]
mod test_support;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let questions_path = env::var("QUESTIONS").unwrap_or_else(|_err| "questions.toml".into());
    let state_path = env::var("STATE").unwrap_or_else(|_err| "games.json".into());
    let results_path = env::var("RESULTS").unwrap_or_else(|_err| "results.csv".into());
    let player = env::var("PLAYER").unwrap_or_else(|_err| "Player".into());

    let config = fs::read_to_string(&questions_path)?;
    let config: Config = toml::de::from_str(&config)?;

    let bank = QuestionPool::new(config.question.iter())?;
    if bank.is_empty() {
        bail!("{} contains no questions", questions_path);
    }
    let missing = bank.missing_levels();
    if !missing.is_empty() {
        bail!("{} has no questions for levels {:?}", questions_path, missing);
    }
    info!(questions = bank.len(), path = %questions_path, "question bank loaded");

    let storage = Storage::load(&state_path)?;
    info!(
        games = storage.game_count(),
        game_questions = storage.game_question_count(),
        path = %state_path,
        "state loaded"
    );
    let controller = GameController::new(Arc::new(bank), Arc::new(SystemClock), storage)
        .with_snapshot(&state_path)
        .with_result_writer(ResultWriter::new(&results_path)?);

    let user = controller.find_or_register_user(&player)?;
    println!("Welcome, {}! Your balance is {}.", user.name, user.balance);
    print_usage();

    let mut game = controller.in_progress_game(user.id)?;
    match &game {
        Some(game) => {
            println!("Resuming your game.");
            print_game(game);
        }
        None => println!("Type `new` to start a game."),
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            None => break,
            Some(line) => line?,
        };

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                println!("{}", err);
                print_usage();
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }

        match run_command(&controller, &user, &mut game, command) {
            Ok(()) => {}
            Err(err) => println!("{}", describe_error(&err)),
        }
    }

    Ok(())
}

fn run_command(
    controller: &GameController,
    user: &User,
    game: &mut Option<Game>,
    command: Command,
) -> Result<(), GameError> {
    match command {
        Command::NewGame => {
            let created = controller.create_game_for_user(user.id)?;
            println!("Game started. Good luck!");
            print_game(&created);
            *game = Some(created);
        }
        Command::History => {
            let user = controller.user(user.id)?;
            println!("Balance: {}", user.balance);
            for past in controller.games_for_user(user.id)? {
                println!(
                    "  {}  {:<11}  level {:>2}  prize {}",
                    past.created_at.format("%Y-%m-%d %H:%M"),
                    past.status().to_string(),
                    past.current_level,
                    past.prize
                );
            }
        }
        Command::Status => {
            let game_id = game.as_ref().map(|game| game.id).ok_or(GameError::NoGameInProgress)?;
            let current = controller.game(user.id, game_id)?;
            print_game(&current);
            *game = Some(current);
        }
        Command::Answer(key) => {
            let game_id = current_game_id(game)?;
            let (correct, updated) =
                controller.answer_current_question(user.id, game_id, key.as_str())?;
            if correct {
                println!("Correct!");
            }
            print_game(&updated);
            *game = Some(updated);
        }
        Command::TakeMoney => {
            let game_id = current_game_id(game)?;
            let updated = controller.take_money(user.id, game_id)?;
            print_game(&updated);
            *game = Some(updated);
        }
        Command::Help(kind) => {
            let game_id = current_game_id(game)?;
            let updated = controller.use_help(user.id, game_id, kind)?;
            print_game(&updated);
            *game = Some(updated);
        }
        Command::Quit => {}
    }

    Ok(())
}

fn current_game_id(game: &Option<Game>) -> Result<models::GameId, GameError> {
    match game {
        Some(game) if !game.finished() => Ok(game.id),
        Some(game) => Err(GameError::GameAlreadyFinished(game.id)),
        None => Err(GameError::NoGameInProgress),
    }
}

fn describe_error(err: &GameError) -> String {
    match err {
        GameError::GameAlreadyInProgress { .. } => {
            "You have an unfinished game, finish it first.".into()
        }
        GameError::GameAlreadyFinished(_) => "This game is over. Type `new` to play again.".into(),
        GameError::NoGameInProgress => "No game in progress. Type `new` to start one.".into(),
        GameError::HintAlreadyUsed(kind) => format!("You already used {}.", help_name(*kind)),
        other => other.to_string(),
    }
}

fn help_name(kind: HelpKind) -> &'static str {
    match kind {
        HelpKind::FiftyFifty => "50/50",
        HelpKind::AudienceHelp => "the audience",
        HelpKind::FriendCall => "your phone call",
    }
}

fn print_usage() {
    println!("Commands: a b c d | 50 | audience | friend | take | new | history | status | quit");
}

fn print_correct_answer(game: &Game) {
    if let Some(question) = game.current_game_question() {
        println!(
            "The right answer was {}) {}",
            question.correct_answer_key().as_str().to_uppercase(),
            question.correct_answer()
        );
    }
}

fn print_game(game: &Game) {
    match game.status() {
        GameStatus::InProgress => {}
        GameStatus::Won => {
            println!("You won the jackpot: {}!", game.prize);
            return;
        }
        GameStatus::Fail => {
            println!("Wrong answer. You leave with {}.", game.prize);
            print_correct_answer(game);
            return;
        }
        GameStatus::Timeout => {
            println!("Time is up. You leave with {}.", game.prize);
            print_correct_answer(game);
            return;
        }
        GameStatus::Money => {
            println!("You took the money: {}.", game.prize);
            return;
        }
    }

    let question = match game.current_game_question() {
        None => return,
        Some(question) => question,
    };

    println!();
    println!(
        "Question {} for {} (banked {})",
        question.level + 1,
        rules::prize_for_level(question.level),
        game.prize
    );
    println!("{}", question.text());

    let visible = match question.help(HelpKind::FiftyFifty) {
        Some(HelpPayload::FiftyFifty(keys)) => Some(keys),
        _ => None,
    };
    for (key, text) in question.variants() {
        if visible.map_or(true, |keys| keys.contains(&key)) {
            println!("  {}) {}", key.as_str().to_uppercase(), text);
        }
    }

    if let Some(HelpPayload::AudienceHelp(distribution)) = question.help(HelpKind::AudienceHelp) {
        let votes = distribution
            .iter()
            .map(|(key, share)| format!("{}: {}%", key.as_str().to_uppercase(), share))
            .collect::<Vec<_>>();
        println!("Audience: {}", votes.join("  "));
    }

    if let Some(HelpPayload::FriendCall(call)) = question.help(HelpKind::FriendCall) {
        println!("Phone: {}", call);
    }

    let unused = [
        HelpKind::FiftyFifty,
        HelpKind::AudienceHelp,
        HelpKind::FriendCall,
    ]
    .iter()
    .filter(|&&kind| !game.help_used(kind))
    .map(|&kind| help_name(kind))
    .collect::<Vec<_>>();
    if !unused.is_empty() {
        println!("Lifelines left: {}", unused.join(", "));
    }
}
