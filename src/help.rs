use rand::prelude::*;
use std::collections::BTreeMap;

use crate::models::{AnswerKey, FriendCall};

const FRIENDS: &[&str] = &[
    "Aunt Clara",
    "Professor Hale",
    "Coach Rivera",
    "Your neighbour Sam",
    "Grandpa Joe",
];

/// How often a friend on the phone names the right answer.
const FRIEND_ACCURACY: f64 = 0.8;

fn wrong_keys(correct: AnswerKey) -> Vec<AnswerKey> {
    AnswerKey::ALL
        .iter()
        .copied()
        .filter(|&key| key != correct)
        .collect()
}

/// The correct key and one random wrong key, in key order.
pub fn fifty_fifty<R: Rng + ?Sized>(correct: AnswerKey, rng: &mut R) -> Vec<AnswerKey> {
    let mut keys = vec![correct];
    keys.extend(wrong_keys(correct).choose(rng).copied());
    keys.sort();
    keys
}

/// Percentage of the audience voting for each key. Always sums to 100, and
/// the correct key always gets the most votes.
pub fn audience_distribution<R: Rng + ?Sized>(
    correct: AnswerKey,
    rng: &mut R,
) -> BTreeMap<AnswerKey, u8> {
    let weights = AnswerKey::ALL
        .iter()
        .map(|&key| {
            let mut weight = rng.gen_range(1, 30);
            if key == correct {
                weight += rng.gen_range(40, 80);
            }
            (key, weight)
        })
        .collect::<Vec<(AnswerKey, u32)>>();

    let total: u32 = weights.iter().map(|(_key, weight)| weight).sum();

    // Largest remainder rounding.
    let mut shares = weights
        .iter()
        .map(|&(key, weight)| (key, weight * 100 / total, weight * 100 % total))
        .collect::<Vec<_>>();
    let assigned: u32 = shares.iter().map(|&(_key, share, _rem)| share).sum();

    shares.sort_by(|a, b| b.2.cmp(&a.2));
    for share in shares.iter_mut().take((100 - assigned) as usize) {
        share.1 += 1;
    }

    shares
        .into_iter()
        .map(|(key, share, _rem)| (key, share as u8))
        .collect()
}

pub fn friend_call<R: Rng + ?Sized>(correct: AnswerKey, rng: &mut R) -> FriendCall {
    let suggested = if rng.gen_bool(FRIEND_ACCURACY) {
        correct
    } else {
        wrong_keys(correct).choose(rng).copied().unwrap_or(correct)
    };

    let friend = FRIENDS.choose(rng).copied().unwrap_or("A friend");

    FriendCall {
        friend: friend.into(),
        suggested,
    }
}
