//! Passive chat-activity scoring.
//!
//! A message's value rewards vocabulary spread rather than volume: the
//! word-richness term is the mean, over the message's distinct words, of
//! each word's mean edit distance to every other distinct word. Repeating
//! one word contributes nothing; spam of a single emote contributes only
//! its sub-linear emote term.

use std::collections::BTreeSet;

/// Classic dynamic-programming Levenshtein distance over characters.
pub fn levenshtein(x: &str, y: &str) -> usize {
    let xs: Vec<char> = x.chars().collect();
    let ys: Vec<char> = y.chars().collect();
    let n = xs.len();
    let m = ys.len();

    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in table.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = i + j;
        }
    }

    for i in 0..n {
        for j in 0..m {
            let replace_cost = usize::from(xs[i] != ys[j]);
            table[i + 1][j + 1] = (table[i][j + 1] + 1)
                .min(table[i + 1][j] + 1)
                .min(table[i][j] + replace_cost);
        }
    }
    table[n][m]
}

/// Mean, over the distinct words, of each word's mean Levenshtein
/// distance to every other distinct word. Zero when there are fewer than
/// two distinct words (no "other" word to measure against).
///
/// Every distinct non-emote token counts as a word; there is no
/// dictionary-membership check. Repetition already contributes nothing,
/// and random keyboard mashes are few enough distinct tokens per message
/// that a dictionary gate was judged not worth carrying a word list for.
pub fn word_richness(words: &[&str]) -> f64 {
    let distinct: Vec<&str> = words.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    if distinct.len() < 2 {
        return 0.0;
    }

    let others = (distinct.len() - 1) as f64;
    let total: f64 = distinct
        .iter()
        .map(|word| {
            let sum: usize = distinct
                .iter()
                .filter(|other| *other != word)
                .map(|other| levenshtein(word, other))
                .sum();
            sum as f64 / others
        })
        .sum();
    total / distinct.len() as f64
}

/// Integer score for one message: word richness plus a sub-linear emote
/// term, truncated.
pub fn message_score(words: &[&str], distinct_emote_count: usize) -> u64 {
    let emote_term = (distinct_emote_count as f64).sqrt().floor();
    (word_richness(words) + emote_term) as u64
}
