//! Resolve a user-typed task name against known names.

use similar::TextDiff;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::prompt::Prompter;
use crate::{Error, Result};

/// Maximum number of candidates offered.
pub const MAX_CANDIDATES: usize = 3;

/// Minimum similarity for a name to be offered.
pub const CUTOFF: f32 = 0.6;

/// Similarity of two strings in `[0, 1]` over a character diff.
pub fn similarity(a: &str, b: &str) -> f32 {
    TextDiff::from_chars(a, b).ratio()
}

/// Up to `n` names scoring at least `cutoff`, best first.
pub fn close_matches<'a, I>(target: &str, names: I, n: usize, cutoff: f32) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<(f32, &str)> = names
        .into_iter()
        .map(|name| (similarity(target, name), name))
        .filter(|(score, _)| *score >= cutoff)
        .collect();
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(b.1))
    });
    scored.truncate(n);
    scored.into_iter().map(|(_, name)| name).collect()
}

/// Find the entry whose key best matches `target`.
///
/// An exact key wins outright. Otherwise one close match is taken as is
/// and several are put to `prompter`.
pub fn resolve<'a, T>(
    target: &str,
    candidates: &'a BTreeMap<String, T>,
    prompter: &mut dyn Prompter,
) -> Result<&'a T> {
    if let Some(value) = candidates.get(target) {
        return Ok(value);
    }

    let matches = close_matches(
        target,
        candidates.keys().map(String::as_str),
        MAX_CANDIDATES,
        CUTOFF,
    );
    let chosen = match matches.as_slice() {
        [] => return Err(Error::NotFound(format!("no task matching '{}'", target))),
        [only] => *only,
        several => {
            let options: Vec<String> = several.iter().map(|s| s.to_string()).collect();
            let index = prompter.choose(&format!("Which task did you mean by '{}'?", target), &options)?;
            several.get(index).copied().ok_or_else(|| {
                Error::AmbiguousMatch(format!(
                    "'{}' matches {} tasks and no valid choice was made",
                    target,
                    several.len()
                ))
            })?
        }
    };
    tracing::debug!(query = target, chosen, "resolved task name");

    candidates
        .get(chosen)
        .ok_or_else(|| Error::NotFound(format!("no task matching '{}'", target)))
}
