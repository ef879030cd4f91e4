//! Required character classes - uppercase, lowercase, numbers and "other".
//!
//! Upper- and lowercase letters are counted with a case-folding heuristic:
//! the password is folded to the opposite case and the number of characters
//! left unmatched by a similarity measure is taken as the count. The measure
//! is the one policy thresholds were tuned against, applied per Unicode
//! character rather than per byte, so multibyte letters count once. It stays
//! imprecise on repeated characters and on characters whose case mapping
//! changes length.

use secrecy::ExposeSecret;
use std::collections::HashMap;

use super::RuleResult;
use crate::context::ValidationContext;
use crate::failure::{RequirementSummary, ValidationFailure};
use crate::policy::{CharacterClass, OtherChars, PolicyConfig};

/// Checks every class with a positive minimum.
///
/// # Returns
/// - `None` if every class meets its minimum
/// - `Some(MissingCharacters)` if exactly one class falls short
/// - `Some(MissingCharactersSummary)` if several classes fall short
pub fn required_characters_rule(ctx: &ValidationContext, policy: &PolicyConfig) -> RuleResult {
    let require = &policy.require;
    if require.is_empty() {
        return None;
    }

    let password = ctx.password().expose_secret();
    let other_chars = policy.other_chars();

    let failing: Vec<(CharacterClass, usize)> = CharacterClass::ALL
        .into_iter()
        .filter_map(|class| {
            let minimum = require.minimum(class)?;
            let actual = count_class(class, password, other_chars.as_ref())?;
            (actual < minimum).then_some((class, minimum))
        })
        .collect();

    match failing.as_slice() {
        [] => None,
        [(class, minimum)] => Some(ValidationFailure::MissingCharacters {
            class: *class,
            minimum: *minimum,
            other_chars: match class {
                CharacterClass::Other => other_chars.map(|chars| chars.as_str().to_string()),
                _ => None,
            },
        }),
        _ => Some(ValidationFailure::MissingCharactersSummary(RequirementSummary {
            uppercase: require.minimum(CharacterClass::Uppercase).unwrap_or(0),
            lowercase: require.minimum(CharacterClass::Lowercase).unwrap_or(0),
            numbers: require.minimum(CharacterClass::Numbers).unwrap_or(0),
            other: require.minimum(CharacterClass::Other).unwrap_or(0),
            other_chars: other_chars
                .map(|chars| chars.as_str().to_string())
                .unwrap_or_default(),
        })),
    }
}

/// Counts the characters of `password` in `class`.
///
/// Returns `None` for [`CharacterClass::Other`] when no other-character set is
/// configured, which skips the class.
pub fn count_class(
    class: CharacterClass,
    password: &str,
    other_chars: Option<&OtherChars>,
) -> Option<usize> {
    match class {
        CharacterClass::Uppercase => Some(count_unmatched(password, &password.to_lowercase())),
        CharacterClass::Lowercase => Some(count_unmatched(password, &password.to_uppercase())),
        CharacterClass::Numbers => Some(password.chars().filter(char::is_ascii_digit).count()),
        CharacterClass::Other => {
            let other_chars = other_chars?;
            Some(password.chars().filter(|&c| other_chars.contains(c)).count())
        }
    }
}

/// Length of `folded` minus its similarity with `password`.
fn count_unmatched(password: &str, folded: &str) -> usize {
    let original: Vec<char> = password.chars().collect();
    let folded: Vec<char> = folded.chars().collect();
    folded.len().saturating_sub(similar_chars(&original, &folded))
}

/// Number of characters shared by `a` and `b`, found by taking the longest
/// common run and repeating on the pieces on either side of it.
fn similar_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0..a.len(), 0..b.len())];

    while let Some((range_a, range_b)) = pending.pop() {
        let (pos_a, pos_b, len) =
            longest_common_run(&a[range_a.clone()], &b[range_b.clone()]);
        if len == 0 {
            continue;
        }
        total += len;

        let (start_a, start_b) = (range_a.start + pos_a, range_b.start + pos_b);
        pending.push((range_a.start..start_a, range_b.start..start_b));
        pending.push((start_a + len..range_a.end, start_b + len..range_b.end));
    }

    total
}

/// First longest common contiguous run of `a` and `b` as `(start_a, start_b, len)`.
///
/// "First" means the smallest `start_a`, then the smallest `start_b`. Runs in
/// `O(a.len() + b.len())` using a suffix automaton of `b`.
fn longest_common_run(a: &[char], b: &[char]) -> (usize, usize, usize) {
    if a.is_empty() || b.is_empty() {
        return (0, 0, 0);
    }

    let automaton = SuffixAutomaton::new(b);
    let mut best = (0, 0, 0);
    let (mut state, mut len) = (SuffixAutomaton::ROOT, 0);

    for (end, c) in a.iter().enumerate() {
        while state != SuffixAutomaton::ROOT && !automaton.states[state].next.contains_key(c) {
            state = automaton.states[state].link.unwrap_or(SuffixAutomaton::ROOT);
            len = automaton.states[state].len;
        }
        match automaton.states[state].next.get(c) {
            Some(&next) => {
                state = next;
                len += 1;
            }
            None => len = 0,
        }

        // Strict `>` keeps the earliest end, hence the earliest start in `a`.
        if len > best.2 {
            let first_end = automaton.states[state].first_end;
            best = (end + 1 - len, first_end + 1 - len, len);
        }
    }

    best
}

#[derive(Debug)]
struct State {
    len: usize,
    link: Option<usize>,
    next: HashMap<char, usize>,
    /// End position of the first occurrence in the source text.
    first_end: usize,
}

/// Minimal automaton recognizing every substring of a char slice.
#[derive(Debug)]
struct SuffixAutomaton {
    states: Vec<State>,
    last: usize,
}

impl SuffixAutomaton {
    const ROOT: usize = 0;

    fn new(text: &[char]) -> Self {
        let root = State {
            len: 0,
            link: None,
            next: HashMap::new(),
            first_end: 0,
        };
        let mut automaton = Self {
            states: Vec::with_capacity(text.len() * 2 + 1),
            last: Self::ROOT,
        };
        automaton.states.push(root);
        for (pos, &c) in text.iter().enumerate() {
            automaton.extend(c, pos);
        }
        automaton
    }

    fn extend(&mut self, c: char, pos: usize) {
        let cur = self.states.len();
        self.states.push(State {
            len: self.states[self.last].len + 1,
            link: None,
            next: HashMap::new(),
            first_end: pos,
        });

        let mut p = Some(self.last);
        while let Some(pi) = p {
            if self.states[pi].next.contains_key(&c) {
                break;
            }
            self.states[pi].next.insert(c, cur);
            p = self.states[pi].link;
        }

        let link = match p {
            None => Self::ROOT,
            Some(pi) => {
                let q = self.states[pi].next[&c];
                if self.states[pi].len + 1 == self.states[q].len {
                    q
                } else {
                    let clone = self.states.len();
                    self.states.push(State {
                        len: self.states[pi].len + 1,
                        link: self.states[q].link,
                        next: self.states[q].next.clone(),
                        first_end: self.states[q].first_end,
                    });

                    let mut p = Some(pi);
                    while let Some(pi) = p {
                        if self.states[pi].next.get(&c) != Some(&q) {
                            break;
                        }
                        self.states[pi].next.insert(c, clone);
                        p = self.states[pi].link;
                    }
                    self.states[q].link = Some(clone);
                    clone
                }
            }
        };

        self.states[cur].link = Some(link);
        self.last = cur;
    }
}
