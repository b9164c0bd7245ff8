//! Command history
//!
//! A bounded, shared record of the command lines users submitted across all
//! sessions, with fuzzy and regex search. Lines are recovered from the raw
//! keystrokes forwarded to the shells by [`InputLineTracker`].

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use crate::error::Result;

/// Default number of history entries to keep
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Bounded FIFO of submitted commands
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY))),
            capacity,
        }
    }

    /// Add a command. Blank lines and repeats of the newest entry are
    /// dropped. Returns whether the command was recorded.
    pub fn push(&self, command: impl Into<String>) -> bool {
        let command = command.into();
        if command.trim().is_empty() {
            return false;
        }

        let mut entries = self.lock();
        if entries.back() == Some(&command) {
            return false;
        }

        entries.push_back(command);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        true
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<String> {
        self.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Search history with fuzzy matching, best matches first
    pub fn search(&self, query: &str) -> Vec<String> {
        let entries = self.lock();
        if query.is_empty() {
            return dedup(entries.iter().rev().cloned());
        }

        let query_lower = query.to_lowercase();

        // Newest first so that equal scores keep recency order after the
        // stable sort
        let mut results: Vec<(usize, String)> = entries
            .iter()
            .rev()
            .filter_map(|entry| {
                let score = fuzzy_score(&query_lower, &entry.to_lowercase());
                (score > 0).then(|| (score, entry.clone()))
            })
            .collect();

        results.sort_by(|a, b| b.0.cmp(&a.0));
        dedup(results.into_iter().map(|(_, entry)| entry))
    }

    /// Search history with a regex, most recent first
    pub fn search_regex(&self, pattern: &str) -> Result<Vec<String>> {
        let re = regex::Regex::new(pattern)?;
        let entries = self.lock();
        Ok(dedup(
            entries.iter().rev().filter(|entry| re.is_match(entry)).cloned(),
        ))
    }

    /// Clear all history
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

fn dedup(entries: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    entries.filter(|entry| seen.insert(entry.clone())).collect()
}

/// Simple fuzzy scoring algorithm
/// Returns a score based on how well the query matches the target
fn fuzzy_score(query: &str, target: &str) -> usize {
    let query_chars: Vec<char> = query.chars().collect();
    let mut query_idx = 0;
    let mut score = 0;
    let mut consecutive = 0;

    for c in target.chars() {
        if query_idx == query_chars.len() {
            break;
        }
        if query_chars[query_idx] == c {
            score += 1 + consecutive * 5; // Bonus for consecutive matches
            consecutive += 1;
            query_idx += 1;
        } else {
            consecutive = 0;
        }
    }

    // Only count as a match if all query characters were found
    if query_idx == query_chars.len() {
        score
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EscapeState {
    #[default]
    Ground,
    /// Saw ESC
    Escape,
    /// Inside `ESC [` ... final byte
    Csi,
    /// `ESC O` consumes exactly one more byte
    Ss3,
}

/// Reconstructs submitted command lines from raw terminal input.
///
/// Printable bytes accumulate into the current line, backspace removes the
/// last character, Ctrl-C and Ctrl-U discard the line, escape sequences
/// (arrow keys and the like) are skipped, and CR or LF submits the line.
#[derive(Debug, Default)]
pub struct InputLineTracker {
    line: Vec<u8>,
    state: EscapeState,
}

impl InputLineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw input, returning any lines completed by it
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        let mut completed = Vec::new();

        for &byte in data {
            match self.state {
                EscapeState::Escape => {
                    self.state = match byte {
                        b'[' => EscapeState::Csi,
                        b'O' => EscapeState::Ss3,
                        _ => EscapeState::Ground,
                    };
                    continue;
                }
                EscapeState::Csi => {
                    if (0x40..=0x7e).contains(&byte) {
                        self.state = EscapeState::Ground;
                    }
                    continue;
                }
                EscapeState::Ss3 => {
                    self.state = EscapeState::Ground;
                    continue;
                }
                EscapeState::Ground => {}
            }

            match byte {
                b'\r' | b'\n' => {
                    let line = String::from_utf8_lossy(&self.line).trim().to_string();
                    self.line.clear();
                    if !line.is_empty() {
                        completed.push(line);
                    }
                }
                0x1b => self.state = EscapeState::Escape,
                0x7f | 0x08 => self.pop_char(),
                // Ctrl-C, Ctrl-U
                0x03 | 0x15 => self.line.clear(),
                b'\t' => self.line.push(b' '),
                byte if byte < 0x20 => {}
                byte => self.line.push(byte),
            }
        }

        completed
    }

    /// Text typed since the last submitted line
    pub fn pending(&self) -> String {
        String::from_utf8_lossy(&self.line).into_owned()
    }

    fn pop_char(&mut self) {
        // Drop UTF-8 continuation bytes, then the lead byte
        while let Some(byte) = self.line.pop() {
            if byte & 0xc0 != 0x80 {
                break;
            }
        }
    }
}
