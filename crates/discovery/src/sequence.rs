//! Generation tokens for stale-response suppression.
//!
//! Every query round takes the next [`Generation`] before its first await.
//! When the round resolves, the caller compares the token with the
//! sequencer and only commits if no newer round has started. Stale rounds
//! are ignored on arrival; the underlying request is not aborted.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic round number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared round counter. Clones observe the same counter.
#[derive(Debug, Clone, Default)]
pub struct RequestSequencer {
    counter: Arc<AtomicU64>,
}

impl RequestSequencer {
    /// A counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new round, superseding every earlier one.
    pub fn next(&self) -> Generation {
        Generation(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The most recently issued generation.
    pub fn current(&self) -> Generation {
        Generation(self.counter.load(Ordering::SeqCst))
    }

    /// Whether `generation` is still the latest round.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

/// The committed result set.
///
/// Results are replaced wholesale and only by the current generation; a
/// failed round leaves the previous results in place.
#[derive(Debug, Clone)]
pub struct ResultBoard<T> {
    generation: Option<Generation>,
    results: Vec<T>,
}

impl<T> Default for ResultBoard<T> {
    fn default() -> Self {
        Self {
            generation: None,
            results: Vec::new(),
        }
    }
}

impl<T> ResultBoard<T> {
    /// An empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the results if `generation` is current and newer than what is
    /// committed. Returns whether the results were applied.
    pub fn commit(&mut self, sequencer: &RequestSequencer, generation: Generation, results: Vec<T>) -> bool {
        if !sequencer.is_current(generation) || self.generation.is_some_and(|g| g >= generation) {
            return false;
        }
        self.generation = Some(generation);
        self.results = results;
        true
    }

    /// Generation of the committed results.
    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }

    /// Committed results.
    pub fn results(&self) -> &[T] {
        &self.results
    }

    /// Swaps the committed results for a set derived from them, keeping the
    /// generation. Refused unless `generation` is the committed one, so a
    /// derivation from an older set never lands.
    pub fn replace(&mut self, generation: Generation, results: Vec<T>) -> bool {
        if self.generation != Some(generation) {
            return false;
        }
        self.results = results;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generations_increase() {
        let seq = RequestSequencer::new();
        let a = seq.next();
        let b = seq.next();
        assert!(b > a);
        assert!(seq.is_current(b));
        assert!(!seq.is_current(a));
    }

    #[test]
    fn test_clones_share_the_counter() {
        let seq = RequestSequencer::new();
        let other = seq.clone();
        let a = seq.next();
        other.next();
        assert!(!seq.is_current(a));
    }

    #[test]
    fn test_late_older_response_is_dropped() {
        let seq = RequestSequencer::new();
        let mut board = ResultBoard::new();

        let n = seq.next();
        let n1 = seq.next();

        assert!(board.commit(&seq, n1, vec!["newer"]));
        assert!(!board.commit(&seq, n, vec!["older"]));
        assert_eq!(board.results(), &["newer"]);
        assert_eq!(board.generation(), Some(n1));
    }

    #[test]
    fn test_replace_keeps_generation() {
        let seq = RequestSequencer::new();
        let mut board = ResultBoard::new();

        let n = seq.next();
        assert!(!board.replace(n, vec!["early"]));
        assert!(board.commit(&seq, n, vec!["plain"]));
        assert!(board.replace(n, vec!["starred"]));
        assert_eq!(board.results(), &["starred"]);
        assert_eq!(board.generation(), Some(n));

        let n1 = seq.next();
        assert!(board.commit(&seq, n1, vec!["newer"]));
        assert!(!board.replace(n, vec!["stale"]));
        assert_eq!(board.results(), &["newer"]);
    }

    #[test]
    fn test_superseded_before_arrival() {
        let seq = RequestSequencer::new();
        let mut board: ResultBoard<u8> = ResultBoard::new();

        let n = seq.next();
        seq.next();
        assert!(!board.commit(&seq, n, vec![1]));
        assert!(board.results().is_empty());
    }
}
