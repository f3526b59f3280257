//! Sorted-set members paired with their scores

use serde::{Deserialize, Serialize};

/// A sorted-set member and its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortedSetEntry<T> {
    pub member: T,
    pub score: f64,
}

impl<T> SortedSetEntry<T> {
    pub fn new(member: T, score: f64) -> Self {
        Self { member, score }
    }

    /// Convert the member while keeping the score
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SortedSetEntry<U> {
        SortedSetEntry {
            member: f(self.member),
            score: self.score,
        }
    }
}

impl<T> From<(T, f64)> for SortedSetEntry<T> {
    fn from((member, score): (T, f64)) -> Self {
        Self { member, score }
    }
}
