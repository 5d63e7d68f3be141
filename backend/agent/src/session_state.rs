//! State of one poem run, owned by the orchestrator that drives it.

use std::collections::BTreeMap;

use poemforge_core::{PoemError, Speaker, VerseTurn};
use uuid::Uuid;

/// How many of the latest verses join the context in a retrieval query.
pub const QUERY_TRAILING_VERSES: usize = 2;

/// Turns are indexed 1..=n with alternating speakers, A first. Only this
/// crate can append to them.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    context: String,
    target_verse_count: usize,
    turns: Vec<VerseTurn>,
    /// Retrieved facts keyed by the exact query string.
    facts_cache: BTreeMap<String, Vec<String>>,
}

impl Session {
    pub fn new(context: impl Into<String>, target_verse_count: usize) -> Result<Self, PoemError> {
        if target_verse_count == 0 {
            return Err(PoemError::InvalidConfiguration(
                "target verse count must be at least 1".into(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            context: context.into(),
            target_verse_count,
            turns: Vec::new(),
            facts_cache: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn target_verse_count(&self) -> usize {
        self.target_verse_count
    }

    pub fn turns(&self) -> &[VerseTurn] {
        &self.turns
    }

    /// Index of the last appended turn, 0 before the first.
    pub fn last_successful_turn(&self) -> usize {
        self.turns.len()
    }

    pub fn is_complete(&self) -> bool {
        self.turns.len() == self.target_verse_count
    }

    pub fn verses_by(&self, speaker: Speaker) -> impl Iterator<Item = &VerseTurn> {
        self.turns.iter().filter(move |t| t.speaker() == speaker)
    }

    /// Query for the next turn's facts: the context followed by the texts of
    /// the most recent turns.
    pub fn retrieval_query(&self) -> String {
        let start = self.turns.len().saturating_sub(QUERY_TRAILING_VERSES);
        std::iter::once(self.context.as_str())
            .chain(self.turns[start..].iter().map(VerseTurn::text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn cached_facts(&self, query: &str) -> Option<&[String]> {
        self.facts_cache.get(query).map(Vec::as_slice)
    }

    pub fn cached_queries(&self) -> usize {
        self.facts_cache.len()
    }

    pub(crate) fn cache_facts(&mut self, query: String, facts: Vec<String>) {
        self.facts_cache.insert(query, facts);
    }

    /// Append the next verse. The index and speaker follow from the turn count.
    pub(crate) fn push_turn(&mut self, text: String) -> &VerseTurn {
        let index = self.turns.len() + 1;
        self.turns.push(VerseTurn::new(index, text));
        &self.turns[index - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_target_is_rejected() {
        let err = Session::new("ctx", 0).unwrap_err();
        assert!(matches!(err, PoemError::InvalidConfiguration(_)));
    }

    #[test]
    fn pushed_turns_alternate_from_a() {
        let mut s = Session::new("ctx", 3).unwrap();
        for text in ["one", "two", "three"] {
            s.push_turn(text.into());
        }
        let speakers: Vec<_> = s.turns().iter().map(|t| t.speaker()).collect();
        assert_eq!(speakers, vec![Speaker::ProviderA, Speaker::ProviderB, Speaker::ProviderA]);
        assert_eq!(s.turns()[2].index(), 3);
        assert!(s.is_complete());
        assert_eq!(s.verses_by(Speaker::ProviderA).count(), 2);
    }

    #[test]
    fn query_uses_two_latest_verses() {
        let mut s = Session::new("tides", 6).unwrap();
        assert_eq!(s.retrieval_query(), "tides");
        s.push_turn("first".into());
        assert_eq!(s.retrieval_query(), "tides\nfirst");
        s.push_turn("second".into());
        s.push_turn("third".into());
        assert_eq!(s.retrieval_query(), "tides\nsecond\nthird");
    }
}
