//! Which open bugs have no card on the board.
//!
//! A bug counts as visible when its decimal id occurs anywhere in a card
//! name. This is a plain substring test: card "12345" also hides bug 234.
//! Existing boards rely on free-form names such as "Outage 1680259 - network
//! flaps", so the test is not tightened to whole tokens.

use crate::types::{BugId, BugMap, Card, UnmatchedSet};
use std::collections::BTreeMap;

fn card_mentions(card: &Card, id: &str) -> bool {
    card.name.contains(id)
}

/// Ids from `open` that no card name mentions.
pub fn unmatched_bugs(open: &BugMap, cards: &[Card]) -> UnmatchedSet {
    open.ids()
        .filter(|id| {
            let needle = id.to_string();
            !cards.iter().any(|card| card_mentions(card, &needle))
        })
        .collect()
}

/// For every matched bug, the names of the cards that mention it.
pub fn matching_cards<'a>(open: &BugMap, cards: &'a [Card]) -> BTreeMap<BugId, Vec<&'a str>> {
    let mut matches = BTreeMap::new();
    for id in open.ids() {
        let needle = id.to_string();
        let names: Vec<&str> = cards
            .iter()
            .filter(|card| card_mentions(card, &needle))
            .map(|card| card.name.as_str())
            .collect();
        if !names.is_empty() {
            matches.insert(id, names);
        }
    }
    matches
}
