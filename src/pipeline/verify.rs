use std::collections::HashMap;

use crate::docs::types::{CandidateAnswer, VerifiedAnswer};

/// Majority vote over exact answer texts.
///
/// Ties on the top count go to the text whose first occurrence comes earliest in
/// `candidates`. Callers pass candidates in document order, so the earliest document
/// wins. Returns `None` when there is nothing to vote on.
pub fn verify(candidates: &[CandidateAnswer]) -> Option<VerifiedAnswer> {
    // text -> (votes, first index)
    let mut tally: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        tally
            .entry(candidate.text.as_str())
            .and_modify(|(votes, _)| *votes += 1)
            .or_insert((1, idx));
    }

    let top = tally.values().map(|(votes, _)| *votes).max()?;
    let leaders: Vec<(&str, usize)> = tally
        .iter()
        .filter(|(_, (votes, _))| *votes == top)
        .map(|(text, (_, first))| (*text, *first))
        .collect();
    let (winner, _) = leaders.iter().min_by_key(|(_, first)| *first).copied()?;

    Some(VerifiedAnswer {
        text: winner.to_string(),
        vote_count: top,
        supporting_documents: candidates
            .iter()
            .filter(|c| c.text == winner)
            .map(|c| c.source_document_id.clone())
            .collect(),
        total_candidates: candidates.len(),
        contested: leaders.len() > 1,
    })
}
