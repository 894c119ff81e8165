use crate::ranker::Candidate;

/// Pick the winning set from an ordered candidate list.
///
/// Walks the list from the best candidate and includes each next one while
/// the set still has fewer than `topk` members, or while its score is within
/// `epsilon` of the best score. Tie inclusion overrides the `topk` cap, so a
/// tie class anchored at the best score can produce more than `topk`
/// winners.
///
/// Returns an empty vector for an empty input; the caller reports that as a
/// no-candidates outcome rather than an error.
pub fn select_winners(
    candidates: &[Candidate],
    topk: usize,
    epsilon: f32,
) -> Vec<Candidate> {
    let Some(best) = candidates.first() else {
        return Vec::new();
    };
    if topk == 0 {
        return Vec::new();
    }

    let mut winners = Vec::with_capacity(topk);
    for candidate in candidates {
        let tied_with_best = best.score - candidate.score <= epsilon;
        if winners.len() < topk || tied_with_best {
            winners.push(candidate.clone());
        } else {
            break;
        }
    }
    winners
}
