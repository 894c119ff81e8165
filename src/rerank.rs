use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{
    backend::InferenceBackend,
    index::FileRecord,
    ranker::{Candidate, Stage, sort_candidates},
};

/// Rerank the top `depth` candidates with a second inference pass.
///
/// Each candidate is presented to the backend as its stored snippet (falling
/// back to its path), and the returned relevance scores reorder the slice.
/// Candidates outside the slice keep their embedding-stage order and are
/// never promoted above it; the candidate set is never grown or shrunk.
///
/// Any backend failure (after one retry) skips the stage: the embedding
/// order passes through unchanged and the second return value is `true` so
/// the degradation stays observable in the final report.
pub fn rerank_top(
    backend: &dyn InferenceBackend,
    query: &str,
    candidates: Vec<Candidate>,
    records: &[FileRecord],
    depth: usize,
) -> (Vec<Candidate>, bool) {
    let slice_len = depth.min(candidates.len());
    if slice_len < 2 {
        return (candidates, false);
    }

    let snippets: HashMap<&str, &str> = records
        .iter()
        .map(|r| (r.path.as_str(), r.snippet.as_deref().unwrap_or(&r.path)))
        .collect();

    let documents: Vec<String> = candidates[..slice_len]
        .iter()
        .map(|c| {
            snippets
                .get(c.path.as_str())
                .copied()
                .unwrap_or(c.path.as_str())
                .to_string()
        })
        .collect();

    // One retry per batch, then fall back to the embedding order.
    let scores = match backend.rerank(query, &documents) {
        Ok(scores) => scores,
        Err(first) => match backend.rerank(query, &documents) {
            Ok(scores) => scores,
            Err(second) => {
                warn!(%first, %second, "rerank unavailable, keeping embedding order");
                return (candidates, true);
            }
        },
    };

    if scores.len() != slice_len {
        warn!(
            expected = slice_len,
            actual = scores.len(),
            "rerank returned a misaligned score list, keeping embedding order"
        );
        return (candidates, true);
    }

    let mut reranked = candidates;
    for (candidate, score) in reranked[..slice_len].iter_mut().zip(&scores) {
        candidate.score = *score;
        candidate.stage = Stage::Rerank;
    }
    sort_candidates(&mut reranked[..slice_len]);

    debug!(depth = slice_len, "rerank pass applied");
    (reranked, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        scores: Vec<f32>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl ScriptedBackend {
        fn scoring(scores: Vec<f32>) -> Self {
            Self { scores, calls: AtomicUsize::new(0), fail: false }
        }

        fn failing() -> Self {
            Self { scores: vec![], calls: AtomicUsize::new(0), fail: true }
        }
    }

    impl InferenceBackend for ScriptedBackend {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            unreachable!("reranker never embeds")
        }

        fn rerank(&self, _query: &str, docs: &[String]) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::InferenceUnavailable("down".to_string()));
            }
            Ok(self.scores[..docs.len()].to_vec())
        }
    }

    fn make_candidate(path: &str, score: f32) -> Candidate {
        Candidate { path: path.to_string(), score, stage: Stage::Embedding }
    }

    fn make_record(path: &str, snippet: Option<&str>) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            size: 1,
            mtime: 1,
            content_hash: String::new(),
            offset: 0,
            length: 1,
            embedding_id: 0,
            snippet: snippet.map(str::to_string),
        }
    }

    #[test]
    fn permutes_only_the_top_slice() {
        let candidates = vec![
            make_candidate("a.md", 0.9),
            make_candidate("b.md", 0.8),
            make_candidate("c.md", 0.7),
            make_candidate("d.md", 0.6),
        ];
        let records: Vec<_> = ["a.md", "b.md", "c.md", "d.md"]
            .iter()
            .map(|p| make_record(p, Some("text")))
            .collect();
        // Reverse the top two.
        let backend = ScriptedBackend::scoring(vec![0.1, 0.95]);

        let (out, degraded) =
            rerank_top(&backend, "q", candidates, &records, 2);
        assert!(!degraded);
        let paths: Vec<_> = out.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["b.md", "a.md", "c.md", "d.md"]);
        assert_eq!(out[0].stage, Stage::Rerank);
        assert_eq!(out[2].stage, Stage::Embedding);
        assert_eq!(out[2].score, 0.7);
    }

    #[test]
    fn never_changes_candidate_count() {
        let candidates: Vec<_> =
            (0..5).map(|i| make_candidate(&format!("{i}.md"), 0.5)).collect();
        let records: Vec<_> = (0..5)
            .map(|i| make_record(&format!("{i}.md"), None))
            .collect();
        let backend = ScriptedBackend::scoring(vec![0.5; 3]);

        let (out, _) = rerank_top(&backend, "q", candidates, &records, 3);
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn failure_degrades_with_flag_after_one_retry() {
        let candidates =
            vec![make_candidate("a.md", 0.9), make_candidate("b.md", 0.8)];
        let records =
            vec![make_record("a.md", None), make_record("b.md", None)];
        let backend = ScriptedBackend::failing();

        let (out, degraded) =
            rerank_top(&backend, "q", candidates.clone(), &records, 2);
        assert!(degraded);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        let paths: Vec<_> = out.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.md"]);
        assert!(out.iter().all(|c| c.stage == Stage::Embedding));
    }

    struct ShortBackend;

    impl InferenceBackend for ShortBackend {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            unreachable!()
        }

        fn rerank(&self, _query: &str, _docs: &[String]) -> Result<Vec<f32>> {
            // Always one score short of the request.
            Ok(vec![0.5])
        }
    }

    #[test]
    fn misaligned_scores_degrade() {
        let candidates =
            vec![make_candidate("a.md", 0.9), make_candidate("b.md", 0.8)];
        let records =
            vec![make_record("a.md", None), make_record("b.md", None)];

        let (out, degraded) =
            rerank_top(&ShortBackend, "q", candidates, &records, 2);
        assert!(degraded);
        let paths: Vec<_> = out.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.md"]);
    }

    #[test]
    fn single_candidate_skips_the_backend() {
        let candidates = vec![make_candidate("a.md", 0.9)];
        let records = vec![make_record("a.md", None)];
        let backend = ScriptedBackend::failing();

        let (out, degraded) =
            rerank_top(&backend, "q", candidates, &records, 10);
        assert!(!degraded);
        assert_eq!(out.len(), 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rerank_ties_break_by_path() {
        let candidates = vec![
            make_candidate("b.md", 0.9),
            make_candidate("a.md", 0.8),
            make_candidate("c.md", 0.7),
        ];
        let records: Vec<_> = ["a.md", "b.md", "c.md"]
            .iter()
            .map(|p| make_record(p, None))
            .collect();
        let backend = ScriptedBackend::scoring(vec![0.5, 0.5, 0.5]);

        let (out, _) = rerank_top(&backend, "q", candidates, &records, 3);
        let paths: Vec<_> = out.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.md", "c.md"]);
    }
}
