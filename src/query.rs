use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::{
    archive::ArchiveReader,
    backend::InferenceBackend,
    config::{AppConfig, QueryMode},
    error::Result,
    extract::{ExtractReport, FileStatus, extract_files},
    index::{FileRecord, IndexDb},
    ranker::{Candidate, rank},
    rerank::rerank_top,
    select::select_winners,
    shortlist::{Predicate, shortlist},
};

#[derive(Debug, Clone)]
pub struct QueryParams {
    /// Free-text query fed to the semantic stages.
    pub query: String,
    pub mode: QueryMode,
    /// Structured filter bounding the candidate set before any semantics.
    pub predicate: Predicate,
    /// Maximum shortlist size.
    pub limit: usize,
    /// Maximum number of winners (tie classes may exceed it).
    pub topk: usize,
    /// Score tolerance for treating candidates as tied.
    pub epsilon: f32,
    pub out_dir: PathBuf,
}

/// Why a query ended without extracting anything. Distinct from errors: the
/// pipeline worked, there was simply nothing to win.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchReason {
    /// The structured predicate matched no records.
    EmptyShortlist,
    /// Ranking left no scoreable candidates (e.g. an index packed without
    /// embeddings), or the winner set came out empty.
    NoCandidates,
}

#[derive(Debug)]
pub enum QueryOutcome {
    Extracted {
        /// Final ranked winners; empty in `off` mode where no stage scores.
        winners: Vec<Candidate>,
        reports: Vec<ExtractReport>,
        /// True when hybrid mode fell back to the embedding order.
        rerank_skipped: bool,
    },
    NoMatch(NoMatchReason),
}

/// Run the full cascade: shortlist, rank, optionally rerank, select,
/// extract.
///
/// The index and container are read-only throughout, so any number of
/// queries may run against the same pair concurrently.
pub fn execute_query(
    params: &QueryParams,
    index: &IndexDb,
    archive: &ArchiveReader,
    backend: &dyn InferenceBackend,
    config: &AppConfig,
) -> Result<QueryOutcome> {
    let shortlisted = shortlist(index, &params.predicate, params.limit)?;
    if shortlisted.is_empty() {
        return Ok(QueryOutcome::NoMatch(NoMatchReason::EmptyShortlist));
    }

    let (winners, selected_records, rerank_skipped) = match params.mode {
        QueryMode::Off => {
            // No semantic stage: take the first topk in path order.
            let selected: Vec<FileRecord> = shortlisted
                .iter()
                .take(params.topk)
                .cloned()
                .collect();
            (Vec::new(), selected, false)
        }
        QueryMode::Embeddings | QueryMode::Hybrid => {
            let candidates = rank(backend, &params.query, &shortlisted, index)?;

            let (candidates, rerank_skipped) =
                if params.mode == QueryMode::Hybrid {
                    rerank_top(
                        backend,
                        &params.query,
                        candidates,
                        &shortlisted,
                        config.rerank_depth,
                    )
                } else {
                    (candidates, false)
                };

            let winners =
                select_winners(&candidates, params.topk, params.epsilon);

            let by_path: HashMap<&str, &FileRecord> = shortlisted
                .iter()
                .map(|r| (r.path.as_str(), r))
                .collect();
            let selected: Vec<FileRecord> = winners
                .iter()
                .filter_map(|w| by_path.get(w.path.as_str()).copied())
                .cloned()
                .collect();

            (winners, selected, rerank_skipped)
        }
    };

    if selected_records.is_empty() {
        return Ok(QueryOutcome::NoMatch(NoMatchReason::NoCandidates));
    }

    debug!(winners = selected_records.len(), mode = %params.mode, "extracting winning set");
    let reports = extract_files(archive, &selected_records, &params.out_dir)?;
    info!(extracted = reports.len(), out = %params.out_dir.display(), "query complete");

    Ok(QueryOutcome::Extracted { winners, reports, rerank_skipped })
}

/// Format an outcome for human-readable terminal output.
pub fn format_human(outcome: &QueryOutcome) {
    match outcome {
        QueryOutcome::NoMatch(NoMatchReason::EmptyShortlist) => {
            println!("(no matches)");
        }
        QueryOutcome::NoMatch(NoMatchReason::NoCandidates) => {
            println!("(no candidates to rank)");
        }
        QueryOutcome::Extracted { winners, reports, rerank_skipped } => {
            if *rerank_skipped {
                println!("(rerank unavailable, results use embedding order)");
            }
            let scores: HashMap<&str, f32> = winners
                .iter()
                .map(|w| (w.path.as_str(), w.score))
                .collect();
            for report in reports {
                let marker = match &report.status {
                    FileStatus::Verified => "ok",
                    FileStatus::IntegrityMismatch { .. } => "HASH MISMATCH",
                    FileStatus::Failed(_) => "FAILED",
                };
                match scores.get(report.path.as_str()) {
                    Some(score) => println!(
                        "[{score:.3}] {} -> {} ({marker})",
                        report.path,
                        report.output_path.display()
                    ),
                    None => println!(
                        "{} -> {} ({marker})",
                        report.path,
                        report.output_path.display()
                    ),
                }
            }
            println!("\n{} file(s) extracted", reports.len());
        }
    }
}

/// Format an outcome as a single JSON object on stdout.
pub fn format_json(outcome: &QueryOutcome, query: &str) {
    let value = match outcome {
        QueryOutcome::NoMatch(reason) => serde_json::json!({
            "query": query,
            "outcome": "no_match",
            "reason": match reason {
                NoMatchReason::EmptyShortlist => "empty_shortlist",
                NoMatchReason::NoCandidates => "no_candidates",
            },
        }),
        QueryOutcome::Extracted { winners, reports, rerank_skipped } => {
            let scores: HashMap<&str, f32> = winners
                .iter()
                .map(|w| (w.path.as_str(), w.score))
                .collect();
            let files: Vec<serde_json::Value> = reports
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "path": r.path,
                        "output": r.output_path.display().to_string(),
                        "score": scores.get(r.path.as_str()),
                        "status": match &r.status {
                            FileStatus::Verified => "verified".to_string(),
                            FileStatus::IntegrityMismatch { .. } =>
                                "integrity_mismatch".to_string(),
                            FileStatus::Failed(e) => format!("failed: {e}"),
                        },
                    })
                })
                .collect();
            serde_json::json!({
                "query": query,
                "outcome": "extracted",
                "rerank_skipped": rerank_skipped,
                "files": files,
            })
        }
    };
    println!("{value}");
}
