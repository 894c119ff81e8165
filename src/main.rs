use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use packrat::{
    archive::ArchiveReader,
    backend::{HttpBackend, InferenceBackend},
    cli::{Cli, Command, ExtractArgs, FilterArgs, SearchArgs, StatusArgs},
    config::AppConfig,
    error::{Error, Result},
    extract::{FileStatus, extract_files},
    index::{FileRecord, IndexDb},
    pack::pack_directory,
    query::{self, QueryOutcome, QueryParams},
    shortlist::{Predicate, shortlist},
};

fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var("PACKRAT_LOG") {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Bounds rayon's scoring and extraction parallelism for the whole
    // process. Ignore the error if a pool already exists (tests).
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(cli.concurrency.max(1))
        .build_global();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig {
        backend_url: cli.backend_url.clone(),
        concurrency: cli.concurrency,
        ..AppConfig::default()
    };

    match cli.command {
        Command::Pack(args) => {
            let backend = if args.no_embed {
                None
            } else {
                Some(HttpBackend::new(&config)?)
            };
            let summary = pack_directory(
                &args.root,
                &args.index,
                &args.container,
                backend.as_ref().map(|b| b as &dyn InferenceBackend),
            )?;
            println!(
                "Packed {} file(s) ({} embedded, {} container bytes)",
                summary.files, summary.embedded, summary.container_len
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Query(args) => {
            let config = AppConfig {
                rerank_depth: args.rerank_depth,
                ..config
            };
            let index = IndexDb::open(&args.index)?;
            let archive = ArchiveReader::open(&args.container)?;
            let backend = HttpBackend::new(&config)?;

            let params = QueryParams {
                query: args.query.clone(),
                mode: args.mode,
                predicate: build_predicate(&args.filter)?,
                limit: args.limit,
                topk: args.topk,
                epsilon: args.epsilon,
                out_dir: args.out.clone(),
            };

            let outcome =
                query::execute_query(&params, &index, &archive, &backend, &config)?;

            if args.json {
                query::format_json(&outcome, &args.query);
            } else {
                query::format_human(&outcome);
            }

            Ok(match outcome {
                QueryOutcome::Extracted { .. } => ExitCode::SUCCESS,
                QueryOutcome::NoMatch(_) => ExitCode::from(1),
            })
        }
        Command::Search(args) => cmd_search(&args),
        Command::Extract(args) => cmd_extract(&args),
        Command::Status(args) => cmd_status(&args),
        Command::Completions(args) => {
            args.generate();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_predicate(filter: &FilterArgs) -> Result<Predicate> {
    let mut predicate = Predicate::default();
    if let Some(ref pattern) = filter.glob {
        predicate = predicate.with_glob(pattern)?;
    }
    if let Some(ref needle) = filter.path_contains {
        predicate = predicate.with_substring(needle);
    }
    if !filter.extensions.is_empty() {
        predicate = predicate.with_extensions(&filter.extensions);
    }
    Ok(predicate
        .with_size_range(filter.min_size, filter.max_size)
        .with_mtime_range(filter.modified_after, filter.modified_before))
}

fn cmd_search(args: &SearchArgs) -> Result<ExitCode> {
    let index = IndexDb::open(&args.index)?;
    let predicate = build_predicate(&args.filter)?;
    let records = shortlist(&index, &predicate, args.limit)?;

    if args.json {
        let entries: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "path": r.path,
                    "size": r.size,
                    "mtime": r.mtime,
                    "hash": r.content_hash,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(entries));
    } else if args.paths {
        for record in &records {
            println!("{}", record.path);
        }
    } else if records.is_empty() {
        println!("(no matches)");
    } else {
        for record in &records {
            println!("{}\t{} bytes", record.path, record.size);
        }
        println!("\n{} match(es)", records.len());
    }

    Ok(if records.is_empty() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_extract(args: &ExtractArgs) -> Result<ExitCode> {
    let index = IndexDb::open(&args.index)?;
    let archive = ArchiveReader::open(&args.container)?;

    let mut records: Vec<FileRecord> = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let record = index.get_record(path)?.ok_or_else(|| Error::NotFound {
            kind: "file",
            name: path.clone(),
        })?;
        records.push(record);
    }

    let reports = extract_files(&archive, &records, &args.out)?;
    let mut failures = 0usize;
    for report in &reports {
        match &report.status {
            FileStatus::Verified => {
                println!("{} -> {}", report.path, report.output_path.display());
            }
            FileStatus::IntegrityMismatch { expected, actual } => {
                failures += 1;
                eprintln!(
                    "{}: hash mismatch (expected {expected}, got {actual})",
                    report.path
                );
            }
            FileStatus::Failed(e) => {
                failures += 1;
                eprintln!("{}: {e}", report.path);
            }
        }
    }

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn cmd_status(args: &StatusArgs) -> Result<ExitCode> {
    let index = IndexDb::open(&args.index)?;
    let files = index.file_count()?;
    let embeddings = index.embedding_count()?;
    let dimension = index.embedding_dimension()?;
    let container_len = ArchiveReader::open(&args.container)
        .map(|a| a.len())
        .ok();

    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "index": args.index.display().to_string(),
                "files": files,
                "embeddings": embeddings,
                "dimension": dimension,
                "container_bytes": container_len,
            })
        );
    } else {
        println!("Index: {}", args.index.display());
        println!("Files: {files}");
        println!("Embeddings: {embeddings}");
        match dimension {
            Some(d) => println!("Dimension: {d}"),
            None => println!("Dimension: (none)"),
        }
        match container_len {
            Some(len) => println!("Container: {len} bytes"),
            None => println!("Container: (missing)"),
        }
    }
    Ok(ExitCode::SUCCESS)
}
