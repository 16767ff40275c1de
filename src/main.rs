use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use futures::stream::{self, StreamExt};
use rparsers::{
    cli::{Cli, Commands},
    config::Config,
    display::{DisplayManager, ScanRecord},
    dsl,
    ExtractorSet, FingerprintSet, Response, SimilarityThreshold,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Instant;

/// Read-only state shared by every scan worker
struct ScanContext {
    extractors: ExtractorSet,
    baseline: Option<FingerprintSet>,
    threshold: SimilarityThreshold,
    unique: bool,
    max_response_size: usize,
    meta_sniff_len: usize,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let display = DisplayManager::with_quiet(cli.quiet);

    let config = if let Some(config_path) = &cli.config {
        match Config::load_from_file(&config_path.to_string_lossy()) {
            Ok(config) => {
                display.print_info(&format!(
                    "Loaded configuration from {} ({} extractors)",
                    config_path.display(),
                    config.extractors.len()
                ));
                config
            }
            Err(e) => {
                display.print_warning(&format!("Failed to load configuration: {}, using defaults", e));
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    let start_time = Instant::now();

    let result = match cli.command {
        Commands::Decode { expression } => execute_decode(&expression),
        Commands::Compare { first, second, threshold } => {
            execute_compare(&config, &display, &first, &second, threshold).await
        }
        Commands::Scan { files, baseline, threshold, unique, tag, json, workers } => {
            let options = ScanOptions { baseline, threshold, unique, tag, json, workers };
            execute_scan(&config, &display, files, options).await
        }
    };

    match result {
        Ok(_) => {
            log::info!("Finished in {:.2?}", start_time.elapsed());
        }
        Err(e) => {
            display.print_error(&format!("{:#}", e));
            process::exit(1);
        }
    }
}

fn execute_decode(expression: &str) -> anyhow::Result<()> {
    let decoded = dsl::decode(expression)
        .with_context(|| format!("cannot evaluate '{}'", expression))?;
    if !decoded.applied {
        log::info!("No recognised operator, printing input unchanged");
    }
    println!("{}", decoded.to_string_lossy());
    Ok(())
}

async fn load_response(path: &Path, config: &Config) -> anyhow::Result<Response> {
    let mut raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    raw.truncate(config.engine.max_response_size);
    Ok(Response::from_raw_with(raw, config.engine.meta_sniff_len))
}

async fn execute_compare(
    config: &Config,
    display: &DisplayManager,
    first: &Path,
    second: &Path,
    threshold: Option<u32>,
) -> anyhow::Result<()> {
    let threshold = threshold.map(SimilarityThreshold).unwrap_or_else(|| config.threshold());
    let a = load_response(first, config).await?;
    let b = load_response(second, config).await?;

    display.print_section_header(&format!("{} <-> {}", first.display(), second.display()));
    display.print_distances(&a.fingerprints().compare(&b.fingerprints()), threshold);
    Ok(())
}

struct ScanOptions {
    baseline: Option<PathBuf>,
    threshold: Option<u32>,
    unique: bool,
    tag: Option<String>,
    json: bool,
    workers: Option<usize>,
}

async fn execute_scan(
    config: &Config,
    display: &DisplayManager,
    files: Vec<PathBuf>,
    options: ScanOptions,
) -> anyhow::Result<()> {
    let mut extractors = config.compile_extractors();
    if let Some(tag) = &options.tag {
        extractors = extractors.with_tag(tag);
        display.print_info(&format!("{} extractors tagged '{}'", extractors.len(), tag));
    }
    let failures = extractors.failures().count();
    if failures > 0 {
        display.print_warning(&format!("{} extractor patterns failed to compile and were skipped", failures));
    }

    let baseline = match &options.baseline {
        Some(path) => Some(
            load_response(path, config)
                .await?
                .fingerprints(),
        ),
        None => None,
    };

    let ctx = Arc::new(ScanContext {
        extractors,
        baseline,
        threshold: options.threshold.map(SimilarityThreshold).unwrap_or_else(|| config.threshold()),
        unique: options.unique || config.engine.unique_extract,
        max_response_size: config.engine.max_response_size,
        meta_sniff_len: config.engine.meta_sniff_len,
    });
    let workers = options.workers.unwrap_or(config.engine.workers).max(1);

    let mut results = stream::iter(files)
        .map(|path| {
            let ctx = Arc::clone(&ctx);
            async move {
                let raw = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let source = path.display().to_string();
                tokio::task::spawn_blocking(move || analyze(source, raw, &ctx))
                    .await
                    .context("scan worker panicked")
            }
        })
        .buffer_unordered(workers);

    let (mut scanned, mut soft) = (0usize, 0usize);
    while let Some(result) = results.next().await {
        match result {
            Ok(record) => {
                scanned += 1;
                if record.soft {
                    soft += 1;
                }
                if options.json {
                    println!("{}", serde_json::to_string(&record)?);
                } else {
                    display.print_record(&record);
                }
            }
            Err(e) => display.print_warning(&format!("{:#}", e)),
        }
    }

    if !options.json {
        display.print_success(&format!("Scanned {} responses, {} soft", scanned, soft));
    }
    Ok(())
}

fn analyze(source: String, mut raw: Vec<u8>, ctx: &ScanContext) -> ScanRecord {
    raw.truncate(ctx.max_response_size);
    let response = Response::from_raw_with(raw, ctx.meta_sniff_len);
    let hashes = response.fingerprints();
    let extracts = ctx
        .extractors
        .extract_all(&response.content().body_text(), ctx.unique);

    let distance = ctx.baseline.as_ref().map(|b| hashes.compare(b).body);
    let soft = distance.map_or(false, |d| ctx.threshold.is_near_duplicate(d));

    ScanRecord {
        source,
        title: response.title.clone(),
        server: response.server.clone(),
        language: response.language.clone(),
        charset: response.charset.clone(),
        opaque: response.is_opaque(),
        body_length: response.content().body().len(),
        hashes,
        extracts,
        distance,
        soft,
    }
}
