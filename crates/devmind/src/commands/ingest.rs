//! Ingest command - load a documentation tree into the knowledge base.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use indicatif::{ProgressBar, ProgressStyle};

use devmind_agent::{FileOutcome, IngestReport, Ingestor};

use super::Context;
use crate::setup;

/// Arguments for the ingest command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Documentation root (defaults to the configured docs_source)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// File extension to include; repeat for several (defaults to the configured list)
    #[arg(long)]
    pub ext: Vec<String>,
}

/// Run the ingest command.
pub async fn run(args: IngestArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let source = args.source.unwrap_or_else(|| config.paths().docs_source);
    let extensions = if args.ext.is_empty() {
        config.ingest().extensions
    } else {
        args.ext
    };

    let store = setup::open_store(config)?;
    let embedder = setup::embedder(config)?;
    let ingestor = Ingestor::new(store, embedder)
        .with_chunker(setup::chunker(config)?)
        .with_collection(config.storage().collection)
        .with_extensions(&extensions);

    println!(
        "Ingesting {} from {}",
        style(extensions.join(", ")).cyan(),
        style(source.display()).cyan()
    );

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {wide_msg}")?
            .progress_chars("=> "),
    );

    let verbose = ctx.verbose;
    let report = ingestor
        .run_with_progress(&source, |progress| {
            bar.set_length(progress.total as u64);
            bar.set_message(progress.path.display().to_string());
            match progress.outcome {
                FileOutcome::Failed { error } => {
                    bar.println(format!(
                        "{} {}: {}",
                        style("failed").red(),
                        progress.path.display(),
                        error
                    ));
                }
                FileOutcome::NoEmbeddings { skipped_chunks } => {
                    bar.println(format!(
                        "{} {}: no chunk could be embedded ({} skipped)",
                        style("skipped").yellow(),
                        progress.path.display(),
                        skipped_chunks
                    ));
                }
                FileOutcome::Ingested { chunks, .. } if verbose => {
                    bar.println(format!("{} chunks  {}", chunks, progress.path.display()));
                }
                _ => {}
            }
            bar.inc(1);
        })
        .await;
    bar.finish_and_clear();

    let report = report?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &IngestReport) {
    let dim = Style::new().dim();

    if report.files_found == 0 {
        println!("{}", dim.apply_to("No matching documents found."));
        return;
    }

    println!();
    println!("{}", style("Ingestion complete").bold().green());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  Files found:     {}", report.files_found);
    println!("  Files ingested:  {}", report.files_ingested);
    println!("  Empty files:     {}", report.files_empty);
    println!("  Failed files:    {}", report.files_failed);
    println!("  Chunks written:  {}", report.chunks_written);
    println!("  Chunks skipped:  {}", report.chunks_skipped);
    match report.total_in_store {
        Some(total) => println!("  Total in store:  {}", total),
        None => println!("  Total in store:  {}", dim.apply_to("unknown")),
    }
}
