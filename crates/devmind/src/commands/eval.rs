//! Eval command - score the evaluation log and write a report.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use devmind_agent::{EvaluationReport, EvaluationSummary, Metric, RagJudge, read_records};

use super::Context;
use crate::setup;

/// Report file written next to the log when `--report` is absent.
const REPORT_FILE: &str = "report.csv";

/// Arguments for the eval command.
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Evaluation log to read (defaults to the configured evaluation_log)
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// CSV report path (defaults to report.csv next to the log)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Only summarize the log, without LLM scoring
    #[arg(long)]
    pub no_judge: bool,

    /// Print the results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    summary: &'a EvaluationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a EvaluationReport>,
}

/// Run the eval command.
pub async fn run(args: EvalArgs, ctx: &Context) -> Result<()> {
    let path = args.log.unwrap_or_else(|| ctx.config.paths().evaluation_log);
    let records = read_records(&path)
        .with_context(|| format!("Failed to read evaluation log {}", path.display()))?;
    let summary = EvaluationSummary::from_records(&records);

    let report = if args.no_judge || records.is_empty() {
        None
    } else {
        let judge = RagJudge::new(setup::backend(&ctx.config)?, ctx.config.llm().model);
        let bar = if args.json {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(records.len() as u64)
        };
        bar.set_style(
            ProgressStyle::with_template("{spinner} Scoring [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        let report = judge.evaluate(&records, |_, _| bar.inc(1)).await;
        bar.finish_and_clear();

        let report_path = args
            .report
            .unwrap_or_else(|| default_report_path(&path));
        report
            .write_csv(&report_path)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
        Some((report, report_path))
    };

    if args.json {
        let output = JsonOutput {
            summary: &summary,
            report: report.as_ref().map(|(r, _)| r),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style(format!("Evaluation log: {}", path.display())).bold());
    println!("{}", dim.apply_to("─".repeat(40)));

    if summary.records == 0 {
        println!("Dataset is empty.");
        return Ok(());
    }

    println!("  Records:              {}", summary.records);
    println!("  Turns with contexts:  {}", summary.with_contexts);
    println!("  Avg contexts / turn:  {:.2}", summary.average_contexts());
    println!("  With ground truth:    {}", summary.with_ground_truth);
    if let (Some(first), Some(last)) = (&summary.first_timestamp, &summary.last_timestamp) {
        println!("  First record:         {}", first);
        println!("  Last record:          {}", last);
    }

    if let Some((report, report_path)) = &report {
        println!();
        println!("{}", style("Scores").bold());
        for metric in Metric::ALL {
            println!(
                "  {:<20}  {}  {}",
                metric.as_str(),
                format_score(report.mean(metric)),
                dim.apply_to(format!("({} scored)", report.scored(metric)))
            );
        }
        println!("  Report saved to {}", report_path.display());
    }

    if ctx.verbose {
        println!();
        for (i, record) in records.iter().enumerate() {
            println!(
                "{} {} {}",
                dim.apply_to(format!("{:>4}.", i + 1)),
                record.question,
                dim.apply_to(format!("({} contexts)", record.contexts.len()))
            );
        }
    }
    Ok(())
}

fn default_report_path(log: &Path) -> PathBuf {
    log.parent()
        .map(|dir| dir.join(REPORT_FILE))
        .unwrap_or_else(|| PathBuf::from(REPORT_FILE))
}

fn format_score(score: Option<f64>) -> String {
    match score {
        Some(score) => format!("{:.3}", score),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lands_next_to_log() {
        assert_eq!(
            default_report_path(Path::new("data/evaluation/ragas_dataset.jsonl")),
            PathBuf::from("data/evaluation/report.csv")
        );
        assert_eq!(
            default_report_path(Path::new("eval.jsonl")),
            PathBuf::from("report.csv")
        );
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(Some(0.8333333)), "0.833");
        assert_eq!(format_score(None), "n/a");
    }
}
