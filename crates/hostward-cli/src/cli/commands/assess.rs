//! `hostward assess` - Run category assessments.

use anyhow::{Context as _, Result};
use colored::Colorize;
use futures_util::future::join_all;
use futures_util::StreamExt;
use hostward::{AssessmentResult, Category, Classification, Orchestrator};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::cli::args::AssessArgs;
use crate::output::{exit_code, print_structured, verdict, OutputFormat, Report};

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Passed")]
    passed: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Warnings")]
    warnings: usize,
}

pub async fn execute(ctx: Context, args: AssessArgs) -> Result<ExitCode> {
    let denylist = ctx.denylist(args.denylist.as_deref())?;
    let mut config = ctx.config.assessment.clone();
    if args.sequential {
        config.concurrent = false;
    }

    let orchestrator = Orchestrator::builder()
        .denylist(Arc::clone(&denylist))
        .config(config)
        .build()?;
    let categories = args.selected();

    let results = match ctx.output_format {
        OutputFormat::Pretty => with_progress(&orchestrator, &categories).await?,
        _ => orchestrator.assess_many(&categories).await?,
    };
    let report = Report::new(denylist.version(), results);

    match ctx.output_format {
        OutputFormat::Pretty => print_pretty(&report),
        format => print_structured(format, &report)?,
    }

    Ok(exit_code(report.worst()))
}

/// Assess categories concurrently with one spinner each.
async fn with_progress(
    orchestrator: &Orchestrator,
    categories: &[Category],
) -> Result<Vec<AssessmentResult>> {
    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:<10.bold} {pos}/{len} {wide_msg}")?
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");

    let runs = categories.iter().map(|&category| {
        let bar = multi.add(ProgressBar::new(0));
        bar.set_style(style.clone());
        bar.set_prefix(category.title());
        bar.enable_steady_tick(Duration::from_millis(100));
        track(orchestrator, category, bar)
    });

    join_all(runs).await.into_iter().collect()
}

async fn track(
    orchestrator: &Orchestrator,
    category: Category,
    bar: ProgressBar,
) -> Result<AssessmentResult> {
    let mut stream = orchestrator.assess(category)?;
    let mut last = None;

    while let Some(state) = stream.next().await {
        bar.set_length(state.total as u64);
        bar.set_position(state.completed as u64);
        if let Some(stage) = &state.stage {
            bar.set_message(stage.clone());
        }
        if let Some(result) = state.into_result() {
            bar.finish_with_message(format!(
                "{} {}%",
                verdict(result.classification),
                result.score_percent
            ));
            last = Some(result);
        }
    }

    last.with_context(|| format!("{category} assessment ended without a verdict"))
}

fn print_pretty(report: &Report) {
    println!();
    println!("{} {}", "Host:".bold(), report.node_id.cyan());
    println!(
        "{} {}",
        "Denylist:".bold(),
        report.denylist_version.dimmed()
    );
    println!();

    let rows: Vec<ResultRow> = report
        .results
        .iter()
        .map(|r| ResultRow {
            category: r.category.title().to_string(),
            verdict: verdict(r.classification).to_string(),
            score: format!("{}%", r.score_percent),
            passed: r.passed_outcomes.len(),
            failed: r.failed_outcomes.len(),
            warnings: r.warnings.len(),
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");

    for result in &report.results {
        if result.classification == Classification::Passed {
            continue;
        }
        println!();
        println!(
            "{} {}",
            verdict(result.classification),
            result.category.title().bold()
        );
        for outcome in &result.failed_outcomes {
            let marker = if outcome.veto { "!!".red().bold() } else { "x".red() };
            println!("  {marker} {}: {}", outcome.name.bold(), outcome.evidence);
            if let Some(error) = &outcome.error {
                println!("      {}", error.dimmed());
            }
        }
        for line in result.recommendation.lines() {
            println!("  {}", line.yellow());
        }
    }

    println!();
    println!("{} {}", "Overall:".bold(), verdict(report.worst()));
}
