//! `hostward categories` - List categories, thresholds and probes.

use anyhow::Result;
use colored::Colorize;
use hostward::probes::standard_sets;
use hostward::{Category, ProbeDescriptor, ScorePolicy, Tier};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::output::{print_structured, OutputFormat};

#[derive(Serialize)]
struct CategoryInfo<'a> {
    category: Category,
    title: &'static str,
    policy: ScorePolicy,
    probes: &'a [ProbeDescriptor],
}

#[derive(Tabled)]
struct ProbeRow {
    #[tabled(rename = "Probe")]
    name: &'static str,
    #[tabled(rename = "Tier")]
    tier: &'static str,
    #[tabled(rename = "Weight")]
    weight: String,
    #[tabled(rename = "Unknown")]
    policy: &'static str,
    #[tabled(rename = "Veto")]
    veto: &'static str,
}

pub fn execute(ctx: &Context) -> Result<()> {
    let denylist = ctx.denylist(None)?;
    let sets = standard_sets(&denylist, &ctx.config.assessment.probe_options())?;
    let infos: Vec<CategoryInfo<'_>> = sets
        .iter()
        .map(|set| CategoryInfo {
            category: set.category(),
            title: set.category().title(),
            policy: set.scorer().policy(),
            probes: set.scorer().descriptors(),
        })
        .collect();

    if ctx.output_format != OutputFormat::Pretty {
        return print_structured(ctx.output_format, &infos);
    }

    for info in &infos {
        println!(
            "{} {}  {}",
            info.title.bold(),
            format!("({})", info.category).dimmed(),
            format!(
                "pass >= {}%, fail < {}%",
                info.policy.pass_threshold, info.policy.fail_threshold
            )
            .dimmed()
        );
        let rows: Vec<ProbeRow> = info
            .probes
            .iter()
            .map(|d| ProbeRow {
                name: d.name,
                tier: match d.tier {
                    Tier::Critical => "critical",
                    Tier::Supplementary => "supplementary",
                },
                weight: format!("{:.2}", d.weight),
                policy: d.policy.label(),
                veto: if d.veto { "yes" } else { "" },
            })
            .collect();
        println!("{}", Table::new(&rows).with(Style::rounded()));
        println!();
    }

    Ok(())
}
