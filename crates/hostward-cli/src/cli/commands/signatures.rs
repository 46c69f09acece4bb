//! `hostward signatures` - Show the signature denylist.

use anyhow::Result;
use colored::Colorize;
use hostward::SignatureEntry;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::cli::args::SignaturesArgs;
use crate::output::{print_structured, OutputFormat};

#[derive(Serialize)]
struct Listing<'a> {
    version: &'a str,
    digest: &'a str,
    entries: Vec<&'a SignatureEntry>,
}

#[derive(Tabled)]
struct EntryRow<'a> {
    #[tabled(rename = "Identifier")]
    identifier: &'a str,
    #[tabled(rename = "Class")]
    category: &'a str,
}

pub fn execute(ctx: &Context, args: &SignaturesArgs) -> Result<()> {
    let denylist = ctx.denylist(args.denylist.as_deref())?;
    let entries: Vec<&SignatureEntry> = match &args.category {
        Some(class) => denylist.in_category(class).collect(),
        None => denylist.entries().iter().collect(),
    };

    if ctx.output_format != OutputFormat::Pretty {
        return print_structured(
            ctx.output_format,
            &Listing {
                version: denylist.version(),
                digest: denylist.digest(),
                entries,
            },
        );
    }

    println!("{} {}", "Version:".bold(), denylist.version().cyan());
    println!("{} {}", "SHA-256:".bold(), denylist.digest().dimmed());
    println!(
        "{} {} of {}",
        "Entries:".bold(),
        entries.len(),
        denylist.len()
    );
    println!();

    if entries.is_empty() {
        println!("{}", "No entries match.".dimmed());
        return Ok(());
    }
    let rows: Vec<EntryRow<'_>> = entries
        .iter()
        .map(|e| EntryRow {
            identifier: &e.identifier,
            category: &e.category,
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));

    Ok(())
}
