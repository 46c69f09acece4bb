//! `hostward config` - CLI configuration management.

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::config::Config;
use crate::output::{print_structured, OutputFormat};

pub fn execute(ctx: &Context, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
        ConfigCommands::Show => show_config(ctx),
        ConfigCommands::Init { force } => init_config(ctx, force),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output_format != OutputFormat::Pretty {
        return print_structured(ctx.output_format, &ctx.config);
    }

    let source = if ctx.config_path.exists() {
        ctx.config_path.display().to_string()
    } else {
        format!("{} (not present, using defaults)", ctx.config_path.display())
    };
    println!("{} {}", "Configuration:".bold(), source.dimmed());
    println!();
    print!("{}", toml::to_string_pretty(&ctx.config)?);
    Ok(())
}

fn init_config(ctx: &Context, force: bool) -> Result<()> {
    if ctx.config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists\n\nUse --force to overwrite it.",
            ctx.config_path.display()
        );
    }

    Config::default().save(&ctx.config_path)?;
    println!(
        "{} Wrote defaults to {}.",
        "Success:".green().bold(),
        ctx.config_path.display().to_string().cyan()
    );
    Ok(())
}
