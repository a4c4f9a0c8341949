//! Preflight command: check that a run can start.

use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use relmetrics_core::config::Config;
use relmetrics_core::preflight;
use relmetrics_core::tools::Tool;

/// Arguments for the `preflight` subcommand.
#[derive(Args, Debug)]
pub struct PreflightArgs {
    /// Tool whose requirements are checked
    #[arg(value_enum)]
    pub tool: Tool,
}

/// Run preflight checks and display results.
#[instrument(name = "cmd_preflight", skip_all, fields(json_output, tool = %args.tool))]
pub fn cmd_preflight(args: PreflightArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing preflight command");

    let report = preflight::run_preflight(config, args.tool);

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format!("Preflight Checks ({})", args.tool).bold().underline());
        println!();

        for check in &report.checks {
            super::print_check(check.passed, &check.name, &check.message);
        }

        println!();
        if report.all_passed {
            println!("  {}", "Ready to analyze.".green().bold());
        } else {
            let failed = report.failures().len();
            println!(
                "  {}; fix the issues above before analyzing",
                format!("{failed} check(s) failed").red().bold(),
            );
        }
    }

    if report.all_passed {
        Ok(())
    } else {
        Err(anyhow::anyhow!("preflight checks failed"))
    }
}
