//! CLI run handler: merge config file and flags, run the chosen strategies, print the results.

use anyhow::{Context, Result};
use colored::Colorize;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;

use crate::engine::arg_parser::Cli;
use crate::engine::bench::{Timings, run_repeated};
use crate::engine::tools::{format_secs, format_size};
use crate::engine::tree_view::render_tree;
use crate::pipeline::CancelToken;
use crate::utils::{apply_file_to_opts, load_treesum_toml, secs_to_duration, setup_logging};
use crate::{AggregateReport, Opts, ReducerKind, StrategyChoice, aggregate_with};

/// Overwrite opts field from a CLI flag when it was given.
macro_rules! apply_cli_opt {
    ($cli:expr, $opts:expr, $field:ident) => {
        if let Some(v) = $cli.$field {
            $opts.$field = v;
        }
    };
}

/// Defaults, then `.treesum.toml` in DIR, then flags.
fn setup_opts(cli: &Cli) -> Result<Opts> {
    let mut opts = Opts::default();
    if let Some(file) = load_treesum_toml(&cli.dir)? {
        apply_file_to_opts(&file, &mut opts)?;
    }
    apply_cli_opt!(cli, opts, strategy);
    apply_cli_opt!(cli, opts, reducer);
    apply_cli_opt!(cli, opts, repeat);
    apply_cli_opt!(cli, opts, tree);
    apply_cli_opt!(cli, opts, json);
    apply_cli_opt!(cli, opts, list_errors);
    apply_cli_opt!(cli, opts, verbose);
    if cli.threads.is_some() {
        opts.threads = cli.threads;
    }
    if let Some(t) = cli.timeout {
        opts.timeout = Some(secs_to_duration("--timeout", t)?);
    }
    if let Some(t) = cli.task_timeout {
        opts.task_timeout = secs_to_duration("--task-timeout", t)?;
    }
    Ok(opts)
}

/// Ctrl+C cancels the running aggregation instead of killing the process.
fn install_interrupt_handler() -> CancelToken {
    let token = CancelToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("Ctrl+C handler not installed: {}", e);
    }
    token
}

/// One strategy's outcome over all its repeats.
#[derive(Serialize)]
struct StrategyRun {
    report: AggregateReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    timings: Option<Timings>,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    root: &'a Path,
    runs: &'a [StrategyRun],
    totals_agree: bool,
}

/// Aggregate DIR with every strategy the options select and print the results.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli)?;
    setup_logging(opts.verbose);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );

    if opts.tree {
        print!("{}", render_tree(&cli.dir));
    }

    let cancel = install_interrupt_handler();
    let mut runs = Vec::new();
    for kind in opts.strategy.kinds() {
        let aggregate_opts = opts.aggregate_opts(kind, Some(cancel.clone()));
        let (report, timings) = run_repeated(opts.repeat, || {
            aggregate_with(&cli.dir, &aggregate_opts).map(|r| {
                let elapsed = r.elapsed;
                (r, elapsed)
            })
        })
        .with_context(|| format!("{} on {}", kind, cli.dir.display()))?;
        runs.push(StrategyRun {
            report,
            timings: (timings.runs > 1).then_some(timings),
        });
    }

    let totals_agree = runs
        .windows(2)
        .all(|w| w[0].report.total == w[1].report.total);

    if opts.json {
        let out = JsonOutput {
            root: &cli.dir,
            runs: &runs,
            totals_agree,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("serialize report")?
        );
    } else {
        for run in &runs {
            print_run(run, opts.reducer);
        }
    }

    if opts.list_errors
        && let Some(first) = runs.first()
    {
        print_errors(&first.report);
    }

    if matches!(opts.strategy, StrategyChoice::All) {
        if totals_agree {
            info!("All {} strategies agree", runs.len());
        } else {
            warn!("Strategies returned different totals; the tree may have changed during the runs");
        }
    }
    Ok(())
}

fn print_run(run: &StrategyRun, reducer: ReducerKind) {
    let r = &run.report;
    let total = match reducer {
        ReducerKind::Bytes => format!("{} ({})", r.total, format_size(r.total)),
        ReducerKind::Count | ReducerKind::Digest => r.total.to_string(),
    };
    let errors = if r.error_count > 0 {
        format!("errors: {}", r.error_count).yellow()
    } else {
        "errors: 0".normal()
    };
    println!(
        "{:<17} {}: {} | files: {} | dirs: {} | {} | threads: {} | {}",
        r.strategy.name().cyan().bold(),
        r.reducer,
        total.green(),
        r.stats.files,
        r.stats.directories,
        errors,
        r.parallelism,
        format_secs(r.elapsed)
    );
    if let Some(t) = run.timings {
        println!(
            "{:<17} runs: {} | min: {} | max: {} | avg: {}",
            "",
            t.runs,
            format_secs(t.min),
            format_secs(t.max),
            format_secs(t.avg)
        );
    }
}

fn print_errors(report: &AggregateReport) {
    if report.errors.is_empty() {
        return;
    }
    eprintln!("{}", "Skipped:".yellow());
    for e in &report.errors {
        eprintln!("  {}", e);
    }
    let unlisted = report.error_count.saturating_sub(report.errors.len());
    if unlisted > 0 {
        eprintln!("  ... and {} more", unlisted);
    }
}
