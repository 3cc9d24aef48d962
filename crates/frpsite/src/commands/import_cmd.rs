//! Batch import: JSON site list → registry, with a duplicate policy.
//!
//! The file is an already-mapped `Site[]` -- column mapping belongs to
//! whatever produced it.

use owo_colors::OwoColorize;

use frpsite_core::{DuplicateCheckReport, ImportFailure};

use crate::cli::{DuplicatePolicy, GlobalOpts, ImportArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(args: ImportArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let sites = util::read_sites_file(&args.file)?;
    let total = sites.len();
    let mut session = util::open_loaded(global).await?;

    let report = match args.on_duplicate {
        DuplicatePolicy::Report => session.registry.import_with_duplicate_check(sites),
        DuplicatePolicy::Skip => {
            let r = session.registry.import_with_overwrite(sites, false);
            DuplicateCheckReport {
                success_count: r.success_count,
                errors: r.errors,
                duplicates: Vec::new(),
            }
        }
        DuplicatePolicy::Overwrite => {
            let r = session.registry.import_with_overwrite(sites, true);
            DuplicateCheckReport {
                success_count: r.success_count + r.overwritten_count,
                errors: r.errors,
                duplicates: Vec::new(),
            }
        }
        DuplicatePolicy::Fail => {
            let r = session.registry.import_sites(sites);
            DuplicateCheckReport {
                success_count: r.success_count,
                errors: r.errors,
                duplicates: Vec::new(),
            }
        }
    };

    if report.success_count > 0 {
        session.save().await?;
    }

    print_report(total, &report, global);
    Ok(())
}

fn print_report(total: usize, report: &DuplicateCheckReport, global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    let color = output::should_color(&global.color);

    eprintln!("Imported {}/{total} sites", report.success_count);

    if !report.duplicates.is_empty() {
        let macs: Vec<String> = report
            .duplicates
            .iter()
            .map(|site| site.mac().to_string())
            .collect();
        let line = format!(
            "Skipped {} existing: {} (re-run with --on-duplicate overwrite to replace)",
            macs.len(),
            macs.join(", ")
        );
        if color {
            eprintln!("{}", line.yellow());
        } else {
            eprintln!("{line}");
        }
    }

    for ImportFailure { mac, error } in &report.errors {
        let line = format!("{mac}: {error}");
        if color {
            eprintln!("{}", line.red());
        } else {
            eprintln!("{line}");
        }
    }
}
