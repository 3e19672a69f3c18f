use crate::output::{print_json, print_section, print_table, truncate};
use anyhow::Context;
use critwatch_core::config::{Config, WarnLevel};
use critwatch_core::run::{self, LiveClients, RunOptions, RunReport};
use critwatch_core::types::BugMap;
use std::path::Path;

/// Outcome of one configuration file's run.
pub enum RunStatus {
    Clean,
    /// The run finished but some calls failed and need a human.
    Partial,
}

pub fn run(path: &Path, opts: &RunOptions, json: bool) -> anyhow::Result<RunStatus> {
    let config = Config::load(path).context("failed to load config")?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!(file = %path.display(), "{}", w.message),
            WarnLevel::Error => anyhow::bail!("invalid config: {}", w.message),
        }
    }

    let clients = LiveClients::from_config(&config).context("failed to build API clients")?;
    let report = run::execute(&config, &clients.collaborators(), opts)
        .context("run aborted")?;

    if json {
        print_json(&report)?;
    } else {
        print_report(path, &report);
    }

    Ok(if report.has_failures() {
        RunStatus::Partial
    } else {
        RunStatus::Clean
    })
}

// ---------------------------------------------------------------------------
// Text summary
// ---------------------------------------------------------------------------

fn print_bugs(bugs: &BugMap) {
    if bugs.is_empty() {
        println!("(none)");
        return;
    }
    print_table(
        &["BUG", "STATUS", "TITLE"],
        bugs.bugs()
            .map(|b| vec![b.id.to_string(), b.status.to_string(), truncate(&b.title, 70)])
            .collect(),
    );
}

fn print_report(path: &Path, report: &RunReport) {
    println!("== {}", path.display());
    if report.dry_run {
        println!("(dry run: no emails sent, no cards created)");
    }
    for failure in &report.source_failures {
        println!("tracker query failed for {}: {}", failure.project, failure.error);
    }

    print_section("open critical bugs");
    print_bugs(&report.open);
    print_section("closed critical bugs");
    print_bugs(&report.closed);

    println!(
        "board lists: outage={} tech_debt={} new={} ({} cards scanned)",
        report.lists.outage, report.lists.tech_debt, report.lists.new, report.cards_scanned
    );
    if !report.tracked.is_empty() {
        print_section("tracked on board");
        print_table(
            &["BUG", "CARD"],
            report
                .tracked
                .iter()
                .flat_map(|(id, names)| {
                    names
                        .iter()
                        .map(move |name| vec![id.to_string(), truncate(name, 80)])
                })
                .collect(),
        );
    }
    let unmatched: Vec<String> = report.unmatched.iter().map(|id| id.to_string()).collect();
    println!("critical bugs not tracked on board: [{}]", unmatched.join(", "));

    let dispatch = &report.dispatch;
    if dispatch.no_escalation_required() {
        println!("There are no bugs that require a new escalation");
    } else {
        print_section("escalations");
        if !dispatch.outcomes.is_empty() {
            print_table(
                &["BUG", "EMAIL", "CARD", "SUBJECT"],
                dispatch
                    .outcomes
                    .iter()
                    .map(|o| {
                        vec![
                            o.bug_id.to_string(),
                            o.email.to_string(),
                            o.card.to_string(),
                            truncate(&o.subject, 80),
                        ]
                    })
                    .collect(),
            );
        }
        for id in &dispatch.anomalies {
            println!("bug {id} is unmatched but missing from the open bug set; skipped");
        }
    }

    if !report.enrichment.is_empty() {
        print_section("health links");
        print_table(
            &["CARD", "RESULT", "NAME"],
            report
                .enrichment
                .iter()
                .map(|e| {
                    vec![
                        e.card_id.clone(),
                        e.result.to_string(),
                        truncate(&e.card_name, 70),
                    ]
                })
                .collect(),
        );
    }
    println!();
}
