//! One pass over one configuration: fetch bugs, fetch cards, reconcile,
//! escalate, optionally enrich health links.

use crate::config::{CardScope, Config};
use crate::dispatch::{CardRoute, DispatchReport, Dispatcher, EscalationTemplate, MailRoute, StepOutcome};
use crate::error::Result;
use crate::health::{enrich_description, HealthDashboard, HealthProbe};
use crate::launchpad::{BugSource, LaunchpadClient};
use crate::mail::{Mailer, SmtpMailer};
use crate::reconcile::{matching_cards, unmatched_bugs};
use crate::trello::{BoardSource, TrelloClient};
use crate::types::{BugId, BugMap, Card, UnmatchedSet};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

pub struct Collaborators<'a> {
    pub bugs: &'a dyn BugSource,
    pub board: &'a dyn BoardSource,
    pub mailer: Option<&'a dyn Mailer>,
    pub health: Option<&'a dyn HealthProbe>,
}

/// The network-backed collaborators described by a `Config`.
pub struct LiveClients {
    launchpad: LaunchpadClient,
    trello: TrelloClient,
    smtp: Option<SmtpMailer>,
    health: Option<HealthDashboard>,
}

impl LiveClients {
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.http.timeout();
        let health = if config.health.enabled {
            Some(HealthDashboard::from_config(&config.health, timeout)?)
        } else {
            None
        };
        Ok(Self {
            launchpad: LaunchpadClient::new(&config.tracker.api_base, timeout)?,
            trello: TrelloClient::from_config(&config.board, timeout)?,
            smtp: config
                .email
                .as_ref()
                .map(|email| SmtpMailer::from_config(email, timeout)),
            health,
        })
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            bugs: &self.launchpad,
            board: &self.trello,
            mailer: self.smtp.as_ref().map(|m| m as &dyn Mailer),
            health: self.health.as_ref().map(|h| h as &dyn HealthProbe),
        }
    }
}

// ---------------------------------------------------------------------------
// Options / report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Reconcile only: no mail, no card writes, no health probes.
    pub dry_run: bool,
    pub enrich_health_links: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub project: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardLists {
    pub outage: String,
    pub tech_debt: String,
    pub new: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichOutcome {
    pub card_id: String,
    pub card_name: String,
    pub result: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub open: BugMap,
    pub closed: BugMap,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_failures: Vec<SourceFailure>,
    pub lists: BoardLists,
    pub cards_scanned: usize,
    /// Open bugs with a card, and the names of the cards that mention them.
    pub tracked: BTreeMap<BugId, Vec<String>>,
    pub unmatched: UnmatchedSet,
    pub dispatch: DispatchReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enrichment: Vec<EnrichOutcome>,
}

impl RunReport {
    /// Anything a human has to follow up on.
    pub fn has_failures(&self) -> bool {
        !self.source_failures.is_empty()
            || self.dispatch.has_failures()
            || self.enrichment.iter().any(|e| e.result.is_failed())
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

pub fn execute(config: &Config, collab: &Collaborators<'_>, opts: &RunOptions) -> Result<RunReport> {
    let started_at = Utc::now();

    // Tracker: a failing project is reported, the others still count.
    let mut open = BugMap::new();
    let mut closed = BugMap::new();
    let mut source_failures = Vec::new();
    for project in config.tracked_projects()? {
        match collab.bugs.query_critical_alert_bugs(&project) {
            Ok(snapshot) => {
                open.extend(snapshot.open);
                closed.extend(snapshot.closed);
                source_failures.extend(snapshot.failures.into_iter().map(|f| SourceFailure {
                    project: project.project.clone(),
                    error: format!("{}: {}", f.bug_link, f.error),
                }));
            }
            Err(e) => {
                tracing::warn!(project = %project.project, error = %e, "tracker query failed");
                source_failures.push(SourceFailure {
                    project: project.project.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    // Board: without a complete card list every bug would look unmatched.
    let board = &config.board;
    let lists = BoardLists {
        outage: collab.board.list_id_by_name(&board.board_id, &board.list_outage)?,
        tech_debt: collab.board.list_id_by_name(&board.board_id, &board.list_tech_debt)?,
        new: collab.board.list_id_by_name(&board.board_id, &board.list_new)?,
    };
    let cards: Vec<Card> = match board.scan {
        CardScope::Lists => {
            let mut cards = collab.board.cards_in_list(&lists.outage)?;
            cards.extend(collab.board.cards_in_list(&lists.tech_debt)?);
            cards.extend(collab.board.cards_in_list(&lists.new)?);
            cards
        }
        CardScope::Board => collab.board.cards_on_board(&board.board_id)?,
    };

    let unmatched = unmatched_bugs(&open, &cards);
    let tracked: BTreeMap<BugId, Vec<String>> = matching_cards(&open, &cards)
        .into_iter()
        .map(|(id, names)| (id, names.into_iter().map(str::to_string).collect()))
        .collect();
    tracing::debug!(
        open = open.len(),
        cards = cards.len(),
        unmatched = unmatched.len(),
        "reconciled"
    );

    let template = EscalationTemplate::from_config(config);
    let mut dispatcher = Dispatcher::new(&template);
    if !opts.dry_run {
        if let (Some(email), Some(mailer)) = (&config.email, collab.mailer) {
            dispatcher = dispatcher.with_mail(MailRoute {
                mailer,
                from: email.from.clone(),
                to: email.to.clone(),
            });
        }
        if config.escalation.create_cards {
            dispatcher = dispatcher.with_cards(CardRoute {
                board: collab.board,
                list_id: lists.new.clone(),
            });
        }
        if dispatcher.has_routes() {
            if let Some(probe) = collab.health {
                dispatcher = dispatcher.with_health_probe(probe);
            }
        }
    }
    let dispatch = dispatcher.dispatch(&unmatched, &open);

    let enrichment = match (opts.enrich_health_links, collab.health) {
        (true, Some(probe)) if !opts.dry_run => {
            enrich_cards(collab.board, probe, &config.health.page_base, &cards)
        }
        _ => Vec::new(),
    };

    Ok(RunReport {
        started_at,
        dry_run: opts.dry_run,
        open,
        closed,
        source_failures,
        lists,
        cards_scanned: cards.len(),
        tracked,
        unmatched,
        dispatch,
        enrichment,
    })
}

/// Write health links into the descriptions of cards that lack one.
fn enrich_cards(
    board: &dyn BoardSource,
    probe: &dyn HealthProbe,
    page_base: &str,
    cards: &[Card],
) -> Vec<EnrichOutcome> {
    let mut outcomes = Vec::new();
    for card in cards {
        let Some(desc) = enrich_description(card, probe, page_base) else {
            continue;
        };
        let result = match board.update_card_description(&card.id, &desc) {
            Ok(()) => StepOutcome::Done {
                detail: "health link added".to_string(),
            },
            Err(e) => {
                tracing::warn!(card = %card.id, error = %e, "health link update failed");
                StepOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        outcomes.push(EnrichOutcome {
            card_id: card.id.clone(),
            card_name: card.name.clone(),
            result,
        });
    }
    outcomes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
