//! Escalation of unmatched bugs: one mail and one card per bug per call.
//!
//! Every bug is handled on its own. A failed mail does not stop the card,
//! and a failure for one bug does not touch the others. Nothing is
//! remembered between calls, so dispatching the same set twice escalates
//! twice. A persisted dedupe store keyed by bug id would slot in here.

use crate::config::Config;
use crate::health::{health_link, HealthProbe};
use crate::mail::{Mailer, OutgoingMail};
use crate::trello::BoardSource;
use crate::types::{Bug, BugId, BugMap, UnmatchedSet};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Template / action
// ---------------------------------------------------------------------------

pub const SUBJECT_PREFIX: &str = "[CIX][LP:";

#[derive(Debug, Clone)]
pub struct EscalationTemplate {
    pub subject_tags: String,
    pub bug_url_base: String,
    pub body_intro: String,
    pub health_page_base: String,
}

impl EscalationTemplate {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            subject_tags: cfg.escalation.subject_tags.clone(),
            bug_url_base: cfg.escalation.bug_url_base.clone(),
            body_intro: cfg.escalation.body_intro.clone(),
            health_page_base: cfg.health.page_base.clone(),
        }
    }
}

/// Rendered escalation for a single bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationAction {
    pub bug_id: BugId,
    pub title: String,
    pub subject: String,
    pub body: String,
}

impl EscalationAction {
    pub fn render(bug: &Bug, template: &EscalationTemplate, with_health_link: bool) -> Self {
        let id = bug.id.to_string();
        let subject = format!(
            "{SUBJECT_PREFIX}{id}]{} {}",
            template.subject_tags, bug.title
        );
        let mut body = format!("{} {}{id}", template.body_intro, template.bug_url_base);
        if with_health_link {
            body.push('\n');
            body.push_str(&health_link(&template.health_page_base, &id));
        }
        Self {
            bug_id: bug.id,
            title: bug.title.clone(),
            subject,
            body,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepOutcome {
    Done { detail: String },
    Failed { reason: String },
    /// The route is not configured (or this is a dry run).
    Skipped,
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Done { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepOutcome::Done { detail } => write!(f, "ok ({detail})"),
            StepOutcome::Failed { reason } => write!(f, "FAILED: {reason}"),
            StepOutcome::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EscalationOutcome {
    pub bug_id: BugId,
    pub subject: String,
    pub email: StepOutcome,
    pub card: StepOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<EscalationOutcome>,
    /// Unmatched ids that were missing from the open bug map.
    pub anomalies: Vec<BugId>,
}

impl DispatchReport {
    pub fn no_escalation_required(&self) -> bool {
        self.outcomes.is_empty() && self.anomalies.is_empty()
    }

    pub fn emails_sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.email.is_done()).count()
    }

    pub fn cards_created(&self) -> usize {
        self.outcomes.iter().filter(|o| o.card.is_done()).count()
    }

    pub fn has_failures(&self) -> bool {
        !self.anomalies.is_empty()
            || self
                .outcomes
                .iter()
                .any(|o| o.email.is_failed() || o.card.is_failed())
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct MailRoute<'a> {
    pub mailer: &'a dyn Mailer,
    pub from: String,
    pub to: Vec<String>,
}

pub struct CardRoute<'a> {
    pub board: &'a dyn BoardSource,
    pub list_id: String,
}

pub struct Dispatcher<'a> {
    template: &'a EscalationTemplate,
    mail: Option<MailRoute<'a>>,
    cards: Option<CardRoute<'a>>,
    probe: Option<&'a dyn HealthProbe>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(template: &'a EscalationTemplate) -> Self {
        Self {
            template,
            mail: None,
            cards: None,
            probe: None,
        }
    }

    pub fn with_mail(mut self, route: MailRoute<'a>) -> Self {
        self.mail = Some(route);
        self
    }

    pub fn with_cards(mut self, route: CardRoute<'a>) -> Self {
        self.cards = Some(route);
        self
    }

    pub fn with_health_probe(mut self, probe: &'a dyn HealthProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Whether any escalation route (mail or card) is attached.
    pub fn has_routes(&self) -> bool {
        self.mail.is_some() || self.cards.is_some()
    }

    /// Escalate every id in `unmatched`. An empty set does no I/O.
    pub fn dispatch(&self, unmatched: &UnmatchedSet, open: &BugMap) -> DispatchReport {
        let mut report = DispatchReport::default();
        for &id in unmatched {
            let Some(bug) = open.get(id) else {
                tracing::warn!(bug = %id, "unmatched bug missing from open set; skipping");
                report.anomalies.push(id);
                continue;
            };
            report.outcomes.push(self.escalate(bug));
        }
        report
    }

    fn escalate(&self, bug: &Bug) -> EscalationOutcome {
        let with_health_link = self
            .probe
            .is_some_and(|p| p.page_exists(&bug.id.to_string()));
        let action = EscalationAction::render(bug, self.template, with_health_link);

        let email = match &self.mail {
            None => StepOutcome::Skipped,
            Some(route) => {
                let mail = OutgoingMail {
                    from: route.from.clone(),
                    to: route.to.clone(),
                    subject: action.subject.clone(),
                    body: action.body.clone(),
                };
                match route.mailer.send(&mail) {
                    Ok(()) => {
                        tracing::info!(bug = %bug.id, to = %route.to.join(","), "escalation email sent");
                        StepOutcome::Done {
                            detail: format!("sent to {}", route.to.join(", ")),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(bug = %bug.id, error = %e, "escalation email failed");
                        StepOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            }
        };

        let card = match &self.cards {
            None => StepOutcome::Skipped,
            Some(route) => match route
                .board
                .create_card(&route.list_id, &action.subject, &action.body)
            {
                Ok(card) => {
                    tracing::info!(bug = %bug.id, card = %card.id, "escalation card created");
                    StepOutcome::Done {
                        detail: format!("card {}", card.id),
                    }
                }
                Err(e) => {
                    tracing::warn!(bug = %bug.id, error = %e, "escalation card failed");
                    StepOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            },
        };

        EscalationOutcome {
            bug_id: action.bug_id,
            subject: action.subject,
            email,
            card,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
