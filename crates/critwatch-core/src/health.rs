//! Health-dashboard links for escalation cards.
//!
//! The dashboard publishes one YAML descriptor per bug id; when the
//! descriptor exists the bug has a page at `<page_base>#<id>`.

use crate::config::HealthConfig;
use crate::error::Result;
use crate::http;
use crate::types::Card;
use regex::Regex;
use reqwest::blocking::Client;
use std::sync::OnceLock;
use std::time::Duration;

pub trait HealthProbe {
    /// Whether a dashboard page exists for `bug_id`. Failures count as "no".
    fn page_exists(&self, bug_id: &str) -> bool;
}

pub struct HealthDashboard {
    descriptor_base: String,
    client: Client,
}

impl HealthDashboard {
    pub fn new(descriptor_base: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            descriptor_base: descriptor_base.into(),
            client: http::client(timeout)?,
        })
    }

    pub fn from_config(health: &HealthConfig, timeout: Duration) -> Result<Self> {
        Self::new(&health.descriptor_base, timeout)
    }
}

impl HealthProbe for HealthDashboard {
    fn page_exists(&self, bug_id: &str) -> bool {
        let url = http::join_url(&self.descriptor_base, &format!("{bug_id}.yaml"));
        match self.client.get(&url).send() {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(%url, error = %e, "health probe failed");
                false
            }
        }
    }
}

static CARD_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn card_name_re() -> &'static Regex {
    CARD_NAME_RE.get_or_init(|| Regex::new(r"^\[CIX\]\[LP:(.*?)\]").unwrap())
}

/// Bug id from a card named `[CIX][LP:<id>]…`.
pub fn extract_bug_id(card_name: &str) -> Option<&str> {
    card_name_re()
        .captures(card_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn has_health_link(desc: &str, page_base: &str) -> bool {
    desc.contains(page_base)
}

pub fn health_link(page_base: &str, bug_id: &str) -> String {
    format!("{page_base}#{bug_id}")
}

/// The card's description with the health link appended, or `None` when
/// there is nothing to change.
pub fn enrich_description(card: &Card, probe: &dyn HealthProbe, page_base: &str) -> Option<String> {
    let bug_id = extract_bug_id(&card.name)?;
    if has_health_link(&card.desc, page_base) {
        return None;
    }
    if !probe.page_exists(bug_id) {
        return None;
    }
    Some(format!("{}\n{}", card.desc, health_link(page_base, bug_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const BASE: &str = "http://health.sbarnea.com/";

    struct FixedProbe {
        exists: bool,
        calls: Cell<usize>,
    }

    impl FixedProbe {
        fn new(exists: bool) -> Self {
            Self {
                exists,
                calls: Cell::new(0),
            }
        }
    }

    impl HealthProbe for FixedProbe {
        fn page_exists(&self, _bug_id: &str) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.exists
        }
    }

    #[test]
    fn extract_bug_id_from_prefixed_name() {
        assert_eq!(extract_bug_id("[CIX][LP:1680259] x"), Some("1680259"));
        assert_eq!(extract_bug_id("Outage 1680259"), None);
        assert_eq!(extract_bug_id(" [CIX][LP:1] leading space"), None);
    }

    #[test]
    fn enrich_appends_link_once() {
        let probe = FixedProbe::new(true);
        let mut card = Card::new("c1", "[CIX][LP:1680259] x");
        card.desc = "original".to_string();

        let enriched = enrich_description(&card, &probe, BASE).unwrap();
        assert_eq!(enriched, "original\nhttp://health.sbarnea.com/#1680259");

        card.desc = enriched;
        assert_eq!(enrich_description(&card, &probe, BASE), None);
    }

    #[test]
    fn enrich_skips_when_no_page() {
        let probe = FixedProbe::new(false);
        let card = Card::new("c1", "[CIX][LP:42] x");
        assert_eq!(enrich_description(&card, &probe, BASE), None);
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn enrich_ignores_cards_without_bug_id() {
        let probe = FixedProbe::new(true);
        let card = Card::new("c1", "tech debt: rotate logs");
        assert_eq!(enrich_description(&card, &probe, BASE), None);
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn dashboard_probe_checks_descriptor() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/elastic-recheck/1680259.yaml")
            .with_status(200)
            .with_body("id: 1680259\n")
            .create();
        server
            .mock("GET", "/elastic-recheck/42.yaml")
            .with_status(404)
            .create();
        let probe = HealthDashboard::new(
            format!("{}/elastic-recheck/", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(probe.page_exists("1680259"));
        assert!(!probe.page_exists("42"));
    }

    #[test]
    fn dashboard_probe_treats_transport_error_as_missing() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let probe =
            HealthDashboard::new(format!("http://127.0.0.1:{port}/"), Duration::from_secs(2))
                .unwrap();
        assert!(!probe.page_exists("1"));
    }
}
