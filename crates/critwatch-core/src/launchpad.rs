//! Bug source backed by the anonymous Launchpad REST API.
//!
//! For each tracked project:
//!   GET <api>/<project>/all_milestones
//!   GET <api>/<project>?ws.op=searchTasks&milestone=…&importance=Critical&tags=alert&status=…
//!   GET <bug_link>                     once per bug, for id/title/tags
//!
//! Collections are paged; every `next_collection_link` is followed.

use crate::config::TrackedProject;
use crate::error::Result;
use crate::http;
use crate::types::{
    Bug, BugId, BugMap, BugSnapshot, BugStatus, FetchFailure, ALERT_TAG, CRITICAL_IMPORTANCE,
};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "launchpad";

/// Supplies the critical, alert-tagged bugs of one tracked project.
pub trait BugSource {
    fn query_critical_alert_bugs(&self, project: &TrackedProject) -> Result<BugSnapshot>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    entries: Vec<T>,
    #[serde(default)]
    next_collection_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Milestone {
    name: String,
    self_link: String,
}

#[derive(Debug, Deserialize)]
struct BugTask {
    status: String,
    importance: String,
    bug_link: String,
}

#[derive(Debug, Deserialize)]
struct LpBug {
    id: u64,
    title: String,
    #[serde(default)]
    tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// LaunchpadClient
// ---------------------------------------------------------------------------

pub struct LaunchpadClient {
    api_base: String,
    client: Client,
}

impl LaunchpadClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: http::client(timeout)?,
        })
    }

    /// Send `first` and keep following `next_collection_link`, gathering the
    /// entries of every page.
    fn fetch_all<T: DeserializeOwned>(&self, first: RequestBuilder) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let mut page: Collection<T> = http::ensure_success(SERVICE, first.send()?)?.json()?;
        loop {
            rows.append(&mut page.entries);
            let Some(next) = page.next_collection_link.take() else {
                break;
            };
            tracing::debug!(url = %next, "fetching next page");
            page = http::ensure_success(SERVICE, self.client.get(&next).send()?)?.json()?;
        }
        Ok(rows)
    }

    fn milestones(&self, project: &str) -> Result<Vec<Milestone>> {
        let url = http::join_url(&self.api_base, &format!("{project}/all_milestones"));
        tracing::debug!(%url, "fetching milestones");
        self.fetch_all(self.client.get(&url))
    }

    fn search_tasks(
        &self,
        project: &str,
        milestone: &Milestone,
        statuses: &[BugStatus],
    ) -> Result<Vec<BugTask>> {
        let url = http::join_url(&self.api_base, project);
        let mut query: Vec<(&str, &str)> = vec![
            ("ws.op", "searchTasks"),
            ("milestone", milestone.self_link.as_str()),
            ("importance", CRITICAL_IMPORTANCE),
            ("tags", ALERT_TAG),
        ];
        query.extend(statuses.iter().map(|s| ("status", s.as_str())));
        tracing::debug!(%url, milestone = %milestone.name, "searching bug tasks");
        self.fetch_all(self.client.get(&url).query(&query))
    }

    fn bug(&self, bug_link: &str) -> Result<LpBug> {
        tracing::debug!(url = %bug_link, "fetching bug");
        let resp = http::ensure_success(SERVICE, self.client.get(bug_link).send()?)?;
        Ok(resp.json()?)
    }

    /// Resolve every task to a `Bug` and add it to `into`. A bug whose details
    /// cannot be fetched is recorded in `failures` and the rest still count.
    fn collect(&self, tasks: Vec<BugTask>, into: &mut BugMap, failures: &mut Vec<FetchFailure>) {
        for task in tasks {
            let status: BugStatus = match task.status.parse() {
                Ok(s) => s,
                Err(reason) => {
                    tracing::warn!(bug_link = %task.bug_link, %reason, "skipping task");
                    continue;
                }
            };
            let lp = match self.bug(&task.bug_link) {
                Ok(lp) => lp,
                Err(e) => {
                    tracing::warn!(bug_link = %task.bug_link, error = %e, "bug fetch failed");
                    failures.push(FetchFailure {
                        bug_link: task.bug_link,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            let bug = Bug {
                id: BugId(lp.id),
                title: lp.title,
                status,
                importance: task.importance,
                tags: lp.tags.into_iter().collect(),
            };
            if bug.is_in_scope() {
                into.insert(bug);
            }
        }
    }
}

impl BugSource for LaunchpadClient {
    fn query_critical_alert_bugs(&self, project: &TrackedProject) -> Result<BugSnapshot> {
        let mut snapshot = BugSnapshot::default();
        for milestone in self.milestones(&project.project)? {
            if !project.matches_milestone(&milestone.name) {
                continue;
            }
            let open = self.search_tasks(&project.project, &milestone, &BugStatus::OPEN)?;
            self.collect(open, &mut snapshot.open, &mut snapshot.failures);
            let closed = self.search_tasks(&project.project, &milestone, &BugStatus::CLOSED)?;
            self.collect(closed, &mut snapshot.closed, &mut snapshot.failures);
        }
        tracing::debug!(
            project = %project.project,
            open = snapshot.open.len(),
            closed = snapshot.closed.len(),
            failures = snapshot.failures.len(),
            "tracker query complete"
        );
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
