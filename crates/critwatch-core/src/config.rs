use crate::error::{CritwatchError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// TrackerConfig / TrackedProject
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_launchpad_api")]
    pub api_base: String,
    /// label → `"projectName,milestoneRegex"`
    #[serde(default)]
    pub projects: BTreeMap<String, String>,
}

fn default_launchpad_api() -> String {
    "https://api.launchpad.net/devel".to_string()
}

/// A tracker project plus the milestone filter its bugs are searched under.
#[derive(Debug, Clone)]
pub struct TrackedProject {
    pub label: String,
    pub project: String,
    milestone_pattern: Regex,
}

impl TrackedProject {
    /// Parse a `projectName,milestoneRegex` entry. The pattern only has to
    /// match at the start of a milestone name.
    pub fn parse(label: &str, entry: &str) -> Result<Self> {
        let invalid = |reason: &str| CritwatchError::InvalidProject {
            label: label.to_string(),
            reason: reason.to_string(),
        };
        let (project, pattern) = entry
            .split_once(',')
            .ok_or_else(|| invalid("expected 'projectName,milestoneRegex'"))?;
        let project = project.trim();
        if project.is_empty() {
            return Err(invalid("project name is empty"));
        }
        let pattern = pattern.trim();
        let milestone_pattern = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|e| invalid(&format!("bad milestone regex: {e}")))?;
        Ok(Self {
            label: label.to_string(),
            project: project.to_string(),
            milestone_pattern,
        })
    }

    pub fn matches_milestone(&self, name: &str) -> bool {
        self.milestone_pattern.is_match(name)
    }
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub from: String,
    #[serde(deserialize_with = "one_or_many")]
    pub to: Vec<String>,
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

fn default_smtp_port() -> u16 {
    25
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        OneOrMany::Many(v) => v,
    })
}

// ---------------------------------------------------------------------------
// BoardConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardScope {
    /// Only the outage, tech debt and new lists.
    #[default]
    Lists,
    /// Every open card on the board.
    Board,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "default_trello_api")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub token: String,
    pub board_id: String,
    pub list_outage: String,
    pub list_tech_debt: String,
    pub list_new: String,
    #[serde(default)]
    pub scan: CardScope,
}

fn default_trello_api() -> String {
    "https://api.trello.com/1".to_string()
}

// ---------------------------------------------------------------------------
// HealthConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_descriptor_base")]
    pub descriptor_base: String,
    #[serde(default = "default_page_base")]
    pub page_base: String,
}

fn default_true() -> bool {
    true
}

fn default_descriptor_base() -> String {
    "https://opendev.org/openstack/tripleo-ci-health-queries/raw/branch/master/output/elastic-recheck/"
        .to_string()
}

fn default_page_base() -> String {
    "http://health.sbarnea.com/".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            descriptor_base: default_descriptor_base(),
            page_base: default_page_base(),
        }
    }
}

// ---------------------------------------------------------------------------
// EscalationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default = "default_true")]
    pub create_cards: bool,
    #[serde(default = "default_subject_tags")]
    pub subject_tags: String,
    #[serde(default = "default_bug_url_base")]
    pub bug_url_base: String,
    #[serde(default = "default_body_intro")]
    pub body_intro: String,
}

fn default_subject_tags() -> String {
    "[tripleoci][unknown]".to_string()
}

fn default_bug_url_base() -> String {
    "https://bugs.launchpad.net/tripleo/+bug/".to_string()
}

fn default_body_intro() -> String {
    "Automatically generated escalation via #tripleo alerts:".to_string()
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            create_cards: true,
            subject_tags: default_subject_tags(),
            bug_url_base: default_bug_url_base(),
            body_intro: default_body_intro(),
        }
    }
}

// ---------------------------------------------------------------------------
// HttpConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpConfig {
    /// Per-request timeout, never shorter than one second.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracker: TrackerConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailConfig>,
    pub board: BoardConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CritwatchError::Config(format!(
                "failed to open/read '{}'",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(data)?;
        cfg.tracked_projects()?;
        Ok(cfg)
    }

    /// Parse every `tracker.projects` entry. Fails on the first bad entry.
    pub fn tracked_projects(&self) -> Result<Vec<TrackedProject>> {
        self.tracker
            .projects
            .iter()
            .filter(|(label, _)| !label.starts_with('_'))
            .map(|(label, entry)| TrackedProject::parse(label, entry))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.tracker.projects.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "tracker.projects is empty: no bugs will be queried".to_string(),
            });
        }
        for (label, entry) in &self.tracker.projects {
            if label.starts_with('_') {
                continue;
            }
            if let Err(e) = TrackedProject::parse(label, entry) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: e.to_string(),
                });
            }
        }

        match &self.email {
            None => warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "no email section: escalation emails are disabled".to_string(),
            }),
            Some(email) => {
                if email.to.is_empty() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: "email.to has no recipients".to_string(),
                    });
                }
                if email.from.trim().is_empty() || email.smtp_server.trim().is_empty() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: "email.from and email.smtp_server must be set".to_string(),
                    });
                }
            }
        }

        if self.email.is_none() && !self.escalation.create_cards {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "email is disabled and escalation.create_cards is false: \
                          unmatched bugs will only be reported"
                    .to_string(),
            });
        }

        if self.board.api_key.is_empty() || self.board.token.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "board.api_key or board.token is empty".to_string(),
            });
        }

        if self.http.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "http.timeout_secs is 0: using 1 second instead"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
tracker:
  projects:
    tripleo: "tripleo,^(pike|queens)"
board:
  board_id: b1
  list_outage: Outages
  list_tech_debt: Tech Debt
  list_new: New
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(cfg.tracker.api_base, "https://api.launchpad.net/devel");
        assert_eq!(cfg.board.api_base, "https://api.trello.com/1");
        assert_eq!(cfg.board.scan, CardScope::Lists);
        assert!(cfg.email.is_none());
        assert!(cfg.health.enabled);
        assert!(cfg.escalation.create_cards);
        assert_eq!(cfg.escalation.subject_tags, "[tripleoci][unknown]");
        assert_eq!(cfg.http.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn zero_timeout_is_raised_to_one_second() {
        let yaml = format!("{MINIMAL}http:\n  timeout_secs: 0\n");
        let cfg = Config::from_yaml(&yaml).unwrap();
        assert_eq!(cfg.http.timeout(), Duration::from_secs(1));
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("timeout_secs is 0")));
    }

    #[test]
    fn tracked_project_parses_entry() {
        let p = TrackedProject::parse("tripleo", "tripleo, pike|queens").unwrap();
        assert_eq!(p.project, "tripleo");
        assert!(p.matches_milestone("pike-3"));
        assert!(p.matches_milestone("queens"));
        assert!(!p.matches_milestone("rocky-pike"));
    }

    #[test]
    fn tracked_project_rejects_missing_comma() {
        let err = TrackedProject::parse("bad", "tripleo").unwrap_err();
        assert!(matches!(err, CritwatchError::InvalidProject { .. }));
    }

    #[test]
    fn tracked_project_rejects_bad_regex() {
        let err = TrackedProject::parse("bad", "tripleo,(unclosed").unwrap_err();
        assert!(err.to_string().contains("bad milestone regex"));
    }

    #[test]
    fn from_yaml_rejects_bad_project_entry() {
        let yaml = MINIMAL.replace("tripleo,^(pike|queens)", "tripleo");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn underscore_labels_are_ignored() {
        let yaml = MINIMAL.replace(
            "    tripleo: \"tripleo,^(pike|queens)\"",
            "    tripleo: \"tripleo,^(pike|queens)\"\n    _disabled: \"broken\"",
        );
        let cfg = Config::from_yaml(&yaml).unwrap();
        assert_eq!(cfg.tracked_projects().unwrap().len(), 1);
    }

    #[test]
    fn missing_board_section_is_an_error() {
        let yaml = "tracker:\n  projects: {}\n";
        assert!(matches!(
            Config::from_yaml(yaml).unwrap_err(),
            CritwatchError::Yaml(_)
        ));
    }

    #[test]
    fn email_to_accepts_string_or_list() {
        let single = format!(
            "{MINIMAL}email:\n  from: ci@example.com\n  to: a@example.com, b@example.com\n  smtp_server: mail\n"
        );
        let cfg = Config::from_yaml(&single).unwrap();
        let email = cfg.email.unwrap();
        assert_eq!(email.to, vec!["a@example.com", "b@example.com"]);
        assert_eq!(email.smtp_port, 25);

        let list = format!(
            "{MINIMAL}email:\n  from: ci@example.com\n  to: [ops@example.com]\n  smtp_server: mail\n  smtp_port: 2525\n"
        );
        let email = Config::from_yaml(&list).unwrap().email.unwrap();
        assert_eq!(email.to, vec!["ops@example.com"]);
        assert_eq!(email.smtp_port, 2525);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, CritwatchError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("critwatch.yaml");
        std::fs::write(&path, MINIMAL).unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.board.list_tech_debt, "Tech Debt");
        assert_eq!(cfg.tracked_projects().unwrap().len(), 1);
    }

    #[test]
    fn validate_warns_when_nothing_would_escalate() {
        let mut cfg = Config::from_yaml(MINIMAL).unwrap();
        cfg.escalation.create_cards = false;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("unmatched bugs will only be reported")));
    }

    #[test]
    fn validate_flags_empty_recipients() {
        let yaml = format!(
            "{MINIMAL}email:\n  from: ci@example.com\n  to: []\n  smtp_server: mail\n"
        );
        let cfg = Config::from_yaml(&yaml).unwrap();
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("no recipients")));
    }

    #[test]
    fn validate_warns_on_missing_credentials() {
        let cfg = Config::from_yaml(MINIMAL).unwrap();
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("board.api_key")));
    }
}
