//! Keyword routing of classified issues to owning teams.

use serde::{Deserialize, Serialize};
use tracing::debug;
use triagebot_common::{Category, Issue, Result, RoutingResult, TriageError};

/// A keyword that, when found in the issue text, assigns `team`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRoute {
    pub keyword: String,
    pub team: String,
}

impl KeywordRoute {
    pub fn new(keyword: &str, team: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            team: team.to_string(),
        }
    }
}

/// Routing row for one category. Keywords are tried in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub category: Category,

    #[serde(default)]
    pub keywords: Vec<KeywordRoute>,

    #[serde(default)]
    pub default_team: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    #[serde(default = "default_team")]
    pub default_team: String,

    #[serde(default = "builtin_rules")]
    pub rules: Vec<RoutingRule>,
}

fn default_team() -> String {
    "triage-team".into()
}

fn builtin_rules() -> Vec<RoutingRule> {
    vec![
        RoutingRule {
            category: Category::Bug,
            keywords: vec![
                KeywordRoute::new("auth", "backend-team"),
                KeywordRoute::new("login", "backend-team"),
                KeywordRoute::new("ui", "frontend-team"),
                KeywordRoute::new("css", "frontend-team"),
                KeywordRoute::new("security", "security-team"),
            ],
            default_team: None,
        },
        RoutingRule {
            category: Category::Feature,
            keywords: Vec::new(),
            default_team: Some("product-team".into()),
        },
        RoutingRule {
            category: Category::Security,
            keywords: Vec::new(),
            default_team: Some("security-team".into()),
        },
        RoutingRule {
            category: Category::Docs,
            keywords: Vec::new(),
            default_team: Some("docs-team".into()),
        },
    ]
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            default_team: default_team(),
            rules: builtin_rules(),
        }
    }
}

impl RoutingTable {
    /// Team names and keywords must be non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.default_team.trim().is_empty() {
            return Err(TriageError::Config("routing.default_team must not be empty".into()));
        }
        for rule in &self.rules {
            if let Some(ref team) = rule.default_team
                && team.trim().is_empty()
            {
                return Err(TriageError::Config(format!(
                    "Empty default_team for category '{}'",
                    rule.category
                )));
            }
            for route in &rule.keywords {
                if route.keyword.trim().is_empty() || route.team.trim().is_empty() {
                    return Err(TriageError::Config(format!(
                        "Empty keyword or team in routing rules for category '{}'",
                        rule.category
                    )));
                }
            }
        }
        Ok(())
    }

    fn rule_for(&self, category: Category) -> Option<&RoutingRule> {
        self.rules.iter().find(|r| r.category == category)
    }
}

pub struct RouterAgent {
    table: RoutingTable,
}

impl RouterAgent {
    pub fn new(table: RoutingTable) -> Self {
        Self { table }
    }

    /// Resolve the owning team. First keyword hit wins, then the category
    /// default, then the global default.
    pub fn route(&self, issue: &Issue, category: Category) -> RoutingResult {
        let text = issue.text().to_lowercase();

        let result = match self.table.rule_for(category) {
            Some(rule) => {
                let hit = rule
                    .keywords
                    .iter()
                    .find(|r| text.contains(&r.keyword.to_lowercase()));
                match (hit, &rule.default_team) {
                    (Some(route), _) => RoutingResult {
                        team: route.team.clone(),
                        reasoning: format!(
                            "Matched keyword '{}' for category '{category}'",
                            route.keyword
                        ),
                    },
                    (None, Some(team)) => RoutingResult {
                        team: team.clone(),
                        reasoning: format!("Default team for category '{category}'"),
                    },
                    (None, None) => self.global_default(category),
                }
            }
            None => self.global_default(category),
        };

        debug!(issue = issue.number, category = %category, team = %result.team, "Routed issue");
        result
    }

    fn global_default(&self, category: Category) -> RoutingResult {
        RoutingResult {
            team: self.table.default_team.clone(),
            reasoning: format!("No routing rule matched for category '{category}'"),
        }
    }
}

impl Default for RouterAgent {
    fn default() -> Self {
        Self::new(RoutingTable::default())
    }
}
