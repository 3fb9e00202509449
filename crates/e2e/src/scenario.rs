//! Declarative scenarios
//!
//! A scenario is an ordered list of page-object operations, written in YAML
//! or built in code. String fields may reference test data with `${key}`;
//! they are resolved right before the step runs, so a step can use what an
//! earlier step recorded.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::pages::NewUser;
use crate::testdata::LAST_CREATED_USERNAME;

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Run only scenarios marked `only` when any are
    #[serde(default)]
    pub only: bool,

    /// Overrides the suite's scenario timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Steps to execute in order
    pub steps: Vec<ScenarioStep>,
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Open the login screen and sign in
    Login { username: String, password: String },

    NavigateToAdmin,

    AddUser {
        #[serde(flatten)]
        user: NewUser,
    },

    SearchUser {
        #[serde(default = "last_created_username")]
        username: String,
    },

    /// Without a role the first listed option is chosen
    EditUser {
        #[serde(default)]
        role: Option<String>,
    },

    /// Re-search the username and delete its row
    DeleteUser {
        #[serde(default = "last_created_username")]
        username: String,
    },
}

fn last_created_username() -> String {
    format!("${{{}}}", LAST_CREATED_USERNAME)
}

impl ScenarioStep {
    /// Short label used in results and logs
    pub fn name(&self) -> String {
        match self {
            ScenarioStep::Login { username, .. } => format!("login:{}", username),
            ScenarioStep::NavigateToAdmin => "navigate_to_admin".to_string(),
            ScenarioStep::AddUser { user } => format!("add_user:{}", user.employee_name),
            ScenarioStep::SearchUser { username } => format!("search_user:{}", username),
            ScenarioStep::EditUser { role: Some(role) } => format!("edit_user:{}", role),
            ScenarioStep::EditUser { role: None } => "edit_user".to_string(),
            ScenarioStep::DeleteUser { username } => format!("delete_user:{}", username),
        }
    }
}

impl Scenario {
    /// Create, find, edit and delete a user as the demo administrator
    pub fn user_management() -> Self {
        Self {
            name: "user-management".to_string(),
            description: "Add a new user, search, edit and then delete".to_string(),
            tags: vec!["admin".to_string(), "smoke".to_string()],
            only: false,
            timeout_ms: Some(120_000),
            steps: vec![
                ScenarioStep::Login {
                    username: "Admin".to_string(),
                    password: "admin123".to_string(),
                },
                ScenarioStep::NavigateToAdmin,
                ScenarioStep::AddUser {
                    user: NewUser::new("Orange Test", "Password@123"),
                },
                ScenarioStep::SearchUser {
                    username: last_created_username(),
                },
                ScenarioStep::EditUser { role: None },
                ScenarioStep::DeleteUser {
                    username: last_created_username(),
                },
            ],
        }
    }

    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        if scenario.steps.is_empty() {
            return Err(E2eError::SpecParse(format!("scenario '{}' has no steps", scenario.name)));
        }
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, sorted by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }
}
