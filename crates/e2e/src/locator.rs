//! Element locators
//!
//! A [`Locator`] is plain data: it serializes into the shape the browser
//! driver resolves into a Playwright locator, and its `Display` form is what
//! shows up in logs and error messages.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// ARIA role with an optional accessible name
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        exact: bool,
    },
    Css { value: String },
    Xpath { value: String },
    Placeholder { value: String },
}

/// Which match to use when a locator resolves to several elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nth {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    #[serde(flatten)]
    pub target: Target,

    /// Keep only matches whose text contains this (case-insensitive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<Nth>,
}

impl Locator {
    fn new(target: Target) -> Self {
        Self { target, has_text: None, nth: None }
    }

    pub fn role(role: &str, name: &str) -> Self {
        Self::new(Target::Role {
            role: role.to_string(),
            name: Some(name.to_string()),
            exact: true,
        })
    }

    pub fn css(selector: &str) -> Self {
        Self::new(Target::Css { value: selector.to_string() })
    }

    pub fn xpath(expr: &str) -> Self {
        Self::new(Target::Xpath { value: expr.to_string() })
    }

    pub fn placeholder(text: &str) -> Self {
        Self::new(Target::Placeholder { value: text.to_string() })
    }

    pub fn has_text(mut self, text: &str) -> Self {
        self.has_text = Some(text.to_string());
        self
    }

    pub fn first(mut self) -> Self {
        self.nth = Some(Nth::First);
        self
    }

    pub fn last(mut self) -> Self {
        self.nth = Some(Nth::Last);
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Role { role, name: Some(name), .. } => write!(f, "role={}[name=\"{}\"]", role, name)?,
            Target::Role { role, name: None, .. } => write!(f, "role={}", role)?,
            Target::Css { value } => write!(f, "css={}", value)?,
            Target::Xpath { value } => write!(f, "xpath={}", value)?,
            Target::Placeholder { value } => write!(f, "placeholder={}", value)?,
        }
        if let Some(text) = &self.has_text {
            write!(f, " >> has-text=\"{}\"", text)?;
        }
        match self.nth {
            Some(Nth::First) => write!(f, " >> first"),
            Some(Nth::Last) => write!(f, " >> last"),
            None => Ok(()),
        }
    }
}
