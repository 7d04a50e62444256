use crate::rotation::RotationWindow;
use chrono::{FixedOffset, Offset, Utc};
use std::str::FromStr;

/// What approving a fee registration that carries no payment proof does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpaidApproval {
    /// Approve and leave the payment status at `unpaid`.
    Allow,
    /// Refuse the approval with `PaymentRequired`.
    Refuse,
}

/// A name, optionally pinned to a class, promoted to super-authority when it registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRule {
    pub name: String,
    pub class: Option<String>,
}

impl SeedRule {
    pub fn matches(&self, name: &str, class: &str) -> bool {
        self.name == name && self.class.as_deref().map_or(true, |c| c == class)
    }
}

impl FromStr for SeedRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, class) = match s.split_once(':') {
            Some((name, class)) => (name.trim(), Some(class.trim())),
            None => (s.trim(), None),
        };
        if name.is_empty() || class.map_or(false, str::is_empty) {
            return Err(format!("invalid seed rule `{s}`"));
        }
        Ok(SeedRule {
            name: name.to_string(),
            class: class.map(str::to_string),
        })
    }
}

/// Parses a comma separated list such as `admin,Jane:NEE4`.
pub fn parse_seed_rules(s: &str) -> Result<Vec<SeedRule>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|rule| !rule.is_empty())
        .map(str::parse)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Policy {
    pub rotation: RotationWindow,
    pub unpaid_approval: UnpaidApproval,
    pub seeds: Vec<SeedRule>,
}

impl Policy {
    pub fn is_seeded(&self, name: &str, class: &str) -> bool {
        self.seeds.iter().any(|rule| rule.matches(name, class))
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            rotation: RotationWindow::new(
                FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
            ),
            unpaid_approval: UnpaidApproval::Allow,
            seeds: vec![SeedRule {
                name: "admin".to_string(),
                class: None,
            }],
        }
    }
}
