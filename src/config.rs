use crate::{
    policy::{parse_seed_rules, Policy, UnpaidApproval},
    rotation::RotationWindow,
};
use anyhow::{anyhow, Context};
use chrono::FixedOffset;
use envconfig::Envconfig;
use std::time::Duration;

#[derive(Envconfig)]
pub struct Config {
    /// Unset means the in-memory store.
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: Option<String>,
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,
    #[envconfig(from = "JWT_SECRET")]
    pub jwt_secret: String,
    #[envconfig(from = "SESSION_HOURS", default = "24")]
    pub session_hours: u64,
    #[envconfig(from = "UPLOAD_DIR", default = "uploads")]
    pub upload_dir: String,
    #[envconfig(from = "SERVER_UTC_OFFSET_MINUTES", default = "480")]
    pub utc_offset_minutes: i32,
    #[envconfig(from = "APPROVE_UNPAID_REGISTRATIONS", default = "true")]
    pub approve_unpaid: bool,
    #[envconfig(from = "SUPER_AUTHORITY_SEEDS", default = "admin")]
    pub super_authority_seeds: String,
    #[envconfig(from = "EVENT_BUFFER", default = "64")]
    pub event_buffer: usize,
}

impl Config {
    pub fn session(&self) -> Duration {
        Duration::from_secs(self.session_hours * 60 * 60)
    }

    pub fn policy(&self) -> anyhow::Result<Policy> {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .with_context(|| format!("{} minutes is not a valid UTC offset", self.utc_offset_minutes))?;
        let seeds = parse_seed_rules(&self.super_authority_seeds)
            .map_err(|e| anyhow!(e))
            .context("SUPER_AUTHORITY_SEEDS")?;
        Ok(Policy {
            rotation: RotationWindow::new(offset),
            unpaid_approval: if self.approve_unpaid {
                UnpaidApproval::Allow
            } else {
                UnpaidApproval::Refuse
            },
            seeds,
        })
    }
}
