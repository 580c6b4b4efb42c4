use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::macros::format_description;

/// Run configuration. Every field has a default, so an empty TOML file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub session_id: String,
    pub base_url: String,
    pub roster_url: String,
    pub cache_root: PathBuf,
    pub output_root: PathBuf,
    /// Vote count above which an unlinked vote is taken to be a floor vote.
    pub floor_vote_threshold: u32,
    pub committee_vote_host: String,
    pub floor_vote_pattern: String,
    pub recording_host: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Pins "today" (MM/DD/YYYY) for replays; the local date otherwise.
    pub today: Option<String>,
    pub name_replacements: HashMap<String, String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let session_id = "20211".to_string();
        Self {
            roster_url: format!(
                "http://laws.leg.mt.gov/legprd/LAW0217W$BAIV.return_all_bills?P_SESS={session_id}"
            ),
            session_id,
            base_url: "http://laws.leg.mt.gov/legprd/".to_string(),
            cache_root: PathBuf::from("cache"),
            output_root: PathBuf::from("output"),
            floor_vote_threshold: 40,
            committee_vote_host: "leg.mt.gov".to_string(),
            floor_vote_pattern: "LAW0211W$BLAC".to_string(),
            recording_host: "sg001-harmony.sliq.net".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
            user_agent: concat!("legis/", env!("CARGO_PKG_VERSION")).to_string(),
            today: None,
            name_replacements: HashMap::new(),
        }
    }
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Per-session cache base path.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_root.join(&self.session_id)
    }

    /// Per-session export directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output_root.join(&self.session_id)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.cache_dir().join("last-scrape-bills.json")
    }

    pub fn today(&self) -> Result<String> {
        match &self.today {
            Some(day) => Ok(day.clone()),
            None => local_today(),
        }
    }

    /// Standard form for a legislator name.
    pub fn clean_name(&self, raw: &str) -> String {
        self.name_replacements
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }
}

/// Today's date in the roster's `MM/DD/YYYY` form.
pub fn local_today() -> Result<String> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_roster_date(now)
}

pub fn format_roster_date(at: OffsetDateTime) -> Result<String> {
    let format = format_description!("[month]/[day]/[year]");
    Ok(at.date().format(&format)?)
}
