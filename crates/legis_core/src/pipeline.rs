use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::action::Classifier;
use crate::bill::{fetch_bill_page, parse_bill_page};
use crate::cache::{DocumentCache, DocumentKind};
use crate::config::SyncConfig;
use crate::fetch::Fetcher;
use crate::refresh::{PlannedBill, RosterDiff, Snapshot, plan};
use crate::roster::parse_roster;
use crate::schema::{ActionRecord, BillRecord, RosterEntry, VoteKind, VoteRecord};
use crate::vote::{VoteContext, extract_vote};

/// Cache id of the roster listing.
pub const ROSTER_ID: &str = "all-bills";

/// The three exported collections of one run, in roster then chronological
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutput {
    pub bills: Vec<BillRecord>,
    pub actions: Vec<ActionRecord>,
    pub votes: Vec<VoteRecord>,
}

impl SyncOutput {
    fn extend(&mut self, other: SyncOutput) {
        self.bills.extend(other.bills);
        self.actions.extend(other.actions);
        self.votes.extend(other.votes);
    }
}

pub struct SyncPipeline<'a> {
    config: &'a SyncConfig,
    cache: &'a mut dyn DocumentCache,
    fetcher: &'a dyn Fetcher,
    classifier: Classifier,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        config: &'a SyncConfig,
        cache: &'a mut dyn DocumentCache,
        fetcher: &'a dyn Fetcher,
    ) -> Self {
        Self {
            classifier: Classifier::from_config(config),
            config,
            cache,
            fetcher,
        }
    }

    /// Fetch and parse the bill listing. With `use_cached`, the previously
    /// saved listing is read instead.
    pub fn load_roster(&mut self, use_cached: bool) -> Result<Vec<RosterEntry>> {
        let html = if use_cached {
            info!("reading roster from cache");
            self.cache
                .read_text(DocumentKind::Roster, ROSTER_ID)
                .context("no cached roster")?
        } else {
            let url = self.config.roster_url.as_str();
            info!(url, "fetching roster");
            let response = self.fetcher.get(url).context("fetching roster")?;
            if !response.is_ok() {
                bail!("roster returned HTTP {} ({url})", response.status);
            }
            self.cache
                .write(DocumentKind::Roster, ROSTER_ID, &response.body)?;
            response.text()
        };
        let roster = parse_roster(&html, &self.config.base_url).context("parsing roster")?;
        info!(bills = roster.len(), "roster loaded");
        Ok(roster)
    }

    /// Process every roster bill. Any bill-level failure aborts the run.
    pub fn run(&mut self, roster: &[RosterEntry], snapshot: &Snapshot) -> Result<SyncOutput> {
        let diff = RosterDiff::compute(roster, snapshot);
        info!(
            added = diff.added.len(),
            changed = diff.changed.len(),
            unchanged = diff.unchanged.len(),
            removed = diff.removed.len(),
            "roster compared to last run"
        );
        for key in &diff.removed {
            warn!(bill = %key, "bill no longer listed");
        }

        let today = self.config.today()?;
        let planned = plan(roster, snapshot, &today);
        let refreshing = planned.iter().filter(|p| p.refresh).count();
        info!(today = %today, refreshing, cached = planned.len() - refreshing, "sync planned");

        let mut output = SyncOutput::default();
        for bill in &planned {
            let processed = self
                .process_bill(bill)
                .with_context(|| format!("processing {}", bill.entry.key))?;
            output.extend(processed);
        }

        let degraded = output.votes.iter().filter(|v| !v.is_complete()).count();
        info!(
            bills = output.bills.len(),
            actions = output.actions.len(),
            votes = output.votes.len(),
            degraded,
            "sync finished"
        );
        Ok(output)
    }

    /// One bill: its record, actions and votes.
    pub fn process_bill(&mut self, planned: &PlannedBill) -> Result<SyncOutput> {
        let entry = &planned.entry;
        let html = fetch_bill_page(entry, planned.refresh, &mut *self.cache, self.fetcher)?;
        let parsed = parse_bill_page(&html, entry, &self.config.session_id)
            .with_context(|| format!("parsing bill page {}", entry.bill_page_url))?;

        let mut output = SyncOutput::default();
        for (sequence, row) in parsed.actions.iter().enumerate() {
            let classified = self.classifier.classify(&entry.key, sequence, row)?;
            if let Some(request) = &classified.vote {
                if request.kind == VoteKind::Unknown {
                    warn!(
                        action = %request.action_id,
                        url = ?request.url,
                        "unrecognised vote link"
                    );
                }
                let mut ctx = VoteContext {
                    config: self.config,
                    cache: &mut *self.cache,
                    fetcher: self.fetcher,
                    refresh: planned.refresh,
                };
                output.votes.push(extract_vote(request, &mut ctx)?);
            }
            output.actions.push(classified.record);
        }
        output.bills.push(parsed.record);
        Ok(output)
    }
}
