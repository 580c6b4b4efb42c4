// Vote extraction. Floor votes come from HTML tally pages, committee votes
// from PDF vote sheets, and veto overrides are built from the action row.
// Document-backed kinds share one read/skip/fetch decision tree and degrade
// to the row-reported totals instead of failing the run.

mod committee;
mod floor;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::action::VoteRequest;
use crate::cache::{DocumentCache, DocumentKind};
use crate::config::SyncConfig;
use crate::fetch::{FetchResponse, Fetcher};
use crate::schema::{VoteError, VoteKind, VoteRecord};

pub use committee::{CommitteeVote, parse_vote_sheet, parse_vote_sheet_text};

#[cfg(test)]
pub(crate) use committee::{SHEET_LINES, sheet_pdf};
pub use floor::{FloorVote, NO_VOTE_RECORDS, chamber_marker_sequence, parse_floor_vote};

/// What a single extraction may touch.
pub struct VoteContext<'a> {
    pub config: &'a SyncConfig,
    pub cache: &'a mut dyn DocumentCache,
    pub fetcher: &'a dyn Fetcher,
    /// The parent bill's refresh decision.
    pub refresh: bool,
}

/// Extract one vote. Only cache I/O failures are returned as errors; every
/// document problem is recorded on the vote itself.
pub fn extract_vote(request: &VoteRequest, ctx: &mut VoteContext) -> Result<VoteRecord> {
    let mut record = VoteRecord {
        url: request.url.clone(),
        bill: request.bill.clone(),
        session: ctx.config.session_id.clone(),
        action_id: request.action_id.clone(),
        vote_type: request.kind.known(),
        seq_number: None,
        date: None,
        description: None,
        totals: request.reported,
        votes: Vec::new(),
        error: None,
    };

    match request.kind {
        VoteKind::Floor => extract_floor(request, ctx, &mut record)?,
        VoteKind::Committee => extract_committee(request, ctx, &mut record)?,
        VoteKind::VetoOverride => {
            record.date = Some(request.action_date.clone());
            record.description = Some(request.action_description.clone());
        }
        VoteKind::Unknown => {}
    }

    if let Some(error) = record.error {
        info!(action = %request.action_id, url = ?request.url, %error, "vote degraded to reported totals");
    }
    Ok(record)
}

fn extract_floor(
    request: &VoteRequest,
    ctx: &mut VoteContext,
    record: &mut VoteRecord,
) -> Result<()> {
    let source = DocumentSource {
        kind: DocumentKind::VotePage,
        missing_url: VoteError::MissingVotePage,
        unavailable: VoteError::MissingVotePage,
        reject: |resp: &FetchResponse| {
            !resp.is_ok() || String::from_utf8_lossy(&resp.body).contains(NO_VOTE_RECORDS)
        },
    };
    let bytes = match source.acquire(request, ctx)? {
        Acquired::Document(bytes) => bytes,
        Acquired::Failed(error) => {
            record.fail(error, request.reported);
            return Ok(());
        }
    };

    let text = String::from_utf8_lossy(&bytes);
    match parse_floor_vote(&text, request.url.as_deref(), ctx.config) {
        Ok(vote) => {
            record.seq_number = vote.seq_number;
            record.date = Some(vote.date);
            record.description = Some(vote.description);
            record.totals = vote.totals;
            record.votes = vote.votes;
        }
        Err(err) => {
            warn!(action = %request.action_id, error = %err, "unreadable floor vote page");
            record.fail(VoteError::MalformedDocument, request.reported);
        }
    }
    Ok(())
}

fn extract_committee(
    request: &VoteRequest,
    ctx: &mut VoteContext,
    record: &mut VoteRecord,
) -> Result<()> {
    let source = DocumentSource {
        kind: DocumentKind::VoteSheet,
        missing_url: VoteError::MissingUrl,
        unavailable: VoteError::MissingPdf,
        reject: |resp: &FetchResponse| !resp.is_ok(),
    };
    let bytes = match source.acquire(request, ctx)? {
        Acquired::Document(bytes) => bytes,
        Acquired::Failed(error) => {
            record.fail(error, request.reported);
            return Ok(());
        }
    };

    match parse_vote_sheet(&bytes, ctx.config) {
        Ok(vote) => {
            record.date = Some(vote.date);
            record.description = Some(vote.description);
            record.totals = vote.totals;
            record.votes = vote.votes;
        }
        Err(err) => {
            warn!(action = %request.action_id, error = %err, "unreadable committee vote sheet");
            record.fail(VoteError::MalformedDocument, request.reported);
        }
    }
    Ok(())
}

enum Acquired {
    Document(Vec<u8>),
    Failed(VoteError),
}

struct DocumentSource<F> {
    kind: DocumentKind,
    missing_url: VoteError,
    /// Recorded when the fetch fails or the response is rejected.
    unavailable: VoteError,
    reject: F,
}

impl<F: Fn(&FetchResponse) -> bool> DocumentSource<F> {
    fn acquire(&self, request: &VoteRequest, ctx: &mut VoteContext) -> Result<Acquired> {
        let id = request.action_id.as_str();
        let cached = ctx.cache.exists(self.kind, id);

        if cached && !ctx.refresh {
            debug!(action = id, kind = ?self.kind, "reading vote document from cache");
            return Ok(Acquired::Document(ctx.cache.read(self.kind, id)?));
        }
        if !cached && !ctx.refresh {
            // Unchanged bill whose vote link failed last time.
            debug!(action = id, url = ?request.url, "skipping previously missing vote document");
            return Ok(Acquired::Failed(VoteError::SkippedMissingVotePage));
        }
        let Some(url) = request.url.as_deref() else {
            if cached {
                debug!(action = id, "vote link gone, using cached copy");
                return Ok(Acquired::Document(ctx.cache.read(self.kind, id)?));
            }
            return Ok(Acquired::Failed(self.missing_url));
        };

        info!(action = id, url, "fetching vote document");
        let response = match ctx.fetcher.get(url) {
            Ok(response) => response,
            Err(err) => {
                warn!(action = id, error = %err, "vote document fetch failed");
                return self.fall_back(id, cached, ctx);
            }
        };
        if (self.reject)(&response) {
            warn!(action = id, status = response.status, "vote document rejected");
            return self.fall_back(id, cached, ctx);
        }
        ctx.cache.write(self.kind, id, &response.body)?;
        Ok(Acquired::Document(response.body))
    }

    /// A failed re-fetch keeps the previously cached copy.
    fn fall_back(&self, id: &str, cached: bool, ctx: &mut VoteContext) -> Result<Acquired> {
        if cached {
            warn!(action = id, kind = ?self.kind, "re-fetch failed, using cached copy");
            return Ok(Acquired::Document(ctx.cache.read(self.kind, id)?));
        }
        Ok(Acquired::Failed(self.unavailable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::fetch::ScriptedFetcher;
    use crate::schema::Tally;

    const FLOOR_URL: &str =
        "http://laws.leg.mt.gov/legprd/LAW0211W$BLAC.VoteTabulation?P_VOTE_SEQ=S77&P_SESS=20211";
    const SHEET_URL: &str = "https://leg.mt.gov/bills/2021/minutes/votesheets/SB0009.pdf";

    const FLOOR_PAGE: &str = r#"<html><body>
<p>MONTANA SENATE</p>
<p>SB 9 - 2nd Reading Passed</p>
<p>DATE: February 2, 2021</p>
<table><tr><td>YEAS</td><td>NAYS</td><td>EXCUSED</td><td>ABSENT</td></tr>
<tr><td>1</td><td>1</td><td>0</td><td>0</td></tr></table>
<table><tr><td>&nbsp;</td></tr></table>
<table><tr><td>Y Ankney</td><td>N Boldman</td></tr></table>
</body></html>"#;

    fn request(kind: VoteKind, url: Option<&str>) -> VoteRequest {
        VoteRequest {
            kind,
            url: url.map(str::to_string),
            bill: "SB 9".to_string(),
            action_id: "SB9-0003".to_string(),
            action_description: "Veto Override Vote Passed".to_string(),
            action_date: "04/28/2021".to_string(),
            reported: Tally::yes_no(7, 3),
        }
    }

    fn run(
        req: &VoteRequest,
        cache: &mut MemoryCache,
        fetcher: &ScriptedFetcher,
        refresh: bool,
    ) -> VoteRecord {
        let config = SyncConfig::default();
        let mut ctx = VoteContext {
            config: &config,
            cache,
            fetcher,
            refresh,
        };
        extract_vote(req, &mut ctx).unwrap()
    }

    #[test]
    fn floor_vote_is_fetched_and_cached() {
        let mut cache = MemoryCache::new();
        let fetcher = ScriptedFetcher::new().respond(FLOOR_URL, FetchResponse::ok(FLOOR_PAGE));
        let vote = run(&request(VoteKind::Floor, Some(FLOOR_URL)), &mut cache, &fetcher, true);
        assert!(vote.is_complete());
        assert_eq!(vote.vote_type, Some(VoteKind::Floor));
        assert_eq!(vote.seq_number.as_deref(), Some("S77"));
        assert_eq!(vote.totals.excused, Some(0));
        assert_eq!(vote.votes.len(), 2);
        assert!(cache.exists(DocumentKind::VotePage, "SB9-0003"));
    }

    #[test]
    fn cached_document_is_read_without_network() {
        let mut cache =
            MemoryCache::new().with_entry(DocumentKind::VotePage, "SB9-0003", FLOOR_PAGE);
        let fetcher = ScriptedFetcher::new();
        let vote = run(&request(VoteKind::Floor, Some(FLOOR_URL)), &mut cache, &fetcher, false);
        assert!(vote.is_complete());
        assert!(fetcher.calls().is_empty());
        assert_eq!(cache.writes(), 0);
    }

    #[test]
    fn uncached_unchanged_vote_is_skipped() {
        let mut cache = MemoryCache::new();
        let fetcher = ScriptedFetcher::new();
        let vote = run(&request(VoteKind::Committee, Some(SHEET_URL)), &mut cache, &fetcher, false);
        assert_eq!(vote.error, Some(VoteError::SkippedMissingVotePage));
        assert_eq!(vote.totals, Tally::yes_no(7, 3));
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn missing_committee_sheet_keeps_reported_totals() {
        let mut cache = MemoryCache::new();
        let fetcher = ScriptedFetcher::new().respond(
            SHEET_URL,
            FetchResponse {
                status: 404,
                body: b"not found".to_vec(),
            },
        );
        let vote = run(&request(VoteKind::Committee, Some(SHEET_URL)), &mut cache, &fetcher, true);
        assert_eq!(vote.error, Some(VoteError::MissingPdf));
        assert_eq!(vote.totals, Tally::yes_no(7, 3));
        assert!(vote.votes.is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn transport_failure_is_recorded_not_raised() {
        let mut cache = MemoryCache::new();
        let fetcher = ScriptedFetcher::new();
        let vote = run(&request(VoteKind::Floor, Some(FLOOR_URL)), &mut cache, &fetcher, true);
        assert_eq!(vote.error, Some(VoteError::MissingVotePage));
        assert_eq!(fetcher.calls(), vec![FLOOR_URL.to_string()]);
    }

    #[test]
    fn failed_refetch_keeps_cached_copy() {
        let mut cache =
            MemoryCache::new().with_entry(DocumentKind::VotePage, "SB9-0003", FLOOR_PAGE);
        let fetcher = ScriptedFetcher::new().respond(
            FLOOR_URL,
            FetchResponse {
                status: 503,
                body: Vec::new(),
            },
        );
        let vote = run(&request(VoteKind::Floor, Some(FLOOR_URL)), &mut cache, &fetcher, true);
        assert!(vote.is_complete());
        assert_eq!(vote.votes.len(), 2);
        assert_eq!(fetcher.calls(), vec![FLOOR_URL.to_string()]);
        assert_eq!(cache.writes(), 0);

        let offline = ScriptedFetcher::new();
        let vote = run(&request(VoteKind::Floor, Some(FLOOR_URL)), &mut cache, &offline, true);
        assert!(vote.is_complete());
        assert_eq!(vote.seq_number.as_deref(), Some("S77"));
    }

    #[test]
    fn empty_tabulation_page_keeps_cached_copy() {
        let mut cache =
            MemoryCache::new().with_entry(DocumentKind::VotePage, "SB9-0003", FLOOR_PAGE);
        let body = format!("<html><body><p>{NO_VOTE_RECORDS}</p></body></html>");
        let fetcher = ScriptedFetcher::new().respond(FLOOR_URL, FetchResponse::ok(body));
        let vote = run(&request(VoteKind::Floor, Some(FLOOR_URL)), &mut cache, &fetcher, true);
        assert!(vote.is_complete());
        assert_eq!(
            cache.read_text(DocumentKind::VotePage, "SB9-0003").unwrap(),
            FLOOR_PAGE
        );
    }

    #[test]
    fn committee_sheet_is_fetched_parsed_and_cached() {
        let pdf = sheet_pdf(SHEET_LINES);
        let mut cache = MemoryCache::new();
        let fetcher = ScriptedFetcher::new().respond(SHEET_URL, FetchResponse::ok(pdf.clone()));
        let vote = run(&request(VoteKind::Committee, Some(SHEET_URL)), &mut cache, &fetcher, true);
        assert!(vote.is_complete());
        assert_eq!(vote.vote_type, Some(VoteKind::Committee));
        assert_eq!(vote.date.as_deref(), Some("April 1, 2021"));
        assert_eq!(vote.description.as_deref(), Some("HB 701 - Do Pass"));
        assert_eq!(vote.totals, Tally::yes_no(2, 1));
        assert_eq!(vote.votes.len(), 3);
        assert!(vote.seq_number.is_none());
        assert_eq!(cache.read(DocumentKind::VoteSheet, "SB9-0003").unwrap(), pdf);
        assert!(!cache.exists(DocumentKind::VotePage, "SB9-0003"));
    }

    #[test]
    fn empty_tabulation_page_is_missing() {
        let mut cache = MemoryCache::new();
        let body = format!("<html><body><p>{NO_VOTE_RECORDS}</p></body></html>");
        let fetcher = ScriptedFetcher::new().respond(FLOOR_URL, FetchResponse::ok(body));
        let vote = run(&request(VoteKind::Floor, Some(FLOOR_URL)), &mut cache, &fetcher, true);
        assert_eq!(vote.error, Some(VoteError::MissingVotePage));
        assert!(cache.is_empty());
    }

    #[test]
    fn no_link_errors_depend_on_kind() {
        let fetcher = ScriptedFetcher::new();
        let floor = run(&request(VoteKind::Floor, None), &mut MemoryCache::new(), &fetcher, true);
        assert_eq!(floor.error, Some(VoteError::MissingVotePage));
        let committee = run(
            &request(VoteKind::Committee, None),
            &mut MemoryCache::new(),
            &fetcher,
            true,
        );
        assert_eq!(committee.error, Some(VoteError::MissingUrl));
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn no_link_falls_back_to_cached_copy() {
        let mut cache =
            MemoryCache::new().with_entry(DocumentKind::VotePage, "SB9-0003", FLOOR_PAGE);
        let vote = run(&request(VoteKind::Floor, None), &mut cache, &ScriptedFetcher::new(), true);
        assert!(vote.is_complete());
        assert_eq!(vote.seq_number.as_deref(), Some("SXXX"));
    }

    #[test]
    fn unreadable_sheet_is_malformed() {
        let mut cache =
            MemoryCache::new().with_entry(DocumentKind::VoteSheet, "SB9-0003", "not a pdf");
        let vote = run(
            &request(VoteKind::Committee, Some(SHEET_URL)),
            &mut cache,
            &ScriptedFetcher::new(),
            false,
        );
        assert_eq!(vote.error, Some(VoteError::MalformedDocument));
        assert_eq!(vote.totals, Tally::yes_no(7, 3));
    }

    #[test]
    fn veto_override_comes_from_the_action_row() {
        let fetcher = ScriptedFetcher::new();
        let vote = run(
            &request(VoteKind::VetoOverride, None),
            &mut MemoryCache::new(),
            &fetcher,
            true,
        );
        assert!(vote.is_complete());
        assert_eq!(vote.date.as_deref(), Some("04/28/2021"));
        assert_eq!(vote.description.as_deref(), Some("Veto Override Vote Passed"));
        assert_eq!(vote.totals, Tally::yes_no(7, 3));
        assert!(vote.seq_number.is_none());
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn unknown_kind_has_no_type_and_no_error() {
        let fetcher = ScriptedFetcher::new();
        let vote = run(
            &request(VoteKind::Unknown, Some("http://elsewhere.test/v")),
            &mut MemoryCache::new(),
            &fetcher,
            true,
        );
        assert_eq!(vote.vote_type, None);
        assert_eq!(vote.error, None);
        assert_eq!(vote.totals, Tally::yes_no(7, 3));
        assert!(fetcher.calls().is_empty());
    }
}
