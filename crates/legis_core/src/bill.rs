use anyhow::{Context, Result, bail};
use scraper::Html;
use tracing::info;

use crate::action::ActionRow;
use crate::cache::{DocumentCache, DocumentKind};
use crate::error::ParseError;
use crate::fetch::Fetcher;
use crate::html::{
    anchored_table, body_rows, cell_texts, child_node_text, clean_text, find_text,
    sibling_cell_after,
};
use crate::schema::{BillRecord, RosterEntry, Subject};

pub const STATUS_LABEL: &str = "Current Bill Progress: ";
pub const FISCAL_NOTES_LABEL: &str = "Fiscal Note(s)";
pub const AMENDMENTS_LABEL: &str = "Associated Amendments";

const SPONSOR_ANCHOR: &str = "spon_table";
const SUBJECT_ANCHOR: &str = "subj_table";
const INFO_ANCHOR: &str = "abi_table";
const ACTION_ANCHOR: &str = "ba_table";

/// Bill detail page HTML, from cache when the bill is unchanged, otherwise
/// fetched and written back. Fetch failures are fatal for the bill.
pub fn fetch_bill_page(
    entry: &RosterEntry,
    refresh: bool,
    cache: &mut dyn DocumentCache,
    fetcher: &dyn Fetcher,
) -> Result<String> {
    let id = entry.key.as_str();
    if !refresh && cache.exists(DocumentKind::BillPage, id) {
        info!(bill = id, "reading bill page from cache");
        return cache.read_text(DocumentKind::BillPage, id);
    }

    info!(bill = id, url = %entry.bill_page_url, "fetching bill page");
    let response = fetcher
        .get(&entry.bill_page_url)
        .with_context(|| format!("fetching bill page for {id}"))?;
    if !response.is_ok() {
        bail!(
            "bill page for {id} returned HTTP {} ({})",
            response.status,
            entry.bill_page_url
        );
    }
    cache.write(DocumentKind::BillPage, id, &response.body)?;
    Ok(response.text())
}

/// Everything read off a bill page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBill {
    pub record: BillRecord,
    /// Action rows in chronological order; index is the action sequence.
    pub actions: Vec<ActionRow>,
}

pub fn parse_bill_page(
    html: &str,
    entry: &RosterEntry,
    session: &str,
) -> Result<ParsedBill, ParseError> {
    let doc = Html::parse_document(html);

    let bill_status = find_text(&doc, STATUS_LABEL)
        .and_then(|hit| hit.enclosing("font"))
        .and_then(|font| child_node_text(&font, 1))
        .map(|status| clean_text(&status))
        .ok_or_else(|| ParseError::MissingLabel(STATUS_LABEL.to_string()))?;

    let sponsors = parse_sponsors(&doc)?;
    let subjects = parse_subjects(&doc)?;
    let mut vote_requirements: Vec<String> = Vec::new();
    for subject in &subjects {
        if !vote_requirements.contains(&subject.vote_req) {
            vote_requirements.push(subject.vote_req.clone());
        }
    }

    let info = anchored_table(&doc, INFO_ANCHOR)?;
    let deadline = |label: &str| sibling_cell_after(&info, label).map(|v| clean_text(&v));

    let record = BillRecord {
        roster: entry.clone(),
        session: session.to_string(),
        bill_status,
        fiscal_notes_list_url: labelled_link(&doc, FISCAL_NOTES_LABEL),
        amendment_list_url: labelled_link(&doc, AMENDMENTS_LABEL),
        draft_requestor: sponsors.requestor,
        bill_requestor: sponsors.by_request_of,
        primary_sponsor: sponsors.primary,
        subjects,
        vote_requirements,
        deadline_category: deadline("Category:")?,
        transmittal_deadline: deadline("Transmittal Date:")?,
        amended_return_deadline: deadline("Return (with 2nd house amendments) Date:")?,
    };

    Ok(ParsedBill {
        record,
        actions: parse_actions(&doc)?,
    })
}

/// `href` of the link wrapping `label`, if the page has one.
fn labelled_link(doc: &Html, label: &str) -> Option<String> {
    find_text(doc, label)
        .and_then(|hit| hit.enclosing("a"))
        .and_then(|a| a.value().attr("href").map(str::to_string))
}

#[derive(Debug, Default)]
struct Sponsors {
    requestor: Option<String>,
    by_request_of: Option<String>,
    primary: Option<String>,
}

fn parse_sponsors(doc: &Html) -> Result<Sponsors, ParseError> {
    let table = anchored_table(doc, SPONSOR_ANCHOR)?;
    let mut sponsors = Sponsors::default();
    for (i, row) in body_rows(&table)?.iter().enumerate() {
        let cells = cell_texts(row)?;
        if cells.len() < 3 {
            return Err(ParseError::ShortRow {
                table: "sponsors",
                row: i + 1,
                found: cells.len(),
                expected: 3,
            });
        }
        // Role, last name, first name.
        let name = clean_text(&format!("{} {}", clean_text(&cells[2]), clean_text(&cells[1])));
        let slot = match clean_text(&cells[0]).as_str() {
            "Requestor" => &mut sponsors.requestor,
            "By Request Of" => &mut sponsors.by_request_of,
            "Primary Sponsor" => &mut sponsors.primary,
            _ => continue,
        };
        *slot = Some(name);
    }
    Ok(sponsors)
}

fn parse_subjects(doc: &Html) -> Result<Vec<Subject>, ParseError> {
    let table = anchored_table(doc, SUBJECT_ANCHOR)?;
    body_rows(&table)?
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let cells = cell_texts(row)?;
            if cells.len() < 3 {
                return Err(ParseError::ShortRow {
                    table: "subjects",
                    row: i + 1,
                    found: cells.len(),
                    expected: 3,
                });
            }
            Ok(Subject {
                subject: clean_text(&cells[0]),
                fiscal_code: clean_text(&cells[1]),
                vote_req: clean_text(&cells[2]),
            })
        })
        .collect()
}

/// The source lists actions newest first; reversed so index 0 is the
/// earliest action.
fn parse_actions(doc: &Html) -> Result<Vec<ActionRow>, ParseError> {
    let table = anchored_table(doc, ACTION_ANCHOR)?;
    let mut actions = body_rows(&table)?
        .iter()
        .enumerate()
        .map(|(i, row)| ActionRow::from_element(row, i + 1))
        .collect::<Result<Vec<_>, _>>()?;
    actions.reverse();
    Ok(actions)
}
