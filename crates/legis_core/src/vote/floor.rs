use regex::Regex;
use scraper::Html;

use crate::config::SyncConfig;
use crate::error::ParseError;
use crate::html::{
    body_rows, cell_texts, cells, clean_text, element_text, find_text, find_text_containing,
    following_text, selector,
};
use crate::schema::{Choice, LegislatorVote, Tally};

/// Body text of a tabulation page for an action without recorded votes.
pub const NO_VOTE_RECORDS: &str = "No Vote Records Found for this Action.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorVote {
    pub seq_number: Option<String>,
    pub date: String,
    pub description: String,
    pub totals: Tally,
    pub votes: Vec<LegislatorVote>,
}

/// Parse a floor vote tabulation page. `url` is the page's address when
/// known; the vote sequence number is read from its query string.
pub fn parse_floor_vote(
    html: &str,
    url: Option<&str>,
    config: &SyncConfig,
) -> Result<FloorVote, ParseError> {
    let doc = Html::parse_document(html);

    let seq_number = match url {
        Some(url) => sequence_from_url(url)?,
        None => Some(chamber_marker_sequence(html).to_string()),
    };

    Ok(FloorVote {
        seq_number,
        date: vote_date(&doc)?,
        description: vote_description(&doc)?,
        totals: vote_totals(&doc)?,
        votes: legislator_votes(&doc, config)?,
    })
}

fn sequence_from_url(url: &str) -> Result<Option<String>, ParseError> {
    let pattern = Regex::new(r"VOTE_SEQ=([HS]\d+)")?;
    Ok(pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string()))
}

/// Cache-only fallback for pages whose link has since disappeared from the
/// bill page: only the chamber can be recovered, from the page banner.
pub fn chamber_marker_sequence(html: &str) -> &'static str {
    if html.contains("MONTANA SENATE") {
        "SXXX"
    } else if html.contains("MONTANA HOUSE") {
        "HXXX"
    } else {
        "error"
    }
}

fn vote_date(doc: &Html) -> Result<String, ParseError> {
    let hit = find_text_containing(doc, "DATE:")
        .ok_or_else(|| ParseError::VoteDocument("no DATE: label".to_string()))?;
    let inline = clean_text(&hit.text.replace("DATE:", ""));
    if !inline.is_empty() {
        return Ok(inline);
    }
    following_text(&hit.parent)
        .map(|text| clean_text(&text))
        .ok_or_else(|| ParseError::VoteDocument("empty DATE: label".to_string()))
}

fn vote_description(doc: &Html) -> Result<String, ParseError> {
    let p = selector("p")?;
    doc.select(&p)
        .nth(1)
        .map(|el| clean_text(&element_text(&el)))
        .ok_or_else(|| ParseError::VoteDocument("no description paragraph".to_string()))
}

fn vote_totals(doc: &Html) -> Result<Tally, ParseError> {
    let table = find_text(doc, "YEAS")
        .and_then(|hit| hit.enclosing("table"))
        .ok_or_else(|| ParseError::VoteDocument("no YEAS table".to_string()))?;
    let row = body_rows(&table)?
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::VoteDocument("YEAS table has no totals row".to_string()))?;
    let values = cell_texts(&row)?;
    if values.len() < 4 {
        return Err(ParseError::ShortRow {
            table: "vote totals",
            row: 1,
            found: values.len(),
            expected: 4,
        });
    }
    let count = |i: usize| -> Result<u32, ParseError> {
        let value = clean_text(&values[i]);
        value.parse().map_err(|_| ParseError::BadCount { value })
    };
    Ok(Tally {
        yeas: count(0)?,
        nays: count(1)?,
        excused: Some(count(2)?),
        absent: Some(count(3)?),
    })
}

/// Cells of the third table read "Y Lastname"; the grid ends at the first
/// blank cell.
fn legislator_votes(doc: &Html, config: &SyncConfig) -> Result<Vec<LegislatorVote>, ParseError> {
    let table_sel = selector("table")?;
    let table = doc
        .select(&table_sel)
        .nth(2)
        .ok_or_else(|| ParseError::VoteDocument("no legislator table".to_string()))?;

    let mut votes = Vec::new();
    for cell in cells(&table)? {
        let text = clean_text(&element_text(&cell));
        if text.is_empty() {
            break;
        }
        let mut chars = text.chars();
        let Some(choice) = chars.next().and_then(Choice::from_letter) else {
            continue;
        };
        let name = chars.as_str().trim();
        if name.is_empty() {
            continue;
        }
        votes.push(LegislatorVote {
            name: config.clean_name(name),
            choice,
        });
    }
    Ok(votes)
}
