use std::collections::HashMap;

use regex::Regex;
use scraper::{ElementRef, Html};

use crate::error::ParseError;
use crate::html::{
    all_hrefs, body_rows, cell_texts, element_text, find_text_containing, resolve_url, selector,
};
use crate::schema::RosterEntry;

/// Text immediately before the listing table.
pub const ROSTER_MARKER: &str = "Total number of Introduced and Unintroduced Bills";

/// Parse the "all bills" listing into roster entries, in listing order.
pub fn parse_roster(html: &str, base_url: &str) -> Result<Vec<RosterEntry>, ParseError> {
    let doc = Html::parse_document(html);
    let marker = find_text_containing(&doc, ROSTER_MARKER)
        .ok_or_else(|| ParseError::MissingLabel(ROSTER_MARKER.to_string()))?;
    let table = listing_table(&doc, &marker.parent)
        .ok_or_else(|| ParseError::MissingTable(ROSTER_MARKER.to_string()))?;

    let th = selector("th")?;
    let tr = selector("tr")?;
    let headers: Vec<String> = table
        .select(&tr)
        .next()
        .map(|row| {
            row.select(&th)
                .map(|h| element_text(&h).trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    let sponsor = SponsorPattern::new()?;
    body_rows(&table)?
        .iter()
        .enumerate()
        .map(|(i, row)| parse_row(row, i + 1, &headers, base_url, &sponsor))
        .collect()
}

/// The marker is loose text; the listing is the next table after it in
/// document order.
fn listing_table<'a>(doc: &'a Html, marker_parent: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    let marker_id = marker_parent.id();
    let mut passed = false;
    for node in doc.tree.root().descendants() {
        if node.id() == marker_id {
            passed = true;
            continue;
        }
        if passed {
            if let Some(el) = ElementRef::wrap(node) {
                if el.value().name() == "table" {
                    return Some(el);
                }
            }
        }
    }
    None
}

fn parse_row(
    row: &ElementRef,
    index: usize,
    headers: &[String],
    base_url: &str,
    sponsor: &SponsorPattern,
) -> Result<RosterEntry, ParseError> {
    let cells = cell_texts(row)?;
    let links = all_hrefs(row)?;
    if links.len() < 3 {
        return Err(ParseError::ShortRow {
            table: "roster links",
            row: index,
            found: links.len(),
            expected: 3,
        });
    }
    let raw: HashMap<&str, &str> = headers
        .iter()
        .map(String::as_str)
        .zip(cells.iter().map(String::as_str))
        .collect();
    let field = |name: &str| -> Result<String, ParseError> {
        raw.get(name)
            .map(|v| v.to_string())
            .ok_or_else(|| ParseError::MissingLabel(name.to_string()))
    };

    let (sponsor_name, party, district) = sponsor.split(&field("Primary Sponsor")?);
    Ok(RosterEntry {
        key: field("Bill Type - Number")?
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "),
        bill_page_url: resolve_url(base_url, &links[0]),
        bill_text_url: links[1].clone(),
        bill_pdf_url: links[2].clone(),
        lc: field("LC Number")?.trim().to_string(),
        title: field("Short Title")?.trim().to_string(),
        sponsor: sponsor_name,
        sponsor_party: party,
        sponsor_district: district,
        status_date: field("Status Date")?.trim().to_string(),
        last_action: field("Status")?.replace('|', "").trim().to_string(),
    })
}

/// Splits "Jane  Doe (R) HD 12" into name, party and district.
struct SponsorPattern {
    full: Regex,
    district: Regex,
}

impl SponsorPattern {
    fn new() -> Result<Self, ParseError> {
        Ok(Self {
            full: Regex::new(r"^(?P<name>.*?)\s*\((?P<party>[A-Z])\)\s*(?P<district>[HS]D \d+)")?,
            district: Regex::new(r"[HS]D \d+")?,
        })
    }

    fn split(&self, raw: &str) -> (String, String, String) {
        let cleaned = raw.replace('|', "").replace('\u{a0}', " ");
        let cleaned = cleaned.trim();
        if let Some(caps) = self.full.captures(cleaned) {
            let name = caps["name"].split_whitespace().collect::<Vec<_>>().join(" ");
            let name = name.trim_end_matches('(').trim().to_string();
            return (name, caps["party"].to_string(), caps["district"].to_string());
        }
        let district = self
            .district
            .find(cleaned)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        (cleaned.to_string(), String::new(), district)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: &str = r#"<html><body>
<p>Total number of Introduced and Unintroduced Bills: 2</p>
<table>
<tr><th>Bill Type - Number</th><th>LC Number</th><th>Short Title</th><th>Primary Sponsor</th><th>Status Date</th><th>Status</th></tr>
<tr><td><a href="LAW0203W$BSIV.ActionQuery?P_BILL_NO1=102&P_BLTP_BILL_TYP_CD=HB&Z_ACTION=Find&P_SESS=20211">HB&nbsp;102</a></td>
<td><a href="https://leg.mt.gov/bills/2021/billhtml/HB0102.htm">LC0410</a></td>
<td><a href="https://leg.mt.gov/bills/2021/billpdf/HB0102.pdf">Revise gun laws</a></td>
<td>Seth  Berglee (R) HD 58</td><td>04/01/2021</td><td>Chapter Number Assigned|</td></tr>
<tr><td><a href="LAW0203W$BSIV.ActionQuery?P_BILL_NO1=7">SB 7</a></td>
<td><a href="t.htm">LC0007</a></td><td><a href="p.pdf">Budget</a></td>
<td>Jane Doe (D) SD 3</td><td>01/05/2021</td><td>Introduced</td></tr>
</table></body></html>"#;

    #[test]
    fn parses_listing_rows() {
        let entries = parse_roster(ROSTER, "http://laws.leg.mt.gov/legprd/").unwrap();
        assert_eq!(entries.len(), 2);
        let hb = &entries[0];
        assert_eq!(hb.key, "HB 102");
        assert!(hb.bill_page_url.starts_with("http://laws.leg.mt.gov/legprd/LAW0203W$BSIV"));
        assert_eq!(hb.bill_text_url, "https://leg.mt.gov/bills/2021/billhtml/HB0102.htm");
        assert_eq!(hb.lc, "LC0410");
        assert_eq!(hb.sponsor, "Seth Berglee");
        assert_eq!(hb.sponsor_party, "R");
        assert_eq!(hb.sponsor_district, "HD 58");
        assert_eq!(hb.last_action, "Chapter Number Assigned");
        assert_eq!(entries[1].sponsor_district, "SD 3");
        assert_eq!(entries[1].sponsor_party, "D");
    }

    #[test]
    fn missing_marker_is_an_error() {
        assert!(matches!(
            parse_roster("<html><table></table></html>", "http://x.test/"),
            Err(ParseError::MissingLabel(_))
        ));
    }
}
