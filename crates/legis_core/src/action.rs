use scraper::ElementRef;
use url::Url;

use crate::config::SyncConfig;
use crate::error::ParseError;
use crate::html::{all_hrefs, cells, clean_text, element_text, first_href, is_blank, resolve_url};
use crate::schema::{ActionRecord, Tally, VoteKind};

/// Raw cells of one row of the bill actions table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRow {
    pub description: String,
    pub description_url: Option<String>,
    pub date: String,
    pub yeas: String,
    pub yeas_link: Option<String>,
    pub nays: String,
    pub committee: String,
    pub committee_links: Vec<String>,
}

impl ActionRow {
    pub fn from_element(row: &ElementRef, index: usize) -> Result<Self, ParseError> {
        let tds = cells(row)?;
        if tds.len() < 5 {
            return Err(ParseError::ShortRow {
                table: "actions",
                row: index,
                found: tds.len(),
                expected: 5,
            });
        }
        Ok(Self {
            description: clean_text(&element_text(&tds[0])),
            description_url: first_href(&tds[0])?,
            date: clean_text(&element_text(&tds[1])),
            yeas: element_text(&tds[2]),
            yeas_link: first_href(&tds[2])?,
            nays: element_text(&tds[3]),
            committee: element_text(&tds[4]),
            committee_links: all_hrefs(&tds[4])?,
        })
    }

    /// Both count cells carry a number.
    pub fn has_vote(&self) -> bool {
        !is_blank(&self.yeas) && !is_blank(&self.nays)
    }

    pub fn reported_tally(&self) -> Result<Tally, ParseError> {
        Ok(Tally::yes_no(parse_count(&self.yeas)?, parse_count(&self.nays)?))
    }
}

fn parse_count(raw: &str) -> Result<u32, ParseError> {
    let cleaned = clean_text(raw);
    cleaned
        .parse()
        .map_err(|_| ParseError::BadCount { value: cleaned })
}

/// `{billKeyNoSpaces}-{sequence:04}`
pub fn action_id(bill_key: &str, sequence: usize) -> String {
    let compact: String = bill_key.chars().filter(|c| !c.is_whitespace()).collect();
    format!("{compact}-{sequence:04}")
}

pub fn is_veto_override(description: &str) -> bool {
    description.contains("Veto Override")
}

/// Everything the vote extractor needs from the triggering action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRequest {
    pub kind: VoteKind,
    pub url: Option<String>,
    pub bill: String,
    pub action_id: String,
    pub action_description: String,
    pub action_date: String,
    pub reported: Tally,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedAction {
    pub record: ActionRecord,
    pub vote: Option<VoteRequest>,
}

/// Matching rules for vote links and recordings.
#[derive(Debug, Clone)]
pub struct Classifier {
    pub session_id: String,
    pub base_url: String,
    pub floor_vote_threshold: u32,
    pub committee_vote_host: String,
    pub floor_vote_pattern: String,
    pub recording_host: String,
}

impl Classifier {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            session_id: config.session_id.clone(),
            base_url: config.base_url.clone(),
            floor_vote_threshold: config.floor_vote_threshold,
            committee_vote_host: config.committee_vote_host.clone(),
            floor_vote_pattern: config.floor_vote_pattern.clone(),
            recording_host: config.recording_host.clone(),
        }
    }

    /// PDF vote sheets live on the main legislature site, not on the
    /// `laws.` application host that serves tabulation pages.
    pub fn is_committee_sheet_link(&self, href: &str) -> bool {
        if self.is_floor_tabulation_link(href) {
            return false;
        }
        let Ok(url) = Url::parse(&resolve_url(&self.base_url, href)) else {
            return false;
        };
        url.host_str().is_some_and(|host| {
            host == self.committee_vote_host
                || host.strip_prefix("www.") == Some(self.committee_vote_host.as_str())
        })
    }

    pub fn is_floor_tabulation_link(&self, href: &str) -> bool {
        href.contains(&self.floor_vote_pattern)
    }

    pub fn is_recording_link(&self, href: &str) -> bool {
        href.contains(&self.recording_host)
    }

    /// Heuristic for votes the page does not link: floor votes involve far
    /// more members than any committee.
    pub fn kind_without_link(&self, description: &str, reported: &Tally) -> VoteKind {
        if is_veto_override(description) {
            VoteKind::VetoOverride
        } else if reported.yeas + reported.nays > self.floor_vote_threshold {
            VoteKind::Floor
        } else {
            VoteKind::Committee
        }
    }

    /// Kind and fetchable URL for a linked vote.
    pub fn kind_for_link(&self, href: &str) -> (VoteKind, String) {
        if self.is_floor_tabulation_link(href) {
            (VoteKind::Floor, resolve_url(&self.base_url, href))
        } else if self.is_committee_sheet_link(href) {
            (VoteKind::Committee, href.to_string())
        } else {
            (VoteKind::Unknown, href.to_string())
        }
    }

    /// Build the action record for the `sequence`th chronological action
    /// and, when the row carries counts, the vote to extract.
    pub fn classify(
        &self,
        bill_key: &str,
        sequence: usize,
        row: &ActionRow,
    ) -> Result<ClassifiedAction, ParseError> {
        let id = action_id(bill_key, sequence);
        let has_vote = row.has_vote();

        let vote = if has_vote {
            let reported = row.reported_tally()?;
            let (kind, url) = match &row.yeas_link {
                None => (self.kind_without_link(&row.description, &reported), None),
                Some(href) => {
                    let (kind, url) = self.kind_for_link(href);
                    (kind, Some(url))
                }
            };
            Some(VoteRequest {
                kind,
                url,
                bill: bill_key.to_string(),
                action_id: id.clone(),
                action_description: row.description.clone(),
                action_date: row.date.clone(),
                reported,
            })
        } else {
            None
        };

        let committee = clean_text(&row.committee);
        let record = ActionRecord {
            id,
            bill: bill_key.to_string(),
            session: self.session_id.clone(),
            action: row.description.clone(),
            action_url: row.description_url.clone(),
            date: row.date.clone(),
            has_vote,
            committee: (!committee.is_empty()).then_some(committee),
            recordings: row
                .committee_links
                .iter()
                .filter(|href| self.is_recording_link(href))
                .cloned()
                .collect(),
        };

        Ok(ClassifiedAction { record, vote })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::from_config(&SyncConfig::default())
    }

    fn row(description: &str, yeas: &str, nays: &str, link: Option<&str>) -> ActionRow {
        ActionRow {
            description: description.to_string(),
            date: "03/01/2021".to_string(),
            yeas: yeas.to_string(),
            yeas_link: link.map(str::to_string),
            nays: nays.to_string(),
            committee: "&nbsp".to_string(),
            ..ActionRow::default()
        }
    }

    #[test]
    fn ids_are_compact_and_padded() {
        assert_eq!(action_id("HB 102", 0), "HB102-0000");
        assert_eq!(action_id("SJ 3", 41), "SJ3-0041");
    }

    #[test]
    fn blank_counts_mean_no_vote() {
        let classified = classifier()
            .classify("HB 1", 0, &row("Introduced", "&nbsp", "&nbsp", None))
            .unwrap();
        assert!(!classified.record.has_vote);
        assert!(classified.vote.is_none());
        assert!(classified.record.committee.is_none());
    }

    #[test]
    fn unlinked_votes_use_count_heuristic() {
        let c = classifier();
        let veto = c
            .classify("HB 1", 5, &row("Veto Override Vote Passed", "70", "30", None))
            .unwrap();
        assert_eq!(veto.vote.unwrap().kind, VoteKind::VetoOverride);

        let floor = c
            .classify("HB 1", 6, &row("3rd Reading Passed", "30", "15", None))
            .unwrap();
        assert_eq!(floor.vote.unwrap().kind, VoteKind::Floor);

        let committee = c
            .classify("HB 1", 7, &row("Committee Executive Action", "7", "5", None))
            .unwrap();
        let vote = committee.vote.unwrap();
        assert_eq!(vote.kind, VoteKind::Committee);
        assert_eq!(vote.reported, Tally::yes_no(7, 5));
        assert!(vote.url.is_none());
    }

    #[test]
    fn threshold_is_exclusive_and_configurable() {
        let mut c = classifier();
        assert_eq!(
            c.kind_without_link("2nd Reading", &Tally::yes_no(20, 20)),
            VoteKind::Committee
        );
        c.floor_vote_threshold = 30;
        assert_eq!(
            c.kind_without_link("2nd Reading", &Tally::yes_no(20, 20)),
            VoteKind::Floor
        );
    }

    #[test]
    fn linked_votes_use_host_patterns() {
        let c = classifier();
        let floor = c
            .classify(
                "HB 701",
                40,
                &row(
                    "3rd Reading Passed",
                    "60",
                    "40",
                    Some("LAW0211W$BLAC.VoteTabulation?P_VOTE_SEQ=H1412&P_SESS=20211"),
                ),
            )
            .unwrap();
        let vote = floor.vote.unwrap();
        assert_eq!(vote.kind, VoteKind::Floor);
        assert_eq!(
            vote.url.as_deref(),
            Some("http://laws.leg.mt.gov/legprd/LAW0211W$BLAC.VoteTabulation?P_VOTE_SEQ=H1412&P_SESS=20211")
        );

        let sheet = "https://leg.mt.gov/bills/2021/minutes/house/votesheets/HB0701TAH210401.pdf";
        let committee = c
            .classify("HB 701", 27, &row("Committee Executive Action", "12", "7", Some(sheet)))
            .unwrap();
        let vote = committee.vote.unwrap();
        assert_eq!(vote.kind, VoteKind::Committee);
        assert_eq!(vote.url.as_deref(), Some(sheet));

        let absolute =
            "http://laws.leg.mt.gov/legprd/LAW0211W$BLAC.VoteTabulation?P_VOTE_SEQ=H1412&P_SESS=20211";
        assert_eq!(c.kind_for_link(absolute), (VoteKind::Floor, absolute.to_string()));
        assert!(!c.is_committee_sheet_link(absolute));
    }

    #[test]
    fn committee_host_is_matched_by_host_not_substring() {
        let c = classifier();
        assert!(c.is_committee_sheet_link("https://leg.mt.gov/bills/2021/votesheets/HB0001.pdf"));
        assert!(c.is_committee_sheet_link("https://www.leg.mt.gov/bills/HB0001.pdf"));
        assert!(!c.is_committee_sheet_link("http://laws.leg.mt.gov/legprd/LAW0203W$BSIV.ActionQuery"));
        assert!(!c.is_committee_sheet_link("https://notleg.mt.gov.example.test/leg.mt.gov.pdf"));
        assert!(!c.is_committee_sheet_link("LAW0203W$BSIV.ActionQuery?P_BILL_NO1=1"));
    }

    #[test]
    fn unrecognised_link_is_unknown_not_an_error() {
        let classified = classifier()
            .classify("HB 1", 2, &row("Vote", "7", "3", Some("http://elsewhere.test/v")))
            .unwrap();
        let vote = classified.vote.unwrap();
        assert_eq!(vote.kind, VoteKind::Unknown);
        assert_eq!(vote.kind.known(), None);
    }

    #[test]
    fn committee_and_recordings() {
        let mut r = row("Hearing", "&nbsp", "&nbsp", None);
        r.committee = "(H) Judiciary".to_string();
        r.committee_links = vec![
            "http://sg001-harmony.sliq.net/00309/Harmony/en/PowerBrowser/PowerBrowserV2/1".to_string(),
            "https://leg.mt.gov/minutes".to_string(),
        ];
        let classified = classifier().classify("HB 1", 1, &r).unwrap();
        assert_eq!(classified.record.committee.as_deref(), Some("(H) Judiciary"));
        assert_eq!(classified.record.recordings.len(), 1);
    }

    #[test]
    fn garbage_count_is_a_parse_error() {
        assert!(matches!(
            classifier().classify("HB 1", 0, &row("Vote", "lots", "3", None)),
            Err(ParseError::BadCount { .. })
        ));
    }
}
