use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the master bill listing. Field names are the exported contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub key: String, // e.g. "HB 102"
    pub bill_page_url: String,
    pub bill_text_url: String,
    pub bill_pdf_url: String,
    pub lc: String, // drafting (legislative council) number
    pub title: String,
    pub sponsor: String,
    pub sponsor_party: String,
    pub sponsor_district: String,
    pub status_date: String, // MM/DD/YYYY as published
    pub last_action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub subject: String,
    pub fiscal_code: String,
    pub vote_req: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillRecord {
    #[serde(flatten)]
    pub roster: RosterEntry,
    pub session: String,
    pub bill_status: String,
    pub fiscal_notes_list_url: Option<String>,
    pub amendment_list_url: Option<String>,
    pub draft_requestor: Option<String>,
    pub bill_requestor: Option<String>,
    pub primary_sponsor: Option<String>,
    pub subjects: Vec<Subject>,
    pub vote_requirements: Vec<String>,
    pub deadline_category: String,
    pub transmittal_deadline: String,
    pub amended_return_deadline: String,
}

impl BillRecord {
    pub fn key(&self) -> &str {
        &self.roster.key
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub id: String, // "{billKeyNoSpaces}-{sequence:04}", chronological
    pub bill: String,
    pub session: String,
    pub action: String,
    pub action_url: Option<String>,
    pub date: String,
    pub has_vote: bool,
    pub committee: Option<String>,
    pub recordings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum VoteKind {
    #[serde(rename = "floor")]
    Floor,
    #[serde(rename = "committee")]
    Committee,
    #[serde(rename = "veto override")]
    VetoOverride,
    #[serde(rename = "unknown")]
    Unknown,
}

impl VoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteKind::Floor => "floor",
            VoteKind::Committee => "committee",
            VoteKind::VetoOverride => "veto override",
            VoteKind::Unknown => "unknown",
        }
    }

    /// The value recorded on a vote; an unclassified vote carries no type.
    pub fn known(self) -> Option<VoteKind> {
        match self {
            VoteKind::Unknown => None,
            kind => Some(kind),
        }
    }
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vote totals. Committee sheets and synthesized votes only carry Y/N.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Tally {
    #[serde(rename = "Y")]
    pub yeas: u32,
    #[serde(rename = "N")]
    pub nays: u32,
    #[serde(rename = "E", default, skip_serializing_if = "Option::is_none")]
    pub excused: Option<u32>,
    #[serde(rename = "A", default, skip_serializing_if = "Option::is_none")]
    pub absent: Option<u32>,
}

impl Tally {
    pub fn yes_no(yeas: u32, nays: u32) -> Self {
        Self {
            yeas,
            nays,
            excused: None,
            absent: None,
        }
    }

    pub fn total(&self) -> u32 {
        self.yeas + self.nays + self.excused.unwrap_or(0) + self.absent.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Choice {
    Y,
    N,
    E,
    A,
}

impl Choice {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'Y' => Some(Choice::Y),
            'N' => Some(Choice::N),
            'E' => Some(Choice::E),
            'A' => Some(Choice::A),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LegislatorVote {
    pub name: String,
    #[serde(rename = "vote")]
    pub choice: Choice,
}

/// Recoverable vote-level failure. The run continues with row-reported totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum VoteError {
    #[serde(rename = "Missing vote page")]
    MissingVotePage,
    #[serde(rename = "Missing PDF")]
    MissingPdf,
    #[serde(rename = "Missing URL")]
    MissingUrl,
    #[serde(rename = "Skipped previously missing vote page")]
    SkippedMissingVotePage,
    #[serde(rename = "Malformed vote document")]
    MalformedDocument,
}

impl VoteError {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteError::MissingVotePage => "Missing vote page",
            VoteError::MissingPdf => "Missing PDF",
            VoteError::MissingUrl => "Missing URL",
            VoteError::SkippedMissingVotePage => "Skipped previously missing vote page",
            VoteError::MalformedDocument => "Malformed vote document",
        }
    }
}

impl fmt::Display for VoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VoteRecord {
    pub url: Option<String>,
    pub bill: String,
    pub session: String,
    pub action_id: String,
    #[serde(rename = "type")]
    pub vote_type: Option<VoteKind>,
    pub seq_number: Option<String>, // floor votes only
    pub date: Option<String>,
    pub description: Option<String>,
    pub totals: Tally,
    pub votes: Vec<LegislatorVote>,
    pub error: Option<VoteError>,
}

impl VoteRecord {
    /// Degrade to row-reported totals; the legislator list is dropped.
    pub fn fail(&mut self, error: VoteError, reported: Tally) {
        self.error = Some(error);
        self.totals = reported;
        self.votes.clear();
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_record_uses_stable_field_names() {
        let record = VoteRecord {
            url: None,
            bill: "HB 2".to_string(),
            session: "20211".to_string(),
            action_id: "HB2-0003".to_string(),
            vote_type: Some(VoteKind::VetoOverride),
            seq_number: None,
            date: Some("04/01/2021".to_string()),
            description: Some("Veto Override Vote".to_string()),
            totals: Tally::yes_no(70, 30),
            votes: Vec::new(),
            error: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "veto override");
        assert_eq!(value["action_id"], "HB2-0003");
        assert_eq!(value["totals"], serde_json::json!({"Y": 70, "N": 30}));
        assert!(value["error"].is_null());
    }

    #[test]
    fn fail_resets_to_reported_totals() {
        let mut record = VoteRecord {
            url: Some("http://example.test/v".to_string()),
            bill: "SB 1".to_string(),
            session: "20211".to_string(),
            action_id: "SB1-0001".to_string(),
            vote_type: Some(VoteKind::Floor),
            seq_number: Some("S12".to_string()),
            date: None,
            description: None,
            totals: Tally {
                yeas: 1,
                nays: 0,
                excused: Some(0),
                absent: Some(0),
            },
            votes: vec![LegislatorVote {
                name: "Smith".to_string(),
                choice: Choice::Y,
            }],
            error: None,
        };
        record.fail(VoteError::MissingVotePage, Tally::yes_no(30, 20));
        assert_eq!(record.totals, Tally::yes_no(30, 20));
        assert!(record.votes.is_empty());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["error"], "Missing vote page");
    }

    #[test]
    fn bill_record_flattens_roster_fields() {
        let bill = BillRecord {
            roster: RosterEntry {
                key: "HB 102".to_string(),
                bill_page_url: "p".to_string(),
                bill_text_url: "t".to_string(),
                bill_pdf_url: "f".to_string(),
                lc: "LC0001".to_string(),
                title: "Title".to_string(),
                sponsor: "Jane Doe".to_string(),
                sponsor_party: "R".to_string(),
                sponsor_district: "HD 1".to_string(),
                status_date: "01/01/2021".to_string(),
                last_action: "Introduced".to_string(),
            },
            session: "20211".to_string(),
            bill_status: "Introduced".to_string(),
            fiscal_notes_list_url: None,
            amendment_list_url: None,
            draft_requestor: None,
            bill_requestor: None,
            primary_sponsor: None,
            subjects: Vec::new(),
            vote_requirements: Vec::new(),
            deadline_category: "A".to_string(),
            transmittal_deadline: "03/03/2021".to_string(),
            amended_return_deadline: "04/08/2021".to_string(),
        };
        let value = serde_json::to_value(&bill).unwrap();
        assert_eq!(value["key"], "HB 102");
        assert_eq!(value["statusDate"], "01/01/2021");
        assert_eq!(value["billStatus"], "Introduced");
        let back: BillRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, bill);
    }
}
