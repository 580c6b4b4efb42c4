use lopdf::Document;
use regex::Regex;

use crate::config::SyncConfig;
use crate::error::ParseError;
use crate::schema::{Choice, LegislatorVote, Tally};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeVote {
    pub date: String,
    pub description: String,
    pub totals: Tally,
    pub votes: Vec<LegislatorVote>,
}

/// Parse a committee vote sheet PDF. Only the first page is read.
pub fn parse_vote_sheet(bytes: &[u8], config: &SyncConfig) -> Result<CommitteeVote, ParseError> {
    let doc = Document::load_mem(bytes)?;
    let text = doc.extract_text(&[1])?;
    parse_vote_sheet_text(&text, config)
}

/// Parse the extracted text of a vote sheet.
///
/// The sheet is a header block (committee, date, ..., motion), a
/// `YEAS - n NAYS - n` line, then one `<letter><name>` line per member.
pub fn parse_vote_sheet_text(text: &str, config: &SyncConfig) -> Result<CommitteeVote, ParseError> {
    let text = text.replace("\r\n", "\n");
    let tally = Regex::new(r"\nYEAS\s+[-–]\s+(\d+)\s+NAYS\s+[-–]\s+(\d+)")?;
    let caps = tally
        .captures_iter(&text)
        .last()
        .ok_or_else(|| ParseError::VoteDocument("no YEAS/NAYS line".to_string()))?;

    let (Some(whole), Some(yeas), Some(nays)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return Err(ParseError::VoteDocument("incomplete YEAS/NAYS line".to_string()));
    };
    let count = |raw: &str| -> Result<u32, ParseError> {
        raw.parse().map_err(|_| ParseError::BadCount {
            value: raw.to_string(),
        })
    };
    let totals = Tally::yes_no(count(yeas.as_str())?, count(nays.as_str())?);

    let header: Vec<&str> = text[..whole.start()].split('\n').collect();
    let date = header
        .get(1)
        .map(|line| line.trim().to_string())
        .ok_or_else(|| ParseError::VoteDocument("header has no date line".to_string()))?;
    let description = header
        .last()
        .map(|line| line.trim().to_string())
        .unwrap_or_default();

    let rest = &text[whole.end()..];
    let votes = rest
        .split('\n')
        .skip(1)
        .filter_map(|line| member_vote(line, config))
        .collect();

    Ok(CommitteeVote {
        date,
        description,
        totals,
        votes,
    })
}

fn member_vote(line: &str, config: &SyncConfig) -> Option<LegislatorVote> {
    let mut chars = line.chars();
    let choice = chars.next().and_then(Choice::from_letter)?;
    let raw = chars.as_str();
    if raw.is_empty() {
        return None;
    }
    let name = raw
        .trim()
        .replace(' ', "")
        .replace(',', ", ")
        .replace(";byProxy", "");
    Some(LegislatorVote {
        name: config.clean_name(&name),
        choice,
    })
}

/// Single-page vote sheet PDF with one text object per line.
#[cfg(test)]
pub(crate) fn sheet_pdf(lines: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let y = 760 - 16 * i as i64;
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), Object::Integer(11)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::Integer(40), Object::Integer(y)],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations }.encode().unwrap();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(vec![Object::Reference(page_id)]),
            "Count" => Object::Integer(1),
            "MediaBox" => Object::Array(
                [0, 0, 612, 792].into_iter().map(Object::Integer).collect(),
            ),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[cfg(test)]
pub(crate) const SHEET_LINES: &[&str] = &[
    "HOUSE JUDICIARY COMMITTEE",
    "April 1, 2021",
    "Roll Call Vote",
    "HB 701 - Do Pass",
    "YEAS - 2   NAYS - 1",
    "Y Abbott, Kim",
    "N Bedey, David;byProxy",
    "Y Carlson, Jen",
    "Printed 04/01/2021",
];
