// Location helpers for the LAWS pages. The source markup is loose and
// table-based, so lookups go by anchor names and label text.

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::ParseError;

pub fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        css: css.to_string(),
        message: e.to_string(),
    })
}

/// Trim whitespace (NBSP included) and stray `&nbsp` fragments.
pub fn clean_text(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&nbsp", " ")
        .trim()
        .to_string()
}

pub fn is_blank(s: &str) -> bool {
    clean_text(s).is_empty()
}

pub fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>()
}

/// A text node located by content, with the element that holds it.
pub struct TextHit<'a> {
    pub text: String,
    pub parent: ElementRef<'a>,
}

impl<'a> TextHit<'a> {
    /// Nearest enclosing element with the given tag name.
    pub fn enclosing(&self, name: &str) -> Option<ElementRef<'a>> {
        enclosing(self.parent, name)
    }
}

/// First text node whose trimmed content equals `label`.
pub fn find_text<'a>(doc: &'a Html, label: &str) -> Option<TextHit<'a>> {
    let wanted = label.trim();
    find_text_by(doc, |t| t.trim() == wanted)
}

/// First text node containing `needle`.
pub fn find_text_containing<'a>(doc: &'a Html, needle: &str) -> Option<TextHit<'a>> {
    find_text_by(doc, |t| t.contains(needle))
}

fn find_text_by<'a>(doc: &'a Html, matches: impl Fn(&str) -> bool) -> Option<TextHit<'a>> {
    doc.tree.root().descendants().find_map(|node| {
        let text: &str = node.value().as_text()?;
        if !matches(text) {
            return None;
        }
        let parent = node.parent().and_then(ElementRef::wrap)?;
        Some(TextHit {
            text: text.to_string(),
            parent,
        })
    })
}

/// `el` itself or its nearest ancestor with the given tag name.
pub fn enclosing<'a>(el: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    if el.value().name() == name {
        return Some(el);
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == name)
}

/// Text of the `index`th child node of `el`, text nodes included.
pub fn child_node_text(el: &ElementRef, index: usize) -> Option<String> {
    let child = el.children().nth(index)?;
    match child.value() {
        Node::Text(text) => Some((**text).to_string()),
        _ => ElementRef::wrap(child).map(|c| element_text(&c)),
    }
}

/// First non-blank text among the nodes following `el` at the same level.
pub fn following_text(el: &ElementRef) -> Option<String> {
    el.next_siblings()
        .map(|node| match node.value() {
            Node::Text(text) => (**text).to_string(),
            _ => ElementRef::wrap(node)
                .map(|e| element_text(&e))
                .unwrap_or_default(),
        })
        .find(|text| !is_blank(text))
}

/// The table living alongside `<a name="...">`: the first table under the
/// anchor's parent element.
pub fn anchored_table<'a>(doc: &'a Html, anchor: &str) -> Result<ElementRef<'a>, ParseError> {
    let anchor_sel = selector(&format!(r#"a[name="{anchor}"]"#))?;
    let table_sel = selector("table")?;
    let a = doc
        .select(&anchor_sel)
        .next()
        .ok_or_else(|| ParseError::MissingAnchor(anchor.to_string()))?;
    a.parent()
        .and_then(ElementRef::wrap)
        .and_then(|parent| parent.select(&table_sel).next())
        .ok_or_else(|| ParseError::MissingTable(anchor.to_string()))
}

/// Rows of a table, header row skipped.
pub fn body_rows<'a>(table: &ElementRef<'a>) -> Result<Vec<ElementRef<'a>>, ParseError> {
    let tr = selector("tr")?;
    Ok(table.select(&tr).skip(1).collect())
}

pub fn cells<'a>(row: &ElementRef<'a>) -> Result<Vec<ElementRef<'a>>, ParseError> {
    let td = selector("td")?;
    Ok(row.select(&td).collect())
}

pub fn cell_texts(row: &ElementRef) -> Result<Vec<String>, ParseError> {
    Ok(cells(row)?.iter().map(element_text).collect())
}

/// `href` of the first link inside `el`.
pub fn first_href(el: &ElementRef) -> Result<Option<String>, ParseError> {
    let a = selector("a[href]")?;
    Ok(el
        .select(&a)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(str::to_string))
}

pub fn all_hrefs(el: &ElementRef) -> Result<Vec<String>, ParseError> {
    let a = selector("a[href]")?;
    Ok(el
        .select(&a)
        .filter_map(|link| link.value().attr("href"))
        .map(str::to_string)
        .collect())
}

/// Resolve a (usually relative) link against the site base URL.
pub fn resolve_url(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{base}{href}"))
}

/// Text of the cell right after the cell holding `label`.
pub fn sibling_cell_after(table: &ElementRef, label: &str) -> Result<String, ParseError> {
    let wanted = label.trim();
    let holder = table
        .descendants()
        .find(|node| node.value().as_text().is_some_and(|t| t.trim() == wanted))
        .and_then(|node| node.parent())
        .and_then(ElementRef::wrap)
        .ok_or_else(|| ParseError::MissingLabel(label.to_string()))?;
    let td = enclosing(holder, "td").ok_or_else(|| ParseError::MissingLabel(label.to_string()))?;
    td.next_siblings()
        .find_map(ElementRef::wrap)
        .map(|cell| element_text(&cell))
        .ok_or_else(|| ParseError::MissingLabel(label.to_string()))
}
