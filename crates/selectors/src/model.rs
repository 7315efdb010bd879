use serde::{Deserialize, Serialize};

use dom_page::{Document, NodeId};

use crate::errors::SelectorError;

/// Logical targets the engine resolves in host markup.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    ResultContainer,
    ActiveResearchPanel,
    ThinkingPanel,
    SourceListRegion,
    UsedSourceList,
    UnusedSourceList,
    SourceItem,
    SourceItemLabelTarget,
    WebsiteGroup,
    WebsiteItem,
    WebsiteItemContent,
    InsertionPoint,
    SummaryToolbar,
    SummaryHeader,
    ResearchContent,
}

impl Target {
    pub const ALL: [Target; 15] = [
        Target::ResultContainer,
        Target::ActiveResearchPanel,
        Target::ThinkingPanel,
        Target::SourceListRegion,
        Target::UsedSourceList,
        Target::UnusedSourceList,
        Target::SourceItem,
        Target::SourceItemLabelTarget,
        Target::WebsiteGroup,
        Target::WebsiteItem,
        Target::WebsiteItemContent,
        Target::InsertionPoint,
        Target::SummaryToolbar,
        Target::SummaryHeader,
        Target::ResearchContent,
    ];
}

/// One compound structural query: an optional tag plus any number of class
/// and attribute requirements. Combinators are out of scope; the registry's
/// ranked lists cover the variants the original markup needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    raw: String,
}

impl Query {
    /// Parse a single compound query, e.g. `div.source-list.used-sources`
    /// or `span[data-test-id="content"]`.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(SelectorError::Empty);
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(SelectorError::parse(raw, "combinators are not supported"));
        }

        let mut tag = None;
        let mut classes = Vec::new();
        let mut attrs = Vec::new();
        let mut chars = raw.char_indices().peekable();

        if let Some((_, c)) = chars.peek() {
            if is_ident_char(*c) {
                tag = Some(take_ident(&mut chars));
            }
        }

        while let Some((at, c)) = chars.next() {
            match c {
                '.' => {
                    let ident = take_ident(&mut chars);
                    if ident.is_empty() {
                        return Err(SelectorError::parse(raw, "empty class name"));
                    }
                    classes.push(ident);
                }
                '[' => {
                    let rest = &raw[at + 1..];
                    let close = rest
                        .find(']')
                        .ok_or_else(|| SelectorError::parse(raw, "unterminated attribute"))?;
                    let body = &rest[..close];
                    attrs.push(parse_attr(raw, body)?);
                    // Skip past the `]`.
                    for (idx, _) in chars.by_ref() {
                        if idx == at + 1 + close {
                            break;
                        }
                    }
                }
                other => {
                    return Err(SelectorError::parse(
                        raw,
                        format!("unexpected character `{other}`"),
                    ));
                }
            }
        }

        if tag.is_none() && classes.is_empty() && attrs.is_empty() {
            return Err(SelectorError::parse(raw, "no structural requirements"));
        }

        Ok(Self {
            tag,
            classes,
            attrs,
            raw: raw.to_string(),
        })
    }

    /// Parse a comma-separated list of alternatives into ranked queries.
    pub fn parse_list(input: &str) -> Result<Vec<Self>, SelectorError> {
        let mut out = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            out.push(Self::parse(part)?);
        }
        if out.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(out)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `node` satisfies every requirement of this query.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if doc.tag(node).as_deref() != Some(tag.as_str()) {
                return false;
            }
        }
        for class in &self.classes {
            if !doc.has_class(node, class) {
                return false;
            }
        }
        for (name, expected) in &self.attrs {
            match expected {
                Some(value) => {
                    if doc.attr(node, name).as_deref() != Some(value.as_str()) {
                        return false;
                    }
                }
                None => {
                    if !doc.has_attr(node, name) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> String {
    let mut ident = String::new();
    while let Some((_, c)) = chars.peek() {
        if is_ident_char(*c) {
            ident.push(*c);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

fn parse_attr(raw: &str, body: &str) -> Result<(String, Option<String>), SelectorError> {
    match body.split_once('=') {
        None => {
            if body.is_empty() {
                return Err(SelectorError::parse(raw, "empty attribute name"));
            }
            Ok((body.to_string(), None))
        }
        Some((name, value)) => {
            if name.is_empty() {
                return Err(SelectorError::parse(raw, "empty attribute name"));
            }
            let value = value.trim_matches('"');
            Ok((name.to_string(), Some(value.to_string())))
        }
    }
}
