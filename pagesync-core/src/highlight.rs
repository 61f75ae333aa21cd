use serde::Serialize;

const OPEN: &str = "<b>";
const CLOSE: &str = "</b>";
const APOSTROPHE_ENTITIES: [&str; 2] = ["&#x27;", "&#39;"];

/// A piece of a search snippet, emphasized when the index marked it as a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightRun {
    pub text: String,
    pub emphasized: bool,
}

impl HighlightRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: false,
        }
    }

    pub fn emphasized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: true,
        }
    }
}

pub fn decode_entities(snippet: &str) -> String {
    APOSTROPHE_ENTITIES
        .iter()
        .fold(snippet.to_owned(), |text, entity| text.replace(entity, "'"))
}

/// Splits a snippet with `<b>…</b>` markers into plain and emphasized runs.
///
/// Runs are never empty, and adjacent plain text is merged into one run. An
/// opening marker without a closing one is kept as literal text.
pub fn parse(snippet: &str) -> Vec<HighlightRun> {
    let decoded = decode_entities(snippet);
    let mut runs = Vec::new();
    let mut plain = String::new();
    let mut rest = decoded.as_str();

    loop {
        let Some(start) = rest.find(OPEN) else {
            plain.push_str(rest);
            break;
        };
        let interior_start = start + OPEN.len();
        let Some(len) = rest[interior_start..].find(CLOSE) else {
            plain.push_str(rest);
            break;
        };

        plain.push_str(&rest[..start]);
        let interior = &rest[interior_start..interior_start + len];
        if !interior.is_empty() {
            flush_plain(&mut plain, &mut runs);
            runs.push(HighlightRun::emphasized(interior));
        }
        rest = &rest[interior_start + len + CLOSE.len()..];
    }

    flush_plain(&mut plain, &mut runs);
    runs
}

pub fn plain_text(runs: &[HighlightRun]) -> String {
    runs.iter().map(|run| run.text.as_str()).collect()
}

fn flush_plain(plain: &mut String, runs: &mut Vec<HighlightRun>) {
    if !plain.is_empty() {
        runs.push(HighlightRun::plain(std::mem::take(plain)));
    }
}
