//! Twee 3 source: `:: Name [tags] {metadata}` passage headers, with the
//! `StoryTitle` and `StoryData` special passages lifted into the story.

use reweave_core::{CoreError, Dialect, Passage, Story};
use serde_json::Value;
use tracing::debug;

const TITLE_PASSAGE: &str = "StoryTitle";
const DATA_PASSAGE: &str = "StoryData";

/// A parsed Twee file and the problems found in it. Problems never stop
/// parsing: the offending text is kept as an ordinary passage.
#[derive(Debug)]
pub struct ParsedTwee {
    pub story: Story,
    pub issues: Vec<CoreError>,
}

struct Header {
    name: String,
    tags: Vec<String>,
    metadata: Option<String>,
}

/// Parse Twee source. `default_format` is used when there is no
/// `StoryData` or it names no known format.
pub fn parse_twee(text: &str, default_format: Dialect) -> ParsedTwee {
    let mut story = Story::new("Untitled", default_format);
    let mut issues = Vec::new();
    let mut current: Option<(Header, Vec<&str>)> = None;
    let mut passages = Vec::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("::") {
            passages.extend(current.take());
            current = Some((parse_header(rest), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    passages.extend(current);

    for (header, body) in passages {
        let content = body.join("\n").trim_end_matches(['\n', '\r', ' ', '\t']).to_string();
        match header.name.as_str() {
            TITLE_PASSAGE => story.title = content.trim().to_string(),
            DATA_PASSAGE => match serde_json::from_str::<Value>(&content) {
                Ok(data) => apply_story_data(&mut story, data, &mut issues),
                Err(err) => {
                    issues.push(CoreError::StoryData(err.to_string()));
                    story.passages.push(into_passage(header, content));
                }
            },
            _ => story.passages.push(into_passage(header, content)),
        }
    }
    debug!(
        title = story.title.as_str(),
        passages = story.passages.len(),
        format = %story.format,
        "parsed twee"
    );
    ParsedTwee { story, issues }
}

fn into_passage(header: Header, content: String) -> Passage {
    Passage {
        name: header.name,
        content,
        tags: header.tags,
        metadata: header.metadata,
    }
}

fn apply_story_data(story: &mut Story, data: Value, issues: &mut Vec<CoreError>) {
    if let Some(format) = data.get("format").and_then(Value::as_str) {
        match Dialect::from_format_name(format) {
            Some(dialect) => story.format = dialect,
            None => issues.push(CoreError::UnknownDialect(format.to_string())),
        }
    }
    if let Some(start) = data.get("start").and_then(Value::as_str) {
        story.start = Some(start.to_string());
    }
    story.story_data = Some(data);
}

/// Split a header line (without its leading `::`) into name, tags and
/// metadata, honouring backslash escapes in the name and tags.
fn parse_header(rest: &str) -> Header {
    let mut name = String::new();
    let mut tags = String::new();
    let mut metadata = None;
    let mut in_tags = false;
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    let field = if in_tags { &mut tags } else { &mut name };
                    field.push(escaped);
                }
            }
            '[' if !in_tags && tags.is_empty() => in_tags = true,
            ']' if in_tags => in_tags = false,
            '{' if !in_tags => {
                let block = rest[i..].trim_end();
                metadata = Some(block.to_string());
                break;
            }
            _ if in_tags => tags.push(c),
            _ => name.push(c),
        }
    }
    Header {
        name: name.trim().to_string(),
        tags: tags.split_whitespace().map(str::to_string).collect(),
        metadata,
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '[' | ']' | '{' | '}') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// The `StoryData` block to write for `story`: the parsed one with its
/// `format` (and `start`) brought up to date. A stale `format-version` is
/// dropped when the format changed.
pub fn story_data(story: &Story) -> Value {
    let mut data = match &story.story_data {
        Some(Value::Object(map)) => map.clone(),
        _ => serde_json::Map::new(),
    };
    let format = story.format.format_name();
    let changed = data
        .get("format")
        .and_then(Value::as_str)
        .and_then(Dialect::from_format_name)
        != Some(story.format);
    if changed {
        data.remove("format-version");
    }
    data.insert("format".to_string(), Value::String(format.to_string()));
    if let Some(start) = &story.start {
        data.insert("start".to_string(), Value::String(start.clone()));
    }
    Value::Object(data)
}

/// Write `story` as Twee 3.
pub fn write_twee(story: &Story) -> String {
    let mut out = String::new();
    out.push_str(&format!(":: {TITLE_PASSAGE}\n{}\n\n", story.title));
    // A StoryData passage that failed to parse is written back as found.
    if story.passage(DATA_PASSAGE).is_none() {
        let data = serde_json::to_string_pretty(&story_data(story)).unwrap_or_default();
        out.push_str(&format!(":: {DATA_PASSAGE}\n{data}\n\n"));
    }
    for passage in &story.passages {
        out.push_str(":: ");
        out.push_str(&escape(&passage.name));
        if !passage.tags.is_empty() {
            let tags: Vec<String> = passage.tags.iter().map(|t| escape(t)).collect();
            out.push_str(&format!(" [{}]", tags.join(" ")));
        }
        if let Some(meta) = &passage.metadata {
            out.push(' ');
            out.push_str(meta);
        }
        out.push('\n');
        out.push_str(&passage.content);
        out.push_str("\n\n");
    }
    out
}
