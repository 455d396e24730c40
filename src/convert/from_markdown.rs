//! Markdown to BBCode.
//!
//! Covers the subset people actually paste into a forum: fenced code, block quotes, bullet and ordered lists,
//! pipe tables, ATX headings, rules, and inline emphasis, strike, code spans, links and images.
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::{grammar::TagTable, html::normalize_line_endings};

use super::{open_tag, push_literal, tidy};

static BUILTIN: Lazy<TagTable> = Lazy::new(TagTable::builtin);

static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}(```+|~~~+)\s*([^`\s]*)\s*$").expect("valid regex"));
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}(#{1,6})\s+(.*?)(?:\s+#+)?\s*$").expect("valid regex"));
static RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(?:(?:\*\s*){3,}|(?:-\s*){3,}|(?:_\s*){3,})$").expect("valid regex"));
static LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)([-*+]|\d{1,9}[.)])\s+(.*)$").expect("valid regex"));
static TABLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(?:\|\s*:?-{3,}:?\s*)*\|?\s*$").expect("valid regex"));

static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"``(.+?)``|`([^`]+)`").expect("valid regex"));
static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(!?)\[([^\]]*)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#,
        r"|<((?:https?|ftps?)://[^>\s]+)>",
        r"|<([^@<>\s]+@[^@<>\s]+\.[^@<>\s]+)>",
    ))
    .expect("valid regex")
});
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(\S(?:.*?\S)?)\*\*|__(\S(?:.*?\S)?)__").expect("valid regex"));
static STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~(\S(?:.*?\S)?)~~").expect("valid regex"));
static ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s](?:[^*]*[^*\s])?)\*|\b_([^_\s](?:[^_]*[^_\s])?)_\b").expect("valid regex"));

/// Convert Markdown to BBCode.
pub fn markdown_to_bbcode(markdown: &str) -> String {
    let markdown = normalize_line_endings(markdown);
    let lines: Vec<&str> = markdown.lines().collect();
    tidy(&blocks(&lines))
}

fn blocks(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(caps) = FENCE.captures(line) {
            let fence = &caps[1];
            let body_start = i + 1;
            let mut end = body_start;
            while end < lines.len() && !lines[end].trim_start().starts_with(fence) {
                end += 1;
            }

            let language = caps.get(2).map(|x| x.as_str()).filter(|x| !x.is_empty());
            let open = language
                .and_then(|x| open_tag(&BUILTIN, "code", Some(x), &[]))
                .unwrap_or_else(|| "[code]".to_owned());
            out.push_str(&open);
            out.push_str(&lines[body_start..end].join("\n"));
            out.push_str("[/code]\n");
            i = end + 1;
            continue;
        }

        if line.trim_start().starts_with('>') {
            let mut inner = vec![];
            while i < lines.len() && lines[i].trim_start().starts_with('>') {
                let rest = &lines[i].trim_start()[1..];
                inner.push(rest.strip_prefix(' ').unwrap_or(rest));
                i += 1;
            }
            out.push_str("[quote]");
            out.push_str(&blocks(&inner));
            out.push_str("[/quote]\n");
            continue;
        }

        if RULE.is_match(line) {
            out.push_str("[hr]\n");
            i += 1;
            continue;
        }

        if let Some(caps) = HEADING.captures(line) {
            let text = inline(&caps[2]);
            match caps[1].len() {
                1 => out.push_str(&format!("[size=x-large][b]{text}[/b][/size]\n")),
                2 => out.push_str(&format!("[size=large][b]{text}[/b][/size]\n")),
                _ => out.push_str(&format!("[b]{text}[/b]\n")),
            }
            i += 1;
            continue;
        }

        if LIST_ITEM.is_match(line) {
            let start = i;
            while i < lines.len() && LIST_ITEM.is_match(lines[i]) {
                i += 1;
            }
            out.push_str(&list(&lines[start..i]));
            continue;
        }

        if line.trim_start().starts_with('|') && lines.get(i + 1).map_or(false, |x| TABLE_SEPARATOR.is_match(x)) {
            let header = line;
            i += 2;
            let start = i;
            while i < lines.len() && lines[i].trim_start().starts_with('|') {
                i += 1;
            }
            out.push_str(&table(header, &lines[start..i]));
            continue;
        }

        out.push_str(&inline(line));
        out.push('\n');
        i += 1;
    }

    out
}

struct ListLevel {
    indent: usize,
}

fn list(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut levels: Vec<ListLevel> = vec![];

    for line in lines {
        let Some(caps) = LIST_ITEM.captures(line) else {
            continue;
        };
        let indent = caps[1].chars().map(|c| if c == '\t' { 4 } else { 1 }).sum::<usize>();
        let ordered = caps[2].starts_with(|c: char| c.is_ascii_digit());

        while levels.last().map_or(false, |x| indent < x.indent) {
            out.push_str("[/li][/list]");
            levels.pop();
        }

        match levels.last() {
            Some(top) if top.indent == indent => out.push_str("[/li]"),
            _ => {
                out.push_str(if ordered { "[list type=decimal]" } else { "[list]" });
                levels.push(ListLevel { indent });
            }
        }

        out.push_str("[li]");
        out.push_str(&inline(&caps[3]));
    }

    for _ in levels {
        out.push_str("[/li][/list]");
    }
    out.push('\n');
    out
}

fn table(header: &str, rows: &[&str]) -> String {
    let mut out = String::from("[table]");

    let mut push_row = |line: &str, cell: &str| {
        out.push_str("[tr]");
        for text in split_row(line) {
            out.push_str(&format!("[{cell}]{}[/{cell}]", inline(text)));
        }
        out.push_str("[/tr]");
    };

    push_row(header, "th");
    for row in rows {
        push_row(row, "td");
    }

    out.push_str("[/table]\n");
    out
}

fn split_row(line: &str) -> Vec<&str> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(str::trim).collect()
}

/// Inline markup of one line.
fn inline(text: &str) -> String {
    let mut out = String::new();
    let mut last = 0;

    for caps in CODE_SPAN.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let code = caps.get(1).or_else(|| caps.get(2)).map_or("", |x| x.as_str());
        if code.contains("[/icode") {
            continue;
        }

        out.push_str(&links(&text[last..whole.start()]));
        out.push_str("[icode]");
        out.push_str(code.trim());
        out.push_str("[/icode]");
        last = whole.end();
    }

    out.push_str(&links(&text[last..]));
    out
}

fn links(text: &str) -> String {
    let mut out = String::new();
    let mut last = 0;

    for caps in LINK.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let Some(link) = link(&caps) else {
            continue;
        };

        out.push_str(&emphasis(&text[last..whole.start()]));
        out.push_str(&link);
        last = whole.end();
    }

    out.push_str(&emphasis(&text[last..]));
    out
}

fn link(caps: &Captures<'_>) -> Option<String> {
    if let Some(url) = caps.get(4) {
        let open = open_tag(&BUILTIN, "url", None, &[])?;
        return Some(format!("{open}{}[/url]", url.as_str()));
    }
    if let Some(address) = caps.get(5) {
        let open = open_tag(&BUILTIN, "email", None, &[])?;
        return Some(format!("{open}{}[/email]", address.as_str()));
    }

    let is_image = !caps[1].is_empty();
    let label = &caps[2];
    let target = &caps[3];

    if is_image {
        let alt = [("alt", label)];
        let keys: &[(&str, &str)] = if label.is_empty() { &[] } else { &alt };
        let open = open_tag(&BUILTIN, "img", None, keys).or_else(|| open_tag(&BUILTIN, "img", None, &[]))?;
        return Some(format!("{open}{target}[/img]"));
    }

    if let Some(address) = target.strip_prefix("mailto:") {
        let open = open_tag(&BUILTIN, "email", Some(address), &[])?;
        return Some(format!("{open}{}[/email]", emphasis(label)));
    }
    if label == target {
        return Some(format!("[url]{target}[/url]"));
    }
    let open = open_tag(&BUILTIN, "url", Some(target), &[])?;
    Some(format!("{open}{}[/url]", emphasis(label)))
}

fn emphasis(text: &str) -> String {
    let mut literal = String::new();
    push_literal(&mut literal, text, &BUILTIN);
    if literal.len() != text.len() {
        return literal;
    }

    let text = BOLD.replace_all(text, "[b]${1}${2}[/b]");
    let text = STRIKE.replace_all(&text, "[s]${1}[/s]");
    ITALIC.replace_all(&text, "[i]${1}${2}[/i]").into_owned()
}
