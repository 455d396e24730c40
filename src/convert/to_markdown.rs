//! BBCode to Markdown.
use std::ops::Range;

use crate::{
    grammar::{ContentMode, OpenCounts, Params, TagDefinition, TagTable},
    html::normalize_line_endings,
    parser::ItemMarker,
    rules::builtin::NoParseRule,
    BBParser, Token, TokenKind,
};

use super::tidy;

/// Convert BBCode to Markdown.
///
/// Tags without a Markdown equivalent (colors, sizes, alignment, spoilers) keep only their content. Invalid
/// tags are kept as text, as the HTML renderer does.
pub fn bbcode_to_markdown(source: &str, table: &TagTable) -> String {
    let source = normalize_line_endings(source);
    let mut parser = BBParser::new(&source, table);
    let mut writer = MarkdownWriter::new(table);
    let mut pending: Option<Range<usize>> = None;

    while let Some(tk) = parser.next() {
        let end = tk.start + tk.span.len();
        if tk.is_text() {
            pending = Some(pending.map_or(tk.start..end, |x| x.start..end));
            continue;
        }

        if let Some(range) = pending.take() {
            writer.text(&source[range]);
        }

        match tk.kind {
            TokenKind::OpenBBTag(_) | TokenKind::StandaloneBBTag(_) => writer.open(&tk, &mut parser),
            TokenKind::CloseBBTag(_) => writer.close(&tk),
            TokenKind::ItemCode(marker) => writer.item(marker),
            TokenKind::Text => {}
        }
    }

    if let Some(range) = pending.take() {
        writer.text(&source[range]);
    }

    writer.finish()
}

enum FrameKind {
    /// Markdown delimiter written again on close.
    Delimited(&'static str),
    Link(String),
    Quote,
    Code,
    List { ordered: bool, next: usize },
    Item,
    Table { rows: Vec<Vec<String>> },
    Row { cells: Vec<String> },
    Cell,
    Footnote,
    /// No Markdown equivalent; only the content is kept.
    Plain,
}

struct Frame {
    name: &'static str,
    /// Output length when the tag opened. Table frames rewrite their content from here.
    start: usize,
    line_start: bool,
    kind: FrameKind,
}

struct MarkdownWriter<'t> {
    table: &'t TagTable,
    out: String,
    stack: Vec<Frame>,
    open_names: OpenCounts,
    /// Stack indices of the open lists.
    lists: Vec<usize>,
    quote_depth: usize,
    table_depth: usize,
    at_line_start: bool,
    /// Line breaks inside a quote, written with their prefix once more text follows.
    pending_newlines: usize,
    /// A quote closed and wants a blank line before whatever comes next.
    blank_pending: bool,
    /// Drop the leading whitespace of the next text.
    trim_next: bool,
}

impl<'t> MarkdownWriter<'t> {
    fn new(table: &'t TagTable) -> Self {
        Self {
            table,
            out: String::new(),
            stack: vec![],
            open_names: OpenCounts::default(),
            lists: vec![],
            quote_depth: 0,
            table_depth: 0,
            at_line_start: true,
            pending_newlines: 0,
            blank_pending: false,
            trim_next: false,
        }
    }

    fn in_structure(&self) -> bool {
        self.stack.last().map_or(false, |x| {
            matches!(x.kind, FrameKind::List { .. } | FrameKind::Table { .. } | FrameKind::Row { .. })
        })
    }

    fn quote_prefix(&mut self, blank: bool) {
        let prefix = "> ".repeat(self.quote_depth);
        self.out.push_str(if blank { prefix.trim_end() } else { prefix.as_str() });
    }

    /// Write out the deferred blank line and line breaks.
    fn flush(&mut self) {
        if self.blank_pending {
            self.blank_pending = false;
            if !self.at_line_start {
                self.out.push('\n');
            }
            self.quote_prefix(true);
            self.out.push('\n');
            self.at_line_start = true;
        }
        while self.pending_newlines > 0 {
            self.pending_newlines -= 1;
            if self.at_line_start {
                self.quote_prefix(true);
            }
            self.out.push('\n');
            self.at_line_start = true;
        }
    }

    /// Append `text`, prefixing each line with the open quotes.
    fn write(&mut self, mut text: &str) {
        if self.trim_next {
            text = text.trim_start();
            if text.is_empty() {
                return;
            }
            self.trim_next = false;
        }
        if text.is_empty() {
            return;
        }
        if self.table_depth > 0 {
            self.out.push_str(text);
            self.at_line_start = text.ends_with('\n');
            return;
        }

        for piece in text.split_inclusive('\n') {
            let (line, newline) = match piece.strip_suffix('\n') {
                Some(line) => (line, true),
                None => (piece, false),
            };
            if !line.is_empty() {
                self.flush();
                if self.at_line_start {
                    self.quote_prefix(false);
                }
                self.out.push_str(line);
                self.at_line_start = false;
            }
            if newline {
                if self.quote_depth > 0 {
                    self.pending_newlines += 1;
                } else {
                    self.flush();
                    self.out.push('\n');
                    self.at_line_start = true;
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_structure() && text.trim().is_empty() {
            return;
        }
        if self.stack.last().map_or(false, |x| matches!(x.kind, FrameKind::Code)) {
            self.write(text.trim_matches('\n'));
            return;
        }
        self.write(text);
    }

    fn start_line(&mut self) {
        self.flush();
        if !self.at_line_start {
            self.out.push('\n');
            self.at_line_start = true;
        }
    }

    fn open(&mut self, tk: &Token<'_>, parser: &mut BBParser<'_>) {
        let table = self.table;
        let parsed = tk
            .tag_name()
            .and_then(|x| table.lookup(x))
            .and_then(|def| Some((def, def.parse_params(tk.args().unwrap_or_default())?)));
        let Some((def, params)) = parsed else {
            self.write(tk.span);
            return;
        };

        if let Some(validator) = def.captures_content(&params) {
            let captured = parser.find_close(def.name).and_then(|(content_len, close_len)| {
                let content = &parser.remaining()[..content_len];
                Some((validator.check(content)?.into_owned(), content.to_owned(), content_len + close_len))
            });
            let Some((value, content, len)) = captured else {
                self.write(tk.span);
                return;
            };

            self.captured(def, &params, &value, &content);
            parser.advance(len);
            return;
        }

        if def.content == ContentMode::Verbatim {
            parser.push_rule(NoParseRule::new(def.name));
        }

        let kind = match def.name {
            "hr" => {
                self.start_line();
                self.write("---\n");
                return;
            }
            "br" => {
                self.write("\n");
                return;
            }
            "b" => Some(FrameKind::Delimited("**")),
            "i" => Some(FrameKind::Delimited("*")),
            "s" => Some(FrameKind::Delimited("~~")),
            "icode" | "tt" => Some(FrameKind::Delimited("`")),
            "url" | "iurl" => params.value.clone().map(FrameKind::Link),
            "email" => params.value.as_ref().map(|x| FrameKind::Link(format!("mailto:{x}"))),
            "quote" if self.table_depth == 0 => Some(FrameKind::Quote),
            "code" => Some(FrameKind::Code),
            "list" => {
                let ordered = params
                    .get("type")
                    .map_or(false, |x| !matches!(x, "none" | "disc" | "circle" | "square"));
                Some(FrameKind::List { ordered, next: 1 })
            }
            "li" => {
                self.item_prefix();
                Some(FrameKind::Item)
            }
            "table" => Some(FrameKind::Table { rows: vec![] }),
            "tr" => Some(FrameKind::Row { cells: vec![] }),
            "td" | "th" => Some(FrameKind::Cell),
            "footnote" => Some(FrameKind::Footnote),
            _ => None,
        };

        if def.standalone {
            return;
        }
        match &kind {
            Some(FrameKind::Delimited(delimiter)) => self.write(delimiter),
            Some(FrameKind::Link(_)) => self.write("["),
            Some(FrameKind::Quote) => {
                self.start_line();
                self.quote_depth += 1;
                self.trim_next = true;
            }
            Some(FrameKind::Code) => {
                self.start_line();
                self.write(&format!("```{}\n", params.value.as_deref().unwrap_or_default()));
            }
            Some(FrameKind::Footnote) => {
                self.write(" (");
                self.trim_next = true;
            }
            Some(FrameKind::List { .. }) => self.lists.push(self.stack.len()),
            Some(FrameKind::Table { .. }) => self.table_depth += 1,
            _ => {}
        }

        self.push(Frame {
            name: def.name,
            start: self.out.len(),
            line_start: self.at_line_start,
            kind: kind.unwrap_or(FrameKind::Plain),
        });
    }

    fn push(&mut self, frame: Frame) {
        self.open_names.add(frame.name);
        self.stack.push(frame);
    }

    /// Tags whose raw content is their value: `[img]`, and the content forms of `[url]` and `[email]`.
    fn captured(&mut self, def: &TagDefinition, params: &Params, value: &str, content: &str) {
        match def.name {
            "img" => {
                let alt = params.get("alt").unwrap_or_default();
                self.write(&format!("![{alt}]({value})"));
            }
            "url" | "iurl" | "email" => self.write(&format!("<{value}>")),
            _ => self.write(content),
        }
    }

    fn item_prefix(&mut self) {
        let depth = self.lists.len().saturating_sub(1);
        let list = self.lists.last().and_then(|&idx| self.stack.get_mut(idx));
        let marker = match list.map(|x| &mut x.kind) {
            Some(FrameKind::List { ordered: true, next }) => {
                let marker = format!("{next}. ");
                *next += 1;
                marker
            }
            _ => "- ".to_owned(),
        };

        self.start_line();
        self.write(&format!("{}{marker}", "  ".repeat(depth)));
    }

    fn item(&mut self, marker: ItemMarker) {
        if self.stack.last().map_or(false, |x| matches!(x.kind, FrameKind::Item)) {
            self.close_top();
        }

        let in_list = self.stack.last().map_or(false, |x| matches!(x.kind, FrameKind::List { .. }));
        if in_list {
            self.item_prefix();
            self.push(Frame {
                name: "li",
                start: self.out.len(),
                line_start: self.at_line_start,
                kind: FrameKind::Item,
            });
            return;
        }

        self.start_line();
        self.write(if marker == ItemMarker::Decimal { "1. " } else { "- " });
    }

    fn close(&mut self, tk: &Token<'_>) {
        let name = tk.tag_name().unwrap_or_default();
        if self.open_names.get(name) == 0 {
            self.write(tk.span);
            return;
        }
        let Some(idx) = self.stack.iter().rposition(|x| x.name == name) else {
            return;
        };

        while self.stack.len() > idx {
            self.close_top();
        }
    }

    fn close_top(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        self.open_names.remove(frame.name);

        match frame.kind {
            FrameKind::Delimited(delimiter) => self.write(delimiter),
            FrameKind::Link(href) => self.write(&format!("]({href})")),
            FrameKind::Quote => {
                self.pending_newlines = 0;
                self.trim_next = false;
                if !self.at_line_start {
                    self.out.push('\n');
                    self.at_line_start = true;
                }
                self.quote_depth -= 1;
                self.blank_pending = true;
            }
            FrameKind::Code => {
                self.start_line();
                self.write("```\n");
            }
            FrameKind::List { .. } => {
                self.lists.pop();
                self.write(if self.lists.is_empty() { "\n\n" } else { "\n" });
            }
            FrameKind::Item | FrameKind::Plain => {}
            FrameKind::Cell => {
                let text = self.out.split_off(frame.start);
                let text = text.trim().replace('\n', " ").replace('|', "\\|");
                if let Some(Frame { kind: FrameKind::Row { cells }, .. }) = self.stack.last_mut() {
                    cells.push(text);
                }
                self.at_line_start = frame.line_start;
            }
            FrameKind::Row { cells } => {
                self.out.truncate(frame.start);
                self.at_line_start = frame.line_start;
                if let Some(Frame { kind: FrameKind::Table { rows }, .. }) = self.stack.last_mut() {
                    rows.push(cells);
                }
            }
            FrameKind::Table { rows } => {
                self.out.truncate(frame.start);
                self.at_line_start = frame.line_start;
                self.table_depth -= 1;
                self.start_line();
                self.table(&rows);
            }
            FrameKind::Footnote => {
                self.pending_newlines = 0;
                self.trim_next = false;
                let end = self.out.trim_end().len();
                self.out.truncate(end);
                self.write(")");
            }
        }
    }

    fn table(&mut self, rows: &[Vec<String>]) {
        let Some(columns) = rows.iter().map(Vec::len).max().filter(|x| *x > 0) else {
            return;
        };

        for (idx, row) in rows.iter().enumerate() {
            let mut line = String::from("|");
            for column in 0..columns {
                line.push(' ');
                line.push_str(row.get(column).map_or("", String::as_str));
                line.push_str(" |");
            }
            line.push('\n');

            if idx == 0 {
                line.push('|');
                line.push_str(&" --- |".repeat(columns));
                line.push('\n');
            }
            self.write(&line);
        }
    }

    fn finish(mut self) -> String {
        while !self.stack.is_empty() {
            self.close_top();
        }
        tidy(&self.out)
    }
}
