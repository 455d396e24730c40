//! Repairs BBCode before it is stored.
//!
//! [`Preparser::normalize`] shares the tokenizer and the [`TagTable`] with the renderer, so both passes agree on
//! which tags exist. It closes what was left open, drops empty tags, rewrites parameters into one canonical
//! spelling, strips tags the context does not allow and turns item codes into `[list]`/`[li]` markup.
//! Normalizing twice gives the same text as normalizing once.
use std::ops::Range;

use crate::{
    engine::EngineConfig,
    grammar::{ContentMode, KeySpec, OpenCounts, Params, Suppressions, TagDefinition, TagTable},
    html::{normalize_line_endings, Closing},
    parser::ItemMarker,
    rules::builtin::NoParseRule,
    BBParser, Token, TokenKind,
};

/// Where the normalized text is going to be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreparseOptions {
    pub is_signature: bool,
    pub is_preview: bool,
}

impl PreparseOptions {
    pub fn signature() -> Self {
        Self {
            is_signature: true,
            is_preview: false,
        }
    }

    pub fn preview() -> Self {
        Self {
            is_signature: false,
            is_preview: true,
        }
    }
}

pub struct Preparser<'t> {
    table: &'t TagTable,
    config: &'t EngineConfig,
}

impl<'t> Preparser<'t> {
    pub fn new(table: &'t TagTable, config: &'t EngineConfig) -> Self {
        Self { table, config }
    }

    /// Normalize `text` for storage.
    pub fn normalize(&self, text: &str, options: &PreparseOptions) -> String {
        let normalized = normalize_line_endings(text);
        let source = normalized.trim_end();

        let mut parser = BBParser::new(source, self.table);
        let mut state = Normalizer::new(self, *options, source);
        let mut pending: Option<Range<usize>> = None;

        while let Some(tk) = parser.next() {
            let end = tk.start + tk.span.len();
            if tk.is_text() {
                pending = Some(pending.map_or(tk.start..end, |x| x.start..end));
                continue;
            }

            if let Some(range) = pending.take() {
                state.text(&source[range], matches!(tk.kind, TokenKind::ItemCode(_)));
            }

            match tk.kind {
                TokenKind::OpenBBTag(_) | TokenKind::StandaloneBBTag(_) => state.open(&tk, &mut parser),
                TokenKind::CloseBBTag(_) => state.close(&tk),
                TokenKind::ItemCode(marker) => state.item(&tk, marker),
                TokenKind::Text => {}
            }
        }

        if let Some(range) = pending.take() {
            state.text(&source[range], false);
        }

        state.finish()
    }
}

struct OpenTag<'t> {
    def: &'t TagDefinition,
    has_params: bool,
    span: Range<usize>,
    out_start: usize,
    child_start: usize,
    /// Whether the output before `out_start` ends inside an unterminated `[`.
    after_open_bracket: bool,
    /// Not allowed in this context; neither the open nor the close tag is written.
    stripped: bool,
    /// `[li]` written for an item code; a newline ends it.
    from_item: bool,
    /// `[list]` written around item codes outside of any list.
    implicit: bool,
}

struct Normalizer<'t, 's> {
    table: &'t TagTable,
    config: &'t EngineConfig,
    options: PreparseOptions,
    source: &'s str,
    out: String,
    /// The last bracket written is a `[`.
    open_bracket: bool,
    stack: Vec<OpenTag<'t>>,
    /// Stack indices of the tags that are written.
    kept: Vec<usize>,
    open_names: OpenCounts,
    kept_names: OpenCounts,
    suppressions: Suppressions,
}

impl<'t, 's> Normalizer<'t, 's> {
    fn new(preparser: &Preparser<'t>, options: PreparseOptions, source: &'s str) -> Self {
        Self {
            table: preparser.table,
            config: preparser.config,
            options,
            source,
            out: String::with_capacity(source.len()),
            open_bracket: false,
            stack: vec![],
            kept: vec![],
            open_names: OpenCounts::default(),
            kept_names: OpenCounts::default(),
            suppressions: Suppressions::default(),
        }
    }

    fn is_disallowed(&self, name: &str) -> bool {
        let listed = |list: &[String]| list.iter().any(|x| x.eq_ignore_ascii_case(name));
        (self.options.is_signature && listed(&self.config.signature_disallowed))
            || (self.options.is_preview && listed(&self.config.preview_disallowed))
    }

    fn emit(&mut self, text: &str) {
        if let Some(idx) = text.rfind(['[', ']']) {
            self.open_bracket = text.as_bytes()[idx] == b'[';
        }
        self.out.push_str(text);
    }

    /// Remove everything written since `tag` opened.
    fn rewind(&mut self, tag: &OpenTag<'t>) {
        self.out.truncate(tag.out_start);
        self.open_bracket = tag.after_open_bracket;
    }

    /// The innermost tag that is written.
    fn top(&self) -> Option<&OpenTag<'t>> {
        self.kept.last().map(|&idx| &self.stack[idx])
    }

    fn push_entry(&mut self, tag: OpenTag<'t>) {
        self.open_names.add(tag.def.name);
        if !tag.stripped {
            self.kept_names.add(tag.def.name);
            self.kept.push(self.stack.len());
        }
        self.stack.push(tag);
    }

    fn pop_entry(&mut self) -> Option<OpenTag<'t>> {
        let tag = self.stack.pop()?;
        self.open_names.remove(tag.def.name);
        if !tag.stripped {
            self.kept_names.remove(tag.def.name);
            self.kept.pop();
        }
        Some(tag)
    }

    fn open_entry(&self, def: &'t TagDefinition, span: Range<usize>) -> OpenTag<'t> {
        let at = self.out.len();
        OpenTag {
            def,
            has_params: false,
            span,
            out_start: at,
            child_start: at,
            after_open_bracket: self.open_bracket,
            stripped: false,
            from_item: false,
            implicit: false,
        }
    }

    fn raw(&mut self, span: &str) {
        self.emit(span);
    }

    /// Write an open tag that was echoed as text so that it stays text on the next pass.
    fn protect(&mut self, span: &str) {
        let usable = self.table.lookup("nobbc").is_some()
            && !self.suppressions.blocks("nobbc")
            && !self.is_disallowed("nobbc")
            && !span.to_ascii_lowercase().contains("[/nobbc");
        if usable {
            self.emit("[nobbc]");
            self.emit(span);
            self.emit("[/nobbc]");
        } else {
            self.raw(span);
        }
    }

    fn open(&mut self, tk: &Token<'s>, parser: &mut BBParser<'s>) {
        let table = self.table;
        let Some(def) = tk.tag_name().and_then(|x| table.lookup(x)) else {
            self.raw(tk.span);
            return;
        };

        if self.suppressions.blocks(def.name) {
            self.raw(tk.span);
            return;
        }

        // Removing the tag must not glue an unterminated `[` to the text after it.
        if self.is_disallowed(def.name) && !self.open_bracket {
            log::trace!("stripping disallowed [{}]", def.name);
            self.push_stripped(def, tk);
            return;
        }

        let Some(params) = def.parse_params(tk.args().unwrap_or_default()) else {
            self.raw(tk.span);
            return;
        };

        if let Some(parent) = def.require_parent {
            let inside = self
                .kept
                .iter()
                .rev()
                .map(|&idx| self.stack[idx].def.name)
                .find(|x| !def.auto_close_before.contains(x))
                == Some(parent);
            if !inside {
                if self.open_names.get(parent) > self.kept_names.get(parent) {
                    self.push_stripped(def, tk);
                } else {
                    self.raw(tk.span);
                }
                return;
            }
        }

        while self
            .top()
            .map_or(false, |x| def.auto_close_before.contains(&x.def.name))
        {
            self.close_kept_top();
        }

        if def.standalone {
            self.write_open(def, &params, tk.span);
            return;
        }

        if let Some(validator) = def.captures_content(&params) {
            let Some((content_len, close_len)) = parser.find_close(def.name) else {
                self.raw(tk.span);
                return;
            };

            let content = &parser.remaining()[..content_len];
            if content.trim().is_empty() && params.is_empty() && !self.open_bracket {
                log::trace!("dropping empty [{}]", def.name);
                parser.advance(content_len + close_len);
                return;
            }
            if validator.check(content).is_none() {
                // Tags and line breaks in the content may still be rewritten; the open tag must stay text either way.
                if content.contains(['[', '\n']) {
                    self.protect(tk.span);
                } else {
                    self.raw(tk.span);
                }
                return;
            }

            self.write_open(def, &params, tk.span);
            self.emit(content);
            self.write_close(def.name);
            parser.advance(content_len + close_len);
            return;
        }

        let mut tag = self.open_entry(def, tk.start..(tk.start + tk.span.len()));
        tag.has_params = !params.is_empty();
        self.write_open(def, &params, tk.span);
        tag.child_start = self.out.len();

        if def.content == ContentMode::Verbatim {
            parser.push_rule(NoParseRule::new(def.name));
        }
        self.suppressions.push(def.suppresses);
        self.push_entry(tag);
    }

    fn push_stripped(&mut self, def: &'t TagDefinition, tk: &Token<'s>) {
        if def.standalone {
            return;
        }

        let mut tag = self.open_entry(def, tk.start..(tk.start + tk.span.len()));
        tag.stripped = true;
        self.push_entry(tag);
    }

    fn write_open(&mut self, def: &TagDefinition, params: &Params, span: &str) {
        match canonical_open(def, params) {
            Some(open) => self.emit(&open),
            None => self.emit(span),
        }
    }

    fn write_close(&mut self, name: &str) {
        self.emit("[/");
        self.emit(name);
        self.emit("]");
    }

    fn close(&mut self, tk: &Token<'s>) {
        let Some(name) = tk.tag_name() else {
            self.raw(tk.span);
            return;
        };

        if self.open_names.get(name) == 0 {
            if self.is_disallowed(name) && !self.open_bracket {
                log::trace!("dropping stray [/{name}]");
            } else {
                self.raw(tk.span);
            }
            return;
        }
        let Some(idx) = self.stack.iter().rposition(|x| x.def.name == name) else {
            return;
        };

        while self.stack.len() > idx + 1 {
            self.close_top(Closing::Forced);
        }
        self.close_top(Closing::Matched);
    }

    /// Close the innermost written tag and any stripped tags opened after it.
    fn close_kept_top(&mut self) {
        let Some(&idx) = self.kept.last() else {
            return;
        };
        while self.stack.len() > idx {
            self.close_top(Closing::Forced);
        }
    }

    fn close_top(&mut self, closing: Closing) {
        let Some(tag) = self.pop_entry() else {
            return;
        };

        if tag.stripped {
            if self.open_bracket {
                self.write_close(tag.def.name);
            }
            return;
        }

        let def = tag.def;
        self.suppressions.pop(def.suppresses);

        if def.discard_if_empty && !tag.has_params && self.out.len() == tag.child_start && !tag.after_open_bracket {
            log::trace!("dropping empty [{}]", def.name);
            self.rewind(&tag);
            return;
        }

        // The renderer shows these as text unless their own close tag ends them.
        if closing != Closing::Matched && !def.close_at_eof {
            log::trace!("[{}] closed without its own close tag, keeping it as text", def.name);
            let children = self.out.split_off(tag.child_start);
            self.rewind(&tag);
            let source = self.source;
            self.emit(&source[tag.span]);
            self.emit(&children);
            return;
        }

        if closing == Closing::EndOfInput {
            log::trace!("closing [{}] at end of input", def.name);
        }
        self.write_close(def.name);
    }

    fn item(&mut self, tk: &Token<'s>, marker: ItemMarker) {
        let table = self.table;
        let (Some(list), Some(li)) = (table.lookup("list"), table.lookup("li")) else {
            self.raw(tk.span);
            return;
        };

        if self.top().map_or(false, |x| x.def.name == li.name) {
            self.close_kept_top();
        }

        if self.top().map_or(true, |x| x.def.name != list.name) {
            let mut params = Params::default();
            if marker != ItemMarker::Disc {
                if let Some(key) = list.keys().first() {
                    params.keys.push((key.name, marker.list_style().to_owned()));
                }
            }

            let mut tag = self.open_entry(list, tk.start..tk.start);
            tag.has_params = !params.is_empty();
            tag.implicit = true;
            self.write_open(list, &params, "[list]");
            tag.child_start = self.out.len();
            self.push_entry(tag);
        }

        let mut tag = self.open_entry(li, tk.start..(tk.start + tk.span.len()));
        tag.from_item = true;
        self.write_open(li, &Params::default(), "[li]");
        tag.child_start = self.out.len();
        self.push_entry(tag);
    }

    /// Copy a run of text. `next_is_item` tells whether an item code directly follows the run.
    fn text(&mut self, text: &str, next_is_item: bool) {
        let mut text = text;

        while self.top().map_or(false, |x| x.from_item) {
            let Some(newline) = text.find('\n') else {
                break;
            };

            self.emit(&text[..newline]);
            self.close_kept_top();
            text = &text[(newline + 1)..];

            if self.top().map_or(false, |x| x.implicit) {
                if next_is_item && text.trim().is_empty() {
                    return;
                }
                self.close_kept_top();
            }
        }

        self.emit(text);
    }

    fn finish(mut self) -> String {
        while !self.stack.is_empty() {
            self.close_top(Closing::EndOfInput);
        }

        let len = self.out.trim_end().len();
        self.out.truncate(len);
        self.out
    }
}

/// The canonical spelling of an open tag, or `None` if a value cannot be written unambiguously.
pub(crate) fn canonical_open(def: &TagDefinition, params: &Params) -> Option<String> {
    let mut out = String::with_capacity(def.name.len() + 2);
    out.push('[');
    out.push_str(def.name);

    if let Some(value) = &params.value {
        out.push('=');
        push_value(&mut out, value, false)?;
    }

    for KeySpec { name, .. } in def.keys() {
        if let Some(value) = params.get(name) {
            out.push(' ');
            out.push_str(name);
            out.push('=');
            push_value(&mut out, value, true)?;
        }
    }

    out.push(']');
    Some(out)
}

fn push_value(out: &mut String, value: &str, in_key_list: bool) -> Option<()> {
    let needs_quotes = value.starts_with('"')
        || value.contains(['[', ']'])
        || (in_key_list && value.contains(char::is_whitespace));

    if !needs_quotes {
        out.push_str(value);
        return Some(());
    }

    if value.contains('"') {
        return None;
    }

    out.push('"');
    out.push_str(value);
    out.push('"');
    Some(())
}
