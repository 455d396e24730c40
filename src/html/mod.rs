//! HTML rendering of a BBCode message.
//!
//! [`HtmlSerializer`] drives a [`BBParser`] over the message and interprets its tokens against the
//! [`TagTable`] with an explicit stack of open tags. Rendering never fails: anything that does not form a
//! valid tag is echoed back as escaped text.
use std::{borrow::Cow, ops::Range};

use bitflags::bitflags;
use html_escape::encode_text;

use crate::{
    engine::EngineConfig,
    grammar::{
        builtins, template, ContentMode, OpenCounts, Params, Placement, Suppressions, TagDefinition, TagTable,
        Validator,
    },
    parser::ItemMarker,
    rules::builtin::NoParseRule,
    BBParser, Token, TokenKind,
};

use self::autolink::{LinkKind, LinkMatch};

pub mod autolink;
pub mod smileys;

pub use smileys::SmileySet;

bitflags! {
    /// Per-call rendering switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderFlags: u32 {
        /// Replace smiley codes with images.
        const SMILEYS = 1 << 0;
        /// Turn bare URLs and e-mail addresses into links.
        const AUTOLINK = 1 << 1;
        /// A live preview. Previews are never cached and use a fixed anchor id.
        const PREVIEW = 1 << 2;
    }
}

impl Default for RenderFlags {
    fn default() -> Self {
        RenderFlags::SMILEYS | RenderFlags::AUTOLINK
    }
}

/// Options for a single render call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub flags: RenderFlags,
    /// Identifier of the rendered message, used for stable anchor ids and as the cache key.
    pub message_id: Option<u64>,
    /// Tags that are dropped from the output while their content is kept.
    pub disabled_tags: Vec<String>,
}

impl RenderOptions {
    /// Options for a stored message.
    pub fn message(id: u64) -> Self {
        Self {
            message_id: Some(id),
            ..Default::default()
        }
    }

    /// Options for a live preview, with the preview tag restrictions of `config`.
    pub fn preview(config: &EngineConfig) -> Self {
        Self {
            flags: RenderFlags::default() | RenderFlags::PREVIEW,
            message_id: None,
            disabled_tags: config.preview_disallowed.clone(),
        }
    }

    /// Options for a signature, with the signature tag restrictions of `config`.
    pub fn signature(config: &EngineConfig) -> Self {
        Self {
            disabled_tags: config.signature_disallowed.clone(),
            ..Default::default()
        }
    }

    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_disabled(&self, tag: &str) -> bool {
        self.disabled_tags.iter().any(|x| x.eq_ignore_ascii_case(tag))
    }

    /// The id embedded in generated anchors.
    pub fn anchor_id(&self) -> String {
        if self.flags.contains(RenderFlags::PREVIEW) {
            "preview".to_owned()
        } else {
            self.message_id.unwrap_or(0).to_string()
        }
    }
}

/// Renders BBCode to HTML using the tags of a [`TagTable`].
pub struct HtmlSerializer<'t> {
    table: &'t TagTable,
    smileys: &'t SmileySet,
}

impl<'t> HtmlSerializer<'t> {
    pub fn new(table: &'t TagTable, smileys: &'t SmileySet) -> Self {
        Self { table, smileys }
    }

    /// Render `source` to an HTML fragment.
    pub fn serialize(&self, source: &str, options: &RenderOptions) -> String {
        let source = normalize_line_endings(source);
        let mut parser = BBParser::new(&source, self.table);
        let mut ctx = ParseContext::new(self, options, &source);
        let mut pending: Option<Range<usize>> = None;

        while let Some(tk) = parser.next() {
            let end = tk.start + tk.span.len();
            if tk.is_text() {
                pending = Some(pending.map_or(tk.start..end, |x| x.start..end));
                continue;
            }

            if let Some(range) = pending.take() {
                ctx.text(&source[range], matches!(tk.kind, TokenKind::ItemCode(_)));
            }
            ctx.swallow_newline = false;

            match tk.kind {
                TokenKind::OpenBBTag(_) | TokenKind::StandaloneBBTag(_) => ctx.open(&tk, &mut parser),
                TokenKind::CloseBBTag(_) => ctx.close(&tk),
                TokenKind::ItemCode(marker) => ctx.item(marker),
                TokenKind::Text => {}
            }
        }

        if let Some(range) = pending.take() {
            ctx.text(&source[range], false);
        }

        ctx.finish()
    }
}

pub(crate) fn normalize_line_endings(source: &str) -> Cow<'_, str> {
    if source.contains('\r') {
        Cow::Owned(source.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closing {
    /// By its own close tag.
    Matched,
    /// Implicitly, by a close tag further down the stack or an auto-closing sibling.
    Forced,
    EndOfInput,
}

struct TagInstance<'t> {
    def: &'t TagDefinition,
    params: Params,
    /// Source span of the open tag.
    span: Range<usize>,
    open_output_start: usize,
    child_output_start: usize,
    /// Dropped by the render options: produces no markup and affects no state.
    disabled: bool,
}

struct ParseContext<'t, 's> {
    table: &'t TagTable,
    smileys: &'t SmileySet,
    options: &'s RenderOptions,
    source: &'s str,
    anchor: String,
    out: String,
    stack: Vec<TagInstance<'t>>,
    /// Stack indices of the tags that are not disabled.
    rendered: Vec<usize>,
    open_names: OpenCounts,
    rendered_names: OpenCounts,
    suppressions: Suppressions,
    verbatim: usize,
    links: usize,
    raw_breaks: usize,
    footnotes: Vec<String>,
    swallow_newline: bool,
}

/// Values available to a template besides the tag's own parameters.
struct TemplateContext<'a> {
    anchor: &'a str,
    parity: &'static str,
    footnote: usize,
}

impl<'a> TemplateContext<'a> {
    fn new(anchor: &'a str) -> Self {
        Self {
            anchor,
            parity: "standard",
            footnote: 0,
        }
    }
}

fn render_template(template: &str, def: &TagDefinition, params: &Params, ctx: &TemplateContext<'_>, out: &mut String) {
    if template.is_empty() {
        return;
    }

    template::expand(
        template,
        |name| match name {
            "value" => params.value.as_deref().map(|value| match def.value_validator() {
                Some(validator) => validator.render_value(value).into_owned(),
                None => value.to_owned(),
            }),
            "msg" => Some(ctx.anchor.to_owned()),
            "parity" => Some(ctx.parity.to_owned()),
            "n" => (ctx.footnote > 0).then(|| ctx.footnote.to_string()),
            key => params.get(key).map(str::to_owned),
        },
        out,
    );
}

impl<'t, 's> ParseContext<'t, 's> {
    fn new(serializer: &HtmlSerializer<'t>, options: &'s RenderOptions, source: &'s str) -> Self {
        Self {
            table: serializer.table,
            smileys: serializer.smileys,
            options,
            source,
            anchor: options.anchor_id(),
            out: String::with_capacity(source.len() + source.len() / 4),
            stack: vec![],
            rendered: vec![],
            open_names: OpenCounts::default(),
            rendered_names: OpenCounts::default(),
            suppressions: Suppressions::default(),
            verbatim: 0,
            links: 0,
            raw_breaks: 0,
            footnotes: vec![],
            swallow_newline: false,
        }
    }

    /// The innermost tag that is not disabled.
    fn rendered_top(&self) -> Option<&TagInstance<'t>> {
        self.rendered.last().map(|&idx| &self.stack[idx])
    }

    fn top_name(&self) -> Option<&'static str> {
        self.rendered_top().map(|x| x.def.name)
    }

    /// Close the innermost rendered tag and any disabled tags opened after it.
    fn finish_rendered_top(&mut self) {
        let Some(&idx) = self.rendered.last() else {
            return;
        };
        while self.stack.len() > idx {
            self.finish_top(Closing::Forced);
        }
    }

    fn push_entry(&mut self, instance: TagInstance<'t>) {
        self.open_names.add(instance.def.name);
        if !instance.disabled {
            self.rendered_names.add(instance.def.name);
            self.rendered.push(self.stack.len());
        }
        self.stack.push(instance);
    }

    fn pop_entry(&mut self) -> Option<TagInstance<'t>> {
        let instance = self.stack.pop()?;
        self.open_names.remove(instance.def.name);
        if !instance.disabled {
            self.rendered_names.remove(instance.def.name);
            self.rendered.pop();
        }
        Some(instance)
    }

    fn literal(&mut self, span: &str) {
        self.out.push_str(&encode_text(span));
    }

    fn open(&mut self, tk: &Token<'s>, parser: &mut BBParser<'s>) {
        let table = self.table;
        let Some(def) = tk.tag_name().and_then(|x| table.lookup(x)) else {
            self.literal(tk.span);
            return;
        };

        if self.suppressions.blocks(def.name) {
            self.literal(tk.span);
            return;
        }

        if self.options.is_disabled(def.name) {
            self.push_disabled(def, tk);
            return;
        }

        let Some(params) = def.parse_params(tk.args().unwrap_or_default()) else {
            log::debug!("invalid parameters for [{}], echoing `{}`", def.name, tk.span);
            self.literal(tk.span);
            return;
        };

        if let Some(parent) = def.require_parent {
            let inside = self
                .rendered
                .iter()
                .rev()
                .map(|&idx| self.stack[idx].def.name)
                .find(|x| !def.auto_close_before.contains(x))
                == Some(parent);
            if !inside {
                // Children of a disabled parent go with it.
                if self.open_names.get(parent) > self.rendered_names.get(parent) {
                    self.push_disabled(def, tk);
                    return;
                }
                log::debug!("[{}] outside of [{parent}], echoing", def.name);
                self.literal(tk.span);
                return;
            }
        }

        while self
            .top_name()
            .map_or(false, |x| def.auto_close_before.contains(&x))
        {
            self.finish_rendered_top();
        }

        if def.standalone {
            render_template(def.before, def, &params, &TemplateContext::new(&self.anchor), &mut self.out);
            self.swallow_newline = def.block_level;
            return;
        }

        if let Some(validator) = def.captures_content(&params) {
            self.open_captured(def, params, validator, tk, parser);
            return;
        }

        let parity = if self.rendered_names.get(def.name) % 2 == 0 {
            "standard"
        } else {
            "alternate"
        };

        let open_output_start = self.out.len();
        if def.placement == Placement::Inline {
            let ctx = TemplateContext {
                parity,
                ..TemplateContext::new(&self.anchor)
            };
            render_template(def.before, def, &params, &ctx, &mut self.out);
        }

        if def.content == ContentMode::Verbatim {
            parser.push_rule(NoParseRule::new(def.name));
        }

        let instance = TagInstance {
            def,
            params,
            span: tk.start..(tk.start + tk.span.len()),
            open_output_start,
            child_output_start: self.out.len(),
            disabled: false,
        };
        self.push(instance);
        self.swallow_newline = def.block_level;
    }

    /// Render a tag whose raw content is its value, consuming the content and close tag from `parser`.
    fn open_captured(
        &mut self,
        def: &'t TagDefinition,
        mut params: Params,
        validator: Validator,
        tk: &Token<'s>,
        parser: &mut BBParser<'s>,
    ) {
        let Some((content_len, close_len)) = parser.find_close(def.name) else {
            log::debug!("[{}] has no close tag, echoing", def.name);
            self.literal(tk.span);
            return;
        };

        let raw = &parser.remaining()[..content_len];
        let Some(value) = validator.check(raw) else {
            log::debug!("invalid content for [{}], echoing `{}`", def.name, tk.span);
            self.literal(tk.span);
            return;
        };
        params.value = Some(value.into_owned());

        let ctx = TemplateContext::new(&self.anchor);
        render_template(def.before, def, &params, &ctx, &mut self.out);
        if def.shows_captured() {
            self.out.push_str(&encode_text(raw));
        }
        render_template(def.after, def, &params, &ctx, &mut self.out);

        parser.advance(content_len + close_len);
        self.swallow_newline = def.block_level;
    }

    fn push_disabled(&mut self, def: &'t TagDefinition, tk: &Token<'s>) {
        if def.standalone {
            return;
        }

        let start = self.out.len();
        self.push_entry(TagInstance {
            def,
            params: Params::default(),
            span: tk.start..(tk.start + tk.span.len()),
            open_output_start: start,
            child_output_start: start,
            disabled: true,
        });
    }

    fn push(&mut self, instance: TagInstance<'t>) {
        let def = instance.def;
        self.suppressions.push(def.suppresses);
        if def.content == ContentMode::Verbatim {
            self.verbatim += 1;
        }
        if def.is_link {
            self.links += 1;
        }
        if !def.convert_line_breaks {
            self.raw_breaks += 1;
        }
        self.push_entry(instance);
    }

    fn close(&mut self, tk: &Token<'s>) {
        let Some(name) = tk.tag_name() else {
            self.literal(tk.span);
            return;
        };

        if self.open_names.get(name) == 0 {
            // Disabled tags vanish, their stray close tags with them.
            if !self.options.is_disabled(name) {
                self.literal(tk.span);
            }
            return;
        }
        let Some(idx) = self.stack.iter().rposition(|x| x.def.name == name) else {
            return;
        };

        while self.stack.len() > idx + 1 {
            self.finish_top(Closing::Forced);
        }
        let rendered = !self.stack[idx].disabled;
        let block_level = self.stack[idx].def.block_level;
        self.finish_top(Closing::Matched);
        self.swallow_newline = rendered && block_level;
    }

    /// Pop the innermost tag and emit its closing markup.
    fn finish_top(&mut self, closing: Closing) {
        let Some(instance) = self.pop_entry() else {
            return;
        };
        if instance.disabled {
            return;
        }

        let def = instance.def;
        self.suppressions.pop(def.suppresses);
        if def.content == ContentMode::Verbatim {
            self.verbatim -= 1;
        }
        if def.is_link {
            self.links -= 1;
        }
        if !def.convert_line_breaks {
            self.raw_breaks -= 1;
        }

        if def.discard_if_empty && instance.params.is_empty() && self.out.len() == instance.child_output_start {
            log::trace!("discarding empty [{}]", def.name);
            self.out.truncate(instance.open_output_start);
            return;
        }

        if closing != Closing::Matched && !def.close_at_eof {
            log::debug!("[{}] closed without its own close tag, echoing", def.name);
            let children = self.out.split_off(instance.child_output_start);
            self.out.truncate(instance.open_output_start);
            let span = &self.source[instance.span];
            self.out.push_str(&encode_text(span));
            self.out.push_str(&children);
            return;
        }

        match def.placement {
            Placement::Inline => {
                let ctx = TemplateContext::new(&self.anchor);
                render_template(def.after, def, &instance.params, &ctx, &mut self.out);
            }
            Placement::Footnote => {
                let content = self.out.split_off(instance.child_output_start);
                self.out.truncate(instance.open_output_start);

                let ctx = TemplateContext {
                    footnote: self.footnotes.len() + 1,
                    ..TemplateContext::new(&self.anchor)
                };
                let mut note = String::with_capacity(content.len() + def.before.len() + def.after.len());
                render_template(def.before, def, &instance.params, &ctx, &mut note);
                note.push_str(&content);
                render_template(def.after, def, &instance.params, &ctx, &mut note);
                render_template(builtins::FOOTNOTE_REFERENCE, def, &instance.params, &ctx, &mut self.out);
                self.footnotes.push(note);
            }
        }
    }

    fn item(&mut self, marker: ItemMarker) {
        if matches!(self.top_name(), Some("*" | "li")) {
            self.finish_rendered_top();
        }

        if !matches!(self.top_name(), Some("list" | "*list")) {
            self.open_synthetic(&builtins::ITEM_LIST, Params::default());
        }

        self.open_synthetic(&builtins::ITEM, Params::with_value(marker.list_style().to_owned()));
    }

    fn open_synthetic(&mut self, def: &'t TagDefinition, params: Params) {
        let open_output_start = self.out.len();
        render_template(def.before, def, &params, &TemplateContext::new(&self.anchor), &mut self.out);
        let instance = TagInstance {
            def,
            params,
            span: 0..0,
            open_output_start,
            child_output_start: self.out.len(),
            disabled: false,
        };
        self.push(instance);
    }

    /// Handle a run of text. `next_is_item` tells whether an item code directly follows the run.
    fn text(&mut self, text: &str, next_is_item: bool) {
        let mut text = text;
        if std::mem::take(&mut self.swallow_newline) {
            text = text.strip_prefix('\n').unwrap_or(text);
        }

        // A newline ends an item started by an item code. The implicit list around it only survives when
        // another item code follows.
        while self.top_name() == Some("*") {
            let Some(newline) = text.find('\n') else {
                break;
            };

            self.emit_text(&text[..newline]);
            self.finish_rendered_top();
            text = &text[(newline + 1)..];

            if self.top_name() == Some("*list") {
                if next_is_item && text.trim().is_empty() {
                    return;
                }
                self.finish_rendered_top();
            }
        }

        self.emit_text(text);
    }

    fn emit_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        if let Some(top) = self.rendered_top() {
            if top.def.structural && text.trim().is_empty() {
                return;
            }
        }

        if self.verbatim > 0 {
            self.push_lines(text, false);
            return;
        }

        let mut last = 0;
        if self.links == 0 && self.options.flags.contains(RenderFlags::AUTOLINK) {
            for link in autolink::find_links(text) {
                self.push_lines(&text[last..link.range.start], true);
                self.push_link(text, &link);
                last = link.range.end;
            }
        }
        self.push_lines(&text[last..], true);
    }

    /// Escape `text`, converting newlines to `<br />` unless an open tag keeps them raw.
    fn push_lines(&mut self, text: &str, decorate: bool) {
        let smileys = decorate && self.options.flags.contains(RenderFlags::SMILEYS);
        let line_break = if self.raw_breaks > 0 { "\n" } else { "<br />" };

        for (idx, line) in text.split('\n').enumerate() {
            if idx > 0 {
                self.out.push_str(line_break);
            }
            if smileys {
                self.smileys.substitute(line, &mut self.out);
            } else {
                self.out.push_str(&encode_text(line));
            }
        }
    }

    fn push_link(&mut self, text: &str, link: &LinkMatch) {
        let raw = &text[link.range.clone()];
        let (tag, validator) = match link.kind {
            LinkKind::Url | LinkKind::Www => ("url", Validator::Url),
            LinkKind::Email => ("email", Validator::Email),
        };

        let table = self.table;
        let def = table.lookup(tag);
        let value = validator.check(raw);
        let (Some(def), Some(value)) = (def, value) else {
            self.push_lines(raw, false);
            return;
        };

        let params = Params::with_value(value.into_owned());
        let ctx = TemplateContext::new(&self.anchor);
        render_template(def.before, def, &params, &ctx, &mut self.out);
        self.out.push_str(&encode_text(raw));
        render_template(def.after, def, &params, &ctx, &mut self.out);
    }

    fn finish(mut self) -> String {
        while !self.stack.is_empty() {
            self.finish_top(Closing::EndOfInput);
        }

        if !self.footnotes.is_empty() {
            self.out.push_str("<div class=\"bbc_footnotes\">");
            for note in &self.footnotes {
                self.out.push_str(note);
            }
            self.out.push_str("</div>");
        }

        self.out
    }
}
