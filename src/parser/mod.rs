use bitflags::bitflags;

use crate::grammar::{starts_with_key, KeySpec, ParameterKind, TagTable};

use self::rules::{ParserRule, ParserRuleAction};

pub mod rules;

/// Longest span, in bytes, searched for the `]` that ends an open tag.
pub const MAX_TAG_LEN: usize = 512;

/// Longest raw content, in bytes, captured by tags like `[img]` whose content is their value.
pub const MAX_CAPTURE_LEN: usize = 8192;

pub struct ParserConfig {
    pub feature_flags: ParserFeature,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            feature_flags: ParserFeature::ALL,
        }
    }
}

bitflags! {
    /// Optional syntax accepted by the tokenizer.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ParserFeature: u32 {
        /// Recognize the legacy item codes `[*]`, `[+]`, `[x]`, `[#]` and `[!]`.
        const ITEM_CODES = 1 << 0;
        /// Accept `[name/]` for standalone tags.
        const STANDALONE_SLASH = 1 << 1;

        /// All current and future feature flags.
        const ALL = u32::MAX;
    }
}

/// Legacy single character list markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemMarker {
    /// `[*]`
    Disc,
    /// `[+]` and `[x]`
    Square,
    /// `[#]`
    Decimal,
    /// `[!]`
    Plain,
}

impl ItemMarker {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'*' => Some(ItemMarker::Disc),
            b'+' | b'x' => Some(ItemMarker::Square),
            b'#' => Some(ItemMarker::Decimal),
            b'!' => Some(ItemMarker::Plain),
            _ => None,
        }
    }

    /// The CSS `list-style-type` for items started with this marker.
    pub fn list_style(self) -> &'static str {
        match self {
            ItemMarker::Disc => "disc",
            ItemMarker::Square => "square",
            ItemMarker::Decimal => "decimal",
            ItemMarker::Plain => "none",
        }
    }
}

#[doc(alias = "tokenizer")]
pub struct BBParser<'a> {
    input: &'a str,
    table: &'a TagTable,
    config: ParserConfig,
    loc: usize,
    rule_stack: Vec<Box<dyn ParserRule + 'a>>,
}

impl<'a> BBParser<'a> {
    pub fn new(input: &'a str, table: &'a TagTable) -> BBParser<'a> {
        Self::with_config(input, table, Default::default())
    }

    pub fn with_config(input: &'a str, table: &'a TagTable, config: ParserConfig) -> BBParser<'a> {
        Self {
            input,
            table,
            config,
            loc: 0,
            rule_stack: vec![],
        }
    }

    /// Returns all input text left to parse
    pub fn remaining(&self) -> &'a str {
        &self.input[self.loc..]
    }

    /// Byte offset of the cursor.
    pub fn position(&self) -> usize {
        self.loc
    }

    /// Move the cursor forward by `len` bytes.
    pub fn advance(&mut self, len: usize) {
        self.loc = (self.loc + len).min(self.input.len());
    }

    pub fn push_rule<Rule>(&mut self, rule: Rule)
    where
        Rule: ParserRule + 'a,
    {
        self.rule_stack.push(Box::new(rule))
    }

    /// Locate the close tag `[/name]` ahead of the cursor.
    ///
    /// Returns the length of the content before it and the length of the close tag itself.
    pub fn find_close(&self, name: &str) -> Option<(usize, usize)> {
        let rem = self.remaining();
        let window = &rem.as_bytes()[..rem.len().min(MAX_CAPTURE_LEN + name.len() + 3)];

        let mut from = 0;
        while let Some(idx) = find_bytes(&window[from..], b"[/") {
            let at = from + idx;
            let name_start = at + "[/".len();
            let name_end = name_start + name.len();
            if name_end < window.len() && window[name_start..name_end].eq_ignore_ascii_case(name.as_bytes()) {
                let mut end = name_end;
                while end < window.len() && window[end] == b' ' {
                    end += 1;
                }
                if end < window.len() && window[end] == b']' {
                    return Some((at, end + 1 - at));
                }
            }
            from = at + 1;
        }

        None
    }

    /// Attempt to read a tag starting at the `[` under the cursor.
    fn scan_tag(&self) -> Option<(usize, TokenKind<'a>)> {
        let input = self.input;
        let start = self.loc;
        let bytes = &input.as_bytes()[..input.len().min(start + MAX_TAG_LEN)];
        let mut i = start + 1;

        if bytes.get(i) == Some(&b'/') {
            let name_end = name_run(bytes, i + 1);
            let def = self.table.lookup(&input[(i + 1)..name_end])?;
            let mut end = name_end;
            while bytes.get(end) == Some(&b' ') {
                end += 1;
            }
            return (bytes.get(end) == Some(&b']')).then(|| {
                let tag = BBTag { tag: def.name, args: "" };
                (end + 1 - start, TokenKind::CloseBBTag(tag))
            });
        }

        if self.config.feature_flags.contains(ParserFeature::ITEM_CODES) && bytes.get(i + 1) == Some(&b']') {
            if let Some(marker) = bytes.get(i).copied().and_then(ItemMarker::from_byte) {
                return Some((3, TokenKind::ItemCode(marker)));
            }
        }

        let name_end = name_run(bytes, i);
        let def = self.table.lookup(&input[i..name_end])?;
        i = name_end;

        match bytes.get(i)? {
            b']' => {
                let tag = BBTag { tag: def.name, args: "" };
                let kind = if def.standalone {
                    TokenKind::StandaloneBBTag(tag)
                } else {
                    TokenKind::OpenBBTag(tag)
                };
                Some((i + 1 - start, kind))
            }
            b'/' if def.standalone && self.config.feature_flags.contains(ParserFeature::STANDALONE_SLASH) => {
                (bytes.get(i + 1) == Some(&b']')).then(|| {
                    let tag = BBTag { tag: def.name, args: "" };
                    (i + 2 - start, TokenKind::StandaloneBBTag(tag))
                })
            }
            b'=' => {
                let end = equals_end(bytes, i + 1)?;
                let tag = BBTag { tag: def.name, args: &input[i..end] };
                Some((end + 1 - start, open_or_standalone(def.standalone, tag)))
            }
            b' ' | b'\t' => match def.parameters {
                ParameterKind::KeyValueList(keys) => {
                    let (args_end, tag_end) = key_values_end(input, bytes, i, keys)?;
                    let tag = BBTag { tag: def.name, args: &input[i..args_end] };
                    Some((tag_end - start, open_or_standalone(def.standalone, tag)))
                }
                _ => {
                    let end = i + bracket_end(&bytes[i..])?;
                    let tag = BBTag { tag: def.name, args: &input[i..end] };
                    Some((end + 1 - start, open_or_standalone(def.standalone, tag)))
                }
            },
            _ => None,
        }
    }
}

fn open_or_standalone(standalone: bool, tag: BBTag<'_>) -> TokenKind<'_> {
    if standalone {
        TokenKind::StandaloneBBTag(tag)
    } else {
        TokenKind::OpenBBTag(tag)
    }
}

fn name_run(bytes: &[u8], from: usize) -> usize {
    let mut end = from;
    while end < bytes.len() && bytes[end].is_ascii_alphanumeric() {
        end += 1;
    }
    end
}

fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|b| *b == needle)
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Offset of the first `]`, provided no `[` comes before it. Unquoted arguments never contain brackets.
fn bracket_end(bytes: &[u8]) -> Option<usize> {
    let end = bytes.iter().position(|b| matches!(b, b']' | b'['))?;
    (bytes[end] == b']').then_some(end)
}

/// Index of the `]` ending an `=value` argument. A quoted value may contain brackets.
fn equals_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while bytes.get(i) == Some(&b' ') {
        i += 1;
    }

    if bytes.get(i) == Some(&b'"') {
        if let Some(close) = find_byte(&bytes[(i + 1)..], b'"') {
            let after = i + 1 + close + 1;
            if let Some(end) = bracket_end(&bytes[after..]) {
                return Some(after + end);
            }
        }
    }

    Some(from + bracket_end(&bytes[from..])?)
}

/// End of a `key=value ...` argument list starting at `from`.
///
/// Returns the end of the argument text and the end of the whole tag. These only differ in the degenerate
/// `key=]` form: a value holds at least one character, so the `]` becomes part of the value, which then runs to
/// the next `]`, `[` or the end of input. Stopping at `[` or the end ends the tag without consuming a bracket.
fn key_values_end(input: &str, bytes: &[u8], from: usize, keys: &[KeySpec]) -> Option<(usize, usize)> {
    let mut i = from;

    loop {
        while matches!(bytes.get(i), Some(b' ' | b'\t')) {
            i += 1;
        }

        if *bytes.get(i)? == b']' {
            return Some((i, i + 1));
        }

        let key_end = i + bytes[i..].iter().position(|b| matches!(b, b'=' | b']' | b'['))?;
        match bytes[key_end] {
            b'[' => return None,
            // A key without a value; the tag ends here and fails validation.
            b']' => return Some((key_end, key_end + 1)),
            _ => i = key_end + 1,
        }

        match bytes.get(i)? {
            b'"' => {
                let close = find_byte(&bytes[(i + 1)..], b'"')?;
                i += close + 2;
            }
            b'[' => return None,
            b']' => {
                i += 1;
                while let Some(b) = bytes.get(i) {
                    match b {
                        b']' => return Some((i, i + 1)),
                        b'[' => return Some((i, i)),
                        _ => i += 1,
                    }
                }
                return (bytes.len() == input.len()).then_some((i, i));
            }
            _ => {
                i += 1;
                loop {
                    match bytes.get(i)? {
                        b']' => return Some((i, i + 1)),
                        b'[' => return None,
                        b' ' | b'\t' if starts_with_key(input[i..].trim_start(), keys) => break,
                        _ => i += 1,
                    }
                }
            }
        }
    }
}

impl<'a> Iterator for BBParser<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        const TAG_OPENERS: &[char] = &['['];

        if self.loc >= self.input.len() {
            return None;
        }

        let first_char = self.remaining().chars().next()?;

        let mut token = 'tk: {
            // If this block completes, then we failed to find any tag.
            'no_match: {
                if TAG_OPENERS.contains(&first_char) {
                    let Some((len, kind)) = self.scan_tag() else {
                        break 'no_match;
                    };

                    let old_loc = self.loc;
                    self.loc += len;
                    break 'tk Token {
                        span: &self.input[old_loc..self.loc],
                        start: old_loc,
                        kind,
                    };
                }
            }

            // A failed tag opener is text, so the search for the next opener starts after it.
            let skip = if TAG_OPENERS.contains(&first_char) {
                first_char.len_utf8()
            } else {
                0
            };
            let segment_end = self.remaining()[skip..]
                .find(TAG_OPENERS)
                .map(|x| x + skip)
                .unwrap_or(self.remaining().len());

            let range = self.loc..(self.loc + segment_end);
            self.loc += range.len();
            break 'tk Token {
                start: range.start,
                span: &self.input[range],
                kind: TokenKind::Text,
            };
        };

        let do_pop = if let Some(rule) = self.rule_stack.last() {
            rule.check_should_release(&token)
        } else {
            false
        };

        if do_pop {
            self.rule_stack.pop();
        } else if let Some(rule) = self.rule_stack.last() {
            match rule.action() {
                ParserRuleAction::NoParse => {
                    token = Token {
                        kind: TokenKind::Text,
                        ..token
                    };
                }
            }
        }

        Some(token)
    }
}

#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub span: &'a str,
    pub start: usize,
    pub kind: TokenKind<'a>,
}

impl Token<'_> {
    pub fn is_text(&self) -> bool {
        matches!(self.kind, TokenKind::Text)
    }

    pub fn is_open(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::OpenBBTag(t) if t.tag == name)
    }

    pub fn is_close(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::CloseBBTag(t) if t.tag == name)
    }

    pub fn is_standalone(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::StandaloneBBTag(t) if t.tag == name)
    }

    /// Canonical name of the tag, if this token is one.
    pub fn tag_name(&self) -> Option<&'static str> {
        match &self.kind {
            TokenKind::OpenBBTag(t) | TokenKind::CloseBBTag(t) | TokenKind::StandaloneBBTag(t) => Some(t.tag),
            TokenKind::ItemCode(_) | TokenKind::Text => None,
        }
    }

    /// Raw argument text of an open or standalone tag, including its leading `=` or whitespace.
    pub fn args(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::OpenBBTag(t) | TokenKind::StandaloneBBTag(t) => Some(t.args),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BBTag<'a> {
    /// Canonical (lowercase) name from the tag table.
    pub tag: &'static str,
    pub args: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind<'a> {
    OpenBBTag(BBTag<'a>),
    CloseBBTag(BBTag<'a>),
    StandaloneBBTag(BBTag<'a>),
    ItemCode(ItemMarker),
    Text,
}

#[cfg(test)]
mod tests;
