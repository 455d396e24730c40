//! The tag grammar: one immutable [`TagDefinition`] per tag name, collected into a [`TagTable`].
//!
//! The table is built once (see [`TagTable::builtin`]) and then only read. The tokenizer, the HTML renderer,
//! the storage normalizer and the converters all consult the same table, so they can never disagree about
//! which tags exist or which parameters they accept.
use std::collections::{BTreeSet, HashMap};

use crate::error::GrammarError;

pub mod builtins;
pub mod template;
pub mod validate;

pub use validate::Validator;

/// Longest tag name accepted by [`TagTable::register`].
pub const MAX_NAME_LEN: usize = 16;

/// How a tag takes its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// `[name]` only.
    None,
    /// `[name=anything]`, value required but only checked to be a non-empty single line.
    RequiredLiteral,
    /// `[name=value]`, value required and checked by the validator.
    RequiredValidated(Validator),
    /// `[name]` or `[name=value]`.
    OptionalValidated(Validator),
    /// `[name=value]content[/name]`, or `[name]value[/name]` where the raw content is the value.
    EqualsOrContent(Validator),
    /// `[name key=value key2=value2]` with a fixed key set. `[name=value]` assigns the first key.
    KeyValueList(&'static [KeySpec]),
}

/// One accepted key of a [`ParameterKind::KeyValueList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub name: &'static str,
    pub validator: Validator,
}

impl KeySpec {
    pub const fn new(name: &'static str, validator: Validator) -> Self {
        Self { name, validator }
    }
}

/// How the content between the open and close tag is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// Content is scanned for tags, smileys and links.
    Parsed,
    /// Content is escaped and passed through untouched.
    Verbatim,
    /// The raw content is the tag's value (e.g. `[img]url[/img]`) and is checked by the validator.
    Captured(Validator),
}

/// Tags whose interpretation is disabled while a tag is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    Nothing,
    All,
    Tags(&'static [&'static str]),
}

/// Where the rendered tag ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Inline,
    /// The rendered content moves to the footnote block at the end of the message; a numbered reference is
    /// left in its place.
    Footnote,
}

/// Immutable definition of one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDefinition {
    /// Lowercase tag name.
    pub name: &'static str,
    pub parameters: ParameterKind,
    pub content: ContentMode,
    /// Template emitted for the open tag. See [`template`] for the placeholder syntax.
    pub before: &'static str,
    /// Template emitted for the close tag.
    pub after: &'static str,
    /// The tag has no content and no close tag (`[hr]`).
    pub standalone: bool,
    /// Block level tags swallow one newline after their open and close tags.
    pub block_level: bool,
    pub suppresses: Suppression,
    /// Whether newlines in the content become `<br />`.
    pub convert_line_breaks: bool,
    /// Tags closed implicitly when this tag opens directly inside them (`[li]` closes a previous `[li]`).
    pub auto_close_before: &'static [&'static str],
    /// The tag is only recognized directly inside this parent.
    pub require_parent: Option<&'static str>,
    /// A parameterless instance with empty content is removed entirely.
    pub discard_if_empty: bool,
    /// Whether the tag may be closed implicitly at the end of input. If not, it falls back to its literal
    /// source text.
    pub close_at_eof: bool,
    /// The tag renders a link; autolinking is disabled inside it.
    pub is_link: bool,
    /// Whitespace-only text directly inside the tag is dropped (`[list]`, `[table]`, `[tr]`).
    pub structural: bool,
    pub placement: Placement,
}

impl TagDefinition {
    /// A parameterless tag with parsed content.
    pub const fn new(name: &'static str, before: &'static str, after: &'static str) -> Self {
        Self {
            name,
            parameters: ParameterKind::None,
            content: ContentMode::Parsed,
            before,
            after,
            standalone: false,
            block_level: false,
            suppresses: Suppression::Nothing,
            convert_line_breaks: true,
            auto_close_before: &[],
            require_parent: None,
            discard_if_empty: true,
            close_at_eof: true,
            is_link: false,
            structural: false,
            placement: Placement::Inline,
        }
    }

    /// A tag with no content or close tag.
    pub const fn standalone(name: &'static str, html: &'static str) -> Self {
        let mut def = Self::new(name, html, "");
        def.standalone = true;
        def
    }

    pub const fn with_parameters(mut self, parameters: ParameterKind) -> Self {
        self.parameters = parameters;
        self
    }

    pub const fn with_content(mut self, content: ContentMode) -> Self {
        self.content = content;
        self
    }

    pub const fn block(mut self) -> Self {
        self.block_level = true;
        self
    }

    pub const fn suppressing(mut self, suppresses: Suppression) -> Self {
        self.suppresses = suppresses;
        self
    }

    pub const fn raw_line_breaks(mut self) -> Self {
        self.convert_line_breaks = false;
        self
    }

    pub const fn auto_closing(mut self, names: &'static [&'static str]) -> Self {
        self.auto_close_before = names;
        self
    }

    pub const fn inside(mut self, parent: &'static str) -> Self {
        self.require_parent = Some(parent);
        self
    }

    pub const fn keep_when_empty(mut self) -> Self {
        self.discard_if_empty = false;
        self
    }

    pub const fn no_eof_close(mut self) -> Self {
        self.close_at_eof = false;
        self
    }

    pub const fn link(mut self) -> Self {
        self.is_link = true;
        self
    }

    pub const fn structural(mut self) -> Self {
        self.structural = true;
        self
    }

    pub const fn footnote(mut self) -> Self {
        self.placement = Placement::Footnote;
        self
    }

    /// Parse and validate the raw argument text of an open tag (everything between the name and `]`).
    ///
    /// Returns `None` if the arguments do not fit [`Self::parameters`]; the caller then treats the tag as
    /// literal text.
    pub fn parse_params(&self, args: &str) -> Option<Params> {
        let args = args.trim();

        match self.parameters {
            ParameterKind::None => args.is_empty().then(Params::default),
            ParameterKind::RequiredLiteral => {
                let value = Validator::Literal.check(equals_value(args)?)?;
                Some(Params::with_value(value.into_owned()))
            }
            ParameterKind::RequiredValidated(validator) => {
                let value = validator.check(equals_value(args)?)?;
                Some(Params::with_value(value.into_owned()))
            }
            ParameterKind::OptionalValidated(validator) | ParameterKind::EqualsOrContent(validator) => {
                if args.is_empty() {
                    return Some(Params::default());
                }
                let value = validator.check(equals_value(args)?)?;
                Some(Params::with_value(value.into_owned()))
            }
            ParameterKind::KeyValueList(keys) => {
                if args.is_empty() {
                    return Some(Params::default());
                }

                let pairs = match args.strip_prefix('=') {
                    Some(value) => vec![(keys.first()?, unquote(value))],
                    None => split_key_values(args, keys)?,
                };

                let mut params = Params::default();
                for (spec, value) in pairs {
                    let value = spec.validator.check(value)?;
                    params.keys.push((spec.name, value.into_owned()));
                }
                Some(params)
            }
        }
    }

    /// The validator applied to the tag's main value, if it has one.
    pub fn value_validator(&self) -> Option<Validator> {
        match self.parameters {
            ParameterKind::RequiredLiteral => Some(Validator::Literal),
            ParameterKind::RequiredValidated(v)
            | ParameterKind::OptionalValidated(v)
            | ParameterKind::EqualsOrContent(v) => Some(v),
            ParameterKind::None | ParameterKind::KeyValueList(_) => None,
        }
    }

    /// If the raw content of this instance is its value, the validator for that content.
    pub fn captures_content(&self, params: &Params) -> Option<Validator> {
        match (self.content, self.parameters) {
            (ContentMode::Captured(v), _) => Some(v),
            (_, ParameterKind::EqualsOrContent(v)) if params.value.is_none() => Some(v),
            _ => None,
        }
    }

    /// Whether captured content is also displayed (link text), rather than only used as the value.
    pub fn shows_captured(&self) -> bool {
        matches!(self.parameters, ParameterKind::EqualsOrContent(_))
    }

    /// The keys a [`ParameterKind::KeyValueList`] accepts.
    pub fn keys(&self) -> &'static [KeySpec] {
        match self.parameters {
            ParameterKind::KeyValueList(keys) => keys,
            _ => &[],
        }
    }
}

/// Validated parameters of one tag instance, in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pub value: Option<String>,
    pub keys: Vec<(&'static str, String)>,
}

impl Params {
    pub fn with_value(value: String) -> Self {
        Self {
            value: Some(value),
            keys: vec![],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.keys.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn equals_value(args: &str) -> Option<&str> {
    let value = unquote(args.strip_prefix('=')?);
    (!value.is_empty()).then_some(value)
}

/// Strip one pair of surrounding double quotes.
pub(crate) fn unquote(value: &str) -> &str {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..(value.len() - 1)]
    } else {
        value
    }
}

/// Whether `rest` starts with `key=` for one of `keys`.
pub(crate) fn starts_with_key(rest: &str, keys: &[KeySpec]) -> bool {
    keys.iter().any(|spec| {
        rest.len() > spec.name.len()
            && rest.as_bytes()[spec.name.len()] == b'='
            && rest[..spec.name.len()].eq_ignore_ascii_case(spec.name)
    })
}

/// Split `key=value key2=value2`. Unquoted values run until whitespace followed by another known key.
fn split_key_values<'a>(args: &'a str, keys: &'static [KeySpec]) -> Option<Vec<(&'static KeySpec, &'a str)>> {
    let mut pairs: Vec<(&'static KeySpec, &'a str)> = vec![];
    let mut rest = args.trim_start();

    while !rest.is_empty() {
        let eq = rest.find('=')?;
        let key = rest[..eq].trim();
        let spec = keys.iter().find(|x| x.name.eq_ignore_ascii_case(key))?;
        if pairs.iter().any(|(s, _)| s.name == spec.name) {
            return None;
        }
        rest = &rest[(eq + 1)..];

        let value = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"')?;
            rest = &quoted[(end + 1)..];
            &quoted[..end]
        } else {
            let end = value_end(rest, keys);
            let value = &rest[..end];
            rest = &rest[end..];
            value.trim_end()
        };

        pairs.push((spec, value));
        rest = rest.trim_start();
    }

    Some(pairs)
}

/// End of an unquoted key/value value. A value always holds at least its first character.
fn value_end(rest: &str, keys: &[KeySpec]) -> usize {
    let mut chars = rest.char_indices();
    chars.next();
    for (idx, c) in chars {
        if c.is_whitespace() && starts_with_key(rest[idx..].trim_start(), keys) {
            return idx;
        }
    }
    rest.len()
}

/// A process-wide, read-only lookup from tag name to [`TagDefinition`].
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    tags: Vec<TagDefinition>,
    index: HashMap<&'static str, usize>,
}

impl TagTable {
    /// A table without any tags.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in dialect, see [`builtins::all_builtin_tags`].
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for def in builtins::all_builtin_tags() {
            let registered = table.register(*def);
            debug_assert!(registered.is_ok(), "built-in tags must be unique");
        }
        table
    }

    /// Register a tag. The first registration of a name wins; later ones are rejected.
    pub fn register(&mut self, definition: TagDefinition) -> Result<(), GrammarError> {
        let name = definition.name;
        let valid_name = !name.is_empty()
            && name.len() <= MAX_NAME_LEN
            && name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        if !valid_name {
            return Err(GrammarError::InvalidName(name.to_owned()));
        }

        if self.index.contains_key(name) {
            log::debug!("rejecting duplicate registration of tag `{name}`");
            return Err(GrammarError::DuplicateTag(name.to_owned()));
        }

        self.index.insert(name, self.tags.len());
        self.tags.push(definition);
        Ok(())
    }

    /// Register several tags, stopping at the first failure.
    pub fn register_all<I>(&mut self, definitions: I) -> Result<(), GrammarError>
    where
        I: IntoIterator<Item = TagDefinition>,
    {
        definitions.into_iter().try_for_each(|def| self.register(def))
    }

    /// Look a tag up by name, ignoring ASCII case.
    pub fn lookup(&self, name: &str) -> Option<&TagDefinition> {
        let idx = if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.index.get(name.to_ascii_lowercase().as_str())
        } else {
            self.index.get(name)
        }?;
        self.tags.get(*idx)
    }

    pub fn all_names(&self) -> BTreeSet<&'static str> {
        self.tags.iter().map(|x| x.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagDefinition> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Union of the [`Suppression`]s of all open tags, maintained incrementally as tags are pushed and popped.
#[derive(Debug, Default)]
pub(crate) struct Suppressions {
    all: usize,
    tags: HashMap<&'static str, usize>,
}

impl Suppressions {
    pub fn push(&mut self, suppression: Suppression) {
        match suppression {
            Suppression::Nothing => {}
            Suppression::All => self.all += 1,
            Suppression::Tags(names) => {
                for &name in names {
                    *self.tags.entry(name).or_default() += 1;
                }
            }
        }
    }

    pub fn pop(&mut self, suppression: Suppression) {
        match suppression {
            Suppression::Nothing => {}
            Suppression::All => self.all = self.all.saturating_sub(1),
            Suppression::Tags(names) => {
                for name in names {
                    if let Some(count) = self.tags.get_mut(name) {
                        *count -= 1;
                        if *count == 0 {
                            self.tags.remove(name);
                        }
                    }
                }
            }
        }
    }

    pub fn blocks(&self, name: &str) -> bool {
        self.all > 0 || self.tags.contains_key(name)
    }
}

/// Number of open tags per name, so lookups never walk the stack.
#[derive(Debug, Default)]
pub(crate) struct OpenCounts {
    tags: HashMap<&'static str, usize>,
}

impl OpenCounts {
    pub fn add(&mut self, name: &'static str) {
        *self.tags.entry(name).or_default() += 1;
    }

    pub fn remove(&mut self, name: &str) {
        if let Some(count) = self.tags.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                self.tags.remove(name);
            }
        }
    }

    pub fn get(&self, name: &str) -> usize {
        self.tags.get(name).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests;
