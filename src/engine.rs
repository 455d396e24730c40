//! The [`Engine`] facade: one tag table, one smiley set and one render cache shared by every call.
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    cache::{CacheKey, RenderCache},
    convert,
    error::GrammarError,
    grammar::{TagDefinition, TagTable},
    html::{HtmlSerializer, RenderOptions, SmileySet},
    preparse::{PreparseOptions, Preparser},
};

/// Site-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct EngineConfig {
    /// Base URL of the smiley images.
    pub smiley_url: String,
    /// Tags that are neither stored nor rendered in signatures.
    pub signature_disallowed: Vec<String>,
    /// Tags that are neither stored nor rendered in previews.
    pub preview_disallowed: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smiley_url: "/smileys".to_owned(),
            signature_disallowed: ["size", "footnote", "spoiler", "table", "tr", "td", "th"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            preview_disallowed: vec![],
        }
    }
}

pub struct Engine {
    table: TagTable,
    smileys: SmileySet,
    config: EngineConfig,
    cache: RenderCache,
}

static_assertions::assert_impl_all!(Engine: Send, Sync);
static_assertions::assert_impl_all!(TagTable: Send, Sync);
static_assertions::assert_impl_all!(SmileySet: Send, Sync);

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    /// An engine with the built-in tags and the default smiley set.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            table: TagTable::builtin(),
            smileys: SmileySet::default_set(config.smiley_url.as_str()),
            config,
            cache: RenderCache::new(),
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Render `source` to HTML.
    ///
    /// Renders of a stored message (a message id and no [`PREVIEW`][crate::html::RenderFlags::PREVIEW] flag) are
    /// memoized until [`Self::invalidate`] is called for that message.
    pub fn render(&self, source: &str, options: &RenderOptions) -> String {
        let key = CacheKey::for_options(options);
        if let Some(html) = key.as_ref().and_then(|key| self.cache.get(key)) {
            return html.to_string();
        }

        let html = HtmlSerializer::new(&self.table, &self.smileys).serialize(source, options);
        if let Some(key) = key {
            self.cache.insert(key, html.as_str());
        }
        html
    }

    /// Like [`Self::render`], but shares the cached allocation.
    pub fn render_shared(&self, source: &str, options: &RenderOptions) -> Arc<str> {
        let Some(key) = CacheKey::for_options(options) else {
            return HtmlSerializer::new(&self.table, &self.smileys)
                .serialize(source, options)
                .into();
        };

        if let Some(html) = self.cache.get(&key) {
            return html;
        }
        let html = HtmlSerializer::new(&self.table, &self.smileys).serialize(source, options);
        self.cache.insert(key, html)
    }

    /// Repair and canonicalize `source` before it is stored.
    pub fn normalize_for_storage(&self, source: &str, options: &PreparseOptions) -> String {
        Preparser::new(&self.table, &self.config).normalize(source, options)
    }

    /// Forget every cached rendering of `message_id`.
    pub fn invalidate(&self, message_id: u64) {
        self.cache.invalidate(message_id);
    }

    #[cfg(feature = "html_import")]
    pub fn html_to_bbcode(&self, html: &str) -> String {
        convert::html_to_bbcode(html, &self.table)
    }

    pub fn markdown_to_bbcode(&self, markdown: &str) -> String {
        convert::markdown_to_bbcode(markdown)
    }

    pub fn bbcode_to_markdown(&self, source: &str) -> String {
        convert::bbcode_to_markdown(source, &self.table)
    }

    pub fn table(&self) -> &TagTable {
        &self.table
    }

    pub fn smileys(&self) -> &SmileySet {
        &self.smileys
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }
}

/// Builds an [`Engine`] with extra tags, a custom smiley set or custom configuration.
#[derive(Default)]
pub struct EngineBuilder {
    extra_tags: TagTable,
    smileys: Option<SmileySet>,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Add a tag on top of the built-in ones.
    ///
    /// Fails if the name is invalid or already taken, by a built-in tag or an earlier registration.
    pub fn register_tag(&mut self, definition: TagDefinition) -> Result<&mut Self, GrammarError> {
        if TagTable::builtin().lookup(definition.name).is_some() {
            log::debug!("rejecting registration of built-in tag `{}`", definition.name);
            return Err(GrammarError::DuplicateTag(definition.name.to_owned()));
        }
        self.extra_tags.register(definition)?;
        Ok(self)
    }

    /// Use `smileys` instead of the default set.
    pub fn smileys(&mut self, smileys: SmileySet) -> &mut Self {
        self.smileys = Some(smileys);
        self
    }

    pub fn config(&mut self, config: EngineConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn build(&mut self) -> Engine {
        let mut table = TagTable::builtin();
        for def in self.extra_tags.iter() {
            let registered = table.register(*def);
            debug_assert!(registered.is_ok(), "extra tags are checked on registration");
        }

        let config = self.config.clone();
        let smileys = self
            .smileys
            .clone()
            .unwrap_or_else(|| SmileySet::default_set(config.smiley_url.as_str()));

        Engine {
            table,
            smileys,
            config,
            cache: RenderCache::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::grammar::{ParameterKind, Validator};

    #[test]
    fn renders_are_cached_per_message() {
        let engine = Engine::default();
        let options = RenderOptions::message(7);

        assert_eq!(engine.render("[b]x[/b]", &options), "<strong class=\"bbc_strong\">x</strong>");
        assert_eq!(engine.cache().len(), 1);

        // A hit returns the stored rendering even for different source text.
        assert_eq!(engine.render("changed", &options), "<strong class=\"bbc_strong\">x</strong>");

        engine.invalidate(7);
        assert_eq!(engine.render("changed", &options), "changed");
    }

    #[test]
    fn previews_and_anonymous_renders_are_not_cached() {
        let engine = Engine::default();
        engine.render("x", &RenderOptions::default());
        engine.render("x", &RenderOptions::preview(engine.config()));
        assert!(engine.cache().is_empty());

        let shared = engine.render_shared("y", &RenderOptions::message(1));
        assert_eq!(&*shared, "y");
        assert_eq!(engine.cache().len(), 1);
    }

    #[test]
    fn custom_tags() {
        const SHOUT: TagDefinition = TagDefinition::new("shout", "<span class=\"shout\">", "</span>");
        const GREET: TagDefinition = TagDefinition::new("greet", "<span title=\"{value}\">", "</span>")
            .with_parameters(ParameterKind::RequiredValidated(Validator::Literal));

        let mut builder = Engine::builder();
        builder.register_tag(SHOUT).unwrap().register_tag(GREET).unwrap();
        assert_eq!(
            builder.register_tag(SHOUT).err(),
            Some(GrammarError::DuplicateTag("shout".to_owned()))
        );
        assert_eq!(
            builder.register_tag(TagDefinition::new("b", "", "")).err(),
            Some(GrammarError::DuplicateTag("b".to_owned()))
        );
        assert_eq!(
            builder.register_tag(TagDefinition::new("Big", "", "")).err(),
            Some(GrammarError::InvalidName("Big".to_owned()))
        );

        let engine = builder.build();
        assert_eq!(
            engine.render("[shout]hey[/shout] [greet=you]hi[/greet]", &RenderOptions::default()),
            "<span class=\"shout\">hey</span> <span title=\"you\">hi</span>"
        );
        assert_eq!(
            engine.normalize_for_storage("[SHOUT]hey", &PreparseOptions::default()),
            "[shout]hey[/shout]"
        );
    }

    #[test]
    fn config_drives_smileys_and_signatures() {
        let engine = Engine::new(EngineConfig {
            smiley_url: "https://cdn.example/s/".to_owned(),
            ..Default::default()
        });

        assert_eq!(
            engine.render(":)", &RenderOptions::default()),
            "<img src=\"https://cdn.example/s/smiley.gif\" alt=\":)\" title=\"Smiley\" class=\"smiley\" />"
        );
        assert_eq!(
            engine.normalize_for_storage("[spoiler]x[/spoiler]", &PreparseOptions::signature()),
            "x"
        );
    }
}
