//! A BBCode engine: a tag-stack HTML renderer, a storage normalizer and converters to and from HTML and
//! Markdown, all driven by one table of tag definitions.
//!
//! ```
//! use bbc_engine::{Engine, PreparseOptions, RenderOptions};
//!
//! let engine = Engine::default();
//! let stored = engine.normalize_for_storage("[B]hello", &PreparseOptions::default());
//! assert_eq!(stored, "[b]hello[/b]");
//! assert_eq!(
//!     engine.render(&stored, &RenderOptions::default()),
//!     "<strong class=\"bbc_strong\">hello</strong>"
//! );
//! ```

pub mod cache;
pub mod convert;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod html;
pub mod parser;
pub mod preparse;

pub use engine::{Engine, EngineBuilder, EngineConfig};
pub use error::GrammarError;
pub use grammar::{TagDefinition, TagTable};
pub use html::{RenderFlags, RenderOptions, SmileySet};
pub use parser::{rules, BBParser, BBTag, ItemMarker, ParserConfig, ParserFeature, Token, TokenKind};
pub use preparse::PreparseOptions;
