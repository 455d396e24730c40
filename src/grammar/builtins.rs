//! Built-in tag definitions: the forum dialect rendered by [`TagTable::builtin`][super::TagTable::builtin].
use super::{ContentMode, KeySpec, ParameterKind, Suppression, TagDefinition, Validator};

macro_rules! simple_tag {
    ($doc:expr, $name:ident, $tag:expr, $open:expr, $close:expr) => {
        #[doc = $doc]
        #[doc = "<br/>"]
        #[doc = "This matches the BBCode tag `"]
        #[doc = $tag]
        #[doc = "`"]
        #[doc = "# Exact output"]
        #[doc = "```html"]
        #[doc = $open]
        #[doc = " contents"]
        #[doc = $close]
        #[doc = "```"]
        pub const $name: TagDefinition = TagDefinition::new($tag, $open, $close);
    };
}

macro_rules! simple_standalone_tag {
    ($doc:expr, $name:ident, $tag:expr, $standalone:expr) => {
        #[doc = $doc]
        #[doc = "<br/>"]
        #[doc = "This matches the BBCode tag `"]
        #[doc = $tag]
        #[doc = "`"]
        #[doc = "# Exact output"]
        #[doc = "```html"]
        #[doc = $standalone]
        #[doc = "```"]
        pub const $name: TagDefinition = TagDefinition::standalone($tag, $standalone);
    };
}

simple_tag! {
    "Bold text.",
    BOLD, "b", "<strong class=\"bbc_strong\">", "</strong>"
}
simple_tag! {
    "Italic text.",
    ITALIC, "i", "<em>", "</em>"
}
simple_tag! {
    "Underlined text.",
    UNDERLINE, "u", "<span class=\"bbc_u\">", "</span>"
}
simple_tag! {
    "Struck through text.",
    STRIKE, "s", "<del>", "</del>"
}
simple_tag! {
    "Superscript.",
    SUPERSCRIPT, "sup", "<sup>", "</sup>"
}
simple_tag! {
    "Subscript.",
    SUBSCRIPT, "sub", "<sub>", "</sub>"
}
simple_tag! {
    "Teletype (monospace) text.",
    TELETYPE, "tt", "<span class=\"bbc_tt\">", "</span>"
}
simple_standalone_tag! {
    "A horizontal rule.",
    HORIZONTAL_RULE, "hr", "<hr />"
}
simple_standalone_tag! {
    "A forced line break.",
    LINEBREAK, "br", "<br />"
}

/// Preformatted text. Tags inside are still parsed, newlines are kept as they are.
pub const PREFORMATTED: TagDefinition = TagDefinition::new("pre", "<pre class=\"bbc_pre\">", "</pre>")
    .block()
    .raw_line_breaks();

pub const LEFT: TagDefinition =
    TagDefinition::new("left", "<div style=\"text-align: left;\">", "</div>").block();
pub const CENTER: TagDefinition =
    TagDefinition::new("center", "<div style=\"text-align: center;\">", "</div>").block();
pub const RIGHT: TagDefinition =
    TagDefinition::new("right", "<div style=\"text-align: right;\">", "</div>").block();

pub const COLOR: TagDefinition =
    TagDefinition::new("color", "<span style=\"color: {value};\" class=\"bbc_color\">", "</span>")
        .with_parameters(ParameterKind::RequiredValidated(Validator::Color));

pub const SIZE: TagDefinition =
    TagDefinition::new("size", "<span style=\"font-size: {value};\" class=\"bbc_size\">", "</span>")
        .with_parameters(ParameterKind::RequiredValidated(Validator::Size));

pub const FONT: TagDefinition =
    TagDefinition::new("font", "<span style=\"font-family: {value};\" class=\"bbc_font\">", "</span>")
        .with_parameters(ParameterKind::RequiredValidated(Validator::FontFamily));

const NO_NESTED_LINKS: Suppression = Suppression::Tags(&["url", "iurl", "email"]);

/// `[url]http://example.com[/url]` or `[url=http://example.com]text[/url]`.
pub const URL: TagDefinition = TagDefinition::new(
    "url",
    "<a href=\"{value}\" class=\"bbc_link\" target=\"_blank\" rel=\"noopener noreferrer ugc\">",
    "</a>",
)
.with_parameters(ParameterKind::EqualsOrContent(Validator::Url))
.suppressing(NO_NESTED_LINKS)
.link()
.no_eof_close();

/// Like [`URL`], but opens in the same window.
pub const INTERNAL_URL: TagDefinition = TagDefinition::new("iurl", "<a href=\"{value}\" class=\"bbc_link\">", "</a>")
    .with_parameters(ParameterKind::EqualsOrContent(Validator::Url))
    .suppressing(NO_NESTED_LINKS)
    .link()
    .no_eof_close();

pub const EMAIL: TagDefinition =
    TagDefinition::new("email", "<a href=\"mailto:{value}\" class=\"bbc_email\">", "</a>")
        .with_parameters(ParameterKind::EqualsOrContent(Validator::Email))
        .suppressing(NO_NESTED_LINKS)
        .link()
        .no_eof_close();

const IMAGE_KEYS: &[KeySpec] = &[
    KeySpec::new("width", Validator::Dimension),
    KeySpec::new("height", Validator::Dimension),
    KeySpec::new("alt", Validator::Literal),
];

/// `[img]url[/img]`, `[img width=100 height=50 alt=text]url[/img]`.
pub const IMAGE: TagDefinition = TagDefinition::new(
    "img",
    "<img src=\"{value}\" alt=\"{alt}\"{width? width=\"$\"}{height? height=\"$\"} class=\"bbc_img\" />",
    "",
)
.with_parameters(ParameterKind::KeyValueList(IMAGE_KEYS))
.with_content(ContentMode::Captured(Validator::Url));

const QUOTE_KEYS: &[KeySpec] = &[
    KeySpec::new("author", Validator::QuoteAuthor),
    KeySpec::new("date", Validator::Timestamp),
];

/// `[quote]`, `[quote=author]` or `[quote author=name date=timestamp]`. Nested quotes alternate between the
/// standard and alternate class.
pub const QUOTE: TagDefinition = TagDefinition::new(
    "quote",
    "<div class=\"quoteheader\">{author?Quote from: $|Quote}{date? <span class=\"quotedate\" data-timestamp=\"$\"></span>}</div><blockquote class=\"bbc_{parity}_quote\">",
    "</blockquote>",
)
.with_parameters(ParameterKind::KeyValueList(QUOTE_KEYS))
.block();

/// `[code]` or `[code=language]`. Content is never interpreted.
pub const CODE: TagDefinition = TagDefinition::new(
    "code",
    "<div class=\"codeheader\">Code{value? ($)}</div><pre class=\"bbc_code\">",
    "</pre>",
)
.with_parameters(ParameterKind::OptionalValidated(Validator::CodeLanguage))
.with_content(ContentMode::Verbatim)
.suppressing(Suppression::All)
.raw_line_breaks()
.block();

pub const INLINE_CODE: TagDefinition = TagDefinition::new("icode", "<code class=\"bbc_code\">", "</code>")
    .with_content(ContentMode::Verbatim)
    .suppressing(Suppression::All);

/// Disables BBCode for its content without adding any markup.
pub const NO_BBC: TagDefinition = TagDefinition::new("nobbc", "", "")
    .with_content(ContentMode::Verbatim)
    .suppressing(Suppression::All);

const LIST_KEYS: &[KeySpec] = &[KeySpec::new("type", Validator::ListType)];

pub const LIST: TagDefinition = TagDefinition::new(
    "list",
    "<ul class=\"bbc_list\"{type? style=\"list-style-type: $;\"}>",
    "</ul>",
)
.with_parameters(ParameterKind::KeyValueList(LIST_KEYS))
.structural()
.block();

pub const LIST_ITEM: TagDefinition = TagDefinition::new("li", "<li>", "</li>")
    .inside("list")
    .auto_closing(&["li", "*"])
    .keep_when_empty()
    .block();

pub const TABLE: TagDefinition = TagDefinition::new("table", "<table class=\"bbc_table\">", "</table>")
    .structural()
    .block();

pub const TABLE_ROW: TagDefinition = TagDefinition::new("tr", "<tr>", "</tr>")
    .inside("table")
    .auto_closing(&["tr", "td", "th"])
    .structural()
    .keep_when_empty()
    .block();

pub const TABLE_CELL: TagDefinition = TagDefinition::new("td", "<td>", "</td>")
    .inside("tr")
    .auto_closing(&["td", "th"])
    .keep_when_empty()
    .block();

pub const TABLE_HEADER: TagDefinition = TagDefinition::new("th", "<th>", "</th>")
    .inside("tr")
    .auto_closing(&["td", "th"])
    .keep_when_empty()
    .block();

pub const SPOILER: TagDefinition = TagDefinition::new(
    "spoiler",
    "<details class=\"bbc_spoiler\"><summary>Spoiler</summary><div class=\"spoilerbody\">",
    "</div></details>",
)
.block();

/// Footnote body, moved to the end of the message. `{n}` is the footnote number, `{msg}` the message id.
pub const FOOTNOTE: TagDefinition = TagDefinition::new(
    "footnote",
    "<div class=\"target\" id=\"fn{n}_{msg}\"><sup>{n}</sup>&nbsp;",
    " <a href=\"#ref{n}_{msg}\">&#8617;</a></div>",
)
.suppressing(Suppression::Tags(&["footnote"]))
.footnote();

/// The reference left in place of a relocated footnote.
pub const FOOTNOTE_REFERENCE: &str =
    "<sup class=\"bbc_footnotes\"><a href=\"#fn{n}_{msg}\" id=\"ref{n}_{msg}\">[{n}]</a></sup>";

pub const ABBREVIATION: TagDefinition = TagDefinition::new("abbr", "<abbr title=\"{value}\">", "</abbr>")
    .with_parameters(ParameterKind::RequiredLiteral);

/// `[me=name]does something[/me]`.
pub const ME: TagDefinition = TagDefinition::new("me", "<div class=\"meaction\">* {value} ", "</div>")
    .with_parameters(ParameterKind::RequiredLiteral)
    .block();

pub const ANCHOR: TagDefinition = TagDefinition::new("anchor", "<span id=\"post_{value}\">", "</span>")
    .with_parameters(ParameterKind::RequiredValidated(Validator::AnchorName))
    .keep_when_empty();

/// Implicit list opened by an item code outside of any list. Never registered, so it cannot be typed.
pub const ITEM_LIST: TagDefinition = TagDefinition::new("*list", "<ul class=\"bbc_list\">", "</ul>")
    .structural()
    .keep_when_empty()
    .block();

/// List item opened by an item code. `{value}` is the marker's list style. Never registered.
pub const ITEM: TagDefinition =
    TagDefinition::new("*", "<li style=\"list-style-type: {value};\">", "</li>").keep_when_empty();

/// Returns every built-in tag, in registration order.
pub fn all_builtin_tags() -> &'static [TagDefinition] {
    const ALL: &[TagDefinition] = &[
        BOLD,
        ITALIC,
        UNDERLINE,
        STRIKE,
        SUPERSCRIPT,
        SUBSCRIPT,
        TELETYPE,
        PREFORMATTED,
        LEFT,
        CENTER,
        RIGHT,
        HORIZONTAL_RULE,
        LINEBREAK,
        COLOR,
        SIZE,
        FONT,
        URL,
        INTERNAL_URL,
        EMAIL,
        IMAGE,
        QUOTE,
        CODE,
        INLINE_CODE,
        NO_BBC,
        LIST,
        LIST_ITEM,
        TABLE,
        TABLE_ROW,
        TABLE_CELL,
        TABLE_HEADER,
        SPOILER,
        FOOTNOTE,
        ABBREVIATION,
        ME,
        ANCHOR,
    ];

    ALL
}
