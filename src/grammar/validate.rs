//! Attribute validators.
//!
//! Every tag parameter is checked by exactly one [`Validator`]. A validator either rejects the value (the tag
//! then falls back to its literal source text) or returns the canonical form that is stored by the normalizer
//! and substituted into HTML templates.
use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// The closed set of parameter validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validator {
    /// `#RGB`, `#RRGGBB`, a CSS color keyword or `rgb(r, g, b)`.
    Color,
    /// Unitless `1`-`7`, `<n>px`, `<n>pt` or a CSS size keyword.
    Size,
    /// A single font family. Only the first entry of a comma-separated list is kept.
    FontFamily,
    /// An http(s)/ftp(s) or relative URL. Schemeless URLs get `http://` prepended.
    Url,
    /// An e-mail address, optionally prefixed with `mailto:`.
    Email,
    CodeLanguage,
    AnchorName,
    ListType,
    /// Pixel dimension in `1..=9999`.
    Dimension,
    QuoteAuthor,
    /// Unix timestamp.
    Timestamp,
    /// Any non-empty single line value.
    Literal,
}

/// Upper bound for a quote author name, in characters.
pub const MAX_AUTHOR_LEN: usize = 80;

const MAX_LITERAL_LEN: usize = 256;

/// Em steps used for the legacy unitless `[size=1]`..`[size=7]` forms.
const SIZE_STEPS: [&str; 7] = ["0.7em", "1em", "1.35em", "1.45em", "2em", "2.65em", "3.95em"];

const SIZE_KEYWORDS: &[&str] = &[
    "xx-small", "x-small", "small", "medium", "large", "x-large", "xx-large", "smaller", "larger",
];

const LIST_TYPES: &[&str] = &[
    "none",
    "disc",
    "circle",
    "square",
    "decimal",
    "decimal-leading-zero",
    "lower-roman",
    "upper-roman",
    "lower-alpha",
    "upper-alpha",
    "lower-greek",
    "lower-latin",
    "upper-latin",
];

const URL_SCHEMES: &[&str] = &["http", "https", "ftp", "ftps"];

const CSS_COLORS: &[&str] = &[
    "aliceblue", "antiquewhite", "aqua", "aquamarine", "azure", "beige", "bisque", "black",
    "blanchedalmond", "blue", "blueviolet", "brown", "burlywood", "cadetblue", "chartreuse",
    "chocolate", "coral", "cornflowerblue", "cornsilk", "crimson", "cyan", "darkblue", "darkcyan",
    "darkgoldenrod", "darkgray", "darkgreen", "darkgrey", "darkkhaki", "darkmagenta",
    "darkolivegreen", "darkorange", "darkorchid", "darkred", "darksalmon", "darkseagreen",
    "darkslateblue", "darkslategray", "darkslategrey", "darkturquoise", "darkviolet", "deeppink",
    "deepskyblue", "dimgray", "dimgrey", "dodgerblue", "firebrick", "floralwhite", "forestgreen",
    "fuchsia", "gainsboro", "ghostwhite", "gold", "goldenrod", "gray", "green", "greenyellow",
    "grey", "honeydew", "hotpink", "indianred", "indigo", "ivory", "khaki", "lavender",
    "lavenderblush", "lawngreen", "lemonchiffon", "lightblue", "lightcoral", "lightcyan",
    "lightgoldenrodyellow", "lightgray", "lightgreen", "lightgrey", "lightpink", "lightsalmon",
    "lightseagreen", "lightskyblue", "lightslategray", "lightslategrey", "lightsteelblue",
    "lightyellow", "lime", "limegreen", "linen", "magenta", "maroon", "mediumaquamarine",
    "mediumblue", "mediumorchid", "mediumpurple", "mediumseagreen", "mediumslateblue",
    "mediumspringgreen", "mediumturquoise", "mediumvioletred", "midnightblue", "mintcream",
    "mistyrose", "moccasin", "navajowhite", "navy", "oldlace", "olive", "olivedrab", "orange",
    "orangered", "orchid", "palegoldenrod", "palegreen", "paleturquoise", "palevioletred",
    "papayawhip", "peachpuff", "peru", "pink", "plum", "powderblue", "purple", "rebeccapurple",
    "red", "rosybrown", "royalblue", "saddlebrown", "salmon", "sandybrown", "seagreen", "seashell",
    "sienna", "silver", "skyblue", "slateblue", "slategray", "slategrey", "snow", "springgreen",
    "steelblue", "tan", "teal", "thistle", "tomato", "turquoise", "violet", "wheat", "white",
    "whitesmoke", "yellow", "yellowgreen",
];

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid regex"));
static RGB_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)rgb\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)$").expect("valid regex")
});
static UNIT_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})(px|pt)$").expect("valid regex"));
static FONT_FAMILY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _\-]{0,49}$").expect("valid regex"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)+$").expect("valid regex")
});
static CODE_LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+#_.\-]{1,32}$").expect("valid regex"));
static ANCHOR_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_\-]{0,31}$").expect("valid regex"));
static URL_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").expect("valid regex"));

impl Validator {
    /// Validate `value`, returning its canonical form.
    pub fn check<'a>(self, value: &'a str) -> Option<Cow<'a, str>> {
        match self {
            Validator::Color => color(value.trim()),
            Validator::Size => size(value.trim()),
            Validator::FontFamily => font_family(value),
            Validator::Url => url(value.trim()),
            Validator::Email => email(value.trim()),
            Validator::CodeLanguage => CODE_LANGUAGE.is_match(value.trim()).then(|| Cow::Borrowed(value.trim())),
            Validator::AnchorName => {
                let value = value.trim().trim_start_matches('#');
                ANCHOR_NAME.is_match(value).then_some(Cow::Borrowed(value))
            }
            Validator::ListType => {
                let value = value.trim();
                LIST_TYPES
                    .iter()
                    .find(|x| x.eq_ignore_ascii_case(value))
                    .map(|x| Cow::Borrowed(*x))
            }
            Validator::Dimension => {
                let value = value.trim();
                let valid = !value.is_empty()
                    && value.len() <= 4
                    && value.bytes().all(|b| b.is_ascii_digit())
                    && value.parse::<u32>().map_or(false, |n| n >= 1);
                valid.then_some(Cow::Borrowed(value))
            }
            Validator::QuoteAuthor => {
                let len = value.chars().count();
                let valid = (1..=MAX_AUTHOR_LEN).contains(&len) && !value.contains('\n');
                valid.then_some(Cow::Borrowed(value))
            }
            Validator::Timestamp => {
                let value = value.trim();
                let valid =
                    !value.is_empty() && value.len() <= 10 && value.bytes().all(|b| b.is_ascii_digit());
                valid.then_some(Cow::Borrowed(value))
            }
            Validator::Literal => {
                let valid = !value.trim().is_empty()
                    && value.len() <= MAX_LITERAL_LEN
                    && !value.contains('\n');
                valid.then_some(Cow::Borrowed(value))
            }
        }
    }

    /// Map a canonical value onto the form used inside generated HTML.
    ///
    /// Only [`Validator::Size`] differs: the legacy unitless steps become em sizes.
    pub fn render_value(self, canonical: &str) -> Cow<'_, str> {
        match self {
            Validator::Size => match canonical.parse::<usize>() {
                Ok(n @ 1..=7) => Cow::Borrowed(SIZE_STEPS[n - 1]),
                _ => Cow::Borrowed(canonical),
            },
            _ => Cow::Borrowed(canonical),
        }
    }
}

fn color(value: &str) -> Option<Cow<'_, str>> {
    if HEX_COLOR.is_match(value) {
        return Some(Cow::Borrowed(value));
    }

    if let Some(caps) = RGB_COLOR.captures(value) {
        let mut channels = [0u16; 3];
        for (idx, channel) in channels.iter_mut().enumerate() {
            *channel = caps[idx + 1].parse().ok()?;
            if *channel > 255 {
                return None;
            }
        }
        let [r, g, b] = channels;
        return Some(Cow::Owned(format!("rgb({r}, {g}, {b})")));
    }

    CSS_COLORS
        .iter()
        .find(|x| x.eq_ignore_ascii_case(value))
        .map(|x| Cow::Borrowed(*x))
}

fn size(value: &str) -> Option<Cow<'_, str>> {
    if value.len() == 1 && matches!(value.as_bytes()[0], b'1'..=b'7') {
        return Some(Cow::Borrowed(value));
    }

    if let Some(caps) = UNIT_SIZE.captures(value) {
        let n: u32 = caps[1].parse().ok()?;
        let in_bounds = match &caps[2] {
            "px" => (6..=99).contains(&n),
            _ => (6..=72).contains(&n),
        };
        return in_bounds.then_some(Cow::Borrowed(value));
    }

    SIZE_KEYWORDS
        .iter()
        .find(|x| x.eq_ignore_ascii_case(value))
        .map(|x| Cow::Borrowed(*x))
}

fn font_family(value: &str) -> Option<Cow<'_, str>> {
    let first = value.split(',').next()?.trim();
    let first = first
        .strip_prefix('"')
        .and_then(|x| x.strip_suffix('"'))
        .or_else(|| first.strip_prefix('\'').and_then(|x| x.strip_suffix('\'')))
        .unwrap_or(first)
        .trim();

    FONT_FAMILY.is_match(first).then_some(Cow::Borrowed(first))
}

fn url(value: &str) -> Option<Cow<'_, str>> {
    let forbidden = |c: char| c.is_whitespace() || c.is_control() || matches!(c, '"' | '<' | '>' | '[' | ']' | '`');
    if value.is_empty() || value.contains(forbidden) {
        return None;
    }

    if value.starts_with("//") {
        return (value.len() > 2).then(|| Cow::Owned(format!("http:{value}")));
    }

    if value.starts_with('/') || value.starts_with('#') || value.starts_with('?') {
        return Some(Cow::Borrowed(value));
    }

    if let Some(caps) = URL_SCHEME.captures(value) {
        let scheme = &caps[1];
        let rest = &value[scheme.len() + 1..];

        if URL_SCHEMES.iter().any(|x| x.eq_ignore_ascii_case(scheme)) {
            let host = rest.strip_prefix("//")?;
            return (!host.is_empty()).then_some(Cow::Borrowed(value));
        }

        // `host:port/...` has no scheme, anything else (`javascript:`, `data:`) is rejected.
        let is_port = rest.bytes().next().map_or(false, |b| b.is_ascii_digit()) && scheme.contains('.');
        if !is_port {
            return None;
        }
    }

    Some(Cow::Owned(format!("http://{value}")))
}

fn email(value: &str) -> Option<Cow<'_, str>> {
    let value = value.strip_prefix("mailto:").unwrap_or(value);
    (value.len() <= 254 && EMAIL.is_match(value)).then_some(Cow::Borrowed(value))
}

/// Map a CSS `font-size` produced by [`Validator::render_value`] back onto its BBCode form.
pub fn size_from_css(css: &str) -> Option<Cow<'_, str>> {
    let css = css.trim();
    if let Some(idx) = SIZE_STEPS.iter().position(|x| *x == css) {
        return Some(Cow::Owned((idx + 1).to_string()));
    }
    size(css)
}
