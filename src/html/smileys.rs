//! Smiley substitution inside rendered text.
use html_escape::{encode_double_quoted_attribute, encode_text};

/// One smiley code and the image it renders as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smiley {
    pub code: String,
    pub file: String,
    pub description: String,
}

/// An immutable set of smileys, matched greedily (longest code first).
#[derive(Debug, Clone, Default)]
pub struct SmileySet {
    base_url: String,
    smileys: Vec<Smiley>,
}

const DEFAULT_SMILEYS: &[(&str, &str, &str)] = &[
    (":)", "smiley.gif", "Smiley"),
    (";)", "wink.gif", "Wink"),
    (":D", "cheesy.gif", "Cheesy"),
    (";D", "grin.gif", "Grin"),
    (">:(", "angry.gif", "Angry"),
    (":(", "sad.gif", "Sad"),
    (":o", "shocked.gif", "Shocked"),
    ("8)", "cool.gif", "Cool"),
    ("???", "huh.gif", "Huh?"),
    ("::)", "rolleyes.gif", "Roll Eyes"),
    (":P", "tongue.gif", "Tongue"),
    (":-[", "embarrassed.gif", "Embarrassed"),
    (":-X", "lipsrsealed.gif", "Lips Sealed"),
    (":-\\", "undecided.gif", "Undecided"),
    (":-*", "kiss.gif", "Kiss"),
    (":'(", "cry.gif", "Cry"),
    ("^-^", "happy.gif", "Happy"),
    ("O:-)", "angel.gif", "Angel"),
];

impl SmileySet {
    /// An empty set whose images live under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            smileys: vec![],
        }
    }

    /// The classic forum set.
    pub fn default_set(base_url: impl Into<String>) -> Self {
        let mut set = Self::new(base_url);
        for (code, file, description) in DEFAULT_SMILEYS {
            set.add(*code, *file, *description);
        }
        set
    }

    /// Add a smiley. A code that is already present is replaced.
    pub fn add(
        &mut self,
        code: impl Into<String>,
        file: impl Into<String>,
        description: impl Into<String>,
    ) -> &mut Self {
        let code = code.into();
        if code.is_empty() {
            return self;
        }

        self.smileys.retain(|x| x.code != code);
        self.smileys.push(Smiley {
            code,
            file: file.into(),
            description: description.into(),
        });
        // Stable, so codes of equal length keep insertion order.
        self.smileys.sort_by(|a, b| b.code.len().cmp(&a.code.len()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn iter(&self) -> impl Iterator<Item = &Smiley> {
        self.smileys.iter()
    }

    pub fn len(&self) -> usize {
        self.smileys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.smileys.is_empty()
    }

    /// Escape `text` into `out`, replacing every smiley code that stands on its own with its image.
    ///
    /// A code must start the text or follow whitespace or one of `>:?.[]()*\;`, and must not be followed by a
    /// letter or digit.
    pub fn substitute(&self, text: &str, out: &mut String) {
        let mut last = 0;
        let mut idx = 0;
        let mut prev: Option<char> = None;

        while let Some(c) = text[idx..].chars().next() {
            if boundary_before(prev) {
                if let Some(smiley) = self.match_at(text, idx) {
                    out.push_str(&encode_text(&text[last..idx]));
                    self.push_image(smiley, out);

                    idx += smiley.code.len();
                    last = idx;
                    prev = smiley.code.chars().last();
                    continue;
                }
            }

            prev = Some(c);
            idx += c.len_utf8();
        }

        out.push_str(&encode_text(&text[last..]));
    }

    fn match_at(&self, text: &str, idx: usize) -> Option<&Smiley> {
        let rest = &text[idx..];
        self.smileys.iter().find(|x| {
            rest.starts_with(x.code.as_str())
                && rest[x.code.len()..]
                    .chars()
                    .next()
                    .map_or(true, |next| !next.is_alphanumeric())
        })
    }

    fn push_image(&self, smiley: &Smiley, out: &mut String) {
        out.push_str("<img src=\"");
        out.push_str(&encode_double_quoted_attribute(&self.base_url));
        out.push('/');
        out.push_str(&encode_double_quoted_attribute(&smiley.file));
        out.push_str("\" alt=\"");
        out.push_str(&encode_double_quoted_attribute(&smiley.code));
        out.push_str("\" title=\"");
        out.push_str(&encode_double_quoted_attribute(&smiley.description));
        out.push_str("\" class=\"smiley\" />");
    }
}

fn boundary_before(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '\u{a0}' | '>' | ':' | '?' | '.' | '[' | ']' | '(' | ')' | '*' | '\\' | ';'),
    }
}
