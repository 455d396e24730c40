//! Detection of bare links in text.
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// `http://`, `https://`, `ftp://` or `ftps://`.
    Url,
    /// `www.` without a scheme.
    Www,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    /// Byte range of the link within the searched text.
    pub range: Range<usize>,
    pub kind: LinkKind,
}

static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?i)((?:https?|ftps?)://[^\s<>\[\]"']+)"#,
        r#"|(www\.[^\s<>\[\]"']+)"#,
        r"|([a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)+)",
    ))
    .expect("valid regex")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"'];

/// Find every bare link in `text`, in order.
///
/// A link must start the text or follow a character that cannot be part of a word or another link. Trailing
/// sentence punctuation and an unbalanced closing parenthesis are not part of the link.
pub fn find_links(text: &str) -> Vec<LinkMatch> {
    let mut links = vec![];

    for caps in LINK.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };

        let preceded_ok = text[..whole.start()]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || matches!(c, '_' | '/' | '@' | '.' | '-' | '=' | '&')));
        if !preceded_ok {
            continue;
        }

        let kind = if caps.get(1).is_some() {
            LinkKind::Url
        } else if caps.get(2).is_some() {
            LinkKind::Www
        } else {
            LinkKind::Email
        };

        let end = whole.start() + trimmed_len(whole.as_str());
        let link = &text[whole.start()..end];
        let long_enough = match kind {
            LinkKind::Url => link.find("://").map_or(false, |x| link.len() > x + 3),
            LinkKind::Www => link.len() > "www.".len(),
            LinkKind::Email => true,
        };

        if long_enough {
            links.push(LinkMatch {
                range: whole.start()..end,
                kind,
            });
        }
    }

    links
}

fn trimmed_len(link: &str) -> usize {
    let mut link = link;

    loop {
        if let Some(rest) = link.strip_suffix(TRAILING_PUNCTUATION) {
            link = rest;
        } else if link.ends_with(')') && link.matches(')').count() > link.matches('(').count() {
            link = &link[..(link.len() - 1)];
        } else {
            return link.len();
        }
    }
}
