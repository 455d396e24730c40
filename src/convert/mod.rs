//! Conversions between BBCode and other markup.
//!
//! Only tags present in the given [`TagTable`][crate::grammar::TagTable] are ever produced, so converted
//! text always survives [`Preparser::normalize`][crate::preparse::Preparser::normalize].
#[cfg(feature = "html_import")]
mod from_html;
mod from_markdown;
mod to_markdown;

#[cfg(feature = "html_import")]
pub use from_html::html_to_bbcode;
pub use from_markdown::markdown_to_bbcode;
pub use to_markdown::bbcode_to_markdown;

use crate::{
    grammar::{Params, TagDefinition, TagTable},
    preparse::canonical_open,
    BBParser,
};

/// Open tag for `name` with an optional main value and key/value pairs, if the table knows the tag and accepts
/// the parameters.
pub(crate) fn open_tag(table: &TagTable, name: &str, value: Option<&str>, keys: &[(&str, &str)]) -> Option<String> {
    let def = table.lookup(name)?;
    let params = checked_params(def, value, keys)?;
    canonical_open(def, &params)
}

fn checked_params(def: &TagDefinition, value: Option<&str>, keys: &[(&str, &str)]) -> Option<Params> {
    let mut params = Params::default();

    if let Some(value) = value {
        params.value = Some(def.value_validator()?.check(value)?.into_owned());
    }

    for (key, value) in keys {
        let spec = def.keys().iter().find(|x| x.name == *key)?;
        params.keys.push((spec.name, spec.validator.check(value)?.into_owned()));
    }

    Some(params)
}

/// Protect `text` from being read as BBCode, wrapping it in `[nobbc]` if it would form a tag.
pub(crate) fn push_literal(out: &mut String, text: &str, table: &TagTable) {
    let forms_tag = text.contains('[') && BBParser::new(text, table).any(|tk| !tk.is_text());
    if forms_tag && table.lookup("nobbc").is_some() && !text.contains("[/nobbc") {
        out.push_str("[nobbc]");
        out.push_str(text);
        out.push_str("[/nobbc]");
    } else {
        out.push_str(text);
    }
}

/// Collapse runs of blank lines and trim the result.
pub(crate) fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_lines = 0;

    for line in text.trim().lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_lines += 1;
            if blank_lines > 1 {
                continue;
            }
        } else {
            blank_lines = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.truncate(out.trim_end().len());
    out
}

#[cfg(test)]
mod tests;
