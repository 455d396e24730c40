//! Placeholder expansion for tag templates.
//!
//! Templates are plain HTML with three placeholder forms:
//! - `{name}` inserts the escaped variable, or nothing when it is unset.
//! - `{name?then}` inserts `then` when the variable is set, with every `$` replaced by the escaped value.
//! - `{name?then|else}` additionally inserts `else` when the variable is unset.

/// Expand `template` into `out`, resolving variables through `vars`.
pub fn expand<F>(template: &str, vars: F, out: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[(open + 1)..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return;
        };

        let body = &after[..close];
        rest = &after[(close + 1)..];

        match body.split_once('?') {
            None => {
                if let Some(value) = vars(body) {
                    push_escaped(out, &value);
                }
            }
            Some((name, branches)) => {
                let (then, otherwise) = branches.split_once('|').unwrap_or((branches, ""));
                match vars(name) {
                    Some(value) => {
                        for (idx, part) in then.split('$').enumerate() {
                            if idx > 0 {
                                push_escaped(out, &value);
                            }
                            out.push_str(part);
                        }
                    }
                    None => out.push_str(otherwise),
                }
            }
        }
    }

    out.push_str(rest);
}

fn push_escaped(out: &mut String, value: &str) {
    out.push_str(&html_escape::encode_double_quoted_attribute(value));
}
