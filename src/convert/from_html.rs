//! HTML to BBCode, over a kuchiki DOM.
use kuchiki::{traits::*, ElementData, NodeRef};

use crate::grammar::{validate::size_from_css, TagTable};

use super::{open_tag, push_literal, tidy};

/// Convert an HTML fragment to BBCode.
///
/// Markup produced by the HTML renderer maps back onto the tags it came from. Other HTML is mapped by element
/// and inline style where a tag fits, and reduced to its text otherwise. Scripts, styles and embedded objects
/// are dropped.
pub fn html_to_bbcode(html: &str, table: &TagTable) -> String {
    let document = kuchiki::parse_html().one(html);
    let body = document
        .select_first("body")
        .map(|x| x.as_node().clone())
        .unwrap_or_else(|_| document.clone());

    let converter = Converter { table, document: &document };
    tidy(&converter.walk(body.children().collect()))
}

struct Converter<'a> {
    table: &'a TagTable,
    document: &'a NodeRef,
}

enum Step {
    Enter(NodeRef),
    Emit(String),
}

enum Mapping {
    /// Children are converted between the two strings.
    Wrap(String, String),
    /// The element is replaced by this text; children are not visited.
    Replace(String),
    /// Only the children are converted.
    Transparent,
    Skip,
}

impl<'a> Converter<'a> {
    /// Convert `nodes` and everything below them.
    fn walk(&self, nodes: Vec<NodeRef>) -> String {
        let mut out = String::new();
        let mut steps: Vec<Step> = nodes.into_iter().rev().map(Step::Enter).collect();

        while let Some(step) = steps.pop() {
            let node = match step {
                Step::Emit(text) => {
                    out.push_str(&text);
                    continue;
                }
                Step::Enter(node) => node,
            };

            if let Some(text) = node.as_text() {
                let text = text.borrow();
                let preformatted = node.ancestors().any(|x| element_name(&x) == Some("pre"));
                let text = if preformatted {
                    text.clone()
                } else if is_blank(&text) && node.parent().as_ref().map_or(false, is_structural) {
                    continue;
                } else {
                    collapse_whitespace(&text, &out)
                };
                push_literal(&mut out, &text, self.table);
                continue;
            }

            let Some(element) = node.as_element() else {
                // Document fragments and the like.
                steps.extend(node.children().collect::<Vec<_>>().into_iter().rev().map(Step::Enter));
                continue;
            };

            match self.map_element(&node, element) {
                Mapping::Skip => {}
                Mapping::Replace(text) => out.push_str(&text),
                Mapping::Transparent => {
                    steps.extend(node.children().collect::<Vec<_>>().into_iter().rev().map(Step::Enter));
                }
                Mapping::Wrap(open, close) => {
                    out.push_str(&open);
                    steps.push(Step::Emit(close));
                    steps.extend(node.children().collect::<Vec<_>>().into_iter().rev().map(Step::Enter));
                }
            }
        }

        out
    }

    /// `[name]`..`[/name]` if the table has the tag and accepts the parameters.
    fn wrap(&self, name: &str, value: Option<&str>, keys: &[(&str, &str)]) -> Mapping {
        match open_tag(self.table, name, value, keys) {
            Some(open) => Mapping::Wrap(open, format!("[/{name}]")),
            None => Mapping::Transparent,
        }
    }

    /// `[name]text[/name]` for tags whose content is taken literally.
    fn replace(&self, name: &str, value: Option<&str>, keys: &[(&str, &str)], text: &str) -> Mapping {
        let closes_early = text.to_ascii_lowercase().contains(&format!("[/{name}"));
        match open_tag(self.table, name, value, keys) {
            Some(open) if !closes_early => Mapping::Replace(format!("{open}{text}[/{name}]")),
            _ => {
                let mut literal = String::with_capacity(text.len());
                push_literal(&mut literal, text, self.table);
                Mapping::Replace(literal)
            }
        }
    }

    fn map_element(&self, node: &NodeRef, element: &ElementData) -> Mapping {
        let attributes = element.attributes.borrow();
        let class = attributes.get("class").unwrap_or_default();
        let style = attributes.get("style").unwrap_or_default();
        let has_class = |name: &str| class.split_whitespace().any(|x| x == name);

        match &*element.name.local {
            "script" | "style" | "iframe" | "object" | "embed" | "head" | "title" | "noscript" | "summary" => {
                Mapping::Skip
            }
            "strong" | "b" => self.wrap("b", None, &[]),
            "em" | "i" => self.wrap("i", None, &[]),
            "u" | "ins" => self.wrap("u", None, &[]),
            "del" | "s" | "strike" => self.wrap("s", None, &[]),
            "sub" => self.wrap("sub", None, &[]),
            "sup" if has_class("bbc_footnotes") => self.footnote(node),
            "sup" => self.wrap("sup", None, &[]),
            "tt" | "kbd" | "samp" => self.wrap("tt", None, &[]),
            "span" => {
                if has_class("bbc_u") {
                    return self.wrap("u", None, &[]);
                }
                if has_class("bbc_tt") {
                    return self.wrap("tt", None, &[]);
                }
                if let Some(id) = attributes.get("id").and_then(|x| x.strip_prefix("post_")) {
                    return self.wrap("anchor", Some(id), &[]);
                }
                if let Some(color) = style_property(style, "color") {
                    return self.wrap("color", Some(color), &[]);
                }
                if let Some(size) = style_property(style, "font-size").and_then(size_from_css) {
                    return self.wrap("size", Some(size.as_ref()), &[]);
                }
                if let Some(font) = style_property(style, "font-family") {
                    return self.wrap("font", Some(font), &[]);
                }
                Mapping::Transparent
            }
            "a" => self.link(node, attributes.get("href"), attributes.get("target").is_some()),
            "img" => {
                let src = attributes.get("src").unwrap_or_default();
                let alt = attributes.get("alt").unwrap_or_default();
                if has_class("smiley") {
                    return Mapping::Replace(alt.to_owned());
                }

                let mut keys = vec![];
                for key in ["width", "height"] {
                    if let Some(value) = attributes.get(key) {
                        keys.push((key, value));
                    }
                }
                if !alt.is_empty() {
                    keys.push(("alt", alt));
                }
                match open_tag(self.table, "img", None, &keys).or_else(|| open_tag(self.table, "img", None, &[])) {
                    Some(open) if !src.is_empty() => Mapping::Replace(format!("{open}{src}[/img]")),
                    _ => Mapping::Replace(alt.to_owned()),
                }
            }
            "br" => Mapping::Replace("\n".to_owned()),
            "hr" => match self.table.lookup("hr") {
                Some(_) => Mapping::Replace("[hr]".to_owned()),
                None => Mapping::Replace("\n".to_owned()),
            },
            "code" if !node.ancestors().any(|x| element_name(&x) == Some("pre")) => {
                self.replace("icode", None, &[], &node.text_contents())
            }
            "pre" if has_class("bbc_pre") => self.wrap("pre", None, &[]),
            "pre" => {
                let language = self
                    .header_before(node, "codeheader")
                    .and_then(|x| x.strip_prefix("Code (")?.strip_suffix(')').map(str::to_owned));
                self.replace("code", language.as_deref(), &[], &node.text_contents())
            }
            "blockquote" => self.quote(node),
            "div" if has_class("spoilerbody") => Mapping::Transparent,
            "div" if has_class("codeheader") || has_class("quoteheader") || has_class("bbc_footnotes") => {
                Mapping::Skip
            }
            "div" | "p" => match style_property(style, "text-align") {
                Some(align @ ("left" | "center" | "right")) => {
                    let Mapping::Wrap(open, close) = self.wrap(align, None, &[]) else {
                        return Mapping::Wrap(String::new(), "\n".to_owned());
                    };
                    Mapping::Wrap(open, format!("{close}\n"))
                }
                _ if element.name.local.as_ref() == "p" => Mapping::Wrap(String::new(), "\n\n".to_owned()),
                _ => Mapping::Wrap(String::new(), "\n".to_owned()),
            },
            "center" => self.wrap("center", None, &[]),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => match self.wrap("b", None, &[]) {
                Mapping::Wrap(open, close) => Mapping::Wrap(open, format!("{close}\n")),
                other => other,
            },
            "ul" | "ol" => {
                let list_type = style_property(style, "list-style-type")
                    .map(str::to_owned)
                    .or_else(|| first_item_style(node))
                    .filter(|x| x != "disc")
                    .or_else(|| (element.name.local.as_ref() == "ol").then(|| "decimal".to_owned()));
                match list_type {
                    Some(list_type) => match open_tag(self.table, "list", None, &[("type", list_type.as_str())]) {
                        Some(open) => Mapping::Wrap(open, "[/list]".to_owned()),
                        None => self.wrap("list", None, &[]),
                    },
                    None => self.wrap("list", None, &[]),
                }
            }
            "li" => self.wrap("li", None, &[]),
            "table" => self.wrap("table", None, &[]),
            "tr" => self.wrap("tr", None, &[]),
            "td" => self.wrap("td", None, &[]),
            "th" => self.wrap("th", None, &[]),
            "details" => self.wrap("spoiler", None, &[]),
            "abbr" => match attributes.get("title") {
                Some(title) => self.wrap("abbr", Some(title), &[]),
                None => Mapping::Transparent,
            },
            _ => Mapping::Transparent,
        }
    }

    fn link(&self, node: &NodeRef, href: Option<&str>, new_window: bool) -> Mapping {
        let Some(href) = href else {
            return Mapping::Transparent;
        };
        let text = node.text_contents();

        if let Some(address) = href.strip_prefix("mailto:") {
            if text.trim() == address {
                return self.replace("email", None, &[], address);
            }
            return self.wrap("email", Some(address), &[]);
        }

        let tag = if new_window || self.table.lookup("iurl").is_none() {
            "url"
        } else {
            "iurl"
        };
        if text.trim() == href {
            return self.replace(tag, None, &[], href);
        }
        self.wrap(tag, Some(href), &[])
    }

    fn quote(&self, node: &NodeRef) -> Mapping {
        let header = self.header_element_before(node, "quoteheader");
        let author = header
            .as_ref()
            .and_then(|x| x.text_contents().trim().strip_prefix("Quote from:").map(|x| x.trim().to_owned()))
            .filter(|x| !x.is_empty());
        let date = header.as_ref().and_then(|x| {
            let span = x.select_first("span.quotedate").ok()?;
            let date = span.attributes.borrow().get("data-timestamp")?.to_owned();
            Some(date)
        });

        let mut keys = vec![];
        if let Some(author) = &author {
            keys.push(("author", author.as_str()));
        }
        if let Some(date) = &date {
            keys.push(("date", date.as_str()));
        }

        match open_tag(self.table, "quote", None, &keys) {
            Some(open) => Mapping::Wrap(open, "[/quote]\n".to_owned()),
            None => self.wrap("quote", None, &[]),
        }
    }

    /// The footnote body a reference points at, converted in place of the reference.
    fn footnote(&self, reference: &NodeRef) -> Mapping {
        let target_id = reference
            .select_first("a")
            .ok()
            .and_then(|a| {
                let attributes = a.attributes.borrow();
                let href = attributes.get("href")?.strip_prefix('#')?.to_owned();
                Some(href)
            });
        let Some(target_id) = target_id else {
            return Mapping::Skip;
        };

        let Ok(targets) = self.document.select("div.target") else {
            return Mapping::Skip;
        };
        let Some(target) = targets
            .into_iter()
            .find(|x| x.attributes.borrow().get("id") == Some(target_id.as_str()))
        else {
            return Mapping::Skip;
        };

        // The number and the back link belong to the footnote block, not the body.
        let body: Vec<NodeRef> = target
            .as_node()
            .children()
            .filter(|x| {
                let Some(el) = x.as_element() else {
                    return true;
                };
                let is_back_link = el
                    .attributes
                    .borrow()
                    .get("href")
                    .map_or(false, |x| x.starts_with("#ref"));
                &*el.name.local != "sup" && !is_back_link
            })
            .collect();

        let text = self.walk(body);
        let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}');
        self.replace("footnote", None, &[], text)
    }

    fn header_element_before(&self, node: &NodeRef, class: &str) -> Option<NodeRef> {
        let mut sibling = node.previous_sibling();
        while let Some(current) = sibling {
            if let Some(element) = current.as_element() {
                let matches = element
                    .attributes
                    .borrow()
                    .get("class")
                    .map_or(false, |x| x.split_whitespace().any(|x| x == class));
                return matches.then_some(current);
            }
            if !current.text_contents().trim().is_empty() {
                return None;
            }
            sibling = current.previous_sibling();
        }
        None
    }

    fn header_before(&self, node: &NodeRef, class: &str) -> Option<String> {
        self.header_element_before(node, class)
            .map(|x| x.text_contents().trim().to_owned())
    }
}

fn element_name(node: &NodeRef) -> Option<&str> {
    node.as_element().map(|x| x.name.local.as_ref())
}

/// Value of one property in an inline `style` attribute.
fn style_property<'s>(style: &'s str, name: &str) -> Option<&'s str> {
    style.split(';').find_map(|decl| {
        let (key, value) = decl.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

/// The list style of the first `<li>`, used for lists produced from item codes.
fn first_item_style(list: &NodeRef) -> Option<String> {
    let item = list.children().find(|x| element_name(x) == Some("li"))?;
    let element = item.as_element()?;
    let attributes = element.attributes.borrow();
    style_property(attributes.get("style")?, "list-style-type").map(str::to_owned)
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() && c != '\u{a0}')
}

/// Elements whose text children are only layout whitespace.
fn is_structural(node: &NodeRef) -> bool {
    matches!(
        element_name(node),
        Some("ul" | "ol" | "table" | "thead" | "tbody" | "tfoot" | "tr" | "html" | "head")
    )
}

/// HTML whitespace rules: runs collapse to one space, and no space is written at the start of a line or after
/// another space.
fn collapse_whitespace(text: &str, before: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_space = before.is_empty() || before.ends_with(['\n', ' ']);
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            pending_space = true;
            continue;
        }
        if pending_space && !after_space {
            out.push(' ');
        }
        pending_space = false;
        after_space = false;
        out.push(c);
    }

    if pending_space && !after_space {
        out.push(' ');
    }
    out
}
