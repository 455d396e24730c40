use similar_asserts::assert_eq;

use crate::grammar::TagTable;

use super::{bbcode_to_markdown, markdown_to_bbcode, tidy};

fn to_markdown(source: &str) -> String {
    bbcode_to_markdown(source, &TagTable::builtin())
}

#[test]
fn tidy_collapses_blank_lines() {
    assert_eq!(tidy("\n\na  \n\n\n\nb\n\n"), "a\n\nb");
}

#[test]
fn markdown_inline() {
    assert_eq!(
        markdown_to_bbcode("**bold** and *it* and ~~gone~~"),
        "[b]bold[/b] and [i]it[/i] and [s]gone[/s]"
    );
    assert_eq!(markdown_to_bbcode("use `[b]` here"), "use [icode][b][/icode] here");
    assert_eq!(markdown_to_bbcode("snake_case_name stays"), "snake_case_name stays");
    assert_eq!(
        markdown_to_bbcode("[site](http://example.com) and ![logo](http://example.com/a.png)"),
        "[url=http://example.com]site[/url] and [img alt=logo]http://example.com/a.png[/img]"
    );
    assert_eq!(
        markdown_to_bbcode("<https://example.com> or <me@example.com>"),
        "[url]https://example.com[/url] or [email]me@example.com[/email]"
    );
    assert_eq!(
        markdown_to_bbcode("write [b] literally"),
        "[nobbc]write [b] literally[/nobbc]"
    );
}

#[test]
fn markdown_blocks() {
    assert_eq!(
        markdown_to_bbcode("```rust\nfn main() {}\n```"),
        "[code=rust]fn main() {}[/code]"
    );
    assert_eq!(
        markdown_to_bbcode("> quoted\n> more\n\nafter"),
        "[quote]quoted\nmore\n[/quote]\n\nafter"
    );
    assert_eq!(
        markdown_to_bbcode("# Title\n### Sub\n---"),
        "[size=x-large][b]Title[/b][/size]\n[b]Sub[/b]\n[hr]"
    );
}

#[test]
fn markdown_lists() {
    assert_eq!(
        markdown_to_bbcode("- a\n- b\n  - c\n- d"),
        "[list][li]a[/li][li]b[list][li]c[/li][/list][/li][li]d[/li][/list]"
    );
    assert_eq!(
        markdown_to_bbcode("1. one\n2. two"),
        "[list type=decimal][li]one[/li][li]two[/li][/list]"
    );
}

#[test]
fn markdown_tables() {
    assert_eq!(
        markdown_to_bbcode("| a | b |\n|---|---|\n| 1 | 2 |"),
        "[table][tr][th]a[/th][th]b[/th][/tr][tr][td]1[/td][td]2[/td][/tr][/table]"
    );
}

#[test]
fn bbcode_inline() {
    assert_eq!(
        to_markdown("[b]bold[/b] [i]it[/i] [s]x[/s] [icode]a[b]c[/icode]"),
        "**bold** *it* ~~x~~ `a[b]c`"
    );
    assert_eq!(
        to_markdown("[url=http://example.com]site[/url] [url]example.com[/url]"),
        "[site](http://example.com) <http://example.com>"
    );
    assert_eq!(to_markdown("[img alt=logo]http://e.com/a.png[/img]"), "![logo](http://e.com/a.png)");
    assert_eq!(to_markdown("text[footnote]note[/footnote]"), "text (note)");
    assert_eq!(to_markdown("[color=red]red[/color] [center]mid[/center]"), "red mid");
    assert_eq!(to_markdown("[color=nope]x[/color]"), "[color=nope]x[/color]");
}

#[test]
fn bbcode_blocks() {
    assert_eq!(
        to_markdown("[quote author=x]hello\nworld[/quote]after"),
        "> hello\n> world\n\nafter"
    );
    assert_eq!(
        to_markdown("[code=rust]let x = [b];[/code]"),
        "```rust\nlet x = [b];\n```"
    );
    assert_eq!(
        to_markdown("[list][li]a[/li][li]b[list][li]c[/li][/list][/li][/list]"),
        "- a\n- b\n  - c"
    );
    assert_eq!(
        to_markdown("[list type=decimal]\n[li]x[/li]\n[li]y[/li]\n[/list]"),
        "1. x\n2. y"
    );
    assert_eq!(to_markdown("[*]one\n[*]two"), "- one\n- two");
    assert_eq!(
        to_markdown("[table][tr][th]a[/th][th]b[/th][/tr][tr][td]1[/td][td]2[/td][/tr][/table]"),
        "| a | b |\n| --- | --- |\n| 1 | 2 |"
    );
}

#[test]
fn bbcode_nested_quotes() {
    assert_eq!(
        to_markdown("[quote]a[quote]b[/quote]c[/quote]"),
        "> a\n> > b\n>\n> c"
    );
    assert_eq!(
        to_markdown("[quote]\n  one\n\ntwo\n\n[/quote][quote]three[/quote]"),
        "> one\n>\n> two\n\n> three"
    );
    assert_eq!(
        to_markdown("[quote][code]x\ny[/code][list][li]z[/li][/list][/quote]"),
        "> ```\n> x\n> y\n> ```\n> - z"
    );
    assert_eq!(to_markdown("a[/quote]b[/b]"), "a[/quote]b[/b]");
}

#[test]
fn bbcode_deep_nesting() {
    let depth = 50_000;
    let markdown = to_markdown(&format!("{}x", "[quote]".repeat(depth)));
    assert_eq!(markdown.len(), depth * 2 + 1);
    assert!(markdown.starts_with("> > > "));
    assert!(markdown.ends_with("> x"));

    let markdown = to_markdown(&"[b]x".repeat(depth));
    assert!(markdown.starts_with("**x**x"));
    assert!(markdown.ends_with("x**"));
}

#[cfg(feature = "html_import")]
mod html {
    use similar_asserts::assert_eq;

    use crate::{
        grammar::TagTable,
        html::{HtmlSerializer, RenderFlags, RenderOptions, SmileySet},
    };

    use super::super::html_to_bbcode;

    fn from_html(html: &str) -> String {
        html_to_bbcode(html, &TagTable::builtin())
    }

    /// Render `source`, convert the HTML back and compare with `source`.
    fn assert_round_trip(source: &str) {
        let table = TagTable::builtin();
        let smileys = SmileySet::default_set("/smileys");
        let options = RenderOptions::message(5).with_flags(RenderFlags::empty());
        let html = HtmlSerializer::new(&table, &smileys).serialize(source, &options);
        assert_eq!(html_to_bbcode(&html, &table), source, "html: {html}");
    }

    #[test]
    fn renderer_output_round_trips() {
        assert_round_trip("[b]bold[/b] [i]it[/i] [u]u[/u] [s]s[/s] [sup]1[/sup] [sub]2[/sub] [tt]t[/tt]");
        assert_round_trip("[color=red]r[/color] [size=7]big[/size] [font=Arial]f[/font]");
        assert_round_trip("[quote author=Tom date=123]hi[/quote]");
        assert_round_trip("[code=rust]let a = 1;[/code]");
        assert_round_trip("[icode]x < y[/icode]");
        assert_round_trip("[list][li]a[/li][li]b[/li][/list]");
        assert_round_trip("[list type=square][li]a[/li][/list]");
        assert_round_trip("[url=http://example.com]site[/url]");
        assert_round_trip("[email]me@example.com[/email]");
        assert_round_trip("[img width=10]http://e.com/a.png[/img]");
        assert_round_trip("[table][tr][th]h[/th][/tr][tr][td]a[/td][td]b[/td][/tr][/table]");
        assert_round_trip("a[hr]b");
        assert_round_trip("[center]mid[/center]");
        assert_round_trip("text[footnote]note[/footnote]");
    }

    #[test]
    fn foreign_html() {
        assert_eq!(
            from_html("<p>Hello <b>world</b></p><script>alert(1)</script><h2>Title</h2><ol><li>x</li></ol>"),
            "Hello [b]world[/b]\n\n[b]Title[/b]\n[list type=decimal][li]x[/li][/list]"
        );
        assert_eq!(
            from_html("<a href=\"mailto:me@example.com\">me@example.com</a>"),
            "[email]me@example.com[/email]"
        );
        assert_eq!(from_html("line<br>next"), "line\nnext");
        assert_eq!(
            from_html("<img class=\"smiley\" src=\"/s/smiley.gif\" alt=\":)\"> <span style=\"color: #ff0000\">x</span>"),
            ":) [color=#ff0000]x[/color]"
        );
    }

    #[test]
    fn literal_brackets_are_protected() {
        assert_eq!(from_html("<p>type [b] for bold</p>"), "[nobbc]type [b] for bold[/nobbc]");
        assert_eq!(from_html("<p>[not a tag]</p>"), "[not a tag]");
    }

    #[test]
    fn whitespace_between_elements() {
        assert_eq!(from_html("<b>a</b> <i>b</i>"), "[b]a[/b] [i]b[/i]");
        assert_eq!(from_html("a  <b>b</b>\n c"), "a [b]b[/b] c");
        assert_eq!(
            from_html("<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>"),
            "[list][li]a[/li][li]b[/li][/list]"
        );
    }

    #[test]
    fn code_containing_its_close_tag() {
        assert_eq!(from_html("<pre>a [/code] b</pre>"), "[nobbc]a [/code] b[/nobbc]");
        assert_eq!(from_html("<code>[/ICODE]</code>"), "[nobbc][/ICODE][/nobbc]");
        assert_eq!(from_html("<pre>a [b] b</pre>"), "[code]a [b] b[/code]");
    }
}
