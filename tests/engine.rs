use std::{sync::Arc, thread};

use bbc_engine::{
    grammar::{ParameterKind, Validator},
    Engine, EngineConfig, PreparseOptions, RenderFlags, RenderOptions, SmileySet, TagDefinition,
};
use similar_asserts::assert_eq;

#[test]
fn store_then_render() {
    let engine = Engine::default();
    let stored = engine.normalize_for_storage(
        "[quote=Ann]Look: [url]example.com[/url]\r\n[*]first\r\n[*]second",
        &PreparseOptions::default(),
    );
    assert_eq!(
        stored,
        "[quote author=Ann]Look: [url]example.com[/url]\n[list][li]first[/li][li]second[/li][/list][/quote]"
    );

    let html = engine.render(&stored, &RenderOptions::message(1));
    assert!(html.starts_with("<div class=\"quoteheader\">Quote from: Ann</div>"));
    assert!(html.contains("<a href=\"http://example.com\" class=\"bbc_link\""));
    assert!(html.contains("<li>first</li><li>second</li>"));

    // Storing is idempotent.
    assert_eq!(engine.normalize_for_storage(&stored, &PreparseOptions::default()), stored);
}

#[test]
fn hostile_input_is_escaped() {
    let engine = Engine::default();
    let options = RenderOptions::default().with_flags(RenderFlags::empty());

    assert_eq!(
        engine.render("<script>alert(1)</script>", &options),
        "&lt;script&gt;alert(1)&lt;/script&gt;"
    );
    assert_eq!(
        engine.render("[url=javascript:alert(1)]x[/url]", &options),
        "[url=javascript:alert(1)]x[/url]"
    );
    assert_eq!(
        engine.render("[color=red;background:url(x)]x[/color]", &options),
        "[color=red;background:url(x)]x[/color]"
    );
}

#[test]
fn signatures_and_previews() {
    let engine = Engine::default();
    let source = "[size=7]big[/size] [b]bold[/b]";

    let stored = engine.normalize_for_storage(source, &PreparseOptions::signature());
    assert_eq!(stored, "big [b]bold[/b]");

    let rendered = engine.render(source, &RenderOptions::signature(engine.config()));
    assert_eq!(rendered, "big <strong class=\"bbc_strong\">bold</strong>");

    let preview = engine.render("[footnote]x[/footnote]", &RenderOptions::preview(engine.config()));
    assert!(preview.contains("id=\"fn1_preview\""));
    assert!(engine.cache().is_empty());
}

#[test]
fn custom_engine() {
    const SHOUT: TagDefinition = TagDefinition::new("shout", "<span class=\"shout\">", "</span>");
    const TIP: TagDefinition = TagDefinition::new("tip", "<span title=\"{value}\">", "</span>")
        .with_parameters(ParameterKind::RequiredValidated(Validator::Literal));

    let mut smileys = SmileySet::new("/img");
    smileys.add(":party:", "party.png", "Party");

    let engine = Engine::builder()
        .register_tag(SHOUT)
        .and_then(|x| x.register_tag(TIP))
        .expect("new tags")
        .smileys(smileys)
        .config(EngineConfig {
            signature_disallowed: vec!["shout".to_owned()],
            ..Default::default()
        })
        .build();

    assert_eq!(
        engine.render("[shout]hi :party:[/shout]", &RenderOptions::default()),
        "<span class=\"shout\">hi <img src=\"/img/party.png\" alt=\":party:\" title=\"Party\" class=\"smiley\" /></span>"
    );
    assert_eq!(
        engine.render("[tip=a \"b\"]x[/tip]", &RenderOptions::default()),
        "<span title=\"a &quot;b&quot;\">x</span>"
    );
    assert_eq!(engine.render(":)", &RenderOptions::default()), ":)");
    assert_eq!(
        engine.normalize_for_storage("[shout]x[/shout]", &PreparseOptions::signature()),
        "x"
    );
}

#[test]
fn cache_follows_edits() {
    let engine = Engine::default();
    let options = RenderOptions::message(42);

    let first = engine.render_shared("[i]v1[/i]", &options);
    let again = engine.render_shared("[i]v1[/i]", &options);
    assert!(Arc::ptr_eq(&first, &again));

    engine.invalidate(42);
    assert_eq!(&*engine.render_shared("[i]v2[/i]", &options), "<em>v2</em>");
}

#[test]
fn shared_between_threads() {
    let engine = Arc::new(Engine::default());

    let handles: Vec<_> = (0..4u64)
        .map(|id| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.render(&format!("[b]{id}[/b]"), &RenderOptions::message(id)))
        })
        .collect();

    for (id, handle) in handles.into_iter().enumerate() {
        let html = handle.join().expect("render thread");
        assert_eq!(html, format!("<strong class=\"bbc_strong\">{id}</strong>"));
    }
    assert_eq!(engine.cache().len(), 4);
}

#[test]
fn markdown_round_trip() {
    let engine = Engine::default();
    let markdown = "**bold** and [a link](http://example.com)\n\n- one\n- two";

    let bbcode = engine.markdown_to_bbcode(markdown);
    assert_eq!(
        bbcode,
        "[b]bold[/b] and [url=http://example.com]a link[/url]\n\n[list][li]one[/li][li]two[/li][/list]"
    );
    assert_eq!(engine.bbcode_to_markdown(&bbcode), markdown);
}

#[cfg(feature = "html_import")]
#[test]
fn html_import() {
    let engine = Engine::default();
    let source = "[b]bold[/b] [url=http://example.com]site[/url]";
    let html = engine.render(source, &RenderOptions::default());
    assert_eq!(engine.html_to_bbcode(&html), source);
}

#[test]
fn deeply_nested_quotes() {
    let engine = Engine::default();
    let depth = 50_000;
    let source = format!("{}x", "[quote]".repeat(depth));

    let stored = engine.normalize_for_storage(&source, &PreparseOptions::default());
    assert_eq!(stored.len(), source.len() + depth * "[/quote]".len());

    let html = engine.render(&stored, &RenderOptions::default());
    assert_eq!(html.matches("<blockquote").count(), depth);

    let markdown = engine.bbcode_to_markdown(&stored);
    assert!(markdown.ends_with("> > x"));
}
