use super::{builtins, template, KeySpec, ParameterKind, Params, TagDefinition, TagTable, Validator};
use crate::error::GrammarError;

#[test]
pub fn builtin_table() {
    let table = TagTable::builtin();
    assert_eq!(table.len(), builtins::all_builtin_tags().len());

    let names = table.all_names();
    for name in ["b", "quote", "code", "list", "li", "img", "url", "footnote"] {
        assert!(names.contains(name), "missing {name}");
    }
    assert!(!names.contains("*"));
    assert!(!names.contains("*list"));

    assert_eq!(table.lookup("B").map(|x| x.name), Some("b"));
    assert!(table.lookup("bold").is_none());
}

#[test]
pub fn duplicate_registration_is_rejected() {
    let mut table = TagTable::builtin();
    let shadow = TagDefinition::new("b", "<b>", "</b>");

    assert_eq!(table.register(shadow), Err(GrammarError::DuplicateTag("b".to_owned())));
    // The first registration still wins.
    assert_eq!(table.lookup("b").map(|x| x.before), Some(builtins::BOLD.before));
}

#[test]
pub fn invalid_names_are_rejected() {
    let mut table = TagTable::empty();
    for name in ["", "Bold", "with space", "*", "averyveryverylongname"] {
        let def = TagDefinition::new(name, "", "");
        assert_eq!(table.register(def), Err(GrammarError::InvalidName(name.to_owned())));
    }
    assert!(table.is_empty());
}

#[test]
pub fn register_all_stops_at_first_failure() {
    let mut table = TagTable::empty();
    let result = table.register_all([
        TagDefinition::new("mark", "<mark>", "</mark>"),
        TagDefinition::new("mark", "<mark>", "</mark>"),
        TagDefinition::new("kbd", "<kbd>", "</kbd>"),
    ]);
    assert!(matches!(result, Err(GrammarError::DuplicateTag(_))));
    assert_eq!(table.len(), 1);
}

#[test]
pub fn color_values() {
    let v = Validator::Color;
    assert_eq!(v.check("#FF0000").as_deref(), Some("#FF0000"));
    assert_eq!(v.check("#abc").as_deref(), Some("#abc"));
    assert_eq!(v.check("Red").as_deref(), Some("red"));
    assert_eq!(v.check("rgb(1,2 ,3)").as_deref(), Some("rgb(1, 2, 3)"));
    assert!(v.check("rgb(256,0,0)").is_none());
    assert!(v.check("#GGG").is_none());
    assert!(v.check("red;background:url(x)").is_none());
}

#[test]
pub fn size_values() {
    let v = Validator::Size;
    assert_eq!(v.check("3").as_deref(), Some("3"));
    assert_eq!(v.render_value("3"), "1.35em");
    assert_eq!(v.check("12pt").as_deref(), Some("12pt"));
    assert_eq!(v.check("X-Large").as_deref(), Some("x-large"));
    assert!(v.check("8").is_none());
    assert!(v.check("100px").is_none());
    assert!(v.check("73pt").is_none());
    assert_eq!(super::validate::size_from_css("1.35em").as_deref(), Some("3"));
}

#[test]
pub fn font_values() {
    let v = Validator::FontFamily;
    assert_eq!(v.check("\"Comic Sans MS\", serif").as_deref(), Some("Comic Sans MS"));
    assert_eq!(v.check("Arial").as_deref(), Some("Arial"));
    assert!(v.check("Arial;color:red").is_none());
}

#[test]
pub fn url_values() {
    let v = Validator::Url;
    assert_eq!(v.check("www.example.com").as_deref(), Some("http://www.example.com"));
    assert_eq!(v.check("//example.com/x").as_deref(), Some("http://example.com/x"));
    assert_eq!(v.check("https://example.com/?a=1&b=2").as_deref(), Some("https://example.com/?a=1&b=2"));
    assert_eq!(v.check("/index.php").as_deref(), Some("/index.php"));
    assert_eq!(v.check("example.com:8080/x").as_deref(), Some("http://example.com:8080/x"));
    assert!(v.check("javascript:alert(1)").is_none());
    assert!(v.check("JaVaScRiPt:alert(1)").is_none());
    assert!(v.check("data:text/html,x").is_none());
    assert!(v.check("http://a b").is_none());
    assert!(v.check("http://x\"onmouseover=").is_none());
}

#[test]
pub fn misc_values() {
    assert_eq!(Validator::Email.check("mailto:a@b.org").as_deref(), Some("a@b.org"));
    assert!(Validator::Email.check("a@b").is_none());
    assert_eq!(Validator::ListType.check("Decimal").as_deref(), Some("decimal"));
    assert!(Validator::ListType.check("fancy").is_none());
    assert!(Validator::Dimension.check("0").is_none());
    assert!(Validator::Dimension.check("10000").is_none());
    assert_eq!(Validator::AnchorName.check("#top").as_deref(), Some("top"));

    let long = "x".repeat(81);
    assert!(Validator::QuoteAuthor.check(&long).is_none());
    assert!(Validator::QuoteAuthor.check(&long[..80]).is_some());
}

#[test]
pub fn parse_params() {
    let table = TagTable::builtin();
    let lookup = |name: &str| *table.lookup(name).unwrap();

    assert_eq!(lookup("b").parse_params(""), Some(Params::default()));
    assert_eq!(lookup("b").parse_params("=x"), None);
    assert_eq!(lookup("color").parse_params("=\"red\""), Some(Params::with_value("red".to_owned())));
    assert_eq!(lookup("color").parse_params(""), None);
    assert_eq!(lookup("code").parse_params(""), Some(Params::default()));
    assert_eq!(lookup("code").parse_params("=rust"), Some(Params::with_value("rust".to_owned())));

    let quote = lookup("quote");
    let params = quote.parse_params(" author=Some One date=1234").unwrap();
    assert_eq!(params.get("author"), Some("Some One"));
    assert_eq!(params.get("date"), Some("1234"));

    let params = quote.parse_params("=\"Some One\"").unwrap();
    assert_eq!(params.get("author"), Some("Some One"));

    assert_eq!(quote.parse_params(" author=a author=b"), None);
    assert_eq!(quote.parse_params(" link=x"), None);
    assert_eq!(quote.parse_params(" date=yesterday"), None);
}

#[test]
pub fn captured_content() {
    let url = builtins::URL;
    assert_eq!(url.captures_content(&Params::default()), Some(Validator::Url));
    assert_eq!(url.captures_content(&Params::with_value("http://x".to_owned())), None);
    assert!(url.shows_captured());

    let img = builtins::IMAGE;
    assert_eq!(img.captures_content(&Params::default()), Some(Validator::Url));
    assert!(!img.shows_captured());

    const VIDEO_KEYS: &[KeySpec] = &[KeySpec::new("width", Validator::Dimension)];
    let custom = TagDefinition::new("video", "", "").with_parameters(ParameterKind::KeyValueList(VIDEO_KEYS));
    assert_eq!(custom.keys().len(), 1);
    assert_eq!(custom.value_validator(), None);
}

#[test]
pub fn templates() {
    let vars = |name: &str| match name {
        "value" => Some("a\"b".to_owned()),
        "author" => Some("Tom & Jerry".to_owned()),
        _ => None,
    };

    let mut out = String::new();
    template::expand("<x v=\"{value}\">{author?By $|Anon}{date? on $}", vars, &mut out);
    assert_eq!(out, "<x v=\"a&quot;b\">By Tom &amp; Jerry");

    out.clear();
    template::expand("{missing}{missing?yes|no}", vars, &mut out);
    assert_eq!(out, "no");
}
