use crate::{
    grammar::TagTable,
    parser::{ItemMarker, ParserFeature},
    BBParser, ParserConfig, Token, TokenKind,
};

const LOREM_IPSUM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. In lorem quam, fermentum id porttitor ac, iaculis eu arcu. Aliquam vulputate tempus felis consequat elementum. Cras auctor nunc a cursus lobortis. Fusce venenatis quam nec eleifend porta. Nulla velit diam, maximus sed lobortis imperdiet, hendrerit id elit.";

#[test]
pub fn just_text() {
    let table = TagTable::builtin();
    let mut parser = BBParser::new(LOREM_IPSUM, &table);
    let tok = parser.next().unwrap();
    assert!(tok.is_text());
    assert!(tok.args().is_none());
    assert_eq!(tok.span, LOREM_IPSUM);
    assert!(parser.next().is_none())
}

const SIMPLE: &str = "[b]This is a test![/b] and it's very cool.";

#[test]
pub fn simple_tags() {
    let table = TagTable::builtin();
    let mut parser = BBParser::new(SIMPLE, &table);
    let bold_tag = parser.next().unwrap();
    assert!(bold_tag.is_open("b"));
    assert!(!bold_tag.is_close("b"));
    assert!(!bold_tag.is_standalone("b"));
    assert_eq!(bold_tag.args(), Some(""));

    assert!(matches!(
        parser.next(),
        Some(Token {
            kind: TokenKind::Text,
            ..
        })
    ));

    assert!(matches!(
        parser.next(),
        Some(Token {
            kind: TokenKind::CloseBBTag(..),
            ..
        })
    ));

    let tail = parser.next().unwrap();
    assert!(tail.is_text());
    assert_eq!(tail.span, " and it's very cool.");

    assert!(parser.next().is_none());
}

#[test]
pub fn names_are_case_insensitive() {
    let table = TagTable::builtin();
    let mut parser = BBParser::new("[B]x[/B]", &table);
    let open = parser.next().unwrap();
    assert!(open.is_open("b"));
    assert_eq!(open.tag_name(), Some("b"));
    assert_eq!(open.span, "[B]");
    parser.next();
    assert!(parser.next().unwrap().is_close("b"));
}

const NO_TAG_BLEED: &str = "[b ]foo";

// Tags must capture their ending bracket even when whitespace precedes it.
#[test]
pub fn no_tag_bleed() {
    let table = TagTable::builtin();
    let mut parser = BBParser::new(NO_TAG_BLEED, &table);
    let bar = parser.next().unwrap();
    assert!(bar.span.contains(']'));
    let text = parser.next().unwrap();
    assert!(!text.span.contains(']'))
}

const TAG_KINDS: &str = "[b][color=red][quote author=x date=1][/b][/color ][hr][hr/][br]";

#[test]
pub fn tag_kinds() {
    let table = TagTable::builtin();
    let mut parser = BBParser::new(TAG_KINDS, &table);

    // [b]
    let tag = parser.next().unwrap();
    assert!(tag.is_open("b"));
    // [color=red]
    let tag = parser.next().unwrap();
    assert!(tag.is_open("color"));
    assert_eq!(tag.args(), Some("=red"));
    // [quote author=x date=1]
    let tag = parser.next().unwrap();
    assert!(tag.is_open("quote"));
    assert_eq!(tag.args(), Some(" author=x date=1"));
    // [/b]
    let tag = parser.next().unwrap();
    assert!(tag.is_close("b"));
    // [/color ]
    let tag = parser.next().unwrap();
    assert!(tag.is_close("color"));
    assert_eq!(tag.span, "[/color ]");
    // [hr]
    let tag = parser.next().unwrap();
    assert!(tag.is_standalone("hr"));
    // [hr/]
    let tag = parser.next().unwrap();
    assert!(tag.is_standalone("hr"));
    assert_eq!(tag.span, "[hr/]");
    // [br]
    let tag = parser.next().unwrap();
    assert!(tag.is_standalone("br"));

    assert!(parser.next().is_none());
}

#[test]
pub fn standalone_slash_can_be_disabled() {
    let table = TagTable::builtin();
    let config = ParserConfig {
        feature_flags: ParserFeature::ALL - ParserFeature::STANDALONE_SLASH,
    };
    let mut parser = BBParser::with_config("[hr/]", &table, config);
    assert!(parser.next().unwrap().is_text());
}

const UNCLOSED_TAG: &str = "[color=red ";

#[test]
pub fn unclosed_tag() {
    let table = TagTable::builtin();
    let mut parser = BBParser::new(UNCLOSED_TAG, &table);

    assert!(parser.next().unwrap().is_text());
    assert!(parser.next().is_none());
}

#[test]
pub fn unknown_tags_are_text() {
    let table = TagTable::builtin();
    let tokens: Vec<_> = BBParser::new("[bold]x[/bold]", &table).collect();
    assert!(tokens.iter().all(|t| t.is_text()));
    let joined: String = tokens.iter().map(|t| t.span).collect();
    assert_eq!(joined, "[bold]x[/bold]");
}

#[test]
pub fn quoted_value_may_contain_bracket() {
    let table = TagTable::builtin();
    let mut parser = BBParser::new("[abbr=\"a]b\"]x[/abbr]", &table);
    let tag = parser.next().unwrap();
    assert!(tag.is_open("abbr"));
    assert_eq!(tag.args(), Some("=\"a]b\""));
}

#[test]
pub fn unquoted_value_stops_at_bracket() {
    let table = TagTable::builtin();
    let mut parser = BBParser::new("[color=red[/b]x", &table);
    let text = parser.next().unwrap();
    assert!(text.is_text());
    assert_eq!(text.span, "[color=red");
    assert!(parser.next().unwrap().is_close("b"));

    let mut parser = BBParser::new("[quote author=a[b]]", &table);
    assert_eq!(parser.next().unwrap().span, "[quote author=a");
    assert!(parser.next().unwrap().is_open("b"));
}

#[test]
pub fn degenerate_key_value_runs_to_next_bracket() {
    let table = TagTable::builtin();
    let mut parser = BBParser::new("[quote author=]text[/quote]", &table);
    let tag = parser.next().unwrap();
    assert!(tag.is_open("quote"));
    assert_eq!(tag.span, "[quote author=]text");
    assert!(parser.next().unwrap().is_close("quote"));
    assert!(parser.next().is_none());
}

#[test]
pub fn noparse() {
    use crate::rules::builtin::NoParseRule;

    let table = TagTable::builtin();
    let mut parser = BBParser::new("[code][b]x[/b][/code][b]", &table);

    let mut kinds = vec![];
    while let Some(tk) = parser.next() {
        if tk.is_open("code") {
            parser.push_rule(NoParseRule::new("code"));
        }
        kinds.push((tk.span, tk.is_text()));
    }

    assert_eq!(
        kinds,
        vec![
            ("[code]", false),
            ("[b]", true),
            ("x", true),
            ("[/b]", true),
            ("[/code]", false),
            ("[b]", false),
        ]
    );
}

#[test]
pub fn item_codes() {
    let table = TagTable::builtin();
    let kinds: Vec<_> = BBParser::new("[*]one[#]two[x]three", &table).map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::ItemCode(ItemMarker::Disc),
            TokenKind::Text,
            TokenKind::ItemCode(ItemMarker::Decimal),
            TokenKind::Text,
            TokenKind::ItemCode(ItemMarker::Square),
            TokenKind::Text,
        ]
    );

    let config = ParserConfig {
        feature_flags: ParserFeature::empty(),
    };
    let mut parser = BBParser::with_config("[*]one", &table, config);
    assert!(parser.next().unwrap().is_text());
}

#[test]
pub fn find_close_skips_content() {
    let table = TagTable::builtin();
    let mut parser = BBParser::new("[img]http://x/a.png[/IMG ]rest", &table);
    assert!(parser.next().unwrap().is_open("img"));

    let (content, close) = parser.find_close("img").unwrap();
    assert_eq!(&parser.remaining()[..content], "http://x/a.png");
    assert_eq!(close, "[/IMG ]".len());

    parser.advance(content + close);
    assert_eq!(parser.remaining(), "rest");
    assert_eq!(parser.position(), "[img]http://x/a.png[/IMG ]".len());
}
