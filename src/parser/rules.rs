use crate::Token;

pub enum ParserRuleAction {
    /// Disable parsing within the rule's domain, de-tokenizing any parsed tokens back into their string form until the parser "releases".
    NoParse,
}

/// A rule pushed onto a [`BBParser`][crate::BBParser] that changes how the tokens after it are classified.
pub trait ParserRule {
    fn action(&self) -> ParserRuleAction;

    /// Whether `next` ends the rule's domain. The releasing token itself is classified normally.
    fn check_should_release(&self, next: &Token<'_>) -> bool;
}

pub mod builtin {
    use crate::{parser::BBTag, Token, TokenKind};

    use super::{ParserRule, ParserRuleAction};

    /// Treats everything up to the close tag of `tag_name` as text. Used for verbatim tags like `[code]`.
    pub struct NoParseRule {
        tag_name: &'static str,
    }

    impl NoParseRule {
        pub fn new(tag_name: &'static str) -> Self {
            Self { tag_name }
        }
    }

    impl ParserRule for NoParseRule {
        fn action(&self) -> ParserRuleAction {
            ParserRuleAction::NoParse
        }

        fn check_should_release(&self, next: &Token<'_>) -> bool {
            if let TokenKind::CloseBBTag(BBTag { tag, .. }) = next.kind {
                tag == self.tag_name
            } else {
                false
            }
        }
    }
}
