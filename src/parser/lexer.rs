use logos::Logos;

use super::error::{ParseError, ParseResult};
use super::span::Location;

/// Token types of the Java subset
#[derive(Logos, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Token {
    // Keywords
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("static")]
    Static,
    #[token("public")]
    Public,
    #[token("protected")]
    Protected,
    #[token("private")]
    Private,
    #[token("abstract")]
    Abstract,
    #[token("final")]
    Final,
    #[token("native")]
    Native,
    #[token("synchronized")]
    Synchronized,
    #[token("transient")]
    Transient,
    #[token("volatile")]
    Volatile,
    #[token("strictfp")]
    Strictfp,
    #[token("class")]
    Class,
    #[token("interface")]
    Interface,
    #[token("enum")]
    Enum,
    #[token("extends")]
    Extends,
    #[token("implements")]
    Implements,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("super")]
    Super,
    #[token("instanceof")]
    InstanceOf,
    #[token("void")]
    Void,
    #[token("boolean")]
    Boolean,
    #[token("byte")]
    Byte,
    #[token("short")]
    Short,
    #[token("int")]
    Int,
    #[token("long")]
    Long,
    #[token("char")]
    Char,
    #[token("float")]
    Float,
    #[token("double")]
    Double,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("assert")]
    Assert,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("throw")]
    Throw,
    #[token("throws")]
    Throws,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Operators
    #[token("=")]
    Assign,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    DivAssign,
    #[token("%=")]
    ModAssign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    PipePipe,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("->")]
    Arrow,

    // Separators
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("@")]
    At,
    #[token("...")]
    Ellipsis,

    // Literals
    #[token("\"", string_literal)]
    StringLiteral,
    #[regex(r"'([^'\\\n]|\\.)'")]
    CharLiteral,
    #[regex(r"0[xX][0-9a-fA-F]+")]
    HexInteger,
    #[regex(r"[0-9]+")]
    DecimalInteger,
    #[regex(r"[0-9]+[lL]")]
    LongLiteral,
    #[regex(r"[0-9]+\.[0-9]+")]
    FloatLiteral,

    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
    Identifier,

    // Comments and whitespace
    #[regex(r"//[^\n]*")]
    LineComment,
    #[token("/*", block_comment)]
    BlockComment,
    #[regex(r"[ \t\n\r\f]+", priority = 2)]
    Whitespace,
    #[token("\u{FEFF}")]
    Bom,
}

/// Consume the rest of a string literal after its opening quote.
///
/// Literals are scanned in a loop rather than by the generated automaton so
/// that very long literals cannot exhaust the stack.
fn string_literal(lex: &mut logos::Lexer<Token>) -> bool {
    let mut escaped = false;
    for (offset, ch) in lex.remainder().char_indices() {
        match ch {
            '\n' => return false,
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => {
                lex.bump(offset + 1);
                return true;
            }
            _ => {}
        }
    }
    false
}

fn block_comment(lex: &mut logos::Lexer<Token>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => false,
    }
}

impl Token {
    pub fn is_primitive_type(&self) -> bool {
        matches!(
            self,
            Token::Boolean
                | Token::Byte
                | Token::Short
                | Token::Int
                | Token::Long
                | Token::Char
                | Token::Float
                | Token::Double
                | Token::Void
        )
    }

    fn is_trivia(&self) -> bool {
        matches!(self, Token::Whitespace | Token::Bom | Token::LineComment | Token::BlockComment)
    }
}

/// Lexical token with location information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalToken {
    pub token: Token,
    pub lexeme: String,
    pub location: Location,
    /// Location just past the last character
    pub end: Location,
}

impl LexicalToken {
    pub fn is(&self, token_type: Token) -> bool {
        self.token == token_type
    }
}

/// Lexer wrapping the generated logos automaton with line/column tracking
pub struct Lexer<'a> {
    lexer: logos::Lexer<'a, Token>,
    position: Location,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { lexer: Token::lexer(source), position: Location::start() }
    }

    pub fn next_token(&mut self) -> Option<ParseResult<LexicalToken>> {
        let token = self.lexer.next()?;
        let lexeme = self.lexer.slice();
        let location = self.position;
        self.position.advance_str(lexeme);
        match token {
            Ok(token) => Some(Ok(LexicalToken { token, lexeme: lexeme.to_string(), location, end: self.position })),
            Err(()) => {
                let message = match lexeme.chars().next() {
                    _ if lexeme.starts_with("/*") => "unclosed comment".to_string(),
                    Some('"') => "unclosed string literal".to_string(),
                    Some('\'') => "unclosed character literal".to_string(),
                    Some(c) => format!("illegal character: '{}'", c.escape_default()),
                    None => "illegal character".to_string(),
                };
                Some(Err(ParseError::lexical_error(message, location)))
            }
        }
    }

    /// Tokenize the whole input, dropping whitespace and comments
    pub fn tokenize(mut self) -> ParseResult<Vec<LexicalToken>> {
        let mut tokens = Vec::new();
        while let Some(result) = self.next_token() {
            let token = result?;
            if !token.token.is_trivia() {
                tokens.push(token);
            }
        }
        Ok(tokens)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = ParseResult<LexicalToken>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        Lexer::new(source).tokenize().unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_lexer_keywords() {
        assert_eq!(
            kinds("public class Test extends Object implements Greeter"),
            vec![
                Token::Public,
                Token::Class,
                Token::Identifier,
                Token::Extends,
                Token::Identifier,
                Token::Implements,
                Token::Identifier
            ]
        );
    }

    #[test]
    fn test_lexer_literals_and_operators() {
        assert_eq!(
            kinds(r#"42 "he\"llo" true null a != b && !c"#),
            vec![
                Token::DecimalInteger,
                Token::StringLiteral,
                Token::True,
                Token::Null,
                Token::Identifier,
                Token::Ne,
                Token::Identifier,
                Token::AndAnd,
                Token::Bang,
                Token::Identifier
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped_and_lines_tracked() {
        let tokens = Lexer::new("// one\n/* two\n */ int x;").tokenize().unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].location.line, 3);
        assert_eq!(tokens[0].location.column, 5);
    }

    #[test]
    fn test_long_string_literal() {
        let source = format!("\"{}\\\"\" x", "a".repeat(200_000));
        let tokens = Lexer::new(&source).tokenize().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token, Token::StringLiteral);
        assert_eq!(tokens[0].lexeme.len(), 200_004);
        assert_eq!(tokens[1].location.column, 200_006);
    }

    #[test]
    fn test_unclosed_string_and_comment() {
        let err = Lexer::new("x = \"abc\n\";").tokenize().unwrap_err();
        assert_eq!(err.location().column, 5);
        assert!(err.to_string().contains("unclosed string literal"));

        let err = Lexer::new("int x; /* never closed").tokenize().unwrap_err();
        assert!(err.to_string().contains("unclosed comment"));
        assert_eq!(kinds("a /* b * / c */ d"), vec![Token::Identifier, Token::Identifier]);
    }

    #[test]
    fn test_illegal_character() {
        let err = Lexer::new("int #x;").tokenize().unwrap_err();
        assert_eq!(err.location().column, 5);
        assert!(err.to_string().contains("illegal character"));
    }
}
