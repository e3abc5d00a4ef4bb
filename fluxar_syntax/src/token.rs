use std::{fmt::Display, rc::Rc};

/// A location in the source text. All fields are 0-based and are
/// rendered 1-based for diagnostics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line + 1, self.column + 1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub source: Rc<str>,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(source: Rc<str>, start: Position, end: Position) -> Self {
        Self { source, start, end }
    }

    /// Covers both spans, assuming `self` starts first
    pub fn to(&self, other: &Span) -> Self {
        Self {
            source: self.source.clone(),
            start: self.start,
            end: other.end,
        }
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "File {}, {}", self.source, self.start)
    }
}

/// The enum variants are in SCREAMING_SNAKE_CASE as they technically
/// represent constants, but Rust does not allow const enum variants.
#[allow(nonstandard_style)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenKind {
    // Symbols
    LPAREN,
    RPAREN,
    LBRACKET,
    RBRACKET,
    COMMA,
    ARROW,
    // Arithmetic
    MINUS,
    PLUS,
    SLASH,
    STAR,
    MODULO,
    CARET,
    // Comparisons
    BANG_EQUAL,
    EQUAL_EQUAL,
    GREATER,
    GREATER_EQUAL,
    LESS,
    LESS_EQUAL,
    // Literals
    IDENT,
    STRING,
    NUMBER,
    // Keywords
    AND,
    BREAK,
    CONTINUE,
    DO,
    ELIF,
    ELSE,
    END,
    FOR,
    FUNC,
    IF,
    IN,
    NOT,
    OR,
    RETURN,
    THEN,
    WHILE,
    // Miscellaneous tokens
    EQUAL,
    NEWLINE,
    EOF,
}

impl TokenKind {
    pub fn from_char(c: char) -> Option<Self> {
        let token = match c {
            '(' => Self::LPAREN,
            ')' => Self::RPAREN,
            '[' => Self::LBRACKET,
            ']' => Self::RBRACKET,
            ',' => Self::COMMA,
            '+' => Self::PLUS,
            '*' => Self::STAR,
            '/' => Self::SLASH,
            '%' => Self::MODULO,
            '^' => Self::CARET,
            ';' | '\n' => Self::NEWLINE,
            _ => return None,
        };
        Some(token)
    }

    pub fn from_keyword(kw: &str) -> Option<Self> {
        let token = match kw {
            "and" => Self::AND,
            "break" => Self::BREAK,
            "continue" => Self::CONTINUE,
            "do" => Self::DO,
            "elif" => Self::ELIF,
            "else" => Self::ELSE,
            "end" => Self::END,
            "for" => Self::FOR,
            "func" => Self::FUNC,
            "if" => Self::IF,
            "in" => Self::IN,
            "not" => Self::NOT,
            "or" => Self::OR,
            "return" => Self::RETURN,
            "then" => Self::THEN,
            "while" => Self::WHILE,
            _ => return None,
        };
        Some(token)
    }

    /// Human readable name used in "Expected ..." diagnostics
    pub fn describe(self) -> &'static str {
        match self {
            Self::LPAREN => "'('",
            Self::RPAREN => "')'",
            Self::LBRACKET => "'['",
            Self::RBRACKET => "']'",
            Self::COMMA => "','",
            Self::ARROW => "'->'",
            Self::MINUS => "'-'",
            Self::PLUS => "'+'",
            Self::SLASH => "'/'",
            Self::STAR => "'*'",
            Self::MODULO => "'%'",
            Self::CARET => "'^'",
            Self::BANG_EQUAL => "'!='",
            Self::EQUAL_EQUAL => "'=='",
            Self::GREATER => "'>'",
            Self::GREATER_EQUAL => "'>='",
            Self::LESS => "'<'",
            Self::LESS_EQUAL => "'<='",
            Self::IDENT => "identifier",
            Self::STRING => "string",
            Self::NUMBER => "number",
            Self::AND => "'and'",
            Self::BREAK => "'break'",
            Self::CONTINUE => "'continue'",
            Self::DO => "'do'",
            Self::ELIF => "'elif'",
            Self::ELSE => "'else'",
            Self::END => "'end'",
            Self::FOR => "'for'",
            Self::FUNC => "'func'",
            Self::IF => "'if'",
            Self::IN => "'in'",
            Self::NOT => "'not'",
            Self::OR => "'or'",
            Self::RETURN => "'return'",
            Self::THEN => "'then'",
            Self::WHILE => "'while'",
            Self::EQUAL => "'='",
            Self::NEWLINE => "newline or ';'",
            Self::EOF => "end of file",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub span: Span,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::NEWLINE => f.write_str("newline"),
            TokenKind::EOF => f.write_str("end of file"),
            _ => write!(f, "'{}'", self.lexeme),
        }
    }
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, literal: Option<Literal>, span: Span) -> Self {
        Self {
            kind,
            lexeme,
            literal,
            span,
        }
    }
}
