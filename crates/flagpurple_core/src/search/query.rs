//! Search string tokenizer and recursive-descent parser.
//!
//! Grammar (implicit AND binds tighter than `or`):
//!
//! ```text
//! query   := or_expr?
//! or_expr := and_expr ("or" and_expr)*
//! and_expr:= unary+
//! unary   := "-" unary | "(" or_expr ")" | term
//! ```

use crate::model::card::FLAG_MAX;
use crate::model::note::NoteId;
use crate::search::{Glob, SearchError, SearchResult};

/// Parsed search tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchNode {
    And(Vec<SearchNode>),
    Or(Vec<SearchNode>),
    Not(Box<SearchNode>),
    Term(SearchTerm),
}

/// Leaf search predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerm {
    /// `note:<glob>` on the notetype name.
    Notetype(Glob),
    /// `card:<glob>` on the template name.
    Template(Glob),
    /// `card:<n>` on the 1-based template position (stored 0-based).
    TemplateOrdinal(u32),
    /// `nid:<id>[,<id>...]`.
    NoteIds(Vec<NoteId>),
    /// `tag:<glob>`, matching the tag itself or any `::` ancestor.
    Tag(Glob),
    /// `is:suspended`.
    Suspended,
    /// `flag:<n>`.
    Flag(u8),
    /// `<field>:<glob>` on one field's raw content.
    Field { name: String, value: Glob },
    /// Bare text; substring of any field.
    Text(Glob),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Negate,
    Or,
    Word(String),
}

/// Parses `text` into a search tree. An empty query matches everything.
pub fn parse_query(text: &str) -> SearchResult<SearchNode> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        query: text,
        tokens,
        pos: 0,
    };
    if parser.tokens.is_empty() {
        return Ok(SearchNode::And(Vec::new()));
    }
    let node = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(SearchError::invalid(text, "unbalanced `)`"));
    }
    Ok(node)
}

/// Escapes wildcard and quoting characters so `value` matches literally
/// inside a double-quoted term.
pub fn escape_search_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '"' | '*' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn tokenize(text: &str) -> SearchResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        match ch {
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '-' => {
                chars.next();
                match chars.peek() {
                    Some(next) if !next.is_whitespace() => tokens.push(Token::Negate),
                    _ => tokens.push(Token::Word("-".to_string())),
                }
            }
            _ => {
                let mut word = String::new();
                let mut quoted = false;
                while let Some(&current) = chars.peek() {
                    if current.is_whitespace() || current == '(' || current == ')' {
                        break;
                    }
                    chars.next();
                    if current == '"' {
                        quoted = true;
                        read_quoted(text, &mut chars, &mut word)?;
                    } else if current == '\\' {
                        word.push('\\');
                        if let Some(escaped) = chars.next() {
                            word.push(escaped);
                        }
                    } else {
                        word.push(current);
                    }
                }
                if !quoted && word.eq_ignore_ascii_case("or") {
                    tokens.push(Token::Or);
                } else if !quoted && word.eq_ignore_ascii_case("and") {
                    continue;
                } else {
                    tokens.push(Token::Word(word));
                }
            }
        }
    }

    Ok(tokens)
}

fn read_quoted(
    query: &str,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    word: &mut String,
) -> SearchResult<()> {
    while let Some(current) = chars.next() {
        match current {
            '"' => return Ok(()),
            '\\' => match chars.next() {
                Some('"') => word.push('"'),
                Some(escaped) => {
                    word.push('\\');
                    word.push(escaped);
                }
                None => word.push('\\'),
            },
            other => word.push(other),
        }
    }
    Err(SearchError::invalid(query, "unterminated quote"))
}

struct Parser<'a> {
    query: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_or(&mut self) -> SearchResult<SearchNode> {
        let mut branches = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            branches.push(self.parse_and()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            SearchNode::Or(branches)
        })
    }

    fn parse_and(&mut self) -> SearchResult<SearchNode> {
        let mut parts = Vec::new();
        while let Some(token) = self.peek() {
            if matches!(token, Token::Close | Token::Or) {
                break;
            }
            parts.push(self.parse_unary()?);
        }
        match parts.len() {
            0 => Err(SearchError::invalid(self.query, "expected a search term")),
            1 => Ok(parts.remove(0)),
            _ => Ok(SearchNode::And(parts)),
        }
    }

    fn parse_unary(&mut self) -> SearchResult<SearchNode> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| SearchError::invalid(self.query, "unexpected end of search"))?;
        self.pos += 1;
        match token {
            Token::Negate => Ok(SearchNode::Not(Box::new(self.parse_unary()?))),
            Token::Open => {
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(SearchError::invalid(self.query, "missing `)`"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Token::Word(word) => Ok(SearchNode::Term(parse_term(self.query, &word)?)),
            Token::Close | Token::Or => {
                Err(SearchError::invalid(self.query, "expected a search term"))
            }
        }
    }
}

fn parse_term(query: &str, word: &str) -> SearchResult<SearchTerm> {
    let Some((key, value)) = split_unescaped_colon(word) else {
        return Ok(SearchTerm::Text(Glob::parse(&format!("*{word}*"), query)?));
    };

    match key.to_lowercase().as_str() {
        "note" => Ok(SearchTerm::Notetype(Glob::parse(value, query)?)),
        "card" => match value.parse::<u32>() {
            Ok(position) if position > 0 => Ok(SearchTerm::TemplateOrdinal(position - 1)),
            Ok(_) => Err(SearchError::invalid(query, "card positions start at 1")),
            Err(_) => Ok(SearchTerm::Template(Glob::parse(value, query)?)),
        },
        "nid" => {
            let ids = value
                .split(',')
                .map(|raw| {
                    raw.trim().parse::<NoteId>().map_err(|_| {
                        SearchError::invalid(query, format!("invalid note id `{raw}`"))
                    })
                })
                .collect::<SearchResult<Vec<_>>>()?;
            Ok(SearchTerm::NoteIds(ids))
        }
        "tag" => Ok(SearchTerm::Tag(Glob::parse(value, query)?)),
        "is" => match value.to_lowercase().as_str() {
            "suspended" => Ok(SearchTerm::Suspended),
            other => Err(SearchError::invalid(
                query,
                format!("unsupported state `is:{other}`"),
            )),
        },
        "flag" => match value.parse::<u8>() {
            Ok(flag) if flag <= FLAG_MAX => Ok(SearchTerm::Flag(flag)),
            _ => Err(SearchError::invalid(
                query,
                format!("flag must be 0..={FLAG_MAX}, got `{value}`"),
            )),
        },
        _ => Ok(SearchTerm::Field {
            name: unescape(key),
            value: Glob::parse(value, query)?,
        }),
    }
}

fn split_unescaped_colon(word: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (idx, ch) in word.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            ':' if !escaped && idx > 0 => return Some((&word[..idx], &word[idx + 1..])),
            _ => escaped = false,
        }
    }
    None
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out
}
