//! Reader for the parenthesized CIL surface syntax.
//!
//! Produces a generic [`ParseNode`] tree: atoms (bare symbols or double-quoted
//! strings) and lists, each with its source [`Location`]. Comments run from `;`
//! to the end of the line.

use crate::errors::ParseError;
use crate::nodes::Location;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseNode {
    Atom {
        value: String,
        quoted: bool,
        location: Location,
    },
    List {
        items: Vec<ParseNode>,
        location: Location,
    },
}

impl ParseNode {
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            ParseNode::Atom { location, .. } | ParseNode::List { location, .. } => location,
        }
    }

    #[must_use]
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            ParseNode::Atom { value, .. } => Some(value),
            ParseNode::List { .. } => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[ParseNode]> {
        match self {
            ParseNode::List { items, .. } => Some(items),
            ParseNode::Atom { .. } => None,
        }
    }

    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, ParseNode::List { .. })
    }
}

#[derive(Clone, Copy)]
struct Position {
    offset: u32,
    line: u32,
    column: u32,
}

struct Reader<'a> {
    source_name: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    position: Position,
}

impl<'a> Reader<'a> {
    fn new(source_name: &'a str, text: &'a str) -> Self {
        Self {
            source_name,
            chars: text.char_indices().peekable(),
            position: Position {
                offset: 0,
                line: 1,
                column: 1,
            },
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (idx, c) = self.chars.next()?;
        self.position.offset = u32::try_from(idx + c.len_utf8()).unwrap_or(u32::MAX);
        if c == '\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn location(&self, start: Position) -> Location {
        Location::new(
            start.offset,
            self.position.offset,
            start.line,
            start.column,
            self.position.line,
            self.position.column,
            self.source_name.to_string(),
        )
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_all(&mut self) -> Result<Vec<ParseNode>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Ok(nodes),
                Some(')') => {
                    let start = self.position;
                    self.bump();
                    return Err(ParseError::UnexpectedCloseParen {
                        location: self.location(start),
                    });
                }
                Some(_) => nodes.push(self.read_node()?),
            }
        }
    }

    fn read_node(&mut self) -> Result<ParseNode, ParseError> {
        let start = self.position;
        match self.peek() {
            Some('(') => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_trivia();
                    match self.peek() {
                        None => {
                            return Err(ParseError::UnclosedParen {
                                location: self.location(start),
                            });
                        }
                        Some(')') => {
                            self.bump();
                            return Ok(ParseNode::List {
                                items,
                                location: self.location(start),
                            });
                        }
                        Some(_) => items.push(self.read_node()?),
                    }
                }
            }
            Some('"') => {
                self.bump();
                let mut value = String::new();
                loop {
                    match self.bump() {
                        None | Some('\n') => {
                            return Err(ParseError::UnterminatedString {
                                location: self.location(start),
                            });
                        }
                        Some('"') => break,
                        Some(c) => value.push(c),
                    }
                }
                Ok(ParseNode::Atom {
                    value,
                    quoted: true,
                    location: self.location(start),
                })
            }
            _ => {
                let mut value = String::new();
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == ';' || c == '"' {
                        break;
                    }
                    value.push(c);
                    self.bump();
                }
                Ok(ParseNode::Atom {
                    value,
                    quoted: false,
                    location: self.location(start),
                })
            }
        }
    }
}

/// Reads every top-level form of `text`.
///
/// # Errors
///
/// Returns a [`ParseError`] on unbalanced parentheses or an unterminated string.
pub fn parse_source(source_name: &str, text: &str) -> Result<Vec<ParseNode>, ParseError> {
    Reader::new(source_name, text).read_all()
}
