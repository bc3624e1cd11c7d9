//! PERMAS ASCII keyword deck parser and emitter.
//!
//! A deck is a sequence of `$KEYWORD` blocks. Header parameters are either
//! `KEY = VALUE` pairs or bare flags; data rows follow until the next `$`
//! line. A row starting with `&` continues the previous row and `!` starts a
//! comment.
//!
//! `parse_lenient` keeps going past a bad header: the block is dropped along
//! with its rows up to the next `$` line and the error is kept in
//! `Deck::skipped`. The strict entry points fail on the first such error.

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

mod writer;

pub use writer::{KeywordWriter, scientific};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deck {
    pub blocks: Vec<Block>,
    /// Headers (or stray rows) that could not be parsed, in line order.
    pub skipped: Vec<ParseError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub keyword: String,
    pub parameters: Vec<Parameter>,
    pub rows: Vec<Row>,
    pub line_start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: usize,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

impl Block {
    /// Value of a `KEY = VALUE` parameter, key compared case-insensitively.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key.eq_ignore_ascii_case(key))
            .and_then(|p| p.value.as_deref())
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.parameters
            .iter()
            .any(|p| p.value.is_none() && p.key.eq_ignore_ascii_case(key))
    }

    pub fn name(&self) -> Option<&str> {
        self.param("NAME")
    }

    /// True for `$SURFACE ELEMENTS`-style keywords whose second word is a flag.
    pub fn is(&self, keyword: &str, qualifier: Option<&str>) -> bool {
        self.keyword == keyword && qualifier.is_none_or(|q| self.has_flag(q))
    }
}

impl Row {
    pub fn first(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// Value following `KEY =` inside the row.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.tokens
            .windows(3)
            .find(|w| w[0].eq_ignore_ascii_case(key) && w[1] == "=")
            .map(|w| w[2].as_str())
    }
}

impl Deck {
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ParseError {
            line: 0,
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::parse_str(&raw)
    }

    pub fn parse_str(raw: &str) -> Result<Self, ParseError> {
        Self::parse_lines(raw.lines())
    }

    pub fn parse_lines<I, S>(lines: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut deck = Self::parse_lenient(lines);
        if deck.skipped.is_empty() {
            Ok(deck)
        } else {
            Err(deck.skipped.swap_remove(0))
        }
    }

    pub fn parse_lenient<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut deck = Deck::default();
        // Set while rows belong to a dropped block.
        let mut skipping = false;

        for (idx, raw) in lines.into_iter().enumerate() {
            let line = idx + 1;
            let content = strip_comment(raw.as_ref()).trim();
            if content.is_empty() {
                continue;
            }

            if let Some(header) = content.strip_prefix('$') {
                match parse_header(header, line) {
                    Ok((keyword, parameters)) => {
                        deck.blocks.push(Block {
                            keyword,
                            parameters,
                            rows: Vec::new(),
                            line_start: line,
                        });
                        skipping = false;
                    }
                    Err(err) => {
                        deck.skipped.push(err);
                        skipping = true;
                    }
                }
                continue;
            }
            if skipping {
                continue;
            }

            let Some(block) = deck.blocks.last_mut() else {
                deck.skipped.push(ParseError {
                    line,
                    message: "expected block starting with '$'".to_string(),
                });
                skipping = true;
                continue;
            };

            if let Some(rest) = content.strip_prefix('&') {
                let tokens = tokenize(rest);
                match block.rows.last_mut() {
                    Some(row) => row.tokens.extend(tokens),
                    // Continuation of the header itself.
                    None => match parse_parameters(&tokens, line) {
                        Ok(parameters) => block.parameters.extend(parameters),
                        Err(err) => {
                            deck.blocks.pop();
                            deck.skipped.push(err);
                            skipping = true;
                        }
                    },
                }
                continue;
            }

            block.rows.push(Row {
                line,
                tokens: tokenize(content),
            });
        }

        deck
    }

    pub fn blocks_named<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.keyword == keyword)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('!') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.replace('=', " = ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn parse_header(header: &str, line: usize) -> Result<(String, Vec<Parameter>), ParseError> {
    let tokens = tokenize(header);
    let Some(keyword) = tokens.first() else {
        return Err(ParseError {
            line,
            message: "empty block keyword".to_string(),
        });
    };
    if keyword == "=" {
        return Err(ParseError {
            line,
            message: "block keyword missing before '='".to_string(),
        });
    }
    let parameters = parse_parameters(&tokens[1..], line)?;
    Ok((keyword.to_ascii_uppercase(), parameters))
}

fn parse_parameters(tokens: &[String], line: usize) -> Result<Vec<Parameter>, ParseError> {
    let mut parameters = Vec::new();
    let mut i = 0usize;
    while i < tokens.len() {
        let token = &tokens[i];
        if token == "=" {
            return Err(ParseError {
                line,
                message: "'=' without parameter name".to_string(),
            });
        }
        if tokens.get(i + 1).is_some_and(|t| t == "=") {
            let value = tokens.get(i + 2).filter(|v| *v != "=").ok_or_else(|| ParseError {
                line,
                message: format!("parameter {token} has no value"),
            })?;
            parameters.push(Parameter {
                key: token.to_ascii_uppercase(),
                value: Some(value.clone()),
            });
            i += 3;
        } else {
            parameters.push(Parameter {
                key: token.to_ascii_uppercase(),
                value: None,
            });
            i += 1;
        }
    }
    Ok(parameters)
}
