//! Template parser.
//!
//! Turns scanned segments into a [`Program`]: a tree of content, mustaches,
//! blocks and partials. Block nesting, `{{else}}` chaining and close-tag
//! matching are checked here.

use super::SyntaxError;
use super::lexer::{Segment, Tag, TagKind, Token};

/// A sequence of statements; the body of a template or of a block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub body: Vec<Statement>,
    /// Block parameter names declared by the owning block (`as |a b|`)
    pub block_params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Content(String),
    Mustache {
        call: Call,
        escaped: bool,
    },
    Block(Block),
    Partial(Partial),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub call: Call,
    pub program: Option<Program>,
    pub inverse: Option<Program>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partial {
    pub name: Expr,
    pub context: Option<Expr>,
    pub hash: Vec<(String, Expr)>,
    /// Body of a partial block (`{{#> name}}...{{/name}}`)
    pub fallback: Option<Program>,
}

/// A callee with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub path: Expr,
    pub params: Vec<Expr>,
    pub hash: Vec<(String, Expr)>,
    pub line: usize,
    pub column: usize,
}

impl Call {
    pub fn has_arguments(&self) -> bool {
        !self.params.is_empty() || !self.hash.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(PathExpr),
    Str(String),
    Num(String),
    Bool(bool),
    Null,
    Undefined,
    SubExpr(Box<Call>),
}

impl Expr {
    /// Source spelling used for close-tag matching and diagnostics.
    pub fn original(&self) -> String {
        match self {
            Expr::Path(path) => path.original.clone(),
            Expr::Str(s) => s.clone(),
            Expr::Num(n) => n.clone(),
            Expr::Bool(b) => b.to_string(),
            Expr::Null => "null".to_string(),
            Expr::Undefined => "undefined".to_string(),
            Expr::SubExpr(call) => format!("({})", call.path.original()),
        }
    }
}

/// A (possibly data, possibly scoped) lookup path such as `../user.name`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub data: bool,
    pub depth: usize,
    pub parts: Vec<String>,
    /// Written with `this.` / `./` or as `this` itself
    pub scoped: bool,
    pub original: String,
}

impl PathExpr {
    /// Only a bare single identifier can name a helper.
    pub fn is_helper_name(&self) -> bool {
        !self.data && !self.scoped && self.depth == 0 && self.parts.len() == 1
    }
}

/// How a run of statements ended.
enum Terminator {
    Eof,
    Close { name: String, line: usize, column: usize },
    Else { chain: Option<Call>, line: usize, column: usize },
}

pub(crate) fn parse(segments: Vec<Segment>) -> Result<Program, SyntaxError> {
    let mut parser = Parser {
        segments: segments.into_iter(),
    };
    let (program, terminator) = parser.parse_program()?;
    match terminator {
        Terminator::Eof => Ok(program),
        Terminator::Close {
            name,
            line,
            column,
        } => Err(SyntaxError::new(format!("Unexpected closing tag '{name}'"), line, column)),
        Terminator::Else {
            line,
            column,
            ..
        } => Err(SyntaxError::new("Unexpected {{else}} outside of a block", line, column)),
    }
}

struct Parser {
    segments: std::vec::IntoIter<Segment>,
}

impl Parser {
    fn parse_program(&mut self) -> Result<(Program, Terminator), SyntaxError> {
        let mut body = Vec::new();

        while let Some(segment) = self.segments.next() {
            let tag = match segment {
                Segment::Content(text) => {
                    body.push(Statement::Content(text));
                    continue;
                }
                Segment::Tag(tag) => tag,
            };

            match tag.kind {
                TagKind::Comment => {}
                TagKind::Escaped | TagKind::Unescaped => {
                    if tag.kind == TagKind::Escaped && is_else(&tag.tokens) {
                        let chain = if tag.tokens.len() > 1 {
                            Some(parse_call(&tag.tokens[1..], &tag)?)
                        } else {
                            None
                        };
                        return Ok((
                            Program {
                                body,
                                block_params: Vec::new(),
                            },
                            Terminator::Else {
                                chain,
                                line: tag.line,
                                column: tag.column,
                            },
                        ));
                    }
                    let call = parse_call(&tag.tokens, &tag)?;
                    body.push(Statement::Mustache {
                        call,
                        escaped: tag.kind == TagKind::Escaped,
                    });
                }
                TagKind::InverseOpen if tag.tokens.is_empty() => {
                    return Ok((
                        Program {
                            body,
                            block_params: Vec::new(),
                        },
                        Terminator::Else {
                            chain: None,
                            line: tag.line,
                            column: tag.column,
                        },
                    ));
                }
                TagKind::BlockOpen | TagKind::InverseOpen => {
                    let (tokens, block_params) = split_block_params(&tag)?;
                    let call = parse_call(tokens, &tag)?;
                    let close_name = call.path.original();
                    let (program, inverse) =
                        self.parse_block_body(&close_name, block_params, &tag)?;
                    let block = if tag.kind == TagKind::InverseOpen {
                        // `{{^x}}a{{else}}b{{/x}}` renders `a` when x is falsy
                        Block {
                            call,
                            program: inverse,
                            inverse: Some(program),
                        }
                    } else {
                        Block {
                            call,
                            program: Some(program),
                            inverse,
                        }
                    };
                    body.push(Statement::Block(block));
                }
                TagKind::Partial | TagKind::PartialBlockOpen => {
                    let mut partial = parse_partial(&tag)?;
                    if tag.kind == TagKind::PartialBlockOpen {
                        let close_name = partial.name.original();
                        let (program, inverse) =
                            self.parse_block_body(&close_name, Vec::new(), &tag)?;
                        if inverse.is_some() {
                            return Err(SyntaxError::new(
                                "Partial blocks cannot have an {{else}} section",
                                tag.line,
                                tag.column,
                            ));
                        }
                        partial.fallback = Some(program);
                    }
                    body.push(Statement::Partial(partial));
                }
                TagKind::Close => {
                    let name = parse_path_tokens(&tag.tokens, &tag)?.original();
                    return Ok((
                        Program {
                            body,
                            block_params: Vec::new(),
                        },
                        Terminator::Close {
                            name,
                            line: tag.line,
                            column: tag.column,
                        },
                    ));
                }
            }
        }

        Ok((
            Program {
                body,
                block_params: Vec::new(),
            },
            Terminator::Eof,
        ))
    }

    /// Parse everything up to the close tag of a block named `close_name`.
    ///
    /// `{{else other args}}` opens a chained block whose close tag is shared
    /// with the outer block.
    fn parse_block_body(
        &mut self,
        close_name: &str,
        block_params: Vec<String>,
        open: &Tag,
    ) -> Result<(Program, Option<Program>), SyntaxError> {
        let (mut program, terminator) = self.parse_program()?;
        program.block_params = block_params;

        match terminator {
            Terminator::Eof => Err(SyntaxError::new(
                format!("Unclosed block '{close_name}'"),
                open.line,
                open.column,
            )),
            Terminator::Close {
                name,
                line,
                column,
            } => {
                check_close(close_name, &name, line, column)?;
                Ok((program, None))
            }
            Terminator::Else {
                chain: None,
                ..
            } => {
                let (inverse, terminator) = self.parse_program()?;
                match terminator {
                    Terminator::Close {
                        name,
                        line,
                        column,
                    } => {
                        check_close(close_name, &name, line, column)?;
                        Ok((program, Some(inverse)))
                    }
                    Terminator::Else {
                        line,
                        column,
                        ..
                    } => Err(SyntaxError::new(
                        format!("Duplicate {{{{else}}}} in block '{close_name}'"),
                        line,
                        column,
                    )),
                    Terminator::Eof => Err(SyntaxError::new(
                        format!("Unclosed block '{close_name}'"),
                        open.line,
                        open.column,
                    )),
                }
            }
            Terminator::Else {
                chain: Some(call),
                line,
                column,
            } => {
                let chained_tag = Tag {
                    kind: TagKind::BlockOpen,
                    tokens: Vec::new(),
                    line,
                    column,
                };
                let (chained_program, chained_inverse) =
                    self.parse_block_body(close_name, Vec::new(), &chained_tag)?;
                let chained = Block {
                    call,
                    program: Some(chained_program),
                    inverse: chained_inverse,
                };
                Ok((
                    program,
                    Some(Program {
                        body: vec![Statement::Block(chained)],
                        block_params: Vec::new(),
                    }),
                ))
            }
        }
    }
}

fn check_close(open: &str, close: &str, line: usize, column: usize) -> Result<(), SyntaxError> {
    if open == close {
        Ok(())
    } else {
        Err(SyntaxError::new(format!("{open} doesn't match {close}"), line, column))
    }
}

fn is_else(tokens: &[Token]) -> bool {
    matches!(tokens.first(), Some(Token::Id(word)) if word == "else")
        && !matches!(tokens.get(1), Some(Token::Sep(_)) | Some(Token::Equals))
}

/// Split `as |a b|` off the end of a block's tokens.
fn split_block_params(tag: &Tag) -> Result<(&[Token], Vec<String>), SyntaxError> {
    let tokens = &tag.tokens;
    let as_index = tokens.iter().enumerate().position(|(i, token)| {
        matches!(token, Token::Id(word) if word == "as") && tokens.get(i + 1) == Some(&Token::Pipe)
    });
    let Some(as_index) = as_index else {
        return Ok((tokens, Vec::new()));
    };

    let mut names = Vec::new();
    let mut closed = false;
    for token in &tokens[as_index + 2..] {
        match token {
            Token::Id(name) if !closed => names.push(name.clone()),
            Token::Pipe if !closed => closed = true,
            _ => {
                return Err(SyntaxError::new("Malformed block parameters", tag.line, tag.column));
            }
        }
    }
    if !closed || names.is_empty() {
        return Err(SyntaxError::new("Malformed block parameters", tag.line, tag.column));
    }
    Ok((&tokens[..as_index], names))
}

fn parse_partial(tag: &Tag) -> Result<Partial, SyntaxError> {
    let mut cursor = Cursor::new(&tag.tokens, tag);
    let name = match cursor.peek() {
        Some(Token::OpenParen) => cursor.parse_expr()?,
        Some(Token::Str(_)) => cursor.parse_expr()?,
        Some(_) => Expr::Path(cursor.parse_path()?),
        None => return Err(cursor.error("Expected a partial name")),
    };
    let (params, hash) = cursor.parse_arguments()?;
    if params.len() > 1 {
        return Err(cursor.error("Partials accept at most one context argument"));
    }
    Ok(Partial {
        name,
        context: params.into_iter().next(),
        hash,
        fallback: None,
    })
}

fn parse_call(tokens: &[Token], tag: &Tag) -> Result<Call, SyntaxError> {
    let mut cursor = Cursor::new(tokens, tag);
    let call = cursor.parse_call_body()?;
    if !cursor.at_end() {
        return Err(cursor.error("Unexpected token after expression"));
    }
    Ok(call)
}

fn parse_path_tokens(tokens: &[Token], tag: &Tag) -> Result<Expr, SyntaxError> {
    let mut cursor = Cursor::new(tokens, tag);
    let expr = match cursor.peek() {
        Some(Token::Str(_)) => cursor.parse_expr()?,
        _ => Expr::Path(cursor.parse_path()?),
    };
    if !cursor.at_end() {
        return Err(cursor.error("Expected a single path in closing tag"));
    }
    Ok(expr)
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token], tag: &Tag) -> Self {
        Self {
            tokens,
            pos: 0,
            line: tag.line,
            column: tag.column,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line, self.column)
    }

    fn parse_call_body(&mut self) -> Result<Call, SyntaxError> {
        let path = match self.peek() {
            None => return Err(self.error("Expected an expression")),
            Some(Token::OpenParen) => self.parse_expr()?,
            Some(Token::Id(_)) | Some(Token::At) | Some(Token::DotDot) => {
                Expr::Path(self.parse_path()?)
            }
            Some(_) => self.parse_expr()?,
        };
        let (params, hash) = self.parse_arguments()?;
        Ok(Call {
            path,
            params,
            hash,
            line: self.line,
            column: self.column,
        })
    }

    /// Positional parameters followed by `key=value` pairs.
    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), SyntaxError> {
        let mut params = Vec::new();
        let mut hash = Vec::new();

        while let Some(token) = self.peek() {
            if *token == Token::CloseParen {
                break;
            }
            if let (Token::Id(key), Some(Token::Equals)) = (token, self.peek_at(1)) {
                self.pos += 2;
                let value = self.parse_expr()?;
                hash.push((key.clone(), value));
                continue;
            }
            if !hash.is_empty() {
                return Err(self.error("Positional parameters must come before hash arguments"));
            }
            params.push(self.parse_expr()?);
        }

        Ok((params, hash))
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek() {
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(Expr::Str(s.clone()))
            }
            Some(Token::Num(n)) => {
                self.pos += 1;
                Ok(Expr::Num(n.clone()))
            }
            Some(Token::Bool(b)) => {
                self.pos += 1;
                Ok(Expr::Bool(*b))
            }
            Some(Token::Null) => {
                self.pos += 1;
                Ok(Expr::Null)
            }
            Some(Token::Undefined) => {
                self.pos += 1;
                Ok(Expr::Undefined)
            }
            Some(Token::OpenParen) => {
                self.pos += 1;
                let call = self.parse_call_body()?;
                match self.next() {
                    Some(Token::CloseParen) => Ok(Expr::SubExpr(Box::new(call))),
                    _ => Err(self.error("Unclosed subexpression, expected ')'")),
                }
            }
            Some(Token::Id(_)) | Some(Token::At) | Some(Token::DotDot) => {
                Ok(Expr::Path(self.parse_path()?))
            }
            Some(other) => Err(self.error(format!("Unexpected token {other:?}"))),
            None => Err(self.error("Unexpected end of expression")),
        }
    }

    fn parse_path(&mut self) -> Result<PathExpr, SyntaxError> {
        let mut original = String::new();
        let mut data = false;
        let mut depth = 0;
        let mut scoped = false;
        let mut parts = Vec::new();

        if self.peek() == Some(&Token::At) {
            self.pos += 1;
            data = true;
            original.push('@');
        }

        while self.peek() == Some(&Token::DotDot) {
            self.pos += 1;
            depth += 1;
            original.push_str("..");
            if let Some(Token::Sep(sep)) = self.peek() {
                self.pos += 1;
                original.push(*sep);
            } else {
                return Ok(PathExpr {
                    data,
                    depth,
                    parts,
                    scoped: true,
                    original,
                });
            }
        }

        loop {
            match self.next() {
                Some(Token::Id(segment)) => {
                    if segment == "this" && parts.is_empty() && !data {
                        scoped = true;
                    } else {
                        parts.push(segment.clone());
                    }
                    original.push_str(segment);
                }
                _ => return Err(self.error("Expected a path segment")),
            }
            if let (Some(Token::Sep(sep)), Some(Token::Id(_))) = (self.peek(), self.peek_at(1)) {
                self.pos += 1;
                original.push(*sep);
            } else {
                break;
            }
        }

        Ok(PathExpr {
            data,
            depth,
            parts,
            scoped,
            original,
        })
    }
}
