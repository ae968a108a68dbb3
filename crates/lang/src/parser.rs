//! Recursive-descent parser: one line, one command.
//!
//! [`parse`] drives the lexer over a single line and produces a [`Cmd`].
//! Trailing tokens after a complete command are an error unless they form a
//! single end-of-line comment. A blank line, or a line holding only a
//! comment, parses to [`Cmd::Empty`].

use thiserror::Error;
use warden_core::Right;

use crate::ast::{Atom, Cmd, Delegation, Expr, Target};
use crate::lexer::Lexer;
use crate::token::Token;

/// A lexical or grammatical error in one input line.
///
/// The handler maps every parse error to a single `FAILED` reply for the
/// whole program; the message is for the server log only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The lexer rejected a byte, string, identifier, or comment.
    #[error("lex error: {message}")]
    Lex {
        /// What the lexer rejected.
        message: String,
    },

    /// The parser saw a token the grammar does not allow here.
    #[error("expected {expected}, found {found}")]
    Unexpected {
        /// What the grammar required.
        expected: &'static str,
        /// What was actually found.
        found: &'static str,
    },

    /// A record literal repeated a key.
    #[error("duplicate record key: {key}")]
    DuplicateKey {
        /// The repeated key.
        key: String,
    },
}

/// Parse one input line into a command.
pub fn parse(line: &str) -> Result<Cmd, ParseError> {
    let mut parser = Parser::new(line);
    let mut tok = parser.next()?;
    if tok == Token::Comment {
        tok = parser.next()?;
    }
    let cmd = match tok {
        Token::As => parser.as_principal()?,
        Token::Exit => Cmd::Exit,
        Token::Return => Cmd::Return(parser.expr()?),
        Token::Create => parser.create_principal()?,
        Token::Change => parser.change_password()?,
        Token::Set => parser.set()?,
        Token::Append => parser.append_to()?,
        Token::Local => parser.local()?,
        Token::Foreach => parser.each(true)?,
        Token::Filtereach => parser.each(false)?,
        Token::Delete => {
            parser.expect(Token::Delegation)?;
            Cmd::DeleteDelegation(parser.delegation()?)
        }
        Token::Default => parser.default_delegator()?,
        Token::Terminate => Cmd::Terminate,
        Token::End => return Ok(Cmd::Empty),
        other => return Err(unexpected("a command", &other)),
    };
    parser.finish(cmd)
}

fn unexpected(expected: &'static str, found: &Token) -> ParseError {
    ParseError::Unexpected {
        expected,
        found: found.describe(),
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
}

impl<'a> Parser<'a> {
    fn new(line: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(line),
            peeked: None,
        }
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        match self.peeked.take() {
            Some(tok) => Ok(tok),
            None => self.lexer.next(),
        }
    }

    fn put_back(&mut self, tok: Token) {
        debug_assert!(self.peeked.is_none());
        self.peeked = Some(tok);
    }

    fn expect(&mut self, want: Token) -> Result<(), ParseError> {
        let tok = self.next()?;
        if tok == want {
            Ok(())
        } else {
            Err(unexpected(want.describe(), &tok))
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => Err(unexpected("identifier", &other)),
        }
    }

    fn string(&mut self) -> Result<String, ParseError> {
        match self.next()? {
            Token::Str(s) => Ok(s),
            other => Err(unexpected("string literal", &other)),
        }
    }

    /// A complete command must be followed by end of line, or by one
    /// trailing comment (which itself runs to end of line).
    fn finish(&mut self, cmd: Cmd) -> Result<Cmd, ParseError> {
        match self.next()? {
            Token::End | Token::Comment => Ok(cmd),
            other => Err(unexpected("end of line", &other)),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    // as principal p password "s" do
    fn as_principal(&mut self) -> Result<Cmd, ParseError> {
        self.expect(Token::Principal)?;
        let principal = self.ident()?;
        self.expect(Token::Password)?;
        let password = self.string()?;
        self.expect(Token::Do)?;
        Ok(Cmd::AsPrincipal { principal, password })
    }

    // create principal p "s"
    fn create_principal(&mut self) -> Result<Cmd, ParseError> {
        self.expect(Token::Principal)?;
        let principal = self.ident()?;
        let password = self.string()?;
        Ok(Cmd::CreatePrincipal { principal, password })
    }

    // change password p "s"
    fn change_password(&mut self) -> Result<Cmd, ParseError> {
        self.expect(Token::Password)?;
        let principal = self.ident()?;
        let password = self.string()?;
        Ok(Cmd::ChangePassword { principal, password })
    }

    // set x = <expr>  |  set delegation <dtgt>
    fn set(&mut self) -> Result<Cmd, ParseError> {
        match self.next()? {
            Token::Delegation => Ok(Cmd::SetDelegation(self.delegation()?)),
            Token::Ident(variable) => {
                self.expect(Token::Equals)?;
                let expr = self.expr()?;
                Ok(Cmd::Set { variable, expr })
            }
            other => Err(unexpected("identifier or 'delegation'", &other)),
        }
    }

    // append to x with <expr>
    fn append_to(&mut self) -> Result<Cmd, ParseError> {
        self.expect(Token::To)?;
        let variable = self.ident()?;
        self.expect(Token::With)?;
        let expr = self.expr()?;
        Ok(Cmd::AppendTo { variable, expr })
    }

    // local x = <expr>
    fn local(&mut self) -> Result<Cmd, ParseError> {
        let variable = self.ident()?;
        self.expect(Token::Equals)?;
        let expr = self.expr()?;
        Ok(Cmd::Local { variable, expr })
    }

    // foreach y in x replacewith <expr>  |  filtereach y in x with <expr>
    fn each(&mut self, replace: bool) -> Result<Cmd, ParseError> {
        let binder = self.ident()?;
        self.expect(Token::In)?;
        let variable = self.ident()?;
        self.expect(if replace { Token::Replacewith } else { Token::With })?;
        let expr = self.expr()?;
        Ok(if replace {
            Cmd::Foreach { binder, variable, expr }
        } else {
            Cmd::Filtereach { binder, variable, expr }
        })
    }

    // default delegator = p
    fn default_delegator(&mut self) -> Result<Cmd, ParseError> {
        self.expect(Token::Delegator)?;
        self.expect(Token::Equals)?;
        let principal = self.ident()?;
        Ok(Cmd::DefaultDelegator { principal })
    }

    // (x|all) q (read|write|append|delegate) -> p
    fn delegation(&mut self) -> Result<Delegation, ParseError> {
        let target = match self.next()? {
            Token::All => Target::All,
            Token::Ident(name) => Target::Var(name),
            other => return Err(unexpected("variable or 'all'", &other)),
        };
        let owner = self.ident()?;
        let right = match self.next()? {
            Token::Read => Right::Read,
            Token::Write => Right::Write,
            Token::Append => Right::Append,
            Token::Delegate => Right::Delegate,
            other => return Err(unexpected("a right", &other)),
        };
        self.expect(Token::Arrow)?;
        let receiver = self.ident()?;
        Ok(Delegation { target, owner, right, receiver })
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expr(&mut self) -> Result<Expr, ParseError> {
        match self.next()? {
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => match self.next()? {
                Token::Dot => {
                    let field = self.ident()?;
                    Ok(Expr::Field { record: name, field })
                }
                Token::LParen => {
                    let args = self.call_args()?;
                    Ok(Expr::Call { function: name, args })
                }
                other => {
                    self.put_back(other);
                    Ok(Expr::Ident(name))
                }
            },
            Token::LBracket => {
                self.expect(Token::RBracket)?;
                Ok(Expr::EmptyList)
            }
            Token::LBrace => self.record(),
            Token::Let => {
                let binder = self.ident()?;
                self.expect(Token::Equals)?;
                let bound = self.expr()?;
                self.expect(Token::In)?;
                let body = self.expr()?;
                Ok(Expr::Let {
                    binder,
                    bound: Box::new(bound),
                    body: Box::new(body),
                })
            }
            other => Err(unexpected("an expression", &other)),
        }
    }

    // { key = val, … } — the opening brace is already consumed.
    fn record(&mut self) -> Result<Expr, ParseError> {
        let mut fields: Vec<(String, Atom)> = Vec::new();
        let mut cur = self.next()?;
        while cur != Token::RBrace {
            let key = match cur {
                Token::Ident(key) => key,
                other => return Err(unexpected("record key", &other)),
            };
            if fields.iter().any(|(k, _)| *k == key) {
                return Err(ParseError::DuplicateKey { key });
            }
            self.expect(Token::Equals)?;
            let first = self.next()?;
            let value = self.atom(first)?;
            fields.push((key, value));
            cur = self.next()?;
            if cur == Token::Comma {
                cur = self.next()?;
            }
        }
        Ok(Expr::Record(fields))
    }

    // ( a, b, … ) — the opening paren is already consumed.
    fn call_args(&mut self) -> Result<Vec<Atom>, ParseError> {
        let mut args = Vec::new();
        let mut cur = self.next()?;
        while cur != Token::RParen {
            args.push(self.atom(cur)?);
            cur = self.next()?;
            if cur == Token::Comma {
                cur = self.next()?;
            }
        }
        Ok(args)
    }

    // STR | ID | ID.ID, with the first token already consumed by the caller.
    fn atom(&mut self, first: Token) -> Result<Atom, ParseError> {
        match first {
            Token::Str(s) => Ok(Atom::Str(s)),
            Token::Ident(name) => match self.next()? {
                Token::Dot => {
                    let field = self.ident()?;
                    Ok(Atom::Field { record: name, field })
                }
                other => {
                    self.put_back(other);
                    Ok(Atom::Ident(name))
                }
            },
            other => Err(unexpected("a string, identifier, or field", &other)),
        }
    }
}
