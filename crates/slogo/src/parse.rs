//! Turning program text into syntax trees.
//!
//! This happens in two steps. [`tokenize`] splits the text into words and brackets and uses the
//! syntax classifier to decide what kind of token each one is. [`Builder`] then uses the language
//! classifier to find out which instruction each command word names and groups instructions
//! with their inputs.

use std::{collections::HashMap, rc::Rc};

use nom::{
    branch::alt,
    bytes::complete::take_till1,
    character::complete::{char, multispace0, not_line_ending, satisfy},
    combinator::{all_consuming, recognize},
    multi::many0,
    sequence::{pair, preceded, terminated},
    IResult,
};

use crate::{
    classify::Classifier,
    error::Error,
    typ::{Builtin, Form, Node, NodeKind, Pos, Procedure},
};

pub type Span<'a> = nom_locate::LocatedSpan<&'a str>;

fn is_delimiter(c: char) -> bool {
    matches!(c, '[' | ']' | '(' | ')')
}

fn comment(input: Span) -> IResult<Span, Span> {
    recognize(pair(char('#'), not_line_ending))(input)
}

fn delimiter(input: Span) -> IResult<Span, Span> {
    recognize(satisfy(is_delimiter))(input)
}

fn word(input: Span) -> IResult<Span, Span> {
    take_till1(|c: char| c.is_whitespace() || is_delimiter(c))(input)
}

/// Splits program text into raw tokens: brackets, comments, and whitespace-separated words.
pub fn raw_tokens(input: Span) -> IResult<Span, Vec<Span>> {
    all_consuming(preceded(
        multispace0,
        many0(terminated(alt((comment, delimiter, word)), multispace0)),
    ))(input)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TokenKind {
    Comment,
    Constant,
    Variable,
    Command,
    ListStart,
    ListEnd,
    GroupStart,
    GroupEnd,
}

impl TokenKind {
    pub fn from_symbol(symbol: &str) -> Option<TokenKind> {
        Some(match symbol {
            "Comment" => TokenKind::Comment,
            "Constant" => TokenKind::Constant,
            "Variable" => TokenKind::Variable,
            "Command" => TokenKind::Command,
            "ListStart" => TokenKind::ListStart,
            "ListEnd" => TokenKind::ListEnd,
            "GroupStart" => TokenKind::GroupStart,
            "GroupEnd" => TokenKind::GroupEnd,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub kind: TokenKind,
    pub pos: Pos,
}

/// Splits `input` into tokens and classifies them with `syntax`. Comments are dropped.
pub fn tokenize<'a>(input: &'a str, syntax: &Classifier) -> Result<Vec<Token<'a>>, Error> {
    let (_, spans) = raw_tokens(Span::new(input)).map_err(|e| {
        let (nom::Err::Error(e) | nom::Err::Failure(e)) = e else {
            return syntax_error("", Pos::default(), "incomplete input");
        };
        syntax_error(e.input.fragment(), e.input.into(), "unreadable input")
    })?;

    let mut ret = Vec::with_capacity(spans.len());
    for span in spans {
        let text = *span.fragment();
        let pos = Pos::from(span);
        let symbol = syntax.get_symbol(text).map_err(|e| e.at(pos))?;
        let kind = TokenKind::from_symbol(symbol).ok_or_else(|| {
            syntax_error(text, pos, &format!("{symbol} is not a kind of token"))
        })?;
        if kind != TokenKind::Comment {
            ret.push(Token { text, kind, pos });
        }
    }
    Ok(ret)
}

fn syntax_error(token: &str, pos: Pos, reason: &str) -> Error {
    Error::Syntax {
        token: token.to_owned(),
        pos,
        reason: reason.to_owned(),
    }
}

enum Instr {
    Builtin(Builtin),
    Form(Form),
    User { name: String, arity: usize },
}

/// How deeply expressions may nest unless [`Builder::max_nesting`] says otherwise.
pub const DEFAULT_MAX_NESTING: usize = 128;

/// Builds syntax trees out of classified tokens.
pub struct Builder<'t, 'a> {
    tokens: &'t [Token<'a>],
    next: usize,
    language: &'t Classifier,
    // Names and arities of the user procedures we know about.
    procs: HashMap<String, usize>,
    nesting: usize,
    max_nesting: usize,
}

impl<'t, 'a> Builder<'t, 'a> {
    /// `procs` lists procedures defined by earlier programs, so that this one can call them.
    pub fn new(
        tokens: &'t [Token<'a>],
        language: &'t Classifier,
        procs: HashMap<String, usize>,
    ) -> Self {
        Builder {
            tokens,
            next: 0,
            language,
            procs,
            nesting: 0,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    /// Limits how deeply expressions may nest. Deeper programs are rejected as syntax errors.
    pub fn max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    /// Builds the whole program as one list node.
    pub fn program(mut self) -> Result<Node, Error> {
        let mut nodes = Vec::new();
        while self.peek().is_some() {
            nodes.push(self.expr()?);
        }
        Ok(Node::new(NodeKind::List(nodes), Pos::default()))
    }

    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.next)
    }

    fn bump(&mut self) -> Option<&'t Token<'a>> {
        let tok = self.tokens.get(self.next)?;
        self.next += 1;
        Some(tok)
    }

    /// Takes the next token, complaining about `at` if the program ends first.
    fn bump_or(&mut self, at: &Token, what: &str) -> Result<&'t Token<'a>, Error> {
        self.bump()
            .ok_or_else(|| syntax_error(at.text, at.pos, &format!("expected {what}")))
    }

    fn expect(&mut self, at: &Token, kind: TokenKind, what: &str) -> Result<&'t Token<'a>, Error> {
        let tok = self.bump_or(at, what)?;
        if tok.kind == kind {
            Ok(tok)
        } else {
            Err(syntax_error(tok.text, tok.pos, &format!("expected {what}")))
        }
    }

    fn expr(&mut self) -> Result<Node, Error> {
        let Some(tok) = self.bump() else {
            let pos = self.tokens.last().map(|t| t.pos).unwrap_or_default();
            return Err(syntax_error("", pos, "unexpected end of program"));
        };
        if self.nesting >= self.max_nesting {
            return Err(syntax_error(
                tok.text,
                tok.pos,
                &format!("nested more than {} deep", self.max_nesting),
            ));
        }
        self.nesting += 1;
        let ret = self.node(tok);
        self.nesting -= 1;
        ret
    }

    fn node(&mut self, tok: &'t Token<'a>) -> Result<Node, Error> {
        match tok.kind {
            TokenKind::Constant => {
                let x = tok
                    .text
                    .parse::<f64>()
                    .map_err(|_| syntax_error(tok.text, tok.pos, "not a number"))?;
                Ok(Node::new(NodeKind::Num(x), tok.pos))
            }
            TokenKind::Variable => Ok(Node::new(NodeKind::Var(var_name(tok)), tok.pos)),
            TokenKind::ListStart => {
                let nodes = self.list_rest(tok)?;
                Ok(Node::new(NodeKind::List(nodes), tok.pos))
            }
            TokenKind::GroupStart => self.group(tok),
            TokenKind::Command => self.command(tok),
            TokenKind::ListEnd | TokenKind::GroupEnd | TokenKind::Comment => {
                Err(syntax_error(tok.text, tok.pos, "unexpected token"))
            }
        }
    }

    /// Reads expressions up to the `]` matching `start`.
    fn list_rest(&mut self, start: &Token) -> Result<Vec<Node>, Error> {
        let mut nodes = Vec::new();
        loop {
            match self.peek() {
                None => return Err(syntax_error(start.text, start.pos, "missing ]")),
                Some(tok) if tok.kind == TokenKind::ListEnd => {
                    self.next += 1;
                    return Ok(nodes);
                }
                Some(_) => nodes.push(self.expr()?),
            }
        }
    }

    /// Reads a bracketed list of instructions.
    fn block(&mut self, at: &Token) -> Result<Node, Error> {
        let start = self.expect(at, TokenKind::ListStart, "[")?;
        let nodes = self.list_rest(start)?;
        Ok(Node::new(NodeKind::List(nodes), start.pos))
    }

    fn bracketed(&mut self, at: &Token) -> Result<Vec<Node>, Error> {
        let start = self.expect(at, TokenKind::ListStart, "[")?;
        self.list_rest(start)
    }

    fn variable(&mut self, at: &Token) -> Result<String, Error> {
        let tok = self.expect(at, TokenKind::Variable, "a variable")?;
        Ok(var_name(tok))
    }

    fn translate(&self, tok: &Token) -> Result<Instr, Error> {
        match self.language.get_symbol(tok.text) {
            Ok(symbol) => {
                if let Some(b) = Builtin::from_symbol(symbol) {
                    Ok(Instr::Builtin(b))
                } else if let Some(f) = Form::from_symbol(symbol) {
                    Ok(Instr::Form(f))
                } else {
                    Err(syntax_error(
                        tok.text,
                        tok.pos,
                        &format!("{symbol} is not an instruction"),
                    ))
                }
            }
            Err(e) => match self.procs.get(tok.text) {
                Some(&arity) => Ok(Instr::User {
                    name: tok.text.to_owned(),
                    arity,
                }),
                None => Err(e.at(tok.pos)),
            },
        }
    }

    /// Reads `n` inputs for the instruction `at`.
    fn args(&mut self, at: &Token, n: usize) -> Result<Vec<Node>, Error> {
        let mut args = Vec::with_capacity(n);
        while args.len() < n {
            match self.peek() {
                Some(tok) if !matches!(tok.kind, TokenKind::ListEnd | TokenKind::GroupEnd) => {
                    args.push(self.expr()?);
                }
                _ => {
                    return Err(syntax_error(
                        at.text,
                        at.pos,
                        &format!("not enough inputs to {} (expected {n})", at.text),
                    ))
                }
            }
        }
        Ok(args)
    }

    fn command(&mut self, tok: &Token) -> Result<Node, Error> {
        let kind = match self.translate(tok)? {
            Instr::Builtin(builtin) => NodeKind::Builtin {
                builtin,
                args: self.args(tok, builtin.num_args())?,
            },
            Instr::User { name, arity } => NodeKind::Call {
                name,
                args: self.args(tok, arity)?,
            },
            Instr::Form(form) => self.form(tok, form)?,
        };
        Ok(Node::new(kind, tok.pos))
    }

    fn form(&mut self, tok: &Token, form: Form) -> Result<NodeKind, Error> {
        Ok(match form {
            Form::MakeVariable => {
                let name = self.variable(tok)?;
                let value = Box::new(self.arg(tok)?);
                NodeKind::Make { name, value }
            }
            Form::Repeat => NodeKind::Repeat {
                count: Box::new(self.arg(tok)?),
                body: Box::new(self.block(tok)?),
            },
            Form::DoTimes => {
                self.expect(tok, TokenKind::ListStart, "[")?;
                let var = self.variable(tok)?;
                let limit = Box::new(self.arg(tok)?);
                self.expect(tok, TokenKind::ListEnd, "]")?;
                NodeKind::DoTimes {
                    var,
                    limit,
                    body: Box::new(self.block(tok)?),
                }
            }
            Form::For => {
                self.expect(tok, TokenKind::ListStart, "[")?;
                let var = self.variable(tok)?;
                let mut bounds = self.args(tok, 3)?.into_iter().map(Box::new);
                self.expect(tok, TokenKind::ListEnd, "]")?;
                let (Some(start), Some(end), Some(step)) =
                    (bounds.next(), bounds.next(), bounds.next())
                else {
                    return Err(syntax_error(tok.text, tok.pos, "expected three bounds"));
                };
                NodeKind::For {
                    var,
                    start,
                    end,
                    step,
                    body: Box::new(self.block(tok)?),
                }
            }
            Form::If => NodeKind::If {
                cond: Box::new(self.arg(tok)?),
                body: Box::new(self.block(tok)?),
            },
            Form::IfElse => NodeKind::IfElse {
                cond: Box::new(self.arg(tok)?),
                then: Box::new(self.block(tok)?),
                otherwise: Box::new(self.block(tok)?),
            },
            Form::MakeUserInstruction => self.def_proc(tok)?,
            Form::Tell => NodeKind::Tell(self.bracketed(tok)?),
            Form::Ask => NodeKind::Ask {
                ids: self.bracketed(tok)?,
                body: Box::new(self.block(tok)?),
            },
            Form::AskWith => NodeKind::AskWith {
                cond: Box::new(self.block(tok)?),
                body: Box::new(self.block(tok)?),
            },
        })
    }

    fn arg(&mut self, at: &Token) -> Result<Node, Error> {
        let mut args = self.args(at, 1)?;
        args.pop()
            .ok_or_else(|| syntax_error(at.text, at.pos, "expected an input"))
    }

    fn def_proc(&mut self, tok: &Token) -> Result<NodeKind, Error> {
        let name_tok = self.expect(tok, TokenKind::Command, "a procedure name")?;
        if self.language.contains_string(name_tok.text) {
            return Err(syntax_error(
                name_tok.text,
                name_tok.pos,
                "can't redefine a built-in instruction",
            ));
        }
        let name = name_tok.text.to_owned();

        let start = self.expect(tok, TokenKind::ListStart, "[")?;
        let mut params = Vec::new();
        loop {
            let param = self.bump_or(start, "]")?;
            match param.kind {
                TokenKind::Variable => params.push(var_name(param)),
                TokenKind::ListEnd => break,
                _ => return Err(syntax_error(param.text, param.pos, "expected a parameter")),
            }
        }

        // Register before reading the body, so the procedure can call itself.
        self.procs.insert(name.clone(), params.len());
        let body = self.block(tok)?;
        Ok(NodeKind::DefProc(Rc::new(Procedure { name, params, body })))
    }

    /// `( cmd a b c ... )`: reducers fold over every input, anything else repeats over
    /// consecutive runs of inputs.
    fn group(&mut self, start: &Token) -> Result<Node, Error> {
        let tok = self.expect(start, TokenKind::Command, "an instruction after (")?;
        type Make = Box<dyn Fn(Vec<Node>) -> NodeKind>;
        let (make, arity, reducer): (Make, usize, bool) = match self.translate(tok)? {
            Instr::Builtin(builtin) => (
                Box::new(move |args: Vec<Node>| NodeKind::Builtin { builtin, args }),
                builtin.num_args(),
                builtin.is_reducer(),
            ),
            Instr::User { name, arity } => (
                Box::new(move |args: Vec<Node>| NodeKind::Call {
                    name: name.clone(),
                    args,
                }),
                arity,
                false,
            ),
            Instr::Form(_) => {
                return Err(syntax_error(tok.text, tok.pos, "can't be used in a group"));
            }
        };

        let mut args = Vec::new();
        loop {
            match self.peek() {
                None => return Err(syntax_error(start.text, start.pos, "missing )")),
                Some(t) if t.kind == TokenKind::GroupEnd => {
                    self.next += 1;
                    break;
                }
                Some(_) => args.push(self.expr()?),
            }
        }

        if reducer && args.len() >= 2 {
            let mut args = args.into_iter();
            if let (Some(first), Some(second)) = (args.next(), args.next()) {
                let mut node = Node::new(make(vec![first, second]), tok.pos);
                for rhs in args {
                    node = Node::new(make(vec![node, rhs]), tok.pos);
                }
                return Ok(node);
            }
        } else if arity == 0 {
            if args.is_empty() {
                return Ok(Node::new(make(args), tok.pos));
            }
        } else if !args.is_empty() && args.len() % arity == 0 {
            let mut calls = Vec::with_capacity(args.len() / arity);
            let mut args = args.into_iter().peekable();
            while args.peek().is_some() {
                let chunk: Vec<Node> = args.by_ref().take(arity).collect();
                calls.push(Node::new(make(chunk), tok.pos));
            }
            if calls.len() == 1 {
                return Ok(calls.remove(0));
            }
            return Ok(Node::new(NodeKind::List(calls), start.pos));
        }
        Err(syntax_error(
            tok.text,
            tok.pos,
            &format!("wrong number of inputs to {} in a group", tok.text),
        ))
    }
}

fn var_name(tok: &Token) -> String {
    tok.text.trim_start_matches(':').to_owned()
}

/// Tokenizes and builds `input` in one go.
pub fn program(
    input: &str,
    syntax: &Classifier,
    language: &Classifier,
    procs: HashMap<String, usize>,
) -> Result<Node, Error> {
    let tokens = tokenize(input, syntax)?;
    Builder::new(&tokens, language, procs).program()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifiers() -> (Classifier, Classifier) {
        (
            Classifier::with_patterns("Syntax").unwrap(),
            Classifier::with_patterns("English").unwrap(),
        )
    }

    fn parse(s: &str) -> Result<Node, Error> {
        let (syntax, language) = classifiers();
        program(s, &syntax, &language, HashMap::new())
    }

    #[test]
    fn tokens() {
        let (syntax, _) = classifiers();
        let toks = tokenize("fd 50 # go\n  rt [:x -2.5]", &syntax).unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| (t.text, t.kind)).collect();
        assert_eq!(
            kinds,
            [
                ("fd", TokenKind::Command),
                ("50", TokenKind::Constant),
                ("rt", TokenKind::Command),
                ("[", TokenKind::ListStart),
                (":x", TokenKind::Variable),
                ("-2.5", TokenKind::Constant),
                ("]", TokenKind::ListEnd),
            ]
        );
        assert_eq!(toks[2].pos, Pos { line: 2, column: 3 });
        assert_eq!(toks[5].pos, Pos { line: 2, column: 10 });
    }

    #[test]
    fn unknown_token_kind() {
        let (syntax, _) = classifiers();
        let err = tokenize("fd @", &syntax).unwrap_err();
        assert!(matches!(err, Error::UnknownKeyword { ref text, .. } if text == "@"));
        assert_eq!(err.pos(), Some(Pos { line: 1, column: 4 }));
    }

    #[test]
    fn nesting() {
        let node = parse("fd sum 10 product 2 3 rt 90").unwrap();
        assert_eq!(node.to_string(), "[ Forward Sum 10 Product 2 3 Right 90 ]");
    }

    #[test]
    fn forms() {
        let node = parse("repeat 4 [ fd 10 rt 90 ] make :x 3 if less? :x 4 [ pu ]").unwrap();
        assert_eq!(
            node.to_string(),
            "[ Repeat 4 [ Forward 10 Right 90 ] MakeVariable :x 3 If LessThan :x 4 [ PenUp ] ]"
        );

        let node = parse("for [ :i 1 10 2 ] [ fd :i ] dotimes [ :j 3 ] [ lt :j ]").unwrap();
        assert_eq!(
            node.to_string(),
            "[ For [ :i 1 10 2 ] [ Forward :i ] DoTimes [ :j 3 ] [ Left :j ] ]"
        );

        let node = parse("tell [ 1 2 ] ask [ 3 ] [ fd 1 ] askwith [ less? id 3 ] [ bk 1 ]").unwrap();
        assert_eq!(
            node.to_string(),
            "[ Tell [ 1 2 ] Ask [ 3 ] [ Forward 1 ] AskWith [ LessThan ID 3 ] [ Backward 1 ] ]"
        );
    }

    #[test]
    fn procedures() {
        let node = parse("to spiral [ :n ] [ if greater? :n 0 [ fd :n spiral - :n 1 ] ] spiral 5")
            .unwrap();
        assert_eq!(
            node.to_string(),
            "[ MakeUserInstruction spiral [ :n ] [ If GreaterThan :n 0 [ Forward :n spiral Difference :n 1 ] ] spiral 5 ]"
        );

        let err = parse("to fd [ ] [ ]").unwrap_err();
        assert_eq!(err.token(), Some("fd"));

        let (syntax, language) = classifiers();
        let known = HashMap::from([("square".to_owned(), 1)]);
        let node = program("square 10", &syntax, &language, known).unwrap();
        assert_eq!(node.to_string(), "[ square 10 ]");
    }

    #[test]
    fn groups() {
        let node = parse("( sum 1 2 3 4 )").unwrap();
        assert_eq!(node.to_string(), "[ Sum Sum Sum 1 2 3 4 ]");

        let node = parse("( fd 10 20 )").unwrap();
        assert_eq!(node.to_string(), "[ [ Forward 10 Forward 20 ] ]");

        let node = parse("( fd 10 )").unwrap();
        assert_eq!(node.to_string(), "[ Forward 10 ]");

        let err = parse("( setxy 1 2 3 )").unwrap_err();
        assert_eq!(err.token(), Some("setxy"));
    }

    #[test]
    fn malformed() {
        let err = parse("fd 10\nrt").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
        assert_eq!(err.pos(), Some(Pos { line: 2, column: 1 }));
        assert_eq!(err.token(), Some("rt"));

        let err = parse("repeat 2 [ fd 1").unwrap_err();
        assert_eq!(err.pos(), Some(Pos { line: 1, column: 10 }));

        let err = parse("fd ]").unwrap_err();
        assert_eq!(err.token(), Some("fd"));

        let err = parse("] fd 1").unwrap_err();
        assert_eq!(err.token(), Some("]"));

        let err = parse("make 3 4").unwrap_err();
        assert_eq!(err.token(), Some("3"));
    }

    #[test]
    fn nesting_limit() {
        let (syntax, language) = classifiers();
        let build = |prog: &str, max: usize| {
            let tokens = tokenize(prog, &syntax).unwrap();
            Builder::new(&tokens, &language, HashMap::new())
                .max_nesting(max)
                .program()
        };

        assert!(build("minus minus minus 1", 4).is_ok());
        let err = build("minus minus minus minus 1", 4).unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
        assert_eq!(err.token(), Some("1"));
        assert_eq!(err.pos(), Some(Pos { line: 1, column: 25 }));

        // Instructions inside a block are one level deeper than the block's owner.
        let err = build("repeat 1 [ repeat 1 [ fd 1 ] ]", 2).unwrap_err();
        assert_eq!(err.token(), Some("1"));
        assert_eq!(err.pos(), Some(Pos { line: 1, column: 19 }));

        let deep = format!("{}1", "minus ".repeat(30_000));
        let err = parse(&deep).unwrap_err();
        assert_eq!(err.token(), Some("minus"));
        assert_eq!(
            err.pos(),
            Some(Pos {
                line: 1,
                column: 1 + 6 * DEFAULT_MAX_NESTING,
            })
        );
    }

    #[test]
    fn unknown_command() {
        let err = parse("fd 10\n  jump 5").unwrap_err();
        assert!(matches!(err, Error::UnknownKeyword { ref text, .. } if text == "jump"));
        assert_eq!(err.pos(), Some(Pos { line: 2, column: 3 }));
    }
}
