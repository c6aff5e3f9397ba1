use std::path::PathBuf;

use crate::{symbols::VarType, typ::Pos};

fn fmt_pos(pos: &Option<Pos>) -> String {
    match pos {
        Some(pos) => format!(" (at {pos})"),
        None => String::new(),
    }
}

/// Everything that can go wrong while loading rule sets, classifying, building or running a
/// program.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("\"{text}\" is not defined in the syntax file{}", fmt_pos(.pos))]
    UnknownKeyword { text: String, pos: Option<Pos> },
    #[error("{name} has no value")]
    UndefinedVariable { name: String },
    #[error("the variable {name} is not defined, therefore cannot be removed")]
    CannotRemove { name: String },
    #[error("syntax error at {pos} near \"{token}\": {reason}")]
    Syntax {
        token: String,
        pos: Pos,
        reason: String,
    },
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("invalid pattern for {key}: {source}")]
    BadPattern { key: String, source: regex::Error },
    #[error("failed to read rule set {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Attaches a source position to an error that doesn't have one yet.
    pub fn at(self, at: Pos) -> Self {
        match self {
            Error::UnknownKeyword { text, pos: None } => Error::UnknownKeyword {
                text,
                pos: Some(at),
            },
            other => other,
        }
    }

    pub fn pos(&self) -> Option<Pos> {
        match self {
            Error::UnknownKeyword { pos, .. } => *pos,
            Error::Syntax { pos, .. } => Some(*pos),
            _ => None,
        }
    }

    /// The program text this error complains about, if it came from the program text.
    pub fn token(&self) -> Option<&str> {
        match self {
            Error::UnknownKeyword { text, .. } => Some(text),
            Error::Syntax { token, .. } => Some(token),
            _ => None,
        }
    }
}

/// Failures that only show up while a program runs.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("{op} doesn't like 0 as a divisor")]
    DivideByZero { op: &'static str },
    #[error("{proc} doesn't like {arg} as input")]
    BadArg { proc: &'static str, arg: f64 },
    #[error("{name} holds a {found} value, not a number")]
    NotANumber { name: String, found: VarType },
    #[error("I don't know how to {name}")]
    UnknownProc { name: String },
    #[error("wrong number of inputs to {name} (expected {expected}, found {found})")]
    WrongParams {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("{name} nested deeper than {limit} calls")]
    TooDeep { name: String, limit: usize },
    #[error("{what} has effects and can't be evaluated purely")]
    Effectful { what: String },
}
