//! An interpreter for a small Logo dialect that drives one or more turtles.
//!
//! Program text goes through two [`Classifier`]s: the syntax one decides what kind of token each
//! word is, and the language one maps command words (in English, French, or any other rule set)
//! onto the instructions in [`Builtin`] and [`Form`](typ::Form). The resulting [`Node`]s run
//! against a [`SymbolTable`] and a [`TurtleManager`].

use std::collections::HashMap;

pub mod classify;
pub mod cmd;
pub mod error;
pub mod eval;
pub mod lang;
pub mod parse;
pub mod symbols;
pub mod turtle;
pub mod typ;

pub use classify::Classifier;
pub use cmd::{Command, TurtleCmd};
pub use error::{Error, EvalError};
pub use eval::Env;
pub use symbols::{SymbolTable, Value, VarType, Variables};
pub use turtle::{Turtle, TurtleManager};
pub use typ::{Builtin, Mode, Node, Pos};

#[derive(Clone, Debug)]
pub struct Config {
    /// Rule set for instruction names: a built-in language or a rule file.
    pub language: String,
    /// Rule set for token kinds.
    pub syntax: String,
    /// How many turtles exist (and are active) at the start.
    pub turtles: usize,
    /// How deeply user procedures may call each other.
    pub max_depth: usize,
    /// How deeply expressions may nest within one program.
    pub max_nesting: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            language: "English".to_owned(),
            syntax: "Syntax".to_owned(),
            turtles: 1,
            max_depth: 256,
            max_nesting: parse::DEFAULT_MAX_NESTING,
        }
    }
}

pub struct Interpreter {
    syntax: Classifier,
    language: Classifier,
    pub symbols: SymbolTable,
    pub turtles: TurtleManager,
    config: Config,
}

impl Interpreter {
    pub fn new(config: Config) -> Result<Interpreter, Error> {
        let syntax = Classifier::with_patterns(&config.syntax)?;
        let language = Classifier::with_patterns(&config.language)?;
        if syntax.is_empty() {
            log::warn!("syntax rule set {:?} has no rules", config.syntax);
        }
        Ok(Interpreter {
            syntax,
            language,
            symbols: SymbolTable::new(),
            turtles: TurtleManager::new(config.turtles),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn syntax(&self) -> &Classifier {
        &self.syntax
    }

    pub fn language(&self) -> &Classifier {
        &self.language
    }

    /// Switches to another language for instruction names.
    pub fn set_language(&mut self, rule_set: &str) -> Result<(), Error> {
        self.language.set_patterns(rule_set)?;
        self.config.language = rule_set.to_owned();
        Ok(())
    }

    /// Accepts the instruction names of `rule_set` as well as the current ones.
    pub fn add_language(&mut self, rule_set: &str) -> Result<(), Error> {
        self.language.add_patterns(rule_set)
    }

    /// Builds a program. Procedures defined by earlier runs may be called.
    pub fn parse(&self, input: &str) -> Result<Node, Error> {
        let procs: HashMap<String, usize> = self
            .symbols
            .procedures()
            .map(|(name, arity)| (name.to_owned(), arity))
            .collect();
        let tokens = parse::tokenize(input, &self.syntax)?;
        parse::Builder::new(&tokens, &self.language, procs)
            .max_nesting(self.config.max_nesting)
            .program()
    }

    fn env(&mut self) -> Env<'_> {
        Env::new(&mut self.symbols, &mut self.turtles, self.config.max_depth)
    }

    /// Runs `node` for its effects.
    pub fn interpret(&mut self, node: &Node) -> Result<f64, Error> {
        node.execute(&mut self.env(), Mode::Effectful)
    }

    /// Computes the value of `node`, refusing if that would change anything.
    pub fn evaluate(&mut self, node: &Node) -> Result<f64, Error> {
        node.execute(&mut self.env(), Mode::PureAttempt)
    }

    /// Parses and runs a program, returning the value of its last instruction.
    ///
    /// Every turtle's [`moved`](Turtle::moved) flag is cleared first, so afterwards it says
    /// whether this program moved that turtle.
    pub fn run(&mut self, input: &str) -> Result<f64, Error> {
        let node = self.parse(input)?;
        self.turtles.clear_moved();
        log::debug!("running {node}");
        self.interpret(&node)
    }
}
