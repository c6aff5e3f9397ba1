use std::rc::Rc;

/// A location in the program text. Lines and columns both start at 1.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Pos {
    pub line: u32,
    pub column: usize,
}

impl Default for Pos {
    fn default() -> Self {
        Pos { line: 1, column: 1 }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl From<crate::parse::Span<'_>> for Pos {
    fn from(sp: crate::parse::Span) -> Self {
        Pos {
            line: sp.location_line(),
            column: sp.get_utf8_column(),
        }
    }
}

/// Instructions that take a fixed number of numeric inputs.
///
/// The names returned by [`Builtin::symbol`] are the canonical symbols that the language rule
/// sets map program words onto.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Builtin {
    Forward,
    Backward,
    Left,
    Right,
    SetHeading,
    SetTowards,
    SetPosition,
    PenDown,
    PenUp,
    ShowTurtle,
    HideTurtle,
    Home,
    ClearScreen,
    SetPenColor,
    SetShape,
    XCoordinate,
    YCoordinate,
    Heading,
    IsPenDown,
    IsShowing,
    GetPenColor,
    GetShape,
    Id,
    Turtles,
    Sum,
    Difference,
    Product,
    Quotient,
    Remainder,
    Minus,
    Random,
    Sine,
    Cosine,
    Tangent,
    ArcTangent,
    NaturalLog,
    Power,
    Pi,
    LessThan,
    GreaterThan,
    Equal,
    NotEqual,
    And,
    Or,
    Not,
}

impl Builtin {
    pub const ALL: &'static [Builtin] = &[
        Builtin::Forward,
        Builtin::Backward,
        Builtin::Left,
        Builtin::Right,
        Builtin::SetHeading,
        Builtin::SetTowards,
        Builtin::SetPosition,
        Builtin::PenDown,
        Builtin::PenUp,
        Builtin::ShowTurtle,
        Builtin::HideTurtle,
        Builtin::Home,
        Builtin::ClearScreen,
        Builtin::SetPenColor,
        Builtin::SetShape,
        Builtin::XCoordinate,
        Builtin::YCoordinate,
        Builtin::Heading,
        Builtin::IsPenDown,
        Builtin::IsShowing,
        Builtin::GetPenColor,
        Builtin::GetShape,
        Builtin::Id,
        Builtin::Turtles,
        Builtin::Sum,
        Builtin::Difference,
        Builtin::Product,
        Builtin::Quotient,
        Builtin::Remainder,
        Builtin::Minus,
        Builtin::Random,
        Builtin::Sine,
        Builtin::Cosine,
        Builtin::Tangent,
        Builtin::ArcTangent,
        Builtin::NaturalLog,
        Builtin::Power,
        Builtin::Pi,
        Builtin::LessThan,
        Builtin::GreaterThan,
        Builtin::Equal,
        Builtin::NotEqual,
        Builtin::And,
        Builtin::Or,
        Builtin::Not,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Builtin::Forward => "Forward",
            Builtin::Backward => "Backward",
            Builtin::Left => "Left",
            Builtin::Right => "Right",
            Builtin::SetHeading => "SetHeading",
            Builtin::SetTowards => "SetTowards",
            Builtin::SetPosition => "SetPosition",
            Builtin::PenDown => "PenDown",
            Builtin::PenUp => "PenUp",
            Builtin::ShowTurtle => "ShowTurtle",
            Builtin::HideTurtle => "HideTurtle",
            Builtin::Home => "Home",
            Builtin::ClearScreen => "ClearScreen",
            Builtin::SetPenColor => "SetPenColor",
            Builtin::SetShape => "SetShape",
            Builtin::XCoordinate => "XCoordinate",
            Builtin::YCoordinate => "YCoordinate",
            Builtin::Heading => "Heading",
            Builtin::IsPenDown => "IsPenDown",
            Builtin::IsShowing => "IsShowing",
            Builtin::GetPenColor => "GetPenColor",
            Builtin::GetShape => "GetShape",
            Builtin::Id => "ID",
            Builtin::Turtles => "Turtles",
            Builtin::Sum => "Sum",
            Builtin::Difference => "Difference",
            Builtin::Product => "Product",
            Builtin::Quotient => "Quotient",
            Builtin::Remainder => "Remainder",
            Builtin::Minus => "Minus",
            Builtin::Random => "Random",
            Builtin::Sine => "Sine",
            Builtin::Cosine => "Cosine",
            Builtin::Tangent => "Tangent",
            Builtin::ArcTangent => "ArcTangent",
            Builtin::NaturalLog => "NaturalLog",
            Builtin::Power => "Power",
            Builtin::Pi => "Pi",
            Builtin::LessThan => "LessThan",
            Builtin::GreaterThan => "GreaterThan",
            Builtin::Equal => "Equal",
            Builtin::NotEqual => "NotEqual",
            Builtin::And => "And",
            Builtin::Or => "Or",
            Builtin::Not => "Not",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|b| b.symbol() == symbol)
    }

    pub fn num_args(self) -> usize {
        use Builtin::*;
        match self {
            PenDown | PenUp | ShowTurtle | HideTurtle | Home | ClearScreen | XCoordinate
            | YCoordinate | Heading | IsPenDown | IsShowing | GetPenColor | GetShape | Id
            | Turtles | Pi => 0,
            Forward | Backward | Left | Right | SetHeading | SetPenColor | SetShape | Minus
            | Random | Sine | Cosine | Tangent | ArcTangent | NaturalLog | Not => 1,
            SetTowards | SetPosition | Sum | Difference | Product | Quotient | Remainder
            | Power | LessThan | GreaterThan | Equal | NotEqual | And | Or => 2,
        }
    }

    /// Pure builtins compute a value without changing any turtle.
    pub fn is_pure(self) -> bool {
        use Builtin::*;
        !matches!(
            self,
            Forward
                | Backward
                | Left
                | Right
                | SetHeading
                | SetTowards
                | SetPosition
                | PenDown
                | PenUp
                | ShowTurtle
                | HideTurtle
                | Home
                | ClearScreen
                | SetPenColor
                | SetShape
        )
    }

    /// Binary builtins that a group like `( sum 1 2 3 )` folds over all of its inputs.
    pub fn is_reducer(self) -> bool {
        use Builtin::*;
        matches!(self, Sum | Difference | Product | Quotient | And | Or)
    }
}

/// Instructions with their own shape (variable names, bracketed bodies) rather than a fixed list
/// of numeric inputs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Form {
    MakeVariable,
    Repeat,
    DoTimes,
    For,
    If,
    IfElse,
    MakeUserInstruction,
    Tell,
    Ask,
    AskWith,
}

impl Form {
    pub fn from_symbol(symbol: &str) -> Option<Form> {
        Some(match symbol {
            "MakeVariable" => Form::MakeVariable,
            "Repeat" => Form::Repeat,
            "DoTimes" => Form::DoTimes,
            "For" => Form::For,
            "If" => Form::If,
            "IfElse" => Form::IfElse,
            "MakeUserInstruction" => Form::MakeUserInstruction,
            "Tell" => Form::Tell,
            "Ask" => Form::Ask,
            "AskWith" => Form::AskWith,
            _ => return None,
        })
    }
}

/// How a node is allowed to run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Run for effect: turtles may move and variables may change.
    Effectful,
    /// Only compute a value. Nodes that would have effects are refused before anything runs.
    PureAttempt,
}

/// A user-defined procedure (`to name [ :a :b ] [ body ]`).
#[derive(Clone, Debug)]
pub struct Procedure {
    pub name: String,
    pub params: Vec<String>,
    pub body: Node,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Num(f64),
    Var(String),
    Builtin {
        builtin: Builtin,
        args: Vec<Node>,
    },
    Call {
        name: String,
        args: Vec<Node>,
    },
    List(Vec<Node>),
    Make {
        name: String,
        value: Box<Node>,
    },
    Repeat {
        count: Box<Node>,
        body: Box<Node>,
    },
    DoTimes {
        var: String,
        limit: Box<Node>,
        body: Box<Node>,
    },
    For {
        var: String,
        start: Box<Node>,
        end: Box<Node>,
        step: Box<Node>,
        body: Box<Node>,
    },
    If {
        cond: Box<Node>,
        body: Box<Node>,
    },
    IfElse {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    DefProc(Rc<Procedure>),
    Tell(Vec<Node>),
    Ask {
        ids: Vec<Node>,
        body: Box<Node>,
    },
    AskWith {
        cond: Box<Node>,
        body: Box<Node>,
    },
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Pos,
}

impl Node {
    pub fn new(kind: NodeKind, pos: Pos) -> Node {
        Node { kind, pos }
    }

    /// Whether this node can run in [`Mode::PureAttempt`].
    ///
    /// Literals, variable reads, arithmetic, comparisons and turtle queries are pure, and so are
    /// lists and conditionals made only of pure nodes. Anything that moves a turtle, changes the
    /// turtle selection or writes a variable (loops bind their counters) is not.
    pub fn is_pure(&self) -> bool {
        match &self.kind {
            NodeKind::Num(_) | NodeKind::Var(_) => true,
            NodeKind::Builtin { builtin, args } => {
                builtin.is_pure() && args.iter().all(Node::is_pure)
            }
            NodeKind::List(nodes) => nodes.iter().all(Node::is_pure),
            NodeKind::If { cond, body } => cond.is_pure() && body.is_pure(),
            NodeKind::IfElse {
                cond,
                then,
                otherwise,
            } => cond.is_pure() && then.is_pure() && otherwise.is_pure(),
            NodeKind::Call { .. }
            | NodeKind::Make { .. }
            | NodeKind::Repeat { .. }
            | NodeKind::DoTimes { .. }
            | NodeKind::For { .. }
            | NodeKind::DefProc(_)
            | NodeKind::Tell(_)
            | NodeKind::Ask { .. }
            | NodeKind::AskWith { .. } => false,
        }
    }

    /// A short name for error messages.
    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Num(_) => "number",
            NodeKind::Var(name) => name,
            NodeKind::Builtin { builtin, .. } => builtin.symbol(),
            NodeKind::Call { name, .. } => name,
            NodeKind::List(_) => "list",
            NodeKind::Make { .. } => "MakeVariable",
            NodeKind::Repeat { .. } => "Repeat",
            NodeKind::DoTimes { .. } => "DoTimes",
            NodeKind::For { .. } => "For",
            NodeKind::If { .. } => "If",
            NodeKind::IfElse { .. } => "IfElse",
            NodeKind::DefProc(_) => "MakeUserInstruction",
            NodeKind::Tell(_) => "Tell",
            NodeKind::Ask { .. } => "Ask",
            NodeKind::AskWith { .. } => "AskWith",
        }
    }
}

fn write_list(f: &mut std::fmt::Formatter<'_>, nodes: &[Node]) -> std::fmt::Result {
    f.write_str("[")?;
    for n in nodes {
        write!(f, " {n}")?;
    }
    f.write_str(" ]")
}

fn write_args(f: &mut std::fmt::Formatter<'_>, args: &[Node]) -> std::fmt::Result {
    for a in args {
        write!(f, " {a}")?;
    }
    Ok(())
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            NodeKind::Num(x) => x.fmt(f),
            NodeKind::Var(s) => write!(f, ":{s}"),
            NodeKind::Builtin { builtin, args } => {
                f.write_str(builtin.symbol())?;
                write_args(f, args)
            }
            NodeKind::Call { name, args } => {
                f.write_str(name)?;
                write_args(f, args)
            }
            NodeKind::List(nodes) => write_list(f, nodes),
            NodeKind::Make { name, value } => write!(f, "MakeVariable :{name} {value}"),
            NodeKind::Repeat { count, body } => write!(f, "Repeat {count} {body}"),
            NodeKind::DoTimes { var, limit, body } => {
                write!(f, "DoTimes [ :{var} {limit} ] {body}")
            }
            NodeKind::For {
                var,
                start,
                end,
                step,
                body,
            } => write!(f, "For [ :{var} {start} {end} {step} ] {body}"),
            NodeKind::If { cond, body } => write!(f, "If {cond} {body}"),
            NodeKind::IfElse {
                cond,
                then,
                otherwise,
            } => write!(f, "IfElse {cond} {then} {otherwise}"),
            NodeKind::DefProc(p) => {
                write!(f, "MakeUserInstruction {} [", p.name)?;
                for param in &p.params {
                    write!(f, " :{param}")?;
                }
                write!(f, " ] {}", p.body)
            }
            NodeKind::Tell(ids) => {
                f.write_str("Tell ")?;
                write_list(f, ids)
            }
            NodeKind::Ask { ids, body } => {
                f.write_str("Ask ")?;
                write_list(f, ids)?;
                write!(f, " {body}")
            }
            NodeKind::AskWith { cond, body } => write!(f, "AskWith {cond} {body}"),
        }
    }
}
