//! Running syntax trees.

use rand::Rng;

use crate::{
    cmd::TurtleCmd,
    error::{Error, EvalError},
    symbols::{SymbolTable, Value},
    turtle::{TurtleManager, NUM_COLORS, NUM_SHAPES},
    typ::{Builtin, Mode, Node, NodeKind},
};

/// Everything a running program can see and change.
pub struct Env<'a> {
    pub symbols: &'a mut SymbolTable,
    pub turtles: &'a mut TurtleManager,
    max_depth: usize,
    depth: usize,
}

impl<'a> Env<'a> {
    pub fn new(
        symbols: &'a mut SymbolTable,
        turtles: &'a mut TurtleManager,
        max_depth: usize,
    ) -> Self {
        Env {
            symbols,
            turtles,
            max_depth,
            depth: 0,
        }
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Converts a palette or shape number to an index below `limit`.
fn index(x: f64, limit: usize, proc: &'static str) -> Result<usize, EvalError> {
    if x >= 0.0 && x.fract() == 0.0 && (x as usize) < limit {
        Ok(x as usize)
    } else {
        Err(EvalError::BadArg { proc, arg: x })
    }
}

fn turtle_id(x: f64, proc: &'static str) -> Result<usize, EvalError> {
    if x >= 1.0 && x.fract() == 0.0 {
        Ok(x as usize)
    } else {
        Err(EvalError::BadArg { proc, arg: x })
    }
}

/// Binds `name` for the duration of `f`. The binding is undone even if `f` fails.
fn with_local<T>(
    env: &mut Env<'_>,
    name: &str,
    value: Value,
    f: impl FnOnce(&mut Env<'_>) -> Result<T, Error>,
) -> Result<T, Error> {
    env.symbols.set_local_variable(name, value);
    let ret = f(env);
    env.symbols.remove_local_variable(name);
    ret
}

/// Runs `f` and then puts the turtle selection back the way it was, whether or not `f` failed.
fn keep_selection<T>(
    env: &mut Env<'_>,
    f: impl FnOnce(&mut Env<'_>) -> Result<T, Error>,
) -> Result<T, Error> {
    let saved = env.turtles.selection().to_vec();
    let ret = f(env);
    env.turtles.tell(&saved);
    ret
}

fn math(builtin: Builtin, a: f64, b: f64) -> Result<f64, EvalError> {
    use Builtin::*;
    Ok(match builtin {
        Sum => a + b,
        Difference => a - b,
        Product => a * b,
        Quotient => {
            if b == 0.0 {
                return Err(EvalError::DivideByZero { op: "Quotient" });
            }
            a / b
        }
        Remainder => {
            if b == 0.0 {
                return Err(EvalError::DivideByZero { op: "Remainder" });
            }
            a % b
        }
        Minus => -a,
        Random => {
            if !a.is_finite() || a < 0.0 {
                return Err(EvalError::BadArg {
                    proc: "Random",
                    arg: a,
                });
            }
            if a == 0.0 {
                0.0
            } else {
                rand::thread_rng().gen_range(0.0..a)
            }
        }
        Sine => a.to_radians().sin(),
        Cosine => a.to_radians().cos(),
        Tangent => a.to_radians().tan(),
        ArcTangent => a.atan().to_degrees(),
        NaturalLog => {
            if a <= 0.0 {
                return Err(EvalError::BadArg {
                    proc: "NaturalLog",
                    arg: a,
                });
            }
            a.ln()
        }
        Power => a.powf(b),
        Pi => std::f64::consts::PI,
        LessThan => flag(a < b),
        GreaterThan => flag(a > b),
        Equal => flag(a == b),
        NotEqual => flag(a != b),
        And => flag(a != 0.0 && b != 0.0),
        Or => flag(a != 0.0 || b != 0.0),
        Not => flag(a == 0.0),
        // Everything else talks to turtles and is handled by `apply_builtin`.
        _ => unreachable!("{builtin:?} is not arithmetic"),
    })
}

fn apply_builtin(builtin: Builtin, args: &[f64], env: &mut Env<'_>) -> Result<f64, Error> {
    if args.len() != builtin.num_args() {
        return Err(EvalError::WrongParams {
            name: builtin.symbol().to_owned(),
            expected: builtin.num_args(),
            found: args.len(),
        }
        .into());
    }
    let a = args.first().copied().unwrap_or(0.0);
    let b = args.get(1).copied().unwrap_or(0.0);

    use Builtin::*;
    let cmd = match builtin {
        Forward => TurtleCmd::Forward(a),
        Backward => TurtleCmd::Back(a),
        Left => TurtleCmd::Left(a),
        Right => TurtleCmd::Right(a),
        SetHeading => TurtleCmd::SetHeading(a),
        SetTowards => TurtleCmd::Towards(a, b),
        SetPosition => TurtleCmd::SetPosition(a, b),
        PenDown => TurtleCmd::PenDown,
        PenUp => TurtleCmd::PenUp,
        ShowTurtle => TurtleCmd::Show,
        HideTurtle => TurtleCmd::Hide,
        Home => TurtleCmd::Home,
        ClearScreen => TurtleCmd::ClearScreen,
        SetPenColor => TurtleCmd::SetPenColor(index(a, NUM_COLORS, "SetPenColor")?),
        SetShape => TurtleCmd::SetShape(index(a, NUM_SHAPES, "SetShape")?),
        XCoordinate => TurtleCmd::XCor,
        YCoordinate => TurtleCmd::YCor,
        Heading => TurtleCmd::Heading,
        IsPenDown => TurtleCmd::IsPenDown,
        IsShowing => TurtleCmd::IsShowing,
        GetPenColor => TurtleCmd::PenColor,
        GetShape => TurtleCmd::Shape,
        Id => TurtleCmd::Id,
        Turtles => return Ok(env.turtles.len() as f64),
        _ => return math(builtin, a, b).map_err(Error::from),
    };
    let ret = env.turtles.apply(&cmd);
    Ok(ret.unwrap_or_else(|| cmd.echo()))
}

impl Node {
    /// Runs this node and returns its value.
    ///
    /// In [`Mode::PureAttempt`], a node that isn't [pure](Node::is_pure) is refused before any
    /// part of it runs.
    pub fn execute(&self, env: &mut Env<'_>, mode: Mode) -> Result<f64, Error> {
        if mode == Mode::PureAttempt && !self.is_pure() {
            return Err(EvalError::Effectful {
                what: self.name().to_owned(),
            }
            .into());
        }
        self.run(env)
    }

    fn run(&self, env: &mut Env<'_>) -> Result<f64, Error> {
        match &self.kind {
            NodeKind::Num(x) => Ok(*x),
            NodeKind::Var(name) => env.symbols.get_number(name),
            NodeKind::Builtin { builtin, args } => {
                let args = run_all(args, env)?;
                apply_builtin(*builtin, &args, env)
            }
            NodeKind::Call { name, args } => self.call(name, args, env),
            NodeKind::List(nodes) => run_block(nodes, env),
            NodeKind::Make { name, value } => {
                let value = value.run(env)?;
                env.symbols.set_double(name, value);
                Ok(value)
            }
            NodeKind::Repeat { count, body } => {
                let count = count.run(env)?;
                let mut ret = 0.0;
                for i in 1..=(count as i64) {
                    ret = with_local(env, "repcount", Value::Integer(i), |env| body.run(env))?;
                }
                Ok(ret)
            }
            NodeKind::DoTimes { var, limit, body } => {
                let limit = limit.run(env)?;
                let mut ret = 0.0;
                for i in 1..=(limit as i64) {
                    ret = with_local(env, var, Value::Integer(i), |env| body.run(env))?;
                }
                Ok(ret)
            }
            NodeKind::For {
                var,
                start,
                end,
                step,
                body,
            } => {
                let start = start.run(env)?;
                let end = end.run(env)?;
                let step = step.run(env)?;
                if step == 0.0 {
                    return Err(EvalError::BadArg {
                        proc: "For",
                        arg: step,
                    }
                    .into());
                }
                // Steps are counted from `start`, with a little slack at the end so that
                // `for [ :i 0 0.3 0.1 ]` still reaches 0.3.
                let slack = step.abs() * 1e-9;
                let mut ret = 0.0;
                for k in 0u64.. {
                    let x = start + k as f64 * step;
                    let in_range = if step > 0.0 {
                        x <= end + slack
                    } else {
                        x >= end - slack
                    };
                    if !in_range {
                        break;
                    }
                    ret = with_local(env, var, Value::Double(x), |env| body.run(env))?;
                }
                Ok(ret)
            }
            NodeKind::If { cond, body } => {
                if cond.run(env)? != 0.0 {
                    body.run(env)
                } else {
                    Ok(0.0)
                }
            }
            NodeKind::IfElse {
                cond,
                then,
                otherwise,
            } => {
                if cond.run(env)? != 0.0 {
                    then.run(env)
                } else {
                    otherwise.run(env)
                }
            }
            NodeKind::DefProc(procedure) => {
                env.symbols
                    .set_expression(&procedure.name, procedure.clone());
                Ok(1.0)
            }
            NodeKind::Tell(ids) => {
                let ids = turtle_ids(ids, env, "Tell")?;
                env.turtles.tell(&ids);
                Ok(ids.last().map_or(0.0, |&id| id as f64))
            }
            NodeKind::Ask { ids, body } => {
                let ids = turtle_ids(ids, env, "Ask")?;
                keep_selection(env, |env| {
                    let mut ret = 0.0;
                    for id in ids {
                        env.turtles.tell(&[id]);
                        ret = body.run(env)?;
                    }
                    Ok(ret)
                })
            }
            NodeKind::AskWith { cond, body } => keep_selection(env, |env| {
                let mut matches = Vec::new();
                for id in env.turtles.ids() {
                    env.turtles.tell(&[id]);
                    if cond.run(env)? != 0.0 {
                        matches.push(id);
                    }
                }
                log::debug!("askwith matched turtles {matches:?}");
                let mut ret = 0.0;
                for id in matches {
                    env.turtles.tell(&[id]);
                    ret = body.run(env)?;
                }
                Ok(ret)
            }),
        }
    }

    fn call(&self, name: &str, args: &[Node], env: &mut Env<'_>) -> Result<f64, Error> {
        let procedure = match env.symbols.get_value_in_general_form(name) {
            Ok(Value::Proc(p)) => p.clone(),
            _ => {
                return Err(EvalError::UnknownProc {
                    name: name.to_owned(),
                }
                .into())
            }
        };
        if procedure.params.len() != args.len() {
            return Err(EvalError::WrongParams {
                name: name.to_owned(),
                expected: procedure.params.len(),
                found: args.len(),
            }
            .into());
        }
        if env.depth >= env.max_depth {
            return Err(EvalError::TooDeep {
                name: name.to_owned(),
                limit: env.max_depth,
            }
            .into());
        }

        // Inputs are computed in the caller's scope, before any parameter is bound.
        let values = run_all(args, env)?;
        for (param, value) in procedure.params.iter().zip(values) {
            env.symbols.set_local_variable(param, Value::Double(value));
        }
        env.depth += 1;
        let ret = procedure.body.run(env);
        env.depth -= 1;
        for param in procedure.params.iter().rev() {
            env.symbols.remove_local_variable(param);
        }
        ret
    }
}

fn run_all(nodes: &[Node], env: &mut Env<'_>) -> Result<Vec<f64>, Error> {
    nodes.iter().map(|n| n.run(env)).collect()
}

fn run_block(nodes: &[Node], env: &mut Env<'_>) -> Result<f64, Error> {
    let mut ret = 0.0;
    for node in nodes {
        ret = node.run(env)?;
    }
    Ok(ret)
}

fn turtle_ids(nodes: &[Node], env: &mut Env<'_>, proc: &'static str) -> Result<Vec<usize>, Error> {
    run_all(nodes, env)?
        .into_iter()
        .map(|x| turtle_id(x, proc).map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::HashMap, rc::Rc};

    use kurbo::Point;

    use super::*;
    use crate::{classify::Classifier, parse};

    struct State {
        symbols: SymbolTable,
        turtles: TurtleManager,
    }

    impl State {
        fn new() -> State {
            State {
                symbols: SymbolTable::new(),
                turtles: TurtleManager::default(),
            }
        }

        fn exec_mode(&mut self, prog: &str, mode: Mode) -> Result<f64, Error> {
            let syntax = Classifier::with_patterns("Syntax").unwrap();
            let language = Classifier::with_patterns("English").unwrap();
            let procs = self
                .symbols
                .procedures()
                .map(|(name, n)| (name.to_owned(), n))
                .collect::<HashMap<_, _>>();
            let node = parse::program(prog, &syntax, &language, procs)?;
            let mut env = Env::new(&mut self.symbols, &mut self.turtles, 32);
            node.execute(&mut env, mode)
        }

        fn exec(&mut self, prog: &str) -> Result<f64, Error> {
            self.exec_mode(prog, Mode::Effectful)
        }

        fn position(&self, id: usize) -> Point {
            self.turtles.get(id).unwrap().position
        }
    }

    fn value(prog: &str) -> f64 {
        State::new().exec(prog).unwrap()
    }

    fn eval_err(prog: &str) -> EvalError {
        match State::new().exec(prog).unwrap_err() {
            Error::Eval(e) => e,
            e => panic!("expected a runtime error, got {e}"),
        }
    }

    #[test]
    fn arithmetic() {
        assert_eq!(value("sum 1 product 2 3"), 7.0);
        assert_eq!(value("( sum 1 2 3 4 )"), 10.0);
        assert_eq!(value("( difference 10 1 2 )"), 7.0);
        assert_eq!(value("remainder 7 3"), 1.0);
        assert_eq!(value("minus 4"), -4.0);
        assert_eq!(value("power 2 10"), 1024.0);
        assert!((value("sin 30") - 0.5).abs() < 1e-9);
        assert!((value("atan 1") - 45.0).abs() < 1e-9);
        assert_eq!(value("random 0"), 0.0);
        let r = value("random 5");
        assert!((0.0..5.0).contains(&r));
    }

    #[test]
    fn booleans() {
        assert_eq!(value("less? 1 2"), 1.0);
        assert_eq!(value("greater? 1 2"), 0.0);
        assert_eq!(value("equal? 2 2"), 1.0);
        assert_eq!(value("and 1 0"), 0.0);
        assert_eq!(value("or 1 0"), 1.0);
        assert_eq!(value("not 0"), 1.0);
        assert_eq!(value("ifelse less? 1 2 [ 10 ] [ 20 ]"), 10.0);
        assert_eq!(value("if 0 [ 10 ]"), 0.0);
    }

    #[test]
    fn bad_inputs() {
        assert_eq!(
            eval_err("quotient 1 0"),
            EvalError::DivideByZero { op: "Quotient" }
        );
        assert_eq!(
            eval_err("remainder 1 0"),
            EvalError::DivideByZero { op: "Remainder" }
        );
        assert_eq!(
            eval_err("log 0"),
            EvalError::BadArg {
                proc: "NaturalLog",
                arg: 0.0
            }
        );
        assert_eq!(
            eval_err("random -1"),
            EvalError::BadArg {
                proc: "Random",
                arg: -1.0
            }
        );
        // NaN and infinity, respectively.
        for prog in ["random power -1 0.5", "random power 10 400"] {
            assert!(matches!(
                eval_err(prog),
                EvalError::BadArg { proc: "Random", arg } if !arg.is_finite()
            ));
        }
        assert_eq!(
            eval_err("setpc 100"),
            EvalError::BadArg {
                proc: "SetPenColor",
                arg: 100.0
            }
        );
        assert_eq!(
            eval_err("tell [ 0 ]"),
            EvalError::BadArg {
                proc: "Tell",
                arg: 0.0
            }
        );
    }

    #[test]
    fn turtle_commands_echo() {
        let mut st = State::new();
        assert_eq!(st.exec("fd 50").unwrap(), 50.0);
        assert_eq!(st.position(1), Point::new(50.0, 0.0));
        assert_eq!(st.exec("pd").unwrap(), 1.0);
        assert_eq!(st.exec("setxy 3 4").unwrap(), 0.0);
        assert_eq!(st.exec("xcor").unwrap(), 3.0);
        assert_eq!(st.exec("setpc 3 pc").unwrap(), 3.0);
        assert_eq!(st.exec("turtles").unwrap(), 1.0);
    }

    #[test]
    fn variables_and_loops() {
        let mut st = State::new();
        assert_eq!(st.exec("make :x 3 sum :x 1").unwrap(), 4.0);
        assert_eq!(st.symbols.get_number("x").unwrap(), 3.0);

        st.exec("make :total 0 repeat 4 [ make :total sum :total :repcount ]")
            .unwrap();
        assert_eq!(st.symbols.get_number("total").unwrap(), 10.0);
        assert!(!st.symbols.contains_variable("repcount"));

        st.exec("make :total 0 dotimes [ :i 3 ] [ make :total sum :total :i ]")
            .unwrap();
        assert_eq!(st.symbols.get_number("total").unwrap(), 6.0);
        assert!(!st.symbols.contains_variable("i"));

        st.exec("make :i 100 make :total 0 for [ :i 10 0 -5 ] [ make :total sum :total :i ]")
            .unwrap();
        assert_eq!(st.symbols.get_number("total").unwrap(), 15.0);
        assert_eq!(st.symbols.get_number("i").unwrap(), 100.0);

        st.exec("make :count 0 for [ :i 0 0.3 0.1 ] [ make :count sum :count 1 ]")
            .unwrap();
        assert_eq!(st.symbols.get_number("count").unwrap(), 4.0);
        assert_eq!(st.symbols.get_number("i").unwrap(), 100.0);

        assert!(matches!(
            st.exec("for [ :i 0 10 0 ] [ fd 1 ]"),
            Err(Error::Eval(EvalError::BadArg { proc: "For", .. }))
        ));
        assert!(matches!(
            st.exec("fd :nope"),
            Err(Error::UndefinedVariable { ref name }) if name == "nope"
        ));
    }

    #[test]
    fn procedures() {
        let mut st = State::new();
        assert_eq!(
            st.exec("to sq [ :n ] [ repeat 4 [ fd :n rt 90 ] ]").unwrap(),
            1.0
        );
        st.exec("sq 10").unwrap();
        assert!(st.position(1).distance(Point::ORIGIN) < 1e-9);
        assert!(!st.symbols.contains_variable("n"));

        let fact = "to fact [ :n ] [ ifelse less? :n 2 [ 1 ] [ product :n fact difference :n 1 ] ]";
        st.exec(fact).unwrap();
        assert_eq!(st.exec("fact 5").unwrap(), 120.0);

        // Parameters shadow globals only while the procedure runs.
        st.exec("make :n 7 sq 1").unwrap();
        assert_eq!(st.symbols.get_number("n").unwrap(), 7.0);
    }

    #[test]
    fn runaway_recursion() {
        let mut st = State::new();
        st.exec("make :n 7 to down [ :n ] [ down sum :n 1 ]").unwrap();
        assert!(matches!(
            st.exec("down 1"),
            Err(Error::Eval(EvalError::TooDeep { limit: 32, .. }))
        ));
        // Every parameter binding was undone on the way out.
        assert_eq!(st.symbols.get_number("n").unwrap(), 7.0);
    }

    #[test]
    fn locals_restored_on_error() {
        let mut st = State::new();
        st.exec("make :repcount 42").unwrap();
        assert!(st.exec("repeat 3 [ quotient 1 0 ]").is_err());
        assert_eq!(st.symbols.get_number("repcount").unwrap(), 42.0);
    }

    #[test]
    fn ask_restores_selection() {
        let mut st = State::new();
        st.exec("tell [ 1 2 3 ]").unwrap();
        assert_eq!(st.exec("ask [ 2 ] [ fd 10 id ]").unwrap(), 2.0);
        assert_eq!(st.turtles.selection(), [1, 2, 3]);
        assert_eq!(st.position(1), Point::ORIGIN);
        assert_eq!(st.position(2), Point::new(10.0, 0.0));

        assert!(st.exec("ask [ 3 ] [ quotient 1 0 ]").is_err());
        assert_eq!(st.turtles.selection(), [1, 2, 3]);

        st.exec("askwith [ greater? id 1 ] [ bk 5 ]").unwrap();
        assert_eq!(st.position(1), Point::ORIGIN);
        assert_eq!(st.position(2), Point::new(5.0, 0.0));
        assert_eq!(st.position(3), Point::new(-5.0, 0.0));
        assert_eq!(st.turtles.selection(), [1, 2, 3]);

        assert_eq!(st.exec("askwith [ 0 ] [ fd 1 ]").unwrap(), 0.0);
    }

    #[test]
    fn fan_out() {
        let mut st = State::new();
        st.exec("tell [ 1 2 ] fd 10").unwrap();
        assert_eq!(st.position(1), Point::new(10.0, 0.0));
        assert_eq!(st.position(2), Point::new(10.0, 0.0));
        assert_eq!(st.exec("tell [ 2 1 ] id").unwrap(), 1.0);
    }

    #[test]
    fn pure_attempt() {
        let mut st = State::new();
        assert_eq!(
            st.exec_mode("sum xcor 2", Mode::PureAttempt).unwrap(),
            2.0
        );

        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        st.symbols.register(move |_| c.set(c.get() + 1));

        let err = st.exec_mode("make :x 1 fd 10", Mode::PureAttempt).unwrap_err();
        assert!(matches!(err, Error::Eval(EvalError::Effectful { .. })));
        assert_eq!(count.get(), 0);
        assert!(!st.symbols.contains_variable("x"));
        assert_eq!(st.position(1), Point::ORIGIN);
    }
}
