//! Program variables and user-defined procedures.
//!
//! Every name maps to exactly one [`Value`], so a name can never have two live types. Local
//! bindings (procedure parameters, loop counters) temporarily replace whatever the name held
//! before and put it back when they are removed.
//!
//! Observers registered with [`SymbolTable::register`] are called once at the end of every
//! operation that changes the table.

use std::{collections::BTreeMap, rc::Rc};

use crate::{
    error::{Error, EvalError},
    typ::Procedure,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VarType {
    Integer,
    Double,
    String,
    Function,
}

impl std::fmt::Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            VarType::Integer => "Integer",
            VarType::Double => "Double",
            VarType::String => "String",
            VarType::Function => "Function",
        })
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Integer(i64),
    Double(f64),
    Text(String),
    Proc(Rc<Procedure>),
}

impl Value {
    pub fn var_type(&self) -> VarType {
        match self {
            Value::Integer(_) => VarType::Integer,
            Value::Double(_) => VarType::Double,
            Value::Text(_) => VarType::String,
            Value::Proc(_) => VarType::Function,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(x) => Some(*x as f64),
            Value::Double(x) => Some(*x),
            Value::Text(_) | Value::Proc(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Proc(a), Value::Proc(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(x) => x.fmt(f),
            Value::Double(x) => x.fmt(f),
            Value::Text(s) => s.fmt(f),
            Value::Proc(p) => {
                write!(f, "to {} [", p.name)?;
                for param in &p.params {
                    write!(f, " :{param}")?;
                }
                f.write_str(" ]")
            }
        }
    }
}

/// A read-only view of the variables in a [`SymbolTable`].
#[derive(Clone, Copy)]
pub struct Variables<'a> {
    vars: &'a BTreeMap<String, Value>,
}

impl<'a> Variables<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.vars.get(name)
    }

    /// Variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

type Observer = Box<dyn FnMut(Variables<'_>)>;

// A saved binding, restored when the local that replaced it goes away. `None` means the name
// didn't exist before.
struct Frame {
    name: String,
    prior: Option<Value>,
}

#[derive(Default)]
pub struct SymbolTable {
    vars: BTreeMap<String, Value>,
    locals: Vec<Frame>,
    observers: Vec<Observer>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: impl FnMut(Variables<'_>) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Tells every observer that the table changed.
    pub fn push_alarm(&mut self) {
        let vars = Variables { vars: &self.vars };
        for observer in &mut self.observers {
            observer(vars);
        }
    }

    pub fn set_double(&mut self, name: &str, value: f64) {
        self.set_value(name, Value::Double(value));
    }

    pub fn set_integer(&mut self, name: &str, value: i64) {
        self.set_value(name, Value::Integer(value));
    }

    pub fn set_string(&mut self, name: &str, value: impl Into<String>) {
        self.set_value(name, Value::Text(value.into()));
    }

    pub fn set_expression(&mut self, name: &str, procedure: Rc<Procedure>) {
        self.set_value(name, Value::Proc(procedure));
    }

    /// Binds `name` to `value`, dropping whatever it held before regardless of type.
    pub fn set_value(&mut self, name: &str, value: Value) {
        log::debug!("{name} = {value}");
        self.vars.insert(name.to_owned(), value);
        self.push_alarm();
    }

    /// Binds `name` to `value` until the matching [`remove_local_variable`](Self::remove_local_variable).
    pub fn set_local_variable(&mut self, name: &str, value: Value) {
        log::trace!("local {name} = {value}");
        let prior = self.vars.insert(name.to_owned(), value);
        self.locals.push(Frame {
            name: name.to_owned(),
            prior,
        });
        self.push_alarm();
    }

    /// Undoes the most recent [`set_local_variable`](Self::set_local_variable) for `name`.
    ///
    /// Returns `false`, without touching the table or notifying anyone, if `name` has no pending
    /// local binding.
    pub fn remove_local_variable(&mut self, name: &str) -> bool {
        let Some(idx) = self.locals.iter().rposition(|frame| frame.name == name) else {
            log::warn!("no local binding of {name} to remove");
            return false;
        };
        let frame = self.locals.remove(idx);
        match frame.prior {
            Some(prior) => {
                self.vars.insert(frame.name, prior);
            }
            None => {
                self.vars.remove(&frame.name);
            }
        }
        self.push_alarm();
        true
    }

    pub fn get_variable_type(&self, name: &str) -> Result<VarType, Error> {
        self.get_value_in_general_form(name).map(Value::var_type)
    }

    pub fn get_value_in_general_form(&self, name: &str) -> Result<&Value, Error> {
        self.vars.get(name).ok_or_else(|| Error::UndefinedVariable {
            name: name.to_owned(),
        })
    }

    /// Reads `name` as a number. Integers are widened.
    pub fn get_number(&self, name: &str) -> Result<f64, Error> {
        let value = self.get_value_in_general_form(name)?;
        value.as_number().ok_or_else(|| {
            EvalError::NotANumber {
                name: name.to_owned(),
                found: value.var_type(),
            }
            .into()
        })
    }

    pub fn remove_variable(&mut self, name: &str) -> Result<(), Error> {
        if self.vars.remove(name).is_none() {
            return Err(Error::CannotRemove {
                name: name.to_owned(),
            });
        }
        self.push_alarm();
        Ok(())
    }

    /// Forgets every variable, procedure and pending local binding.
    pub fn reset_state(&mut self) {
        self.vars.clear();
        self.locals.clear();
        self.push_alarm();
    }

    pub fn list_of_variables(&self) -> Variables<'_> {
        Variables { vars: &self.vars }
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Names and arities of the procedures defined so far.
    pub fn procedures(&self) -> impl Iterator<Item = (&str, usize)> {
        self.vars.iter().filter_map(|(name, v)| match v {
            Value::Proc(p) => Some((name.as_str(), p.params.len())),
            _ => None,
        })
    }
}

impl std::fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, value) in &self.vars {
            writeln!(f, "{name} = {value}")?;
        }
        Ok(())
    }
}
