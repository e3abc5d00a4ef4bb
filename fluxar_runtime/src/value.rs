use std::{
    cell::RefCell,
    cmp::Ordering,
    fmt::{Debug, Display},
    rc::Rc,
};

use fluxar_syntax::{
    ast::{BinOp, FuncDecl, UnaryOp},
    token::Span,
};

use crate::{
    context::EnvRef,
    error::{ErrorMsg, RuntimeError},
    interpret::Interpreter,
    stdlib::BuiltinCall,
};

/// Shared, mutable list storage. Assigning a list aliases it.
pub type List = Rc<RefCell<Vec<Value>>>;

#[derive(Clone, Debug)]
pub enum Value {
    Number(f64),
    Str(Rc<str>),
    List(List),
    Func(Func),
    Builtin(&'static NativeFunc),
}

impl Value {
    pub const NULL: Value = Value::Number(0.0);

    pub fn bool(b: bool) -> Self {
        Self::Number(if b { 1.0 } else { 0.0 })
    }

    pub fn str(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Func(_) | Self::Builtin(_) => "function",
        }
    }

    pub fn unary(&self, op: UnaryOp) -> Result<Value, ErrorMsg> {
        match (op, self) {
            (UnaryOp::Minus, Self::Number(n)) => Ok(Self::Number(-n)),
            (UnaryOp::Plus, Self::Number(n)) => Ok(Self::Number(*n)),
            (UnaryOp::Not, Self::Number(n)) => Ok(Self::bool(*n == 0.0)),
            _ => Err(ErrorMsg::IllegalUnary(op, self.type_name())),
        }
    }

    pub fn binary(&self, op: BinOp, rhs: &Value) -> Result<Value, ErrorMsg> {
        match (self, op, rhs) {
            (_, BinOp::EqualEqual, _) => Ok(Self::bool(self == rhs)),
            (_, BinOp::BangEqual, _) => Ok(Self::bool(self != rhs)),
            (Self::Number(a), _, Self::Number(b)) => arithmetic(*a, op, *b),
            (Self::Str(a), BinOp::Plus, Self::Str(b)) => Ok(Self::Str(format!("{a}{b}").into())),
            (Self::Str(s), BinOp::Star, Self::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => {
                repeat(s, *n).map(Self::Str)
            }
            (Self::List(a), BinOp::Plus, Self::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Self::list(items))
            }
            (Self::Str(a), _, Self::Str(b)) => {
                let ord = a.cmp(b);
                match op {
                    BinOp::Greater => Ok(Self::bool(ord == Ordering::Greater)),
                    BinOp::GreaterEqual => Ok(Self::bool(ord != Ordering::Less)),
                    BinOp::Less => Ok(Self::bool(ord == Ordering::Less)),
                    BinOp::LessEqual => Ok(Self::bool(ord != Ordering::Greater)),
                    _ => Err(ErrorMsg::IllegalBinary("string", op, "string")),
                }
            }
            _ => Err(ErrorMsg::IllegalBinary(
                self.type_name(),
                op,
                rhs.type_name(),
            )),
        }
    }

    pub fn get_index(&self, index: &Value) -> Result<Value, ErrorMsg> {
        match (self, index) {
            (Self::List(items), Self::Number(n)) => {
                let items = items.borrow();
                let i = list_index(*n, items.len())?;
                Ok(items[i].clone())
            }
            (Self::Str(s), Self::Number(n)) => {
                let i = list_index(*n, s.chars().count())?;
                s.chars()
                    .nth(i)
                    .map(|c| Self::Str(c.to_string().into()))
                    .ok_or(ErrorMsg::IndexOutOfRange)
            }
            _ => Err(ErrorMsg::IllegalIndex(self.type_name(), index.type_name())),
        }
    }

    pub fn set_index(&self, index: &Value, value: Value) -> Result<(), ErrorMsg> {
        match (self, index) {
            (Self::List(items), Self::Number(n)) => {
                let mut items = items.borrow_mut();
                let i = list_index(*n, items.len())?;
                items[i] = value;
                Ok(())
            }
            _ => Err(ErrorMsg::IllegalIndex(self.type_name(), index.type_name())),
        }
    }
}

/// Longest string `*` may build, in bytes
const MAX_REPEAT_BYTES: usize = 1 << 30;

fn repeat(s: &str, count: f64) -> Result<Rc<str>, ErrorMsg> {
    if s.is_empty() {
        return Ok(Rc::from(""));
    }
    // Saturates for huge counts, which the bound then rejects
    let count = count as usize;
    match s.len().checked_mul(count) {
        Some(len) if len <= MAX_REPEAT_BYTES => Ok(s.repeat(count).into()),
        _ => Err(ErrorMsg::StringTooLong),
    }
}

/// `a ^ b`, rejecting results that are not real numbers
pub(crate) fn power(a: f64, b: f64) -> Result<f64, ErrorMsg> {
    if a == 0.0 && b < 0.0 {
        return Err(ErrorMsg::DivisionByZero);
    }
    let result = a.powf(b);
    if result.is_nan() && !a.is_nan() && !b.is_nan() {
        return Err(ErrorMsg::NotRealPower);
    }
    Ok(result)
}

fn list_index(n: f64, len: usize) -> Result<usize, ErrorMsg> {
    if n < 0.0 || n.fract() != 0.0 || n >= len as f64 {
        return Err(ErrorMsg::IndexOutOfRange);
    }
    Ok(n as usize)
}

/// Python-style modulo, the result takes the sign of the divisor
fn modulo(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

fn arithmetic(a: f64, op: BinOp, b: f64) -> Result<Value, ErrorMsg> {
    let n = match op {
        BinOp::Plus => a + b,
        BinOp::Minus => a - b,
        BinOp::Star => a * b,
        BinOp::Slash => {
            if b == 0.0 {
                return Err(ErrorMsg::DivisionByZero);
            }
            a / b
        }
        BinOp::Modulo => {
            if b == 0.0 {
                return Err(ErrorMsg::ModuloByZero);
            }
            modulo(a, b)
        }
        BinOp::Caret => power(a, b)?,
        BinOp::Greater => return Ok(Value::bool(a > b)),
        BinOp::GreaterEqual => return Ok(Value::bool(a >= b)),
        BinOp::Less => return Ok(Value::bool(a < b)),
        BinOp::LessEqual => return Ok(Value::bool(a <= b)),
        BinOp::EqualEqual => return Ok(Value::bool(a == b)),
        BinOp::BangEqual => return Ok(Value::bool(a != b)),
    };
    Ok(Value::Number(n))
}

type ListPtr = *const RefCell<Vec<Value>>;

impl Value {
    /// Structural equality. `comparing` holds the list pairs already being
    /// compared further up, which are taken as equal so that lists
    /// containing themselves terminate.
    fn equals(&self, other: &Self, comparing: &mut Vec<(ListPtr, ListPtr)>) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                let pair = (Rc::as_ptr(a), Rc::as_ptr(b));
                if Rc::ptr_eq(a, b) || comparing.contains(&pair) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                comparing.push(pair);
                let equal = a.iter().zip(b.iter()).all(|(x, y)| x.equals(y, comparing));
                comparing.pop();
                equal
            }
            (Self::Func(a), Self::Func(b)) => a == b,
            (Self::Builtin(a), Self::Builtin(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }

    /// Writes the display form. Strings nested in a list are quoted, and a
    /// list met again inside itself is shown as `[...]`.
    fn render(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        nested: bool,
        open: &mut Vec<ListPtr>,
    ) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) if nested => write!(f, "\"{s}\""),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                let ptr = Rc::as_ptr(items);
                if open.contains(&ptr) {
                    return f.write_str("[...]");
                }
                open.push(ptr);
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.render(f, true, open)?;
                }
                open.pop();
                f.write_str("]")
            }
            Self::Func(func) => write!(f, "{func}"),
            Self::Builtin(func) => write!(f, "{func}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, &mut Vec::default())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.render(f, false, &mut Vec::default())
    }
}

pub trait Callable {
    fn name(&self) -> &str;
    fn arity(&self) -> usize;
    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        call_site: &Span,
    ) -> Result<Value, RuntimeError>;
}

/// An interpreted function together with the context it was defined in
#[derive(Clone, Debug)]
pub struct Func {
    pub decl: Rc<FuncDecl>,
    pub env: EnvRef,
}

impl PartialEq for Func {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.decl, &other.decl) && self.env == other.env
    }
}

impl Display for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<function {}>", self.name())
    }
}

impl Callable for Func {
    fn name(&self) -> &str {
        self.decl.name.as_deref().unwrap_or("<anonymous>")
    }
    fn arity(&self) -> usize {
        self.decl.params.len()
    }
    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        call_site: &Span,
    ) -> Result<Value, RuntimeError> {
        interpreter.call_func(self, args, call_site)
    }
}

pub struct NativeFunc {
    pub name: &'static str,
    pub args: &'static [&'static str],
    pub body: fn(&mut BuiltinCall) -> Result<Value, RuntimeError>,
}

impl Debug for NativeFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunc")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

impl Display for NativeFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

impl Callable for NativeFunc {
    fn name(&self) -> &str {
        self.name
    }
    fn arity(&self) -> usize {
        self.args.len()
    }
    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        call_site: &Span,
    ) -> Result<Value, RuntimeError> {
        interpreter.call_builtin(self, args, call_site)
    }
}
