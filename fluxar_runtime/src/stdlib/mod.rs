use std::{f64::consts::PI, rc::Rc};

use fluxar_syntax::token::Span;

use crate::{
    context::{ContextId, Globals},
    error::{ErrorMsg, RuntimeError},
    interpret::Interpreter,
    value::{List, NativeFunc, Value},
};

mod io;
mod math;
mod table;

/// Builds the root scope: constants plus every built-in function
pub fn globals() -> Rc<Globals> {
    let mut globals = Globals::default();
    let constants = [
        ("null", Value::NULL),
        ("true", Value::bool(true)),
        ("false", Value::bool(false)),
        ("math.pi", Value::Number(PI)),
        ("math.huge", Value::Number(f64::INFINITY)),
    ];
    for (name, value) in constants {
        globals.insert(name.to_string(), value);
    }
    for func in io::FUNCS
        .iter()
        .chain(PREDICATES)
        .chain(table::FUNCS)
        .chain(math::FUNCS)
    {
        globals.insert(func.name.to_string(), Value::Builtin(func));
    }
    if let Some(clear) = globals.get("clear").cloned() {
        globals.insert("cls".to_string(), clear);
    }
    Rc::new(globals)
}

/// The view a built-in has of its invocation: arguments bound by their
/// declared names, and the interpreter that called it
pub struct BuiltinCall<'a> {
    pub interpreter: &'a mut Interpreter,
    func: &'a NativeFunc,
    frame: ContextId,
    span: Span,
}

impl<'a> BuiltinCall<'a> {
    pub(crate) fn new(
        interpreter: &'a mut Interpreter,
        func: &'a NativeFunc,
        frame: ContextId,
        span: Span,
    ) -> Self {
        Self {
            interpreter,
            func,
            frame,
            span,
        }
    }

    /// Name of the built-in being called
    pub fn name(&self) -> &'static str {
        self.func.name
    }

    pub fn arg(&self, name: &str) -> Result<Value, RuntimeError> {
        self.interpreter
            .contexts
            .get(self.frame, name)
            .ok_or_else(|| self.error(ErrorMsg::Undefined(name.to_string())))
    }

    pub fn number(&self, name: &'static str) -> Result<f64, RuntimeError> {
        match self.arg(name)? {
            Value::Number(n) => Ok(n),
            _ => Err(self.arg_type(name, "number")),
        }
    }

    pub fn integer(&self, name: &'static str) -> Result<i64, RuntimeError> {
        let n = self.number(name)?;
        if n.fract() != 0.0 || !n.is_finite() {
            return Err(self.arg_type(name, "whole number"));
        }
        Ok(n as i64)
    }

    pub fn string(&self, name: &'static str) -> Result<Rc<str>, RuntimeError> {
        match self.arg(name)? {
            Value::Str(s) => Ok(s),
            _ => Err(self.arg_type(name, "string")),
        }
    }

    pub fn list(&self, name: &'static str) -> Result<List, RuntimeError> {
        match self.arg(name)? {
            Value::List(items) => Ok(items),
            _ => Err(self.arg_type(name, "list")),
        }
    }

    pub fn arg_type(&self, name: &'static str, expected: &'static str) -> RuntimeError {
        self.error(ErrorMsg::ArgType(name, self.func.name.to_string(), expected))
    }

    pub fn error(&self, msg: ErrorMsg) -> RuntimeError {
        self.interpreter.error(msg, &self.span)
    }

    pub fn fail(&self, msg: impl Into<String>) -> RuntimeError {
        self.error(ErrorMsg::Custom(msg.into()))
    }
}

static PREDICATES: &[NativeFunc] = &[
    NativeFunc {
        name: "isnumber",
        args: &["value"],
        body: is_number,
    },
    NativeFunc {
        name: "isstring",
        args: &["value"],
        body: is_string,
    },
    NativeFunc {
        name: "islist",
        args: &["value"],
        body: is_list,
    },
    NativeFunc {
        name: "isfunction",
        args: &["value"],
        body: is_function,
    },
];

fn is_number(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    Ok(Value::bool(matches!(call.arg("value")?, Value::Number(_))))
}

fn is_string(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    Ok(Value::bool(matches!(call.arg("value")?, Value::Str(_))))
}

fn is_list(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    Ok(Value::bool(matches!(call.arg("value")?, Value::List(_))))
}

fn is_function(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    Ok(Value::bool(matches!(
        call.arg("value")?,
        Value::Func(_) | Value::Builtin(_)
    )))
}
