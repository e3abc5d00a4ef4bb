use std::{cmp::Ordering, mem, rc::Rc};

use fluxar_syntax::{
    ast::{FuncDecl, LogicalOp, Node, NodeKind},
    lex::Lexer,
    parse::Parser,
    token::Span,
};
use log::{debug, trace};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    context::{ContextId, ContextKind, Contexts, Globals},
    error::{Error, ErrorMsg, Frame, RuntimeError},
    host::{Host, StdHost},
    stdlib::BuiltinCall,
    value::{Callable, Func, NativeFunc, Value},
};

const PROGRAM: &str = "<program>";

/// How the evaluation of a node finished
#[derive(Debug, PartialEq)]
pub enum Signal {
    Value(Value),
    Return(Value),
    Break,
    Continue,
}

pub type Outcome = Result<Signal, RuntimeError>;

/// Unwraps the value of a normally finished evaluation, and hands
/// every other signal (and any error) straight back to the caller
macro_rules! value {
    ($outcome:expr) => {
        match $outcome? {
            Signal::Value(v) => v,
            signal => return Ok(signal),
        }
    };
}

#[derive(Debug)]
struct CallRecord {
    label: String,
    /// Where this call was made from, `None` for a program
    call_site: Option<Span>,
}

pub struct Interpreter {
    pub(crate) contexts: Contexts,
    pub(crate) host: Box<dyn Host>,
    pub(crate) rng: StdRng,
    calls: Vec<CallRecord>,
    root: ContextId,
    // Enclosing loops and function calls, used to reject
    // stray `break`, `continue` and `return` statements
    loops: usize,
    functions: usize,
}

impl Interpreter {
    pub fn new(globals: Rc<Globals>) -> Self {
        Self::with_host(globals, Box::new(StdHost))
    }

    pub fn with_host(globals: Rc<Globals>, host: Box<dyn Host>) -> Self {
        let mut contexts = Contexts::new(globals);
        let root = contexts.push(PROGRAM, None, ContextKind::Frame);
        Self {
            contexts,
            host,
            rng: StdRng::from_entropy(),
            calls: Vec::default(),
            root,
            loops: 0,
            functions: 0,
        }
    }

    /// Lexes, parses and evaluates `source` in the program scope. The
    /// scope persists across calls, so names defined by one run stay
    /// visible to the next.
    pub fn run(&mut self, source_name: &str, source: &str) -> Result<Value, Error> {
        let result = self.execute(source_name, source, self.root);
        self.contexts.collect();
        result
    }

    /// Looks a name up in the program scope
    pub fn get(&self, name: &str) -> Option<Value> {
        self.contexts.get(self.root, name)
    }

    pub fn live_contexts(&self) -> usize {
        self.contexts.live()
    }

    /// Runs another script in its own program scope, on behalf of `run(fn)`
    pub(crate) fn run_nested(&mut self, source_name: &str, source: &str) -> Result<Value, Error> {
        let scope = self.contexts.push(PROGRAM, None, ContextKind::Frame);
        let loops = mem::take(&mut self.loops);
        let functions = mem::take(&mut self.functions);
        let result = self.execute(source_name, source, scope);
        self.loops = loops;
        self.functions = functions;
        self.contexts.pop(scope);
        result
    }

    fn execute(
        &mut self,
        source_name: &str,
        source: &str,
        scope: ContextId,
    ) -> Result<Value, Error> {
        trace!("Lexing {source_name}");
        let tokens = Lexer::new(source_name, source).lex_all()?;
        trace!("Parsing {} tokens from {source_name}", tokens.len());
        let root = Parser::new(&tokens).parse()?;
        trace!("Interpreting {source_name}");
        self.calls.push(CallRecord {
            label: PROGRAM.to_string(),
            call_site: None,
        });
        let outcome = self.evaluate(&root, scope);
        self.calls.pop();
        match outcome? {
            Signal::Value(value) | Signal::Return(value) => Ok(value),
            Signal::Break | Signal::Continue => Ok(Value::NULL),
        }
    }

    pub fn evaluate(&mut self, node: &Node, ctx: ContextId) -> Outcome {
        let value = match &node.kind {
            NodeKind::Number(n) => Value::Number(*n),
            NodeKind::Str(s) => Value::str(s),
            NodeKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(value!(self.evaluate(item, ctx)));
                }
                Value::list(values)
            }
            NodeKind::Access(name) => self
                .contexts
                .get(ctx, name)
                .ok_or_else(|| self.error(ErrorMsg::Undefined(name.clone()), &node.span))?,
            NodeKind::Assign { name, value } => {
                let value = value!(self.evaluate(value, ctx));
                self.contexts.assign(ctx, name, value.clone());
                value
            }
            NodeKind::Index { target, index } => {
                let target = value!(self.evaluate(target, ctx));
                let index = value!(self.evaluate(index, ctx));
                target
                    .get_index(&index)
                    .map_err(|msg| self.error(msg, &node.span))?
            }
            NodeKind::IndexAssign {
                target,
                index,
                value,
            } => {
                let target = value!(self.evaluate(target, ctx));
                let index = value!(self.evaluate(index, ctx));
                let value = value!(self.evaluate(value, ctx));
                target
                    .set_index(&index, value.clone())
                    .map_err(|msg| self.error(msg, &node.span))?;
                value
            }
            NodeKind::Unary { op, expr } => {
                let value = value!(self.evaluate(expr, ctx));
                value
                    .unary(*op)
                    .map_err(|msg| self.error(msg, &node.span))?
            }
            NodeKind::Binary { lhs, op, rhs } => {
                let left = value!(self.evaluate(lhs, ctx));
                let right = value!(self.evaluate(rhs, ctx));
                left.binary(*op, &right)
                    .map_err(|msg| self.error(msg, &node.span))?
            }
            NodeKind::Logical { lhs, op, rhs } => {
                let left = value!(self.evaluate(lhs, ctx));
                match (op, self.condition(&left, &lhs.span)?) {
                    (LogicalOp::And, false) => Value::bool(false),
                    (LogicalOp::Or, true) => Value::bool(true),
                    _ => {
                        let right = value!(self.evaluate(rhs, ctx));
                        Value::bool(self.condition(&right, &rhs.span)?)
                    }
                }
            }
            NodeKind::If { cases, else_case } => {
                return self.evaluate_if(cases, else_case.as_deref(), ctx)
            }
            NodeKind::For {
                var,
                start,
                stop,
                step,
                body,
            } => {
                return self.evaluate_for(var, start, stop, step.as_deref(), body, &node.span, ctx)
            }
            NodeKind::ForIn {
                var,
                iterable,
                body,
            } => return self.evaluate_for_in(var, iterable, body, ctx),
            NodeKind::While { condition, body } => {
                self.loops += 1;
                let outcome = self.evaluate_while(condition, body, ctx);
                self.loops -= 1;
                return outcome;
            }
            NodeKind::FuncDef(decl) => self.define_func(decl, ctx),
            NodeKind::Call { callee, args } => {
                return self.evaluate_call(callee, args, &node.span, ctx)
            }
            NodeKind::Return(value) => {
                if self.functions == 0 {
                    return Err(self.error(ErrorMsg::OutsideFunction, &node.span));
                }
                let value = match value {
                    Some(expr) => value!(self.evaluate(expr, ctx)),
                    None => Value::NULL,
                };
                return Ok(Signal::Return(value));
            }
            NodeKind::Continue => {
                if self.loops == 0 {
                    return Err(self.error(ErrorMsg::OutsideLoop("continue"), &node.span));
                }
                return Ok(Signal::Continue);
            }
            NodeKind::Break => {
                if self.loops == 0 {
                    return Err(self.error(ErrorMsg::OutsideLoop("break"), &node.span));
                }
                return Ok(Signal::Break);
            }
            NodeKind::Block(items) => {
                let mut last = Value::NULL;
                for item in items {
                    last = value!(self.evaluate(item, ctx));
                }
                last
            }
        };

        Ok(Signal::Value(value))
    }

    fn evaluate_if(
        &mut self,
        cases: &[(Node, Node)],
        else_case: Option<&Node>,
        ctx: ContextId,
    ) -> Outcome {
        for (condition, body) in cases {
            let value = value!(self.evaluate(condition, ctx));
            if self.condition(&value, &condition.span)? {
                return self.evaluate(body, ctx);
            }
        }
        match else_case {
            Some(body) => self.evaluate(body, ctx),
            None => Ok(Signal::Value(Value::NULL)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate_for(
        &mut self,
        var: &str,
        start: &Node,
        stop: &Node,
        step: Option<&Node>,
        body: &Node,
        span: &Span,
        ctx: ContextId,
    ) -> Outcome {
        let first = value!(self.evaluate(start, ctx));
        let first = self.number(first, "Loop start", &start.span)?;
        let last = value!(self.evaluate(stop, ctx));
        let last = self.number(last, "Loop end", &stop.span)?;
        let step = match step {
            Some(node) => {
                let value = value!(self.evaluate(node, ctx));
                self.number(value, "Loop step", &node.span)?
            }
            None => 1.0,
        };
        if step == 0.0 {
            return Err(self.error(ErrorMsg::ZeroStep, span));
        }

        let scope = self.contexts.push("<for>", Some(ctx), ContextKind::Block);
        self.loops += 1;
        let mut outcome = Ok(Signal::Value(Value::NULL));
        let mut i = first;
        while if step > 0.0 { i < last } else { i > last } {
            self.contexts.define(scope, var, Value::Number(i));
            if let Some(done) = finish_iteration(self.evaluate(body, scope)) {
                outcome = done;
                break;
            }
            i += step;
        }
        self.loops -= 1;
        self.contexts.pop(scope);
        outcome
    }

    fn evaluate_for_in(
        &mut self,
        var: &str,
        iterable: &Node,
        body: &Node,
        ctx: ContextId,
    ) -> Outcome {
        let items = match value!(self.evaluate(iterable, ctx)) {
            Value::List(items) => items.borrow().clone(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string().into())).collect(),
            other => {
                let msg = ErrorMsg::NotIterable(other.type_name());
                return Err(self.error(msg, &iterable.span));
            }
        };

        let scope = self.contexts.push("<for>", Some(ctx), ContextKind::Block);
        self.loops += 1;
        let mut outcome = Ok(Signal::Value(Value::NULL));
        for item in items {
            self.contexts.define(scope, var, item);
            if let Some(done) = finish_iteration(self.evaluate(body, scope)) {
                outcome = done;
                break;
            }
        }
        self.loops -= 1;
        self.contexts.pop(scope);
        outcome
    }

    fn evaluate_while(&mut self, condition: &Node, body: &Node, ctx: ContextId) -> Outcome {
        loop {
            let value = value!(self.evaluate(condition, ctx));
            if !self.condition(&value, &condition.span)? {
                return Ok(Signal::Value(Value::NULL));
            }
            if let Some(done) = finish_iteration(self.evaluate(body, ctx)) {
                return done;
            }
        }
    }

    fn define_func(&mut self, decl: &Rc<FuncDecl>, ctx: ContextId) -> Value {
        let func = Value::Func(Func {
            decl: Rc::clone(decl),
            env: self.contexts.hold(ctx),
        });
        if let Some(name) = &decl.name {
            self.contexts.assign(ctx, name, func.clone());
        }
        func
    }

    fn evaluate_call(
        &mut self,
        callee: &Node,
        args: &[Node],
        span: &Span,
        ctx: ContextId,
    ) -> Outcome {
        let callee = value!(self.evaluate(callee, ctx));
        let func: &dyn Callable = match &callee {
            Value::Func(f) => f,
            Value::Builtin(f) => *f,
            other => {
                let msg = ErrorMsg::NotCallable(other.to_string());
                return Err(self.error(msg, span));
            }
        };

        // Ensure the number of arguments matches the function definition
        // before anything is evaluated
        match args.len().cmp(&func.arity()) {
            Ordering::Greater => {
                let msg = ErrorMsg::TooManyArgs(func.name().to_string(), func.arity(), args.len());
                return Err(self.error(msg, span));
            }
            Ordering::Less => {
                let msg = ErrorMsg::TooFewArgs(func.name().to_string(), func.arity(), args.len());
                return Err(self.error(msg, span));
            }
            Ordering::Equal => (),
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(value!(self.evaluate(arg, ctx)));
        }

        func.call(self, values, span).map(Signal::Value)
    }

    pub(crate) fn call_func(
        &mut self,
        func: &Func,
        args: Vec<Value>,
        call_site: &Span,
    ) -> Result<Value, RuntimeError> {
        debug!("Call {func}");
        let label = func.name().to_string();
        let frame = self.contexts.push(&label, Some(func.env.id()), ContextKind::Frame);
        for (param, value) in func.decl.params.iter().zip(args) {
            self.contexts.define(frame, param, value);
        }
        self.calls.push(CallRecord {
            label,
            call_site: Some(call_site.clone()),
        });
        let loops = mem::take(&mut self.loops);
        self.functions += 1;

        let outcome = self.evaluate(&func.decl.body, frame);

        self.functions -= 1;
        self.loops = loops;
        self.calls.pop();
        self.contexts.pop(frame);
        match outcome? {
            Signal::Value(value) | Signal::Return(value) => Ok(value),
            Signal::Break | Signal::Continue => Ok(Value::NULL),
        }
    }

    pub(crate) fn call_builtin(
        &mut self,
        func: &NativeFunc,
        args: Vec<Value>,
        call_site: &Span,
    ) -> Result<Value, RuntimeError> {
        let label = func.to_string();
        debug!("Call {label}");
        let frame = self.contexts.push(&label, None, ContextKind::Frame);
        for (name, value) in func.args.iter().zip(args) {
            self.contexts.define(frame, name, value);
        }
        self.calls.push(CallRecord {
            label,
            call_site: Some(call_site.clone()),
        });

        let result = (func.body)(&mut BuiltinCall::new(self, func, frame, call_site.clone()));

        self.calls.pop();
        self.contexts.pop(frame);
        result
    }

    fn condition(&self, value: &Value, span: &Span) -> Result<bool, RuntimeError> {
        match value {
            Value::Number(n) => Ok(*n != 0.0),
            other => Err(self.error(ErrorMsg::NotACondition(other.type_name()), span)),
        }
    }

    fn number(&self, value: Value, what: &'static str, span: &Span) -> Result<f64, RuntimeError> {
        match value {
            Value::Number(n) => Ok(n),
            other => Err(self.error(ErrorMsg::ExpectedNumber(what, other.type_name()), span)),
        }
    }

    /// The active calls innermost first, each paired with the position
    /// it had reached: `span` for the innermost, the call site of the
    /// callee for the rest
    fn traceback(&self, span: &Span) -> Vec<Frame> {
        let mut frames = Vec::default();
        let mut at = span.clone();
        for record in self.calls.iter().rev() {
            frames.push(Frame {
                label: record.label.clone(),
                span: at.clone(),
            });
            match &record.call_site {
                Some(site) => at = site.clone(),
                None => break,
            }
        }
        frames
    }

    pub(crate) fn error(&self, msg: ErrorMsg, span: &Span) -> RuntimeError {
        RuntimeError::new(msg, span.clone(), self.traceback(span))
    }
}

/// Consumes the loop control signals of one iteration. `None` means
/// keep looping, anything else is what the loop finishes with.
fn finish_iteration(outcome: Outcome) -> Option<Outcome> {
    match outcome {
        Ok(Signal::Value(_) | Signal::Continue) => None,
        Ok(Signal::Break) => Some(Ok(Signal::Value(Value::NULL))),
        other => Some(other),
    }
}
