use log::debug;

use super::BuiltinCall;
use crate::{
    error::RuntimeError,
    value::{NativeFunc, Value},
};

pub(super) static FUNCS: &[NativeFunc] = &[
    NativeFunc {
        name: "run",
        args: &["fn"],
        body: run,
    },
    NativeFunc {
        name: "printf",
        args: &["value"],
        body: printf,
    },
    NativeFunc {
        name: "printret",
        args: &["value"],
        body: printret,
    },
    NativeFunc {
        name: "input",
        args: &["text"],
        body: input,
    },
    NativeFunc {
        name: "input_int",
        args: &["text"],
        body: input_int,
    },
    NativeFunc {
        name: "clear",
        args: &[],
        body: clear,
    },
];

/// Loads and executes another script with the same interpreter
fn run(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let path = call.string("fn")?;
    debug!("Loading script {path}");
    let source = call
        .interpreter
        .host
        .load(&path)
        .map_err(|e| call.fail(format!("Failed to load script \"{path}\"\n{e}")))?;
    call.interpreter
        .run_nested(&path, &source)
        .map_err(|e| call.fail(format!("Failed to finish executing script \"{path}\"\n{e}")))?;
    Ok(Value::NULL)
}

fn printf(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let text = call.arg("value")?.to_string();
    call.interpreter.host.print(&text);
    Ok(Value::NULL)
}

fn printret(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    Ok(Value::str(&call.arg("value")?.to_string()))
}

fn read_line(call: &mut BuiltinCall) -> Result<String, RuntimeError> {
    let prompt = call.arg("text")?.to_string();
    match call.interpreter.host.read_line(&prompt) {
        Ok(Some(line)) => Ok(line),
        Ok(None) => Err(call.fail("Reached end of input")),
        Err(e) => Err(call.fail(format!("Failed to read input\n{e}"))),
    }
}

fn input(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    Ok(Value::str(&read_line(call)?))
}

/// Keeps asking until the line holds a whole number
fn input_int(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    loop {
        let line = read_line(call)?;
        match line.trim().parse::<i64>() {
            Ok(n) => return Ok(Value::Number(n as f64)),
            Err(_) => call
                .interpreter
                .host
                .print(&format!("'{line}' must be an integer. Try again!")),
        }
    }
}

fn clear(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    call.interpreter.host.clear();
    Ok(Value::NULL)
}
