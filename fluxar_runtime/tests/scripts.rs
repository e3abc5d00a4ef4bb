use std::{cell::RefCell, collections::HashMap, io, rc::Rc};

use fluxar_runtime::{host::Host, stdlib, Error, Interpreter, Value};
use pretty_assertions::assert_eq;

/// Records printed lines and serves scripts from memory
#[derive(Default)]
struct Script {
    printed: Rc<RefCell<Vec<String>>>,
    files: HashMap<String, String>,
}

impl Host for Script {
    fn print(&mut self, text: &str) {
        self.printed.borrow_mut().push(text.to_string());
    }

    fn read_line(&mut self, _: &str) -> io::Result<Option<String>> {
        Ok(None)
    }

    fn clear(&mut self) {}

    fn load(&mut self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))
    }
}

fn interpreter(files: &[(&str, &str)]) -> (Interpreter, Rc<RefCell<Vec<String>>>) {
    let host = Script {
        files: files
            .iter()
            .map(|(name, text)| (name.to_string(), text.to_string()))
            .collect(),
        ..Script::default()
    };
    let printed = Rc::clone(&host.printed);
    (Interpreter::with_host(stdlib::globals(), Box::new(host)), printed)
}

fn run(source: &str) -> (Result<Value, Error>, Vec<String>) {
    let (mut interpreter, printed) = interpreter(&[]);
    let result = interpreter.run("main.fx", source);
    let printed = printed.borrow().clone();
    (result, printed)
}

#[test]
fn arithmetic_precedence() {
    let (mut interpreter, _) = interpreter(&[]);
    interpreter.run("main.fx", "x = 1 + 2 * 3").unwrap();
    assert_eq!(interpreter.get("x"), Some(Value::Number(7.0)));
}

#[test]
fn numeric_loop_prints_each_step() {
    let (result, printed) = run("for i = 1, 4 do printf(i) end");
    assert_eq!(result.unwrap(), Value::NULL);
    assert_eq!(printed, vec!["1", "2", "3"]);
}

#[test]
fn undefined_function_has_a_single_frame() {
    let (result, _) = run("foo()");
    let Err(Error::Runtime(err)) = result else {
        panic!("expected a runtime error");
    };
    assert!(err.message.contains("is not defined"));
    assert_eq!(err.traceback.len(), 1);
    assert_eq!(
        err.to_string(),
        "Traceback (innermost call first):\n  File main.fx, line 1, column 1, in <program>\nRuntime Error: 'foo' is not defined"
    );
}

#[test]
fn closures_capture_their_scope() {
    let source = "
func makeAdder(n)
  return func (x) -> x + n
end
add3 = makeAdder(3)
add10 = makeAdder(10)
printf(add3(5))
printf(add10(5))
";
    let (result, printed) = run(source);
    result.unwrap();
    assert_eq!(printed, vec!["8", "15"]);
}

#[test]
fn loops_share_the_enclosing_frame() {
    let source = "
total = 0
for x in [1, 2, 3] do
  total = total + x
  last = x
end
printf(total)
printf(last)
";
    let (result, printed) = run(source);
    result.unwrap();
    assert_eq!(printed, vec!["6", "3"]);
}

#[test]
fn wrong_arity_never_runs_the_body() {
    let source = "
func greet(name)
  printf(\"hello \" + name)
end
greet(\"a\", \"b\")
";
    let (result, printed) = run(source);
    let Err(Error::Runtime(err)) = result else {
        panic!("expected a runtime error");
    };
    assert_eq!(
        err.message,
        "Too many arguments passed into 'greet' (expected 1, got 2)"
    );
    assert!(printed.is_empty());
}

#[test]
fn division_by_zero_is_an_error() {
    for (source, message) in [("1 / 0", "Division by zero"), ("5 % 0", "Modulo by zero")] {
        let (result, _) = run(source);
        let Err(Error::Runtime(err)) = result else {
            panic!("expected a runtime error for {source}");
        };
        assert_eq!(err.message, message);
    }
}

#[test]
fn break_does_not_leak_into_later_loops() {
    let source = "
while 1 do break end
n = 0
for i = 0, 5 do n = n + 1 end
printf(n)
";
    let (result, printed) = run(source);
    result.unwrap();
    assert_eq!(printed, vec!["5"]);
}

#[test]
fn scripts_can_run_other_scripts() {
    let (mut interpreter, printed) = interpreter(&[
        ("lib.fx", "printf(\"from lib\")\nprintf(math.max([1, 4, 2]))"),
        ("broken.fx", "printf(1)\n1 / 0"),
    ]);
    interpreter.run("main.fx", "run(\"lib.fx\")").unwrap();
    assert_eq!(*printed.borrow(), vec!["from lib", "4"]);

    let Err(Error::Runtime(err)) = interpreter.run("main.fx", "run(\"broken.fx\")") else {
        panic!("expected a runtime error");
    };
    assert!(err
        .message
        .starts_with("Failed to finish executing script \"broken.fx\"\n"));
    assert!(err.message.ends_with("Runtime Error: Division by zero"));
    let labels: Vec<_> = err.traceback.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(labels, vec!["<built-in function run>", "<program>"]);

    let Err(Error::Runtime(err)) = interpreter.run("main.fx", "run(\"nope.fx\")") else {
        panic!("expected a runtime error");
    };
    assert_eq!(err.message, "Failed to load script \"nope.fx\"\nfile not found");
}

#[test]
fn lexical_errors_point_at_the_character() {
    let Err(Error::Lex(err)) = fluxar_runtime::run("main.fx", "x = 12 @ 3") else {
        panic!("expected a lexical error");
    };
    assert_eq!(err.span.start.offset, 7);
    assert_eq!(
        err.to_string(),
        "Lexical Error: Illegal character '@'\n  File main.fx, line 1, column 8"
    );
}

#[test]
fn syntax_errors_stop_before_running() {
    let Err(Error::Syntax(err)) = fluxar_runtime::run("main.fx", "printf(1\nx = ") else {
        panic!("expected a syntax error");
    };
    assert_eq!(err.message, "Expected ')'");
}

#[test]
fn unbounded_results_are_errors() {
    for (source, message) in [
        ("\"ab\" * 10 ^ 300", "Resulting string is too long"),
        ("(0 - 8) ^ 0.5", "Power has no real result"),
        ("0 ^ (0 - 1)", "Division by zero"),
    ] {
        let (result, _) = run(source);
        let Err(Error::Runtime(err)) = result else {
            panic!("expected a runtime error for {source}");
        };
        assert_eq!(err.message, message);
    }
}

#[test]
fn self_containing_lists_print() {
    let source = "
a = [1]
table.insert(a, a)
b = [1]
table.insert(b, b)
printf(a)
printf(a == b)
printf(a == [1, [1]])
printret(a)
";
    let (result, printed) = run(source);
    assert_eq!(result.unwrap(), Value::str("[1, [...]]"));
    assert_eq!(printed, vec!["[1, [...]]", "1", "0"]);
}

#[test]
fn helper_functions_release_their_calls() {
    let source = "
func outer(n)
  func helper() -> n
  return helper()
end
for k = 0, 1000 do outer(k) end
";
    let (mut interpreter, _) = interpreter(&[]);
    interpreter.run("main.fx", source).unwrap();
    assert_eq!(interpreter.live_contexts(), 1);
}
