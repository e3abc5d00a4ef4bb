pub mod context;
pub mod error;
pub mod host;
pub mod interpret;
pub mod noise;
pub mod stdlib;
pub mod value;

pub use error::Error;
pub use interpret::Interpreter;
pub use value::Value;

/// Runs `source` to completion on a fresh interpreter with the standard
/// library and a terminal host, returning the value of the last statement
pub fn run(source_name: &str, source: &str) -> Result<Value, Error> {
    Interpreter::new(stdlib::globals()).run(source_name, source)
}
