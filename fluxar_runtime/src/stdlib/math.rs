use rand::{rngs::StdRng, Rng, SeedableRng};

use super::BuiltinCall;
use crate::{
    error::RuntimeError,
    noise,
    value::{self, NativeFunc, Value},
};

macro_rules! native {
    ($($name:literal [$($arg:literal),*] => $body:ident),* $(,)?) => {
        pub(super) static FUNCS: &[NativeFunc] = &[
            $(NativeFunc {
                name: $name,
                args: &[$($arg),*],
                body: $body,
            }),*
        ];
    };
}

native! {
    "math.abs" ["value"] => abs,
    "math.acos" ["value"] => acos,
    "math.asin" ["value"] => asin,
    "math.atan" ["value"] => atan,
    "math.atan2" ["y", "x"] => atan2,
    "math.ceil" ["value"] => ceil,
    "math.clamp" ["value", "min", "max"] => clamp,
    "math.cos" ["value"] => cos,
    "math.cosh" ["value"] => cosh,
    "math.deg" ["value"] => deg,
    "math.exp" ["value"] => exp,
    "math.floor" ["value"] => floor,
    "math.fmod" ["x", "y"] => fmod,
    "math.frexp" ["value"] => frexp,
    "math.ldexp" ["value", "e"] => ldexp,
    "math.log" ["value", "base"] => log,
    "math.log10" ["value"] => log10,
    "math.max" ["args"] => max,
    "math.min" ["args"] => min,
    "math.modf" ["value"] => modf,
    "math.noise" ["x", "y"] => perlin,
    "math.pow" ["x", "y"] => pow,
    "math.rad" ["value"] => rad,
    "math.random" ["min", "max"] => random,
    "math.randomseed" ["value"] => randomseed,
    "math.round" ["value"] => round,
    "math.sign" ["value"] => sign,
    "math.sin" ["value"] => sin,
    "math.sinh" ["value"] => sinh,
    "math.sqrt" ["value"] => sqrt,
    "math.tan" ["value"] => tan,
    "math.tanh" ["value"] => tanh,
}

/// Built-ins that map their single `value` argument through an `f64` function
macro_rules! unary {
    ($($name:ident => $f:expr),* $(,)?) => {
        $(fn $name(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
            let f: fn(f64) -> f64 = $f;
            Ok(Value::Number(f(call.number("value")?)))
        })*
    };
}

unary! {
    abs => f64::abs,
    atan => f64::atan,
    ceil => f64::ceil,
    cos => f64::cos,
    cosh => f64::cosh,
    deg => f64::to_degrees,
    exp => f64::exp,
    floor => f64::floor,
    rad => f64::to_radians,
    round => f64::round_ties_even,
    // Zero keeps its sign bit, so the result is never 0
    sign => |x| 1f64.copysign(x),
    sin => f64::sin,
    sinh => f64::sinh,
    tan => f64::tan,
    tanh => f64::tanh,
}

fn acos(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let x = unit_interval(call)?;
    Ok(Value::Number(x.acos()))
}

fn asin(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let x = unit_interval(call)?;
    Ok(Value::Number(x.asin()))
}

fn unit_interval(call: &BuiltinCall) -> Result<f64, RuntimeError> {
    let x = call.number("value")?;
    if !(-1.0..=1.0).contains(&x) {
        return Err(call.fail(format!(
            "Argument of {}() must be between -1 and 1",
            call.name()
        )));
    }
    Ok(x)
}

fn atan2(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let y = call.number("y")?;
    let x = call.number("x")?;
    Ok(Value::Number(y.atan2(x)))
}

fn clamp(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let value = call.number("value")?;
    let min = call.number("min")?;
    let max = call.number("max")?;
    Ok(Value::Number(value.min(max).max(min)))
}

fn fmod(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let x = call.number("x")?;
    let y = call.number("y")?;
    if y == 0.0 {
        return Err(call.fail("Division by zero in math.fmod()"));
    }
    Ok(Value::Number(x % y))
}

/// Splits `value` into `[mantissa, exponent]` with the mantissa in [0.5, 1)
fn frexp(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let (mantissa, exponent) = split_exponent(call.number("value")?);
    Ok(Value::list(vec![
        Value::Number(mantissa),
        Value::Number(exponent as f64),
    ]))
}

fn split_exponent(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // Subnormal: scale into the normal range first
        let (mantissa, exponent) = split_exponent(x * 2f64.powi(54));
        return (mantissa, exponent - 54);
    }
    let mantissa = f64::from_bits((bits & !(0x7ff << 52)) | (1022 << 52));
    (mantissa, biased - 1022)
}

fn ldexp(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let value = call.number("value")?;
    let e = call.number("e")?.trunc();
    let e = e.clamp(i32::MIN as f64, i32::MAX as f64) as i32;
    Ok(Value::Number(value * 2f64.powi(e)))
}

fn log(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let value = call.number("value")?;
    let base = call.number("base")?;
    if value <= 0.0 || base <= 0.0 || base == 1.0 {
        return Err(call.fail("Invalid argument(s) in math.log()"));
    }
    Ok(Value::Number(value.ln() / base.ln()))
}

fn log10(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let value = call.number("value")?;
    if value <= 0.0 {
        return Err(call.fail("Invalid argument in math.log10()"));
    }
    Ok(Value::Number(value.log10()))
}

fn max(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let numbers = numbers(call)?;
    Ok(Value::Number(numbers.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}

fn min(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let numbers = numbers(call)?;
    Ok(Value::Number(numbers.into_iter().fold(f64::INFINITY, f64::min)))
}

/// The non-empty list of numbers taken by `math.max` and `math.min`
fn numbers(call: &BuiltinCall) -> Result<Vec<f64>, RuntimeError> {
    let items = call.list("args")?;
    let items = items.borrow();
    if items.is_empty() {
        return Err(call.fail(format!(
            "{}() cannot be called with an empty list",
            call.name()
        )));
    }
    let numbers = items
        .iter()
        .map(|item| match item {
            Value::Number(n) => Ok(*n),
            _ => Err(call.arg_type("args", "list of numbers")),
        })
        .collect();
    numbers
}

fn modf(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let x = call.number("value")?;
    let whole = x.floor();
    Ok(Value::list(vec![Value::Number(whole), Value::Number(x - whole)]))
}

fn perlin(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let x = call.number("x")?;
    let y = call.number("y")?;
    Ok(Value::Number(noise::perlin(x, y)))
}

fn pow(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let x = call.number("x")?;
    let y = call.number("y")?;
    let result = value::power(x, y).map_err(|msg| call.error(msg))?;
    Ok(Value::Number(result))
}

/// Whole number drawn uniformly from `min..=max`, both truncated first
fn random(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let min = call.number("min")?.trunc() as i64;
    let max = call.number("max")?.trunc() as i64;
    if min > max {
        return Err(call.fail(
            "min value cannot be greater than max value in math.random()",
        ));
    }
    let n = call.interpreter.rng.gen_range(min..=max);
    Ok(Value::Number(n as f64))
}

fn randomseed(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let seed = call.number("value")?;
    call.interpreter.rng = StdRng::seed_from_u64(seed.to_bits());
    Ok(Value::NULL)
}

fn sqrt(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let x = call.number("value")?;
    if x < 0.0 {
        return Err(call.fail("Argument of math.sqrt() must be a non-negative number"));
    }
    Ok(Value::Number(x.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{eval, eval_err};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn number(source: &str) -> f64 {
        match eval(source) {
            Value::Number(n) => n,
            other => panic!("expected a number, got {other}"),
        }
    }

    fn numbers(source: &str) -> Vec<f64> {
        match eval(source) {
            Value::List(items) => items
                .borrow()
                .iter()
                .map(|item| match item {
                    Value::Number(n) => *n,
                    other => panic!("expected a number, got {other}"),
                })
                .collect(),
            other => panic!("expected a list, got {other}"),
        }
    }

    #[test]
    fn simple_functions() {
        assert_eq!(number("math.abs(-3)"), 3.0);
        assert_eq!(number("math.floor(2.7)"), 2.0);
        assert_eq!(number("math.ceil(2.1)"), 3.0);
        assert!((number("math.deg(math.pi)") - 180.0).abs() < 1e-9);
        assert_eq!(number("math.atan2(0, 1)"), 0.0);
        assert_eq!(number("math.pow(2, 10)"), 1024.0);
        assert_eq!(number("math.clamp(15, 0, 10)"), 10.0);
        assert_eq!(number("math.clamp(-5, 0, 10)"), 0.0);
        assert_eq!(number("math.fmod(-7, 3)"), -1.0);
        assert!((number("math.log(8, 2)") - 3.0).abs() < 1e-12);
        assert_eq!(number("math.log10(1000)"), 3.0);
    }

    #[test]
    fn sign_is_never_zero() {
        assert_eq!(number("math.sign(-3)"), -1.0);
        assert_eq!(number("math.sign(0)"), 1.0);
        assert_eq!(number("math.sign(7)"), 1.0);
    }

    #[test]
    fn round_half_to_even() {
        assert_eq!(number("math.round(2.5)"), 2.0);
        assert_eq!(number("math.round(3.5)"), 4.0);
        assert_eq!(number("math.round(-1.6)"), -2.0);
    }

    #[test]
    fn list_results() {
        assert_eq!(numbers("math.frexp(8)"), vec![0.5, 4.0]);
        assert_eq!(numbers("math.frexp(0)"), vec![0.0, 0.0]);
        assert_eq!(numbers("math.frexp(-3)"), vec![-0.75, 2.0]);
        assert_eq!(numbers("math.modf(-1.5)"), vec![-2.0, 0.5]);
        assert_eq!(number("math.ldexp(0.75, 2)"), 3.0);
    }

    #[test]
    fn max_and_min() {
        assert_eq!(number("math.max([3, 9, 2])"), 9.0);
        assert_eq!(number("math.min([3, 9, -2])"), -2.0);
        assert_eq!(
            eval_err("math.max([])"),
            "math.max() cannot be called with an empty list"
        );
        assert_eq!(
            eval_err("math.min([1, \"a\"])"),
            "Argument 'args' of math.min() must be a list of numbers"
        );
    }

    #[test]
    fn domain_errors() {
        assert_eq!(
            eval_err("math.sqrt(-1)"),
            "Argument of math.sqrt() must be a non-negative number"
        );
        assert_eq!(
            eval_err("math.acos(2)"),
            "Argument of math.acos() must be between -1 and 1"
        );
        assert_eq!(
            eval_err("math.asin(-1.5)"),
            "Argument of math.asin() must be between -1 and 1"
        );
        assert_eq!(eval_err("math.log(8, 1)"), "Invalid argument(s) in math.log()");
        assert_eq!(eval_err("math.log10(0)"), "Invalid argument in math.log10()");
        assert_eq!(eval_err("math.fmod(1, 0)"), "Division by zero in math.fmod()");
        assert_eq!(eval_err("math.pow(-8, 0.5)"), "Power has no real result");
        assert_eq!(eval_err("math.pow(0, -1)"), "Division by zero");
    }

    #[test]
    fn random_is_inclusive_and_seedable() {
        assert_eq!(number("math.random(5, 5)"), 5.0);
        let n = number("math.random(1, 3)");
        assert!((1.0..=3.0).contains(&n) && n.fract() == 0.0);
        assert_eq!(
            number(
                "math.randomseed(42); a = math.random(1, 1000000)\n\
                 math.randomseed(42); b = math.random(1, 1000000)\n\
                 a == b"
            ),
            1.0
        );
        assert_eq!(
            eval_err("math.random(3, 1)"),
            "min value cannot be greater than max value in math.random()"
        );
    }

    #[test]
    fn noise_is_zero_on_lattice_points() {
        assert_eq!(number("math.noise(0, 0)"), 0.0);
        assert_eq!(number("math.noise(2, 3)"), 0.0);
    }
}
