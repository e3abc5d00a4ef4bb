use super::BuiltinCall;
use crate::{
    error::RuntimeError,
    value::{NativeFunc, Value},
};

pub(super) static FUNCS: &[NativeFunc] = &[
    NativeFunc {
        name: "table.len",
        args: &["table"],
        body: len,
    },
    NativeFunc {
        name: "table.insert",
        args: &["list", "value"],
        body: insert,
    },
    NativeFunc {
        name: "table.remove",
        args: &["list", "index"],
        body: remove,
    },
    NativeFunc {
        name: "table.extend",
        args: &["listA", "listB"],
        body: extend,
    },
    NativeFunc {
        name: "table.clear",
        args: &["table"],
        body: clear,
    },
    NativeFunc {
        name: "table.concat",
        args: &["t", "sep", "i", "j"],
        body: concat,
    },
    NativeFunc {
        name: "table.find",
        args: &["haystack", "needle", "init"],
        body: find,
    },
];

fn len(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let items = call.list("table")?;
    let len = items.borrow().len();
    Ok(Value::Number(len as f64))
}

fn insert(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let items = call.list("list")?;
    let value = call.arg("value")?;
    items.borrow_mut().push(value);
    Ok(Value::NULL)
}

/// Takes out the element at a 0-based index and returns it
fn remove(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let items = call.list("list")?;
    let index = call.integer("index")?;
    let mut items = items.borrow_mut();
    if index < 0 || index as usize >= items.len() {
        return Err(call.fail(
            "Element at this index could not be removed from list because index is out of range",
        ));
    }
    let removed = items.remove(index as usize);
    Ok(removed)
}

fn extend(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let target = call.list("listA")?;
    // Copied first, `listB` may be the same list
    let extra = call.list("listB")?.borrow().clone();
    target.borrow_mut().extend(extra);
    Ok(Value::NULL)
}

fn clear(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    call.list("table")?.borrow_mut().clear();
    Ok(Value::NULL)
}

/// Joins the display forms of elements `i` through `j` (1-based, inclusive)
fn concat(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let items = call.list("t")?;
    let sep = call.arg("sep")?.to_string();
    let i = call.integer("i")?;
    let j = call.integer("j")?;
    let items = items.borrow();
    let len = items.len() as i64;
    if i < 1 || i > len || j < 1 {
        return Err(call.fail("Invalid range for table.concat()"));
    }
    let end = j.min(len);
    let joined = if end < i {
        String::default()
    } else {
        items[(i - 1) as usize..end as usize]
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(&sep)
    };
    Ok(Value::str(&joined))
}

/// 1-based position of the first element equal to `needle` at or after
/// `init`, or 0 when there is none
fn find(call: &mut BuiltinCall) -> Result<Value, RuntimeError> {
    let haystack = call.list("haystack")?;
    let needle = call.arg("needle")?;
    let init = call.integer("init")?;
    let haystack = haystack.borrow();
    if init < 1 || init > haystack.len() as i64 {
        return Err(call.fail("Invalid range for table.find()"));
    }
    let start = (init - 1) as usize;
    let position = haystack[start..]
        .iter()
        .position(|item| *item == needle)
        .map_or(0, |i| start + i + 1);
    Ok(Value::Number(position as f64))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{eval, eval_err};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn len_insert_and_clear_work_in_place() {
        assert_eq!(eval("t = [1, 2]; table.len(t)"), Value::Number(2.0));
        assert_eq!(
            eval("t = []; u = t; table.insert(u, 5); table.insert(u, \"x\"); t"),
            Value::list(vec![Value::Number(5.0), Value::str("x")])
        );
        assert_eq!(eval("t = [1, 2, 3]; table.clear(t); table.len(t)"), Value::Number(0.0));
    }

    #[test]
    fn remove_uses_zero_based_indices() {
        assert_eq!(eval("t = [10, 20, 30]; table.remove(t, 1)"), Value::Number(20.0));
        assert_eq!(
            eval("t = [10, 20, 30]; table.remove(t, 0); t"),
            Value::list(vec![Value::Number(20.0), Value::Number(30.0)])
        );
        assert_eq!(
            eval_err("table.remove([1], 1)"),
            "Element at this index could not be removed from list because index is out of range"
        );
        assert_eq!(
            eval_err("table.remove([1], 0.5)"),
            "Argument 'index' of table.remove() must be a whole number"
        );
    }

    #[test]
    fn extend_handles_aliasing() {
        assert_eq!(
            eval("a = [1]; table.extend(a, [2, 3]); a"),
            Value::list(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ])
        );
        assert_eq!(eval("a = [1, 2]; table.extend(a, a); table.len(a)"), Value::Number(4.0));
    }

    #[test]
    fn concat_joins_a_range() {
        assert_eq!(eval("table.concat([1, \"b\", 3], \"-\", 1, 3)"), Value::str("1-b-3"));
        assert_eq!(eval("table.concat([1, 2, 3, 4], \", \", 2, 3)"), Value::str("2, 3"));
        assert_eq!(eval("table.concat([1, 2], \"\", 1, 10)"), Value::str("12"));
        assert_eq!(eval("table.concat([1, 2, 3], \"\", 3, 1)"), Value::str(""));
        assert_eq!(
            eval_err("table.concat([1, 2], \",\", 0, 2)"),
            "Invalid range for table.concat()"
        );
        assert_eq!(
            eval_err("table.concat([1, 2], \",\", 3, 3)"),
            "Invalid range for table.concat()"
        );
        assert_eq!(
            eval_err("table.concat(1, \",\", 1, 1)"),
            "Argument 't' of table.concat() must be a list"
        );
    }

    #[test]
    fn find_returns_one_based_positions() {
        assert_eq!(eval("table.find([5, 6, 5], 5, 1)"), Value::Number(1.0));
        assert_eq!(eval("table.find([5, 6, 5], 5, 2)"), Value::Number(3.0));
        assert_eq!(eval("table.find([\"a\", \"b\"], \"b\", 1)"), Value::Number(2.0));
        assert_eq!(eval("table.find([5, 6], 7, 1)"), Value::Number(0.0));
        assert_eq!(
            eval_err("table.find([5, 6], 5, 3)"),
            "Invalid range for table.find()"
        );
    }
}
