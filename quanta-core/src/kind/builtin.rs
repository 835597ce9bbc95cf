//! Built-in plugins for JSON-valued cells.
//!
//! These give `Cell<serde_json::Value>` the usual collection helpers. Every
//! mutating method rebuilds the value and writes it back through
//! [`Cell::set`], so pipes, dedup and listeners all apply.

use serde_json::{Map, Value};

use crate::cell::Cell;
use crate::error::{Error, Result};

use super::catalog::Kinds;
use super::plugin::Plugin;

/// Name the built-in array kind is installed under.
pub const ARRAY: &str = "array";
/// Name the built-in object kind is installed under.
pub const OBJECT: &str = "object";
/// Name the built-in toggle kind is installed under.
pub const TOGGLE: &str = "toggle";

fn shape(value: Option<&Value>) -> &'static str {
    match value {
        None => "empty",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

fn mismatch(method: &str, expected: &'static str, found: Option<&Value>) -> Error {
    Error::TypeMismatch {
        method: method.to_string(),
        expected,
        found: shape(found),
    }
}

fn expect_array(cell: &Cell<Value>, method: &str) -> Result<Vec<Value>> {
    match cell.value() {
        Some(Value::Array(items)) => Ok(items),
        other => Err(mismatch(method, "an array", other.as_ref())),
    }
}

fn expect_object(cell: &Cell<Value>, method: &str) -> Result<Map<String, Value>> {
    match cell.value() {
        Some(Value::Object(map)) => Ok(map),
        other => Err(mismatch(method, "an object", other.as_ref())),
    }
}

fn key_arg<'a>(args: &'a [Value], method: &str) -> Result<&'a str> {
    args.first()
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidArgument {
            method: method.to_string(),
            reason: "first argument must be a string key".to_string(),
        })
}

/// `push`, `pop`, `clear` and a `len` property for array values.
pub fn array() -> Plugin<Value> {
    Plugin::new(ARRAY)
        .method("push", |cell, args| {
            let mut items = expect_array(cell, "push")?;
            items.extend(args.iter().cloned());
            let len = items.len();
            cell.set(Value::Array(items));
            Ok(Value::from(len))
        })
        .method("pop", |cell, _| {
            let mut items = expect_array(cell, "pop")?;
            let popped = items.pop().unwrap_or(Value::Null);
            cell.set(Value::Array(items));
            Ok(popped)
        })
        .method("clear", |cell, _| {
            expect_array(cell, "clear")?;
            cell.set(Value::Array(Vec::new()));
            Ok(Value::Null)
        })
        .property("len", |cell| {
            cell.with(|value| match value {
                Some(Value::Array(items)) => Value::from(items.len()),
                _ => Value::Null,
            })
        })
}

/// `set`, `get`, `remove` and a `keys` property for object values.
pub fn object() -> Plugin<Value> {
    Plugin::new(OBJECT)
        .method("set", |cell, args| {
            let mut map = expect_object(cell, "set")?;
            let key = key_arg(args, "set")?;
            let value = args.get(1).cloned().unwrap_or(Value::Null);
            let previous = map.insert(key.to_string(), value);
            cell.set(Value::Object(map));
            Ok(previous.unwrap_or(Value::Null))
        })
        .method("get", |cell, args| {
            let map = expect_object(cell, "get")?;
            let key = key_arg(args, "get")?;
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        })
        .method("remove", |cell, args| {
            let mut map = expect_object(cell, "remove")?;
            let key = key_arg(args, "remove")?;
            let removed = map.remove(key);
            if removed.is_some() {
                cell.set(Value::Object(map));
            }
            Ok(removed.unwrap_or(Value::Null))
        })
        .property("keys", |cell| {
            cell.with(|value| match value {
                Some(Value::Object(map)) => {
                    Value::Array(map.keys().cloned().map(Value::String).collect())
                }
                _ => Value::Null,
            })
        })
}

/// `toggle` for boolean values.
pub fn toggle() -> Plugin<Value> {
    Plugin::new(TOGGLE).method("toggle", |cell, _| match cell.value() {
        Some(Value::Bool(flag)) => {
            cell.set(Value::Bool(!flag));
            Ok(Value::Bool(!flag))
        }
        other => Err(mismatch("toggle", "a boolean", other.as_ref())),
    })
}

/// Define the `array`, `object` and `toggle` kinds on a catalog.
pub fn install(kinds: &Kinds<Value>) -> Result<()> {
    kinds.setup_nuclear_kinds([
        (ARRAY, vec![array()]),
        (OBJECT, vec![object()]),
        (TOGGLE, vec![toggle()]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellOptions;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn cell_of(kinds: &Kinds<Value>, selector: &str, value: Value) -> Cell<Value> {
        let registry = kinds.registry_for_kind(selector).unwrap();
        Cell::with_options(CellOptions::new().kind(registry).value(value))
    }

    fn installed() -> Kinds<Value> {
        let kinds = Kinds::new();
        install(&kinds).unwrap();
        kinds
    }

    #[test]
    fn push_and_pop_write_through() {
        let kinds = installed();
        let list = cell_of(&kinds, "array", json!([1]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        list.up(move |v, _| seen_clone.lock().push(v.clone()));

        assert_eq!(list.call("push", &[json!(2), json!(3)]).unwrap(), json!(3));
        assert_eq!(list.prop("len").unwrap(), json!(3));
        assert_eq!(list.call("pop", &[]).unwrap(), json!(3));
        assert_eq!(list.value(), Some(json!([1, 2])));

        assert_eq!(
            *seen.lock(),
            vec![json!([1]), json!([1, 2, 3]), json!([1, 2])]
        );
    }

    #[test]
    fn pop_on_empty_array_returns_null() {
        let kinds = installed();
        let list = cell_of(&kinds, "array", json!([]));
        assert_eq!(list.call("pop", &[]).unwrap(), Value::Null);
        list.call("push", &[json!("a")]).unwrap();
        list.call("clear", &[]).unwrap();
        assert_eq!(list.value(), Some(json!([])));
    }

    #[test]
    fn array_methods_reject_other_shapes() {
        let kinds = installed();
        let not_a_list = cell_of(&kinds, "array", json!(5));
        match not_a_list.call("push", &[json!(1)]) {
            Err(Error::TypeMismatch {
                method,
                expected,
                found,
            }) => {
                assert_eq!(method, "push");
                assert_eq!(expected, "an array");
                assert_eq!(found, "number");
            }
            other => panic!("expected type mismatch, got {other:?}"),
        }
        assert_eq!(not_a_list.value(), Some(json!(5)));
    }

    #[test]
    fn object_methods() {
        let kinds = installed();
        let user = cell_of(&kinds, "object", json!({"name": "ada"}));

        assert_eq!(user.call("set", &[json!("age"), json!(36)]).unwrap(), Value::Null);
        assert_eq!(user.call("get", &[json!("age")]).unwrap(), json!(36));
        assert_eq!(user.prop("keys").unwrap(), json!(["age", "name"]));
        assert_eq!(user.call("remove", &[json!("name")]).unwrap(), json!("ada"));
        assert_eq!(user.value(), Some(json!({"age": 36})));
    }

    #[test]
    fn object_methods_validate_arguments_and_shape() {
        let kinds = installed();
        let user = cell_of(&kinds, "object", json!({}));
        assert!(matches!(
            user.call("set", &[json!(1)]),
            Err(Error::InvalidArgument { .. })
        ));

        let list = cell_of(&kinds, "object", json!([]));
        assert!(matches!(
            list.call("get", &[json!("k")]),
            Err(Error::TypeMismatch { found: "array", .. })
        ));
    }

    #[test]
    fn empty_cell_reports_empty_shape() {
        let kinds = installed();
        let registry = kinds.registry_for_kind("toggle").unwrap();
        let flag: Cell<Value> = Cell::with_options(CellOptions::new().kind(registry));
        assert!(matches!(
            flag.call("toggle", &[]),
            Err(Error::TypeMismatch { found: "empty", .. })
        ));
        flag.set(json!(false));
        assert_eq!(flag.call("toggle", &[]).unwrap(), json!(true));
        assert_eq!(flag.value(), Some(json!(true)));
    }

    #[test]
    fn combined_builtin_kinds_share_a_prototype() {
        let kinds = installed();
        let registry = kinds.registry_for_kind("array toggle").unwrap();
        let names: Vec<_> = registry.prototype().method_names().collect();
        assert_eq!(names, vec!["push", "pop", "clear", "toggle"]);
    }
}
