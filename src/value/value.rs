use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable sequence. Cloning the handle aliases the contents.
pub type Array = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable mapping with insertion-ordered keys.
pub type Object = Rc<RefCell<IndexMap<String, Value>>>;

/// A dynamically typed value stored in a scope's property bag.
///
/// Scalars and strings compare by content. Arrays and objects are
/// reference types: cloning a `Value::Array` hands out another handle to the
/// same storage, so in-place mutation through one handle is visible through
/// every other. Use [`Value::snapshot`] for an independent deep copy.
///
/// Values are expected to be acyclic; [`Value::snapshot`] and
/// [`Value::deep_eq`] recurse through containers.
///
/// # Examples
///
/// ```
/// use dirtyscope::Value;
///
/// let list = Value::array([1, 2, 3]);
/// let alias = list.clone();
/// alias.push(4);
///
/// assert_eq!(list.len(), Some(4));
/// assert!(list.same(&alias));
/// ```
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Array),
    Object(Object),
}

impl Value {
    /// Build an array value from anything convertible into values.
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(Rc::new(RefCell::new(
            items.into_iter().map(Into::into).collect(),
        )))
    }

    /// Build an object value from key/value pairs.
    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(Rc::new(RefCell::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Number of elements (arrays), entries (objects) or chars (strings).
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(items.borrow().len()),
            Value::Object(entries) => Some(entries.borrow().len()),
            Value::String(s) => Some(s.chars().count()),
            _ => None,
        }
    }

    /// Element at `index`, or `Undefined` when out of range or not an array.
    pub fn index(&self, index: usize) -> Value {
        match self {
            Value::Array(items) => items.borrow().get(index).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Entry under `key`, or `Undefined` when absent or not an object.
    pub fn key(&self, key: &str) -> Value {
        match self {
            Value::Object(entries) => entries.borrow().get(key).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Append to an array in place. Returns `false` for non-arrays.
    pub fn push(&self, item: impl Into<Value>) -> bool {
        match self {
            Value::Array(items) => {
                items.borrow_mut().push(item.into());
                true
            }
            _ => false,
        }
    }

    /// Overwrite an array element in place, padding with `Undefined`.
    /// Returns `false` for non-arrays and for `usize::MAX`.
    pub fn set_index(&self, index: usize, item: impl Into<Value>) -> bool {
        match self {
            Value::Array(items) => {
                let Some(needed) = index.checked_add(1) else {
                    return false;
                };
                let mut items = items.borrow_mut();
                if needed > items.len() {
                    items.resize(needed, Value::Undefined);
                }
                items[index] = item.into();
                true
            }
            _ => false,
        }
    }

    /// Insert or overwrite an object entry in place.
    pub fn insert(&self, key: impl Into<String>, item: impl Into<Value>) -> bool {
        match self {
            Value::Object(entries) => {
                entries.borrow_mut().insert(key.into(), item.into());
                true
            }
            _ => false,
        }
    }

    /// Identity comparison: containers by reference, everything else by
    /// content, with `NaN` equal to itself.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Structural comparison through nested arrays and objects.
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, x)| b.get(k).is_some_and(|y| x.deep_eq(y)))
            }
            _ => self.same(other),
        }
    }

    /// Independent deep copy; later mutation of `self` does not leak into it.
    pub fn snapshot(&self) -> Value {
        match self {
            Value::Array(items) => Value::Array(Rc::new(RefCell::new(
                items.borrow().iter().map(Value::snapshot).collect(),
            ))),
            Value::Object(entries) => Value::Object(Rc::new(RefCell::new(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.snapshot()))
                    .collect(),
            ))),
            other => other.clone(),
        }
    }

    /// Convert into JSON. `Undefined` and non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) => {
                serde_json::Value::Array(items.borrow().iter().map(Value::to_json).collect())
            }
            Value::Object(entries) => serde_json::Value::Object(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Number(n) if n.is_nan() => f.write_str("NaN"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

from_integer!(i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::array(items),
            serde_json::Value::Object(entries) => Value::object(entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn containers_alias_on_clone() {
        let list = Value::array([1, 2, 3]);
        let alias = list.clone();
        alias.push(4);

        assert_eq!(list.len(), Some(4));
        assert!(list.same(&alias));
    }

    #[test]
    fn snapshot_is_independent() {
        let nested = Value::from(json!({"a": [1, 2], "b": {"c": true}}));
        let copy = nested.snapshot();

        nested.key("a").push(3);
        nested.key("b").insert("c", false);

        assert!(!copy.same(&nested));
        assert_eq!(copy.to_json(), json!({"a": [1.0, 2.0], "b": {"c": true}}));
        assert_ne!(copy, nested);
    }

    #[test]
    fn deep_eq_ignores_identity() {
        let a = Value::from(json!([1, {"x": "y"}]));
        let b = Value::from(json!([1, {"x": "y"}]));

        assert!(!a.same(&b));
        assert!(a.deep_eq(&b));
    }

    #[test]
    fn object_equality_ignores_key_order() {
        let a = Value::object([("a", 1), ("b", 2)]);
        let b = Value::object([("b", 2), ("a", 1)]);

        assert!(a.deep_eq(&b));
    }

    #[test]
    fn set_index_pads_with_undefined() {
        let list = Value::array(Vec::<Value>::new());
        assert!(list.set_index(2, "c"));

        assert_eq!(list.len(), Some(3));
        assert!(list.index(0).is_undefined());
        assert_eq!(list.index(2).as_str(), Some("c"));
    }

    #[test]
    fn set_index_rejects_the_last_usize() {
        let list = Value::array([1]);
        assert!(!list.set_index(usize::MAX, "x"));
        assert_eq!(list.len(), Some(1));
    }

    #[test]
    fn json_round_trip_keeps_shape() {
        let json = json!({"name": "Jane", "tags": ["a", "b"], "age": 42.0, "none": null});
        assert_eq!(Value::from(json.clone()).to_json(), json);
    }

    #[test]
    fn formatting() {
        assert_eq!(format!("{:?}", Value::Undefined), "undefined");
        assert_eq!(format!("{:?}", Value::Number(f64::NAN)), "NaN");
        assert_eq!(Value::from("plain").to_string(), "plain");
        assert_eq!(format!("{:?}", Value::array([1, 2])), "[1.0,2.0]");
    }
}
