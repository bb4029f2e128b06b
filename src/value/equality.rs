use super::Value;

/// How a watcher decides whether its value changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparison {
    /// Identity: containers are equal only if they are the same container.
    /// `NaN` is equal to `NaN` so digests can settle on it.
    #[default]
    Reference,
    /// Structural equality through nested arrays and objects. The cached
    /// value is stored as a snapshot.
    Deep,
}

impl Comparison {
    /// The copy a watcher keeps as its last observed value.
    pub(crate) fn capture(self, value: &Value) -> Value {
        match self {
            Comparison::Reference => value.clone(),
            Comparison::Deep => value.snapshot(),
        }
    }
}

impl From<bool> for Comparison {
    fn from(deep: bool) -> Self {
        if deep {
            Comparison::Deep
        } else {
            Comparison::Reference
        }
    }
}

/// Compare two values under the given strategy.
pub fn equal(a: &Value, b: &Value, comparison: Comparison) -> bool {
    match comparison {
        Comparison::Reference => a.same(b),
        Comparison::Deep => a.deep_eq(b),
    }
}
