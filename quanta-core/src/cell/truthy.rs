//! Truthiness, as used by the `alive` fusion strategy.
//!
//! The rules mirror dynamic-language truthiness: zero, NaN, `false`, the
//! empty string and null-like values are falsy. Collections are truthy even
//! when empty.

use serde_json::Value;

/// A value that can be tested for truthiness.
pub trait Truthy {
    /// Whether the value counts as "present" for `alive` fusions.
    fn is_truthy(&self) -> bool;
}

macro_rules! impl_truthy_int {
    ($($ty:ty),*) => {
        $(impl Truthy for $ty {
            fn is_truthy(&self) -> bool {
                *self != 0
            }
        })*
    };
}

impl_truthy_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Truthy for f32 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for &'static str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for () {
    fn is_truthy(&self) -> bool {
        false
    }
}

impl<T: Truthy> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().is_some_and(Truthy::is_truthy)
    }
}

impl<T> Truthy for Vec<T> {
    fn is_truthy(&self) -> bool {
        true
    }
}

impl<T: Truthy + ?Sized> Truthy for std::sync::Arc<T> {
    fn is_truthy(&self) -> bool {
        (**self).is_truthy()
    }
}

impl Truthy for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers() {
        assert!(!0.is_truthy());
        assert!(3.is_truthy());
        assert!(!0.0f64.is_truthy());
        assert!(!f64::NAN.is_truthy());
        assert!((-1i64).is_truthy());
    }

    #[test]
    fn strings_and_options() {
        assert!(!String::new().is_truthy());
        assert!("x".to_string().is_truthy());
        assert!(!None::<i32>.is_truthy());
        assert!(!Some(0).is_truthy());
        assert!(Some(1).is_truthy());
    }

    #[test]
    fn json_values() {
        assert!(!json!(null).is_truthy());
        assert!(!json!(false).is_truthy());
        assert!(!json!(0).is_truthy());
        assert!(!json!("").is_truthy());
        assert!(json!([]).is_truthy());
        assert!(json!({}).is_truthy());
        assert!(json!(0.5).is_truthy());
    }
}
