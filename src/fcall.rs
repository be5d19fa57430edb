//! Call-envelope encoding.
//!
//! A call is the JSON array `[fname, arg1, ..., argn]`, positional, compact.
//! The argument vocabulary is a closed set ([`ArgValue`] is sealed) and the
//! supported arities are the tuple impls below; a new parameter shape means
//! a new impl, not a generic variadic encoder.

use serde_json::Value;

mod sealed {
    pub trait Sealed {}
}

/// A value that can appear as a positional call argument.
pub trait ArgValue: sealed::Sealed {
    fn to_value(&self) -> Value;
}

macro_rules! impl_arg_value {
    ($ty:ty, $self_:ident => $expr:expr) => {
        impl sealed::Sealed for $ty {}
        impl ArgValue for $ty {
            fn to_value(&$self_) -> Value {
                $expr
            }
        }
    };
}

impl_arg_value!(i32, self => Value::from(*self));
impl_arg_value!(i64, self => Value::from(*self));
impl_arg_value!(&str, self => Value::from(*self));
impl_arg_value!(String, self => Value::from(self.as_str()));
impl_arg_value!(Option<&str>, self => match self {
    Some(s) => Value::from(*s),
    None => Value::Null,
});

/// One positional-argument shape: a tuple of [`ArgValue`]s, arity 0 to 3.
pub trait CallArgs {
    fn append_to(&self, out: &mut Vec<Value>);
}

impl CallArgs for () {
    fn append_to(&self, _out: &mut Vec<Value>) {}
}

impl<A: ArgValue> CallArgs for (A,) {
    fn append_to(&self, out: &mut Vec<Value>) {
        out.push(self.0.to_value());
    }
}

impl<A: ArgValue, B: ArgValue> CallArgs for (A, B) {
    fn append_to(&self, out: &mut Vec<Value>) {
        out.push(self.0.to_value());
        out.push(self.1.to_value());
    }
}

impl<A: ArgValue, B: ArgValue, C: ArgValue> CallArgs for (A, B, C) {
    fn append_to(&self, out: &mut Vec<Value>) {
        out.push(self.0.to_value());
        out.push(self.1.to_value());
        out.push(self.2.to_value());
    }
}

/// Builds the serialized call envelope for `fname` with `args`.
pub fn fcall(fname: &str, args: impl CallArgs) -> Vec<u8> {
    let mut elems = vec![Value::from(fname)];
    args.append_to(&mut elems);
    Value::Array(elems).to_string().into_bytes()
}
