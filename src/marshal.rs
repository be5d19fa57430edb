//! Marshal shims.
//!
//! One shim per signature shape. A shim pulls positional arguments out of a
//! decoded call array (index 0 is the function name), invokes the registered
//! [`NativeFn`] and packs the outcome into a reply object: `{"ret": ...}` on
//! success, `{"err_code": ..., "err_msg": ...}` on failure.
//!
//! Unlike the wire protocol's lineage, an argument whose JSON type does not
//! match the declared kind is a detected error (code 511) instead of a
//! silent zero/empty default.

use crate::error::RpcError;
use crate::native::NativeFn;
use crate::signature::{self, Signature};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// A reply object ready to be serialized onto the wire.
pub type ReplyObject = Map<String, Value>;

/// Type-erased adapter for one signature shape.
pub type MarshalShim = fn(&NativeFn, &[Value]) -> ReplyObject;

pub(crate) fn ret_reply(ret: Value) -> ReplyObject {
    let mut obj = Map::new();
    obj.insert("ret".to_owned(), ret);
    obj
}

pub(crate) fn err_reply(err: &RpcError) -> ReplyObject {
    let mut obj = Map::new();
    obj.insert("err_code".to_owned(), Value::from(err.code));
    obj.insert("err_msg".to_owned(), Value::from(err.message.as_str()));
    obj
}

fn shape_mismatch(func: &NativeFn) -> ReplyObject {
    err_reply(&RpcError::bad_call(format!(
        "function registered under a signature that does not match its shape {}",
        func.shape()
    )))
}

fn arg_str<'a>(params: &'a [Value], idx: usize) -> Result<Option<&'a str>, RpcError> {
    match params.get(idx) {
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Null) => Ok(None),
        Some(other) => Err(RpcError::bad_call(format!(
            "argument {idx} is not a string: {other}"
        ))),
        None => Err(RpcError::bad_call(format!("argument {idx} is missing"))),
    }
}

fn arg_int(params: &[Value], idx: usize) -> Result<i32, RpcError> {
    let n = match params.get(idx) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(other) => {
            return Err(RpcError::bad_call(format!(
                "argument {idx} is not an integer: {other}"
            )))
        }
        None => return Err(RpcError::bad_call(format!("argument {idx} is missing"))),
    };
    n.and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| RpcError::bad_call(format!("argument {idx} is out of range")))
}

fn pack_int(ret: i32) -> Value {
    Value::from(ret)
}

fn pack_int64(ret: i64) -> Value {
    Value::from(ret)
}

fn pack_string(ret: Option<String>) -> Value {
    match ret {
        Some(s) => Value::from(s),
        None => Value::Null,
    }
}

fn pack_object(ret: Option<Value>) -> Value {
    ret.unwrap_or(Value::Null)
}

// An absent list and an empty list both encode as null; the client decodes
// null back to an empty list.
fn pack_objlist(ret: Option<Vec<Value>>) -> Value {
    match ret {
        Some(objs) if !objs.is_empty() => Value::Array(objs),
        _ => Value::Null,
    }
}

fn pack_json(ret: Value) -> Value {
    ret
}

macro_rules! shim {
    ($name:ident, $variant:ident, $pack:ident $(, $extract:ident($idx:literal))*) => {
        fn $name(func: &NativeFn, params: &[Value]) -> ReplyObject {
            let NativeFn::$variant(f) = func else {
                return shape_mismatch(func);
            };
            let out = (|| -> Result<Value, RpcError> {
                Ok($pack(f($($extract(params, $idx)?),*)?))
            })();
            match out {
                Ok(ret) => ret_reply(ret),
                Err(err) => err_reply(&err),
            }
        }
    };
}

shim!(shim_int__void, IntVoid, pack_int);
shim!(shim_int__string, IntString, pack_int, arg_str(1));
shim!(shim_int__string_string, IntStringString, pack_int, arg_str(1), arg_str(2));
shim!(shim_int64__void, Int64Void, pack_int64);
shim!(shim_int64__string, Int64String, pack_int64, arg_str(1));
shim!(shim_string__void, StringVoid, pack_string);
shim!(shim_string__string, StringString, pack_string, arg_str(1));
shim!(shim_string__string_int, StringStringInt, pack_string, arg_str(1), arg_int(2));
shim!(shim_object__void, ObjectVoid, pack_object);
shim!(shim_object__string, ObjectString, pack_object, arg_str(1));
shim!(shim_objlist__void, ObjlistVoid, pack_objlist);
shim!(shim_objlist__string, ObjlistString, pack_objlist, arg_str(1));
shim!(shim_objlist__int_int, ObjlistIntInt, pack_objlist, arg_int(1), arg_int(2));
shim!(shim_objlist__string_int, ObjlistStringInt, pack_objlist, arg_str(1), arg_int(2));
shim!(shim_objlist__string_int_int, ObjlistStringIntInt, pack_objlist, arg_str(1), arg_int(2), arg_int(3));
shim!(shim_objlist__string_string_int, ObjlistStringStringInt, pack_objlist, arg_str(1), arg_str(2), arg_int(3));
shim!(shim_json__void, JsonVoid, pack_json);
shim!(shim_json__string, JsonString, pack_json, arg_str(1));

/// Maps a [`Signature`] to the shim that marshals calls of that shape.
///
/// The built-in set is closed and registered once at server construction;
/// duplicate registrations keep the first entry.
#[derive(Default)]
pub struct MarshalTable {
    shims: HashMap<Signature, MarshalShim>,
}

impl MarshalTable {
    pub fn with_builtins() -> Self {
        let builtins: [(Signature, MarshalShim); 18] = [
            (signature::int__void(), shim_int__void),
            (signature::int__string(), shim_int__string),
            (signature::int__string_string(), shim_int__string_string),
            (signature::int64__void(), shim_int64__void),
            (signature::int64__string(), shim_int64__string),
            (signature::string__void(), shim_string__void),
            (signature::string__string(), shim_string__string),
            (signature::string__string_int(), shim_string__string_int),
            (signature::object__void(), shim_object__void),
            (signature::object__string(), shim_object__string),
            (signature::objlist__void(), shim_objlist__void),
            (signature::objlist__string(), shim_objlist__string),
            (signature::objlist__int_int(), shim_objlist__int_int),
            (signature::objlist__string_int(), shim_objlist__string_int),
            (signature::objlist__string_int_int(), shim_objlist__string_int_int),
            (
                signature::objlist__string_string_int(),
                shim_objlist__string_string_int,
            ),
            (signature::json__void(), shim_json__void),
            (signature::json__string(), shim_json__string),
        ];

        let mut table = Self::default();
        for (sig, shim) in builtins {
            table.register(sig, shim);
        }
        table
    }

    /// Registers a shim for a signature. Returns false and keeps the first
    /// registration if the signature is already present.
    pub fn register(&mut self, signature: Signature, shim: MarshalShim) -> bool {
        if self.shims.contains_key(&signature) {
            warn!(%signature, "cannot register duplicate marshal");
            return false;
        }
        self.shims.insert(signature, shim);
        true
    }

    pub fn lookup(&self, signature: &Signature) -> Option<MarshalShim> {
        self.shims.get(signature).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EC_BAD_CALL;
    use serde_json::json;

    fn strlen_fn() -> NativeFn {
        NativeFn::IntString(Box::new(|s| Ok(s.map_or(0, |s| s.len() as i32))))
    }

    #[test]
    fn int_from_string_happy_path() {
        let func = strlen_fn();
        let reply = shim_int__string(&func, &[json!("strlen"), json!("hello")]);
        assert_eq!(reply.get("ret"), Some(&json!(5)));
        assert!(!reply.contains_key("err_code"));
    }

    #[test]
    fn null_string_argument_passes_as_none() {
        let func = strlen_fn();
        let reply = shim_int__string(&func, &[json!("strlen"), Value::Null]);
        assert_eq!(reply.get("ret"), Some(&json!(0)));
    }

    #[test]
    fn wrong_argument_type_is_a_511_reply() {
        let func = strlen_fn();
        let reply = shim_int__string(&func, &[json!("strlen"), json!(42)]);
        assert_eq!(reply.get("err_code"), Some(&json!(EC_BAD_CALL)));
        assert!(reply.get("err_msg").is_some());
        assert!(!reply.contains_key("ret"));
    }

    #[test]
    fn missing_argument_is_a_511_reply() {
        let func = strlen_fn();
        let reply = shim_int__string(&func, &[json!("strlen")]);
        assert_eq!(reply.get("err_code"), Some(&json!(EC_BAD_CALL)));
    }

    #[test]
    fn shape_mismatch_is_a_511_reply() {
        let func = strlen_fn();
        let reply = shim_string__string(&func, &[json!("strlen"), json!("x")]);
        assert_eq!(reply.get("err_code"), Some(&json!(EC_BAD_CALL)));
    }

    #[test]
    fn duplicate_registration_keeps_the_first() {
        let mut table = MarshalTable::with_builtins();
        assert!(!table.register(signature::int__string(), shim_string__string));
        let shim = table.lookup(&signature::int__string()).unwrap();
        let reply = shim(&strlen_fn(), &[json!("strlen"), json!("abc")]);
        assert_eq!(reply.get("ret"), Some(&json!(3)));
    }

    #[test]
    fn empty_objlist_encodes_as_null() {
        assert_eq!(pack_objlist(Some(vec![])), Value::Null);
        assert_eq!(pack_objlist(None), Value::Null);
        assert_eq!(pack_objlist(Some(vec![json!({"a": 1})])), json!([{"a": 1}]));
    }
}
