//! Reply-envelope decoding.
//!
//! One decoder per result kind. The caller selects the decoder at the call
//! site; the reply bytes do not describe which kind they carry. All
//! decoders share [`handle_ret_common`]: parse, require an object, and
//! raise `err_code`/`err_msg` as an [`RpcError`] before any `ret` read.

use crate::error::{RpcError, EC_BAD_OBJ_LIST};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub(crate) fn handle_ret_common(data: &[u8]) -> Result<Map<String, Value>, RpcError> {
    let root: Value = serde_json::from_slice(data)
        .map_err(|e| RpcError::bad_reply(format!("failed to parse RPC reply: {e}")))?;
    let Value::Object(obj) = root else {
        return Err(RpcError::bad_reply("Invalid data: not an object"));
    };
    if let Some(code) = obj.get("err_code") {
        let code = code.as_i64().unwrap_or(0) as i32;
        let message = obj
            .get("err_msg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        return Err(RpcError::new(code, message));
    }
    Ok(obj)
}

pub fn fret_int(data: &[u8]) -> Result<i32, RpcError> {
    let obj = handle_ret_common(data)?;
    obj.get("ret")
        .and_then(Value::as_i64)
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| RpcError::bad_reply("Invalid data: ret is not an int"))
}

pub fn fret_int64(data: &[u8]) -> Result<i64, RpcError> {
    let obj = handle_ret_common(data)?;
    obj.get("ret")
        .and_then(Value::as_i64)
        .ok_or_else(|| RpcError::bad_reply("Invalid data: ret is not an int64"))
}

pub fn fret_string(data: &[u8]) -> Result<Option<String>, RpcError> {
    let obj = handle_ret_common(data)?;
    match obj.get("ret") {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) => Ok(None),
        _ => Err(RpcError::bad_reply("Invalid data: ret is not a string")),
    }
}

/// Decodes an object-kind reply. A null `ret` is an absent object, not an
/// error.
pub fn fret_object<T: DeserializeOwned>(data: &[u8]) -> Result<Option<T>, RpcError> {
    let mut obj = handle_ret_common(data)?;
    match obj.remove("ret") {
        Some(Value::Null) | None => Ok(None),
        Some(member) => serde_json::from_value(member)
            .map(Some)
            .map_err(|e| RpcError::bad_reply(format!("failed to decode ret object: {e}"))),
    }
}

/// Decodes an object-list reply. A null `ret` is an empty list. Decoding is
/// all-or-nothing: a null or undecodable element discards the whole result
/// with error 503.
pub fn fret_objlist<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>, RpcError> {
    let mut obj = handle_ret_common(data)?;
    let elems = match obj.remove("ret") {
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(Value::Array(elems)) => elems,
        Some(_) => return Err(RpcError::bad_reply("Invalid data: ret is not a list")),
    };

    let mut out = Vec::with_capacity(elems.len());
    for member in elems {
        if member.is_null() {
            return Err(RpcError::new(
                EC_BAD_OBJ_LIST,
                "Invalid data: object list contains null",
            ));
        }
        let decoded = serde_json::from_value(member).map_err(|e| {
            RpcError::new(
                EC_BAD_OBJ_LIST,
                format!("failed to decode object list element: {e}"),
            )
        })?;
        out.push(decoded);
    }
    Ok(out)
}

pub fn fret_json(data: &[u8]) -> Result<Value, RpcError> {
    let mut obj = handle_ret_common(data)?;
    obj.remove("ret")
        .ok_or_else(|| RpcError::bad_reply("Invalid data: reply has no ret"))
}
