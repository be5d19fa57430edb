//! Native function values.
//!
//! The registrable unit is a closed enum with one variant per supported
//! (return-kind, parameter-kind) shape, each holding a strongly-typed boxed
//! closure. This replaces unchecked function-pointer casts: the shape is
//! fixed at registration and pattern-matched by the marshal shim.
//!
//! String parameters are nullable (`Option<&str>`), matching the wire
//! encoding where a string argument may be JSON null. Object and list
//! returns are serialized at this boundary by the generic constructors, so
//! the shim consumes an already-encoded `serde_json::Value` graph and the
//! returned value has exactly one owner on its way into the reply.

use crate::error::{RpcError, EC_BAD_REPLY};
use serde::Serialize;
use serde_json::Value;

pub type NativeResult<T> = Result<T, RpcError>;

type FnVoid<R> = Box<dyn Fn() -> NativeResult<R> + Send + Sync>;
type FnStr<R> = Box<dyn Fn(Option<&str>) -> NativeResult<R> + Send + Sync>;
type FnStrStr<R> = Box<dyn Fn(Option<&str>, Option<&str>) -> NativeResult<R> + Send + Sync>;
type FnStrInt<R> = Box<dyn Fn(Option<&str>, i32) -> NativeResult<R> + Send + Sync>;
type FnIntInt<R> = Box<dyn Fn(i32, i32) -> NativeResult<R> + Send + Sync>;
type FnStrIntInt<R> = Box<dyn Fn(Option<&str>, i32, i32) -> NativeResult<R> + Send + Sync>;
type FnStrStrInt<R> = Box<dyn Fn(Option<&str>, Option<&str>, i32) -> NativeResult<R> + Send + Sync>;

/// A registered RPC implementation, one variant per supported shape.
pub enum NativeFn {
    IntVoid(FnVoid<i32>),
    IntString(FnStr<i32>),
    IntStringString(FnStrStr<i32>),
    Int64Void(FnVoid<i64>),
    Int64String(FnStr<i64>),
    StringVoid(FnVoid<Option<String>>),
    StringString(FnStr<Option<String>>),
    StringStringInt(FnStrInt<Option<String>>),
    ObjectVoid(FnVoid<Option<Value>>),
    ObjectString(FnStr<Option<Value>>),
    ObjlistVoid(FnVoid<Option<Vec<Value>>>),
    ObjlistString(FnStr<Option<Vec<Value>>>),
    ObjlistIntInt(FnIntInt<Option<Vec<Value>>>),
    ObjlistStringInt(FnStrInt<Option<Vec<Value>>>),
    ObjlistStringIntInt(FnStrIntInt<Option<Vec<Value>>>),
    ObjlistStringStringInt(FnStrStrInt<Option<Vec<Value>>>),
    JsonVoid(FnVoid<Value>),
    JsonString(FnStr<Value>),
}

fn encode_object<T: Serialize>(obj: T) -> NativeResult<Value> {
    serde_json::to_value(obj)
        .map_err(|e| RpcError::new(EC_BAD_REPLY, format!("failed to serialize return value: {e}")))
}

fn encode_objlist<T: Serialize>(list: Option<Vec<T>>) -> NativeResult<Option<Vec<Value>>> {
    match list {
        None => Ok(None),
        Some(objs) => objs
            .into_iter()
            .map(encode_object)
            .collect::<NativeResult<Vec<Value>>>()
            .map(Some),
    }
}

/// Constructors that accept functions returning typed objects and serialize
/// them at the boundary.
impl NativeFn {
    pub fn object_void<T, F>(f: F) -> Self
    where
        T: Serialize,
        F: Fn() -> NativeResult<Option<T>> + Send + Sync + 'static,
    {
        NativeFn::ObjectVoid(Box::new(move || f()?.map(encode_object).transpose()))
    }

    pub fn object_string<T, F>(f: F) -> Self
    where
        T: Serialize,
        F: Fn(Option<&str>) -> NativeResult<Option<T>> + Send + Sync + 'static,
    {
        NativeFn::ObjectString(Box::new(move |a| f(a)?.map(encode_object).transpose()))
    }

    pub fn objlist_void<T, F>(f: F) -> Self
    where
        T: Serialize,
        F: Fn() -> NativeResult<Option<Vec<T>>> + Send + Sync + 'static,
    {
        NativeFn::ObjlistVoid(Box::new(move || encode_objlist(f()?)))
    }

    pub fn objlist_string<T, F>(f: F) -> Self
    where
        T: Serialize,
        F: Fn(Option<&str>) -> NativeResult<Option<Vec<T>>> + Send + Sync + 'static,
    {
        NativeFn::ObjlistString(Box::new(move |a| encode_objlist(f(a)?)))
    }

    pub fn objlist_int_int<T, F>(f: F) -> Self
    where
        T: Serialize,
        F: Fn(i32, i32) -> NativeResult<Option<Vec<T>>> + Send + Sync + 'static,
    {
        NativeFn::ObjlistIntInt(Box::new(move |a, b| encode_objlist(f(a, b)?)))
    }

    pub fn objlist_string_int<T, F>(f: F) -> Self
    where
        T: Serialize,
        F: Fn(Option<&str>, i32) -> NativeResult<Option<Vec<T>>> + Send + Sync + 'static,
    {
        NativeFn::ObjlistStringInt(Box::new(move |a, b| encode_objlist(f(a, b)?)))
    }

    pub fn objlist_string_int_int<T, F>(f: F) -> Self
    where
        T: Serialize,
        F: Fn(Option<&str>, i32, i32) -> NativeResult<Option<Vec<T>>> + Send + Sync + 'static,
    {
        NativeFn::ObjlistStringIntInt(Box::new(move |a, b, c| encode_objlist(f(a, b, c)?)))
    }

    pub fn objlist_string_string_int<T, F>(f: F) -> Self
    where
        T: Serialize,
        F: Fn(Option<&str>, Option<&str>, i32) -> NativeResult<Option<Vec<T>>> + Send + Sync + 'static,
    {
        NativeFn::ObjlistStringStringInt(Box::new(move |a, b, c| encode_objlist(f(a, b, c)?)))
    }

    /// Shape name used in mismatch diagnostics.
    pub fn shape(&self) -> &'static str {
        use NativeFn::*;
        match self {
            IntVoid(_) => "int()",
            IntString(_) => "int(string)",
            IntStringString(_) => "int(string, string)",
            Int64Void(_) => "int64()",
            Int64String(_) => "int64(string)",
            StringVoid(_) => "string()",
            StringString(_) => "string(string)",
            StringStringInt(_) => "string(string, int)",
            ObjectVoid(_) => "object()",
            ObjectString(_) => "object(string)",
            ObjlistVoid(_) => "objlist()",
            ObjlistString(_) => "objlist(string)",
            ObjlistIntInt(_) => "objlist(int, int)",
            ObjlistStringInt(_) => "objlist(string, int)",
            ObjlistStringIntInt(_) => "objlist(string, int, int)",
            ObjlistStringStringInt(_) => "objlist(string, string, int)",
            JsonVoid(_) => "json()",
            JsonString(_) => "json(string)",
        }
    }
}
