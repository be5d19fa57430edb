//! Signature fingerprints.
//!
//! A signature uniquely identifies one (return-kind, parameter-kind-list)
//! shape. It is the content hash of the kind names joined with `:`, computed
//! once at registration time and never per call. One signature maps to
//! exactly one marshal shim.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex fingerprint of a (return-kind, parameter-kinds) shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic fingerprint of `ret_kind ":" param_kind ":" ...`.
///
/// Hash collisions between distinct shapes are not defended against; the
/// kind vocabulary is a small closed set.
pub fn compute_signature(ret_kind: &str, param_kinds: &[&str]) -> Signature {
    let mut hasher = Sha256::new();
    hasher.update(ret_kind.as_bytes());
    for kind in param_kinds {
        hasher.update(b":");
        hasher.update(kind.as_bytes());
    }
    Signature(hex::encode(hasher.finalize()))
}

macro_rules! signature_helpers {
    ($($fn_name:ident => $ret:literal, [$($param:literal),*];)*) => {
        $(
            pub fn $fn_name() -> Signature {
                compute_signature($ret, &[$($param),*])
            }
        )*

        #[cfg(test)]
        pub(crate) fn all_builtin_signatures() -> Vec<(&'static str, Signature)> {
            vec![$((stringify!($fn_name), $fn_name())),*]
        }
    };
}

// The closed set of supported shapes. Each helper has a matching marshal
// shim registered by `MarshalTable::with_builtins`.
signature_helpers! {
    int__void => "int", [];
    int__string => "int", ["string"];
    int__string_string => "int", ["string", "string"];
    int64__void => "int64", [];
    int64__string => "int64", ["string"];
    string__void => "string", [];
    string__string => "string", ["string"];
    string__string_int => "string", ["string", "int"];
    object__void => "object", [];
    object__string => "object", ["string"];
    objlist__void => "objlist", [];
    objlist__string => "objlist", ["string"];
    objlist__int_int => "objlist", ["int", "int"];
    objlist__string_int => "objlist", ["string", "int"];
    objlist__string_int_int => "objlist", ["string", "int", "int"];
    objlist__string_string_int => "objlist", ["string", "string", "int"];
    json__void => "json", [];
    json__string => "json", ["string"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(
            compute_signature("int", &["string"]),
            compute_signature("int", &["string"])
        );
    }

    #[test]
    fn param_order_matters() {
        assert_ne!(
            compute_signature("objlist", &["string", "int"]),
            compute_signature("objlist", &["int", "string"])
        );
    }

    #[test]
    fn all_builtin_signatures_distinct() {
        let sigs = all_builtin_signatures();
        for (i, (name_a, sig_a)) in sigs.iter().enumerate() {
            for (name_b, sig_b) in &sigs[i + 1..] {
                assert_ne!(sig_a, sig_b, "{name_a} collides with {name_b}");
            }
        }
    }
}
