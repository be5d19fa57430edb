//! Service registry and dispatch engine.
//!
//! A [`Server`] owns the marshal table and the two-level service/function
//! mapping. Registration happens through `&mut self` at startup; transports
//! then share the server as `Arc<Server>` and dispatch through `&self`, so
//! the tables are immutable while calls are in flight and lookups need no
//! locking. The optional slow-call log is the only mutable state touched
//! during dispatch and sits behind a mutex.

use crate::error::{RegisterError, RpcError, EC_BAD_CALL, EC_SERVICE_NOT_FOUND, EC_TRANSPORT};
use crate::marshal::{err_reply, MarshalShim, MarshalTable, ReplyObject};
use crate::native::NativeFn;
use crate::signature::Signature;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::warn;

struct FuncEntry {
    native: NativeFn,
    // resolved once at registration, never looked up per call
    shim: MarshalShim,
}

struct Service {
    functions: HashMap<String, FuncEntry>,
}

/// Slow-call logging: calls that run longer than `threshold` append one
/// line to the file at `path`.
pub struct SlowLogConfig {
    pub path: PathBuf,
    pub threshold: Duration,
}

struct SlowLog {
    path: PathBuf,
    threshold: Duration,
    file: Mutex<File>,
}

impl SlowLog {
    fn open(config: SlowLogConfig) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;
        Ok(Self {
            path: config.path,
            threshold: config.threshold,
            file: Mutex::new(file),
        })
    }

    fn record(&self, service: &str, call: &[u8], elapsed: Duration) {
        if elapsed < self.threshold {
            return;
        }
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let call = String::from_utf8_lossy(call);
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        let line = format!(
            "{timestamp} - {service} - {call} - {:.3}\n",
            elapsed.as_secs_f64()
        );
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            warn!(error = %e, "failed to append slow-call log");
        }
    }

    // The lock is held across the whole reopen-and-swap so no writer can
    // observe a half-rotated handle; the old file closes on guard drop.
    fn rotate(&self) -> std::io::Result<()> {
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        *file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }
}

/// The server-side registry and dispatch entry point.
pub struct Server {
    marshals: MarshalTable,
    services: HashMap<String, Service>,
    slow_log: Option<SlowLog>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self {
            marshals: MarshalTable::with_builtins(),
            services: HashMap::new(),
            slow_log: None,
        }
    }

    /// Enables the slow-call log. Absent configuration costs one `Option`
    /// check per dispatch.
    pub fn enable_slow_log(&mut self, config: SlowLogConfig) -> std::io::Result<()> {
        self.slow_log = Some(SlowLog::open(config)?);
        Ok(())
    }

    /// Reopens the slow-call log file, e.g. after an external logrotate
    /// moved it aside. No-op when the slow log is not configured.
    pub fn rotate_slow_log(&self) -> std::io::Result<()> {
        match &self.slow_log {
            Some(slow_log) => slow_log.rotate(),
            None => Ok(()),
        }
    }

    pub fn slow_log_path(&self) -> Option<&Path> {
        self.slow_log.as_ref().map(|s| s.path.as_path())
    }

    /// Extension point for shims beyond the built-in set. Duplicate
    /// signatures keep the first registration.
    pub fn register_marshal(&mut self, signature: Signature, shim: MarshalShim) -> bool {
        self.marshals.register(signature, shim)
    }

    /// Creates a service. Re-creating an existing name is a no-op.
    pub fn create_service(&mut self, name: impl Into<String>) {
        self.services.entry(name.into()).or_insert_with(|| Service {
            functions: HashMap::new(),
        });
    }

    /// Removes a service and all functions registered under it. No-op if
    /// the service does not exist.
    pub fn remove_service(&mut self, name: &str) {
        self.services.remove(name);
    }

    /// Registers a function under a service. The signature is resolved to
    /// its marshal shim here, once; an existing function with the same name
    /// in the same service is overwritten.
    pub fn register_function(
        &mut self,
        service: &str,
        fname: impl Into<String>,
        native: NativeFn,
        signature: Signature,
    ) -> Result<(), RegisterError> {
        let shim = self
            .marshals
            .lookup(&signature)
            .ok_or(RegisterError::UnknownSignature)?;
        let service = self
            .services
            .get_mut(service)
            .ok_or(RegisterError::ServiceNotFound)?;
        service
            .functions
            .insert(fname.into(), FuncEntry { native, shim });
        Ok(())
    }

    /// The single dispatch entry point invoked by every transport binding.
    ///
    /// Never fails: dispatch problems come back as successfully-encoded
    /// error replies (501 unknown service, 511 malformed call, 500 unknown
    /// function). Safe to call concurrently from any number of tasks.
    pub fn call_function(&self, service: &str, call: &[u8]) -> Vec<u8> {
        let Some(svc) = self.services.get(service) else {
            return error_bytes(
                EC_SERVICE_NOT_FOUND,
                format!("cannot find service {service}."),
            );
        };

        let parsed: Value = match serde_json::from_slice(call) {
            Ok(v) => v,
            Err(e) => {
                return error_bytes(EC_BAD_CALL, format!("failed to parse RPC call: {e}"));
            }
        };
        let Value::Array(params) = parsed else {
            return error_bytes(EC_BAD_CALL, "RPC call is not an array.");
        };
        let Some(fname) = params.first().and_then(Value::as_str) else {
            return error_bytes(EC_BAD_CALL, "RPC call carries no function name.");
        };

        let Some(entry) = svc.functions.get(fname) else {
            return error_bytes(EC_TRANSPORT, format!("cannot find function {fname}."));
        };

        let start = Instant::now();
        let reply = (entry.shim)(&entry.native, &params);
        if let Some(slow_log) = &self.slow_log {
            slow_log.record(service, call, start.elapsed());
        }

        reply_bytes(reply)
    }
}

fn reply_bytes(reply: ReplyObject) -> Vec<u8> {
    Value::Object(reply).to_string().into_bytes()
}

fn error_bytes(code: i32, message: impl Into<String>) -> Vec<u8> {
    reply_bytes(err_reply(&RpcError::new(code, message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature;
    use serde_json::json;

    fn test_server() -> Server {
        let mut server = Server::new();
        server.create_service("calc");
        server
            .register_function(
                "calc",
                "strlen",
                NativeFn::IntString(Box::new(|s| Ok(s.map_or(0, |s| s.len() as i32)))),
                signature::int__string(),
            )
            .unwrap();
        server
    }

    fn decode(reply: Vec<u8>) -> serde_json::Map<String, Value> {
        match serde_json::from_slice::<Value>(&reply).unwrap() {
            Value::Object(obj) => obj,
            other => panic!("reply is not an object: {other}"),
        }
    }

    #[test]
    fn dispatch_invokes_the_registered_function() {
        let server = test_server();
        let reply = decode(server.call_function("calc", br#"["strlen", "hello"]"#));
        assert_eq!(reply.get("ret"), Some(&json!(5)));
    }

    #[test]
    fn unknown_service_is_a_501_reply() {
        let server = test_server();
        let reply = decode(server.call_function("nope", br#"["strlen", "hello"]"#));
        assert_eq!(reply.get("err_code"), Some(&json!(501)));
    }

    #[test]
    fn unparsable_call_is_a_511_reply() {
        let server = test_server();
        let reply = decode(server.call_function("calc", b"{{{{"));
        assert_eq!(reply.get("err_code"), Some(&json!(511)));
    }

    #[test]
    fn non_array_call_is_a_511_reply() {
        let server = test_server();
        let reply = decode(server.call_function("calc", br#"{"func": "strlen"}"#));
        assert_eq!(reply.get("err_code"), Some(&json!(511)));
    }

    #[test]
    fn unknown_function_is_a_500_reply() {
        let server = test_server();
        let reply = decode(server.call_function("calc", br#"["nope"]"#));
        assert_eq!(reply.get("err_code"), Some(&json!(500)));
    }

    #[test]
    fn create_service_is_idempotent() {
        let mut server = test_server();
        server.create_service("calc");
        let reply = decode(server.call_function("calc", br#"["strlen", "ab"]"#));
        assert_eq!(reply.get("ret"), Some(&json!(2)));
    }

    #[test]
    fn register_function_requires_known_signature() {
        let mut server = test_server();
        let err = server
            .register_function(
                "calc",
                "f",
                NativeFn::IntVoid(Box::new(|| Ok(0))),
                signature::compute_signature("int", &["blob"]),
            )
            .unwrap_err();
        assert_eq!(err, RegisterError::UnknownSignature);
    }

    #[test]
    fn register_function_requires_existing_service() {
        let mut server = Server::new();
        let err = server
            .register_function(
                "ghost",
                "f",
                NativeFn::IntVoid(Box::new(|| Ok(0))),
                signature::int__void(),
            )
            .unwrap_err();
        assert_eq!(err, RegisterError::ServiceNotFound);
    }

    #[test]
    fn remove_service_drops_its_functions() {
        let mut server = test_server();
        server.remove_service("calc");
        let reply = decode(server.call_function("calc", br#"["strlen", "x"]"#));
        assert_eq!(reply.get("err_code"), Some(&json!(501)));
    }

    #[test]
    fn slow_log_records_calls_over_threshold() {
        let path = std::env::temp_dir().join(format!("svcrpc-slowlog-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut server = test_server();
        server
            .enable_slow_log(SlowLogConfig {
                path: path.clone(),
                threshold: Duration::ZERO,
            })
            .unwrap();
        server.call_function("calc", br#"["strlen", "hello"]"#);
        server.rotate_slow_log().unwrap();
        server.call_function("calc", br#"["strlen", "world"]"#);

        let log = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#"calc - ["strlen", "hello"] -"#));
        let _ = std::fs::remove_file(&path);
    }
}
