/// Declares a typed client wrapper for one RPC, so call sites never
/// hand-write encode/decode plumbing. The leading keyword picks the result
/// kind; `object`/`objlist` take the concrete type in angle brackets.
///
/// ```
/// use svcrpc::rpc_client_fn;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Pet {
///     name: String,
/// }
///
/// rpc_client_fn!(string get_substring(text: &str, len: i32));
/// rpc_client_fn!(objlist<Pet> get_pet_list(prefix: &str, count: i32));
/// ```
#[macro_export]
macro_rules! rpc_client_fn {
    (int $name:ident($($arg:ident : $ty:ty),*)) => {
        pub async fn $name(
            client: &mut $crate::Client,
            $($arg: $ty),*
        ) -> Result<i32, $crate::RpcError> {
            client.call_int(stringify!($name), ($($arg,)*)).await
        }
    };
    (int64 $name:ident($($arg:ident : $ty:ty),*)) => {
        pub async fn $name(
            client: &mut $crate::Client,
            $($arg: $ty),*
        ) -> Result<i64, $crate::RpcError> {
            client.call_int64(stringify!($name), ($($arg,)*)).await
        }
    };
    (string $name:ident($($arg:ident : $ty:ty),*)) => {
        pub async fn $name(
            client: &mut $crate::Client,
            $($arg: $ty),*
        ) -> Result<Option<String>, $crate::RpcError> {
            client.call_string(stringify!($name), ($($arg,)*)).await
        }
    };
    (object<$ret:ty> $name:ident($($arg:ident : $ty:ty),*)) => {
        pub async fn $name(
            client: &mut $crate::Client,
            $($arg: $ty),*
        ) -> Result<Option<$ret>, $crate::RpcError> {
            client.call_object::<$ret>(stringify!($name), ($($arg,)*)).await
        }
    };
    (objlist<$ret:ty> $name:ident($($arg:ident : $ty:ty),*)) => {
        pub async fn $name(
            client: &mut $crate::Client,
            $($arg: $ty),*
        ) -> Result<Vec<$ret>, $crate::RpcError> {
            client.call_objlist::<$ret>(stringify!($name), ($($arg,)*)).await
        }
    };
    (json $name:ident($($arg:ident : $ty:ty),*)) => {
        pub async fn $name(
            client: &mut $crate::Client,
            $($arg: $ty),*
        ) -> Result<$crate::serde_json::Value, $crate::RpcError> {
            client.call_json(stringify!($name), ($($arg,)*)).await
        }
    };
}
