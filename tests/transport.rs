use rand::RngCore;
use std::path::PathBuf;
use std::sync::Arc;
use svcrpc::signature;
use svcrpc::transport::ipc::{IpcServer, IpcTransport};
use svcrpc::transport::stream::{read_frame, serve_stream, write_frame, StreamTransport, MAX_FRAME};
use svcrpc::transport::Spawned;
use svcrpc::{AsyncClient, Client, NativeFn, RpcError, Server, TransportError};
use tokio::net::TcpListener;
use tokio::task;

fn build_server() -> Arc<Server> {
    let mut server = Server::new();
    server.create_service("strings");
    server
        .register_function(
            "strings",
            "shout",
            NativeFn::StringString(Box::new(|s| Ok(s.map(|s| s.to_uppercase())))),
            signature::string__string(),
        )
        .unwrap();
    server
        .register_function(
            "strings",
            "strlen",
            NativeFn::IntString(Box::new(|s| Ok(s.map_or(0, |s| s.len() as i32)))),
            signature::int__string(),
        )
        .unwrap();

    server.create_service("math");
    server
        .register_function(
            "math",
            "sum_upto",
            NativeFn::Int64String(Box::new(|s| {
                let n: i64 = s.unwrap_or("0").parse().unwrap_or(0);
                Ok(n * (n + 1) / 2)
            })),
            signature::int64__string(),
        )
        .unwrap();
    Arc::new(server)
}

#[tokio::test(flavor = "current_thread")]
async fn frame_roundtrips_at_the_16_bit_boundary() {
    let (mut a, mut b) = tokio::io::duplex(1 << 20);

    let mut payload = vec![0u8; MAX_FRAME];
    rand::thread_rng().fill_bytes(&mut payload);

    write_frame(&mut a, &payload).await.unwrap();
    let read = read_frame(&mut b).await.unwrap().unwrap();
    assert_eq!(read, payload);
}

#[tokio::test(flavor = "current_thread")]
async fn oversized_frame_is_rejected_deterministically() {
    let (mut a, _b) = tokio::io::duplex(64);
    let payload = vec![0u8; MAX_FRAME + 1];
    match write_frame(&mut a, &payload).await {
        Err(TransportError::FrameTooLarge(got, max)) => {
            assert_eq!(got, MAX_FRAME + 1);
            assert_eq!(max, MAX_FRAME);
        }
        other => panic!("expected FrameTooLarge, got {other:?}"),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn clean_eof_between_frames() {
    let (a, mut b) = tokio::io::duplex(64);
    drop(a);
    assert!(read_frame(&mut b).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tcp_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    task::spawn(serve_stream(build_server(), "strings", listener));

    let transport = StreamTransport::connect(addr).await.unwrap();
    let mut client = Client::new(transport);

    // two sequential calls on one connection, strictly ordered
    assert_eq!(
        client.call_string("shout", ("hello",)).await.unwrap(),
        Some("HELLO".to_owned())
    );
    assert_eq!(client.call_int("strlen", ("hello",)).await.unwrap(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tcp_call_too_large_for_the_frame_fails_as_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    task::spawn(serve_stream(build_server(), "strings", listener));

    let transport = StreamTransport::connect(addr).await.unwrap();
    let mut client = Client::new(transport);

    let huge = "x".repeat(MAX_FRAME + 1);
    let err = client
        .call_int("strlen", (huge.as_str(),))
        .await
        .unwrap_err();
    assert_eq!(err, RpcError::transport());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tcp_async_client_via_spawned_adapter() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    task::spawn(serve_stream(build_server(), "strings", listener));

    let transport = StreamTransport::connect(addr).await.unwrap();
    let mut client = AsyncClient::new(Spawned::new(transport));

    let (tx, rx) = tokio::sync::oneshot::channel();
    client
        .call_string("shout", ("quiet",), move |result| {
            tx.send(result).ok();
        })
        .unwrap();
    assert_eq!(rx.await.unwrap().unwrap(), Some("QUIET".to_owned()));
}

fn temp_socket_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("svcrpc-{tag}-{}.sock", std::process::id()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ipc_hosts_multiple_services_and_concurrent_clients() {
    let path = temp_socket_path("multi");
    let ipc = IpcServer::bind(&path).unwrap();
    task::spawn(ipc.serve(build_server()));

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let path = path.clone();
        handles.push(task::spawn(async move {
            if i % 2 == 0 {
                let transport = IpcTransport::connect(&path, "strings").await.unwrap();
                let mut client = Client::new(transport);
                let text = format!("msg{i}");
                assert_eq!(
                    client.call_string("shout", (text.as_str(),)).await.unwrap(),
                    Some(text.to_uppercase())
                );
            } else {
                let transport = IpcTransport::connect(&path, "math").await.unwrap();
                let mut client = Client::new(transport);
                let n = i.to_string();
                let expected = (i as i64) * (i as i64 + 1) / 2;
                assert_eq!(
                    client
                        .call_int64("sum_upto", (n.as_str(),))
                        .await
                        .unwrap(),
                    expected
                );
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    let _ = std::fs::remove_file(&path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ipc_unknown_service_is_a_501_reply() {
    let path = temp_socket_path("unknown");
    let ipc = IpcServer::bind(&path).unwrap();
    task::spawn(ipc.serve(build_server()));

    let transport = IpcTransport::connect(&path, "ghost").await.unwrap();
    let mut client = Client::new(transport);
    let err = client.call_int("anything", ()).await.unwrap_err();
    assert_eq!(err.code, 501);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ipc_bind_replaces_a_stale_socket_file() {
    let path = temp_socket_path("stale");
    drop(IpcServer::bind(&path).unwrap());
    let ipc = IpcServer::bind(&path).unwrap();
    task::spawn(ipc.serve(build_server()));

    let transport = IpcTransport::connect(&path, "strings").await.unwrap();
    let mut client = Client::new(transport);
    assert_eq!(client.call_int("strlen", ("abc",)).await.unwrap(), 3);
    let _ = std::fs::remove_file(&path);
}
