//! Companion store client tests against stub servers.
//!
//! Servers run on plain threads behind unix or TCP listeners and speak the
//! wire format by hand, so these tests pin the framing as well as the
//! client behavior.

#![cfg(unix)]

use event_engine::config::{Endpoint, Framing, QueryConfig};
use event_engine::query::{read_frame, write_frame};
use event_engine::{HelperRegistry, QueryClient, SocketQueryClient};
use serde_json::json;
use std::io::{BufReader, Read, Write};
use std::net::TcpListener;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Read one length-prefixed request straight off the socket.
fn read_raw_request(stream: &mut UnixStream) -> Option<String> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).ok()?;
    let mut payload = vec![0u8; u32::from_le_bytes(header) as usize];
    stream.read_exact(&mut payload).ok()?;
    String::from_utf8(payload).ok()
}

fn write_raw_reply(stream: &mut UnixStream, reply: &str) {
    let mut frame = (reply.len() as u32).to_le_bytes().to_vec();
    frame.extend_from_slice(reply.as_bytes());
    stream.write_all(&frame).unwrap();
}

/// Accept a single connection and answer each request with the next reply.
fn scripted_unix_server(listener: UnixListener, replies: Vec<&'static str>) -> thread::JoinHandle<Vec<String>> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut requests = Vec::new();
        for reply in replies {
            let Some(request) = read_raw_request(&mut stream) else {
                break;
            };
            requests.push(request);
            write_raw_reply(&mut stream, reply);
        }
        requests
    })
}

fn unix_config(path: &std::path::Path) -> QueryConfig {
    QueryConfig::default()
        .with_endpoint(Endpoint::Unix(path.to_path_buf()))
        .with_timeout(Duration::from_millis(500))
}

#[test]
fn test_update_over_unix_socket() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wdb.sock");
    let listener = UnixListener::bind(&path)?;
    let replies = vec!["ok", "ok with payload", "ok ", "NotOk", "Random payload"];
    let server = scripted_unix_server(listener, replies.clone());

    let client = Arc::new(SocketQueryClient::new(unix_config(&path))?);
    let registry = HelperRegistry::with_query_client(client.clone());
    let op = registry.parse_and_build("wdb.result", "+wdb_update/$wdb.query_parameters/")?;

    let mut results = Vec::new();
    for i in 0..replies.len() {
        let event = json!({"wdb": {"query_parameters": format!("agent 00{i} syscheck integrity_clear {{\"id\":{i}}}")}});
        let result = op.apply(event);
        assert!(result.is_success());
        results.push(result.event()["wdb"]["result"].clone());
    }

    assert_eq!(
        results,
        vec![json!(true), json!(true), json!(true), json!(false), json!(false)]
    );

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[0], "agent 000 syscheck integrity_clear {\"id\":0}");
    assert_eq!(client.idle_connections(), 1);
    Ok(())
}

#[test]
fn test_literal_query_is_sent_verbatim() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wdb.sock");
    let server = scripted_unix_server(UnixListener::bind(&path)?, vec!["ok"]);

    let client = Arc::new(SocketQueryClient::new(unix_config(&path))?);
    let registry = HelperRegistry::with_query_client(client);
    let op = registry.parse_and_build(
        "wdb.result",
        r#"+wdb_update/agent 007 syscheck integrity_clear {"tail": "tail", "checksum": "checksum"}"#,
    )?;

    assert_eq!(op.apply(json!({})).event(), &json!({"wdb": {"result": true}}));
    assert_eq!(
        server.join().unwrap(),
        vec![r#"agent 007 syscheck integrity_clear {"tail": "tail", "checksum": "checksum"}"#]
    );
    Ok(())
}

#[test]
fn test_timeout_becomes_false_result() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("slow.sock");
    let listener = UnixListener::bind(&path)?;
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_raw_request(&mut stream);
        thread::sleep(Duration::from_millis(400));
        request
    });

    let config = unix_config(&path).with_timeout(Duration::from_millis(100));
    let client = Arc::new(SocketQueryClient::new(config)?);

    let response = client.query("agent 001 sql select 1");
    assert_eq!(response.raw(), "err timeout");
    assert_eq!(client.idle_connections(), 0);

    assert_eq!(server.join().unwrap().as_deref(), Some("agent 001 sql select 1"));
    Ok(())
}

#[test]
fn test_closed_connection_is_discarded() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("closing.sock");
    let listener = UnixListener::bind(&path)?;
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_raw_request(&mut stream)
    });

    let client = SocketQueryClient::new(unix_config(&path))?;
    let response = client.query("agent 001 sql select 1");
    assert_eq!(response.status(), "err");
    assert!(!response.is_ok());
    assert_eq!(client.idle_connections(), 0);
    server.join().unwrap();
    Ok(())
}

#[test]
fn test_store_closing_after_each_reply() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("oneshot.sock");
    let listener = UnixListener::bind(&path)?;

    // Answers one request per connection, then hangs up.
    let server = thread::spawn(move || {
        let mut requests = Vec::new();
        for _ in 0..4 {
            let (mut stream, _) = listener.accept().unwrap();
            if let Some(request) = read_raw_request(&mut stream) {
                write_raw_reply(&mut stream, "ok");
                requests.push(request);
            }
        }
        requests
    });

    let client = Arc::new(SocketQueryClient::new(unix_config(&path))?);
    let registry = HelperRegistry::with_query_client(client.clone());
    let op = registry.parse_and_build("wdb.result", "+wdb_update/$request/")?;

    for i in 0..4 {
        // Let the store finish closing the previous connection.
        thread::sleep(Duration::from_millis(20));
        let result = op.apply(json!({"request": format!("agent 00{i} syscheck delete")}));
        assert!(result.is_success());
        assert_eq!(result.event()["wdb"]["result"], json!(true), "request {i}");
    }

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[3], "agent 003 syscheck delete");
    Ok(())
}

#[test]
fn test_timeout_covers_whole_exchange() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("drip.sock");
    let listener = UnixListener::bind(&path)?;

    // Sends a valid header, then the payload one byte every 70ms.
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_raw_request(&mut stream);
        let reply = b"ok drip drip drip";
        if stream.write_all(&(reply.len() as u32).to_le_bytes()).is_err() {
            return;
        }
        for byte in reply {
            thread::sleep(Duration::from_millis(70));
            if stream.write_all(&[*byte]).is_err() {
                return;
            }
        }
    });

    let config = unix_config(&path).with_timeout(Duration::from_millis(100));
    let client = SocketQueryClient::new(config)?;

    let started = Instant::now();
    let response = client.query("agent 001 sql select 1");
    let elapsed = started.elapsed();

    assert_eq!(response.raw(), "err timeout");
    assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
    assert_eq!(client.idle_connections(), 0);

    drop(client);
    server.join().unwrap();
    Ok(())
}

#[test]
fn test_unreachable_store_makes_update_write_false() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let client = Arc::new(SocketQueryClient::new(unix_config(&dir.path().join("none.sock")))?);
    let registry = HelperRegistry::with_query_client(client);

    let update = registry.parse_and_build("wdb.result", "+wdb_update/agent 001 sql/")?;
    let result = update.apply(json!({}));
    assert!(result.is_success());
    assert_eq!(result.event()["wdb"]["result"], json!(false));

    let query = registry.parse_and_build("wdb.payload", "+wdb_query/agent 001 sql/")?;
    let result = query.apply(json!({}));
    assert!(result.is_failure());
    assert_eq!(result.event(), &json!({}));
    Ok(())
}

#[test]
fn test_tcp_newline_framing() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        let request = read_frame(&mut reader, Framing::Newline, 1024).unwrap();
        write_frame(&mut writer, Framing::Newline, "ok [{\"name\":\"agent\"}]").unwrap();
        request
    });

    let config = QueryConfig::default()
        .with_endpoint(Endpoint::Tcp(addr.to_string()))
        .with_framing(Framing::Newline);
    let client = Arc::new(SocketQueryClient::new(config)?);
    let registry = HelperRegistry::with_query_client(client);

    let op = registry.parse_and_build("agent.info", "+wdb_query/$request/")?;
    let result = op.apply(json!({"request": "global get-agent-info 001"}));
    assert!(result.is_success());
    assert_eq!(result.event()["agent"]["info"], json!("[{\"name\":\"agent\"}]"));
    assert_eq!(server.join().unwrap(), "global get-agent-info 001");
    Ok(())
}

#[test]
fn test_concurrent_queries_do_not_interleave() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("echo.sock");
    let listener = UnixListener::bind(&path)?;

    // Echo server: one handler thread per connection, replies "ok <request>".
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            thread::spawn(move || {
                while let Some(request) = read_raw_request(&mut stream) {
                    write_raw_reply(&mut stream, &format!("ok {request}"));
                }
            });
        }
    });

    let client = Arc::new(SocketQueryClient::new(unix_config(&path).with_pool_size(2))?);
    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for i in 0..25 {
                    let request = format!("agent {worker:03} query {i}");
                    let response = client.query(&request);
                    assert_eq!(response.payload(), Some(request.as_str()));
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert!(client.idle_connections() <= 2);
    Ok(())
}
