//! Runs the real binaries and checks their exit behavior.
#![cfg(unix)]

use std::process::Stdio;
use std::time::Duration;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    process::{Child, Command},
    time::timeout,
};

const GATEWAY: &str = env!("CARGO_BIN_EXE_front-gateway");

fn gateway(services: &str) -> Command {
    let mut command = Command::new(GATEWAY);
    command
        .env_remove("RUST_LOG")
        .env("LOG_LEVEL", "info")
        .env("RPC_RECONNECT_INTERVAL", "100ms")
        .env("RPC_CHECK_STATE_INTERVAL", "50ms")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if services.is_empty() {
        command.env_remove("GATEWAY_SERVICES");
    } else {
        command.env("GATEWAY_SERVICES", services);
    }
    command
}

/// Reads stdout until a line containing `needle` shows up.
async fn wait_for_line(child: &mut Child, needle: &str) -> Vec<String> {
    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    let mut seen = Vec::new();
    let found = timeout(Duration::from_secs(10), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            let done = line.contains(needle);
            seen.push(line);
            if done {
                return;
            }
        }
        panic!("stdout closed before {needle:?}");
    })
    .await;
    assert!(found.is_ok(), "never saw {needle:?}, got {seen:?}");
    seen
}

async fn send_signal(child: &Child, signal: &str) {
    let pid = child.id().unwrap().to_string();
    let status = Command::new("kill")
        .args([signal, pid.as_str()])
        .status()
        .await
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_sigterm_exits_zero() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _accept = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let mut child = gateway(&format!("svc={addr}")).spawn().unwrap();
    let seen = wait_for_line(&mut child, "server started").await;
    assert!(seen.iter().any(|line| line.contains("creating connection svc")));

    send_signal(&child, "-TERM").await;
    let status = timeout(Duration::from_secs(10), child.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.code(), Some(0));
}

#[tokio::test]
async fn test_sigint_exits_zero_without_services() {
    let mut child = gateway("").spawn().unwrap();
    wait_for_line(&mut child, "server started").await;

    send_signal(&child, "-INT").await;
    let status = timeout(Duration::from_secs(10), child.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.code(), Some(0));
}

#[tokio::test]
async fn test_empty_address_exits_non_zero() {
    let output = timeout(Duration::from_secs(10), gateway("svc=").output())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("empty address"), "stderr was {stderr}");
}

#[tokio::test]
async fn test_invalid_address_exits_non_zero() {
    let output = timeout(Duration::from_secs(10), gateway("svc=no-port").output())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[tokio::test]
async fn test_help_exits_zero() {
    let output = timeout(Duration::from_secs(10), gateway("").arg("--help").output())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("GATEWAY_SERVICES"), "stdout was {stdout}");
    assert!(!String::from_utf8_lossy(&output.stderr).contains("fatal"));
}
