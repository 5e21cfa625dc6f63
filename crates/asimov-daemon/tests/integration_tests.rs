//! End-to-end tests for the gateway.
//!
//! Each test runs the real listener on an ephemeral port with a logging
//! device and talks to it through `GatewayClient`.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use asimov_core::{Dispatcher, Journal, LoggingDevice};
use asimov_daemon::{ServerContext, listener, serve};
use asimov_protocol::{ArgPolicy, ClientError, Command, GatewayClient, Mode, Reply};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Gateway {
    addr: SocketAddr,
    ctx: ServerContext,
    journal: Journal,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
}

impl Gateway {
    async fn start() -> Self {
        Self::start_with(LoggingDevice::new(), ArgPolicy::Lenient).await
    }

    async fn start_with(device: LoggingDevice, policy: ArgPolicy) -> Self {
        let journal = device.journal();
        let ctx = ServerContext::new(Arc::new(Mutex::new(device)), Dispatcher::new(policy));

        let listener = listener::bind("0").expect("bind ephemeral port");
        let port = listener.local_addr().unwrap().port();
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let (tx, rx) = oneshot::channel();
        let server = tokio::spawn(serve(listener, ctx.clone(), async {
            let _ = rx.await;
        }));

        Self {
            addr,
            ctx,
            journal,
            shutdown: Some(tx),
            server,
        }
    }

    async fn client(&self) -> GatewayClient {
        GatewayClient::connect(self.addr)
            .await
            .expect("handshake")
            .with_timeout(Duration::from_secs(5))
    }

    /// Connect without a handshake.
    async fn raw_client(&self) -> GatewayClient {
        GatewayClient::connect_raw(self.addr)
            .await
            .expect("connect")
            .with_timeout(Duration::from_secs(5))
    }

    /// Connect once the server has noticed the previous client went away.
    async fn client_when_free(&self) -> GatewayClient {
        for _ in 0..100 {
            match GatewayClient::connect(self.addr).await {
                Ok(client) => return client.with_timeout(Duration::from_secs(5)),
                Err(ClientError::Rejected) => tokio::time::sleep(Duration::from_millis(20)).await,
                Err(e) => panic!("Unexpected connect error: {e}"),
            }
        }
        panic!("Gateway never freed the session slot");
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.server.await.unwrap();
    }
}

#[tokio::test]
async fn test_session_scenario_mode_drive_end() {
    let gateway = Gateway::start().await;

    let mut client = gateway.client().await;
    assert_eq!(client.send_line("MODE FULL").await.unwrap(), Reply::Ack);
    assert_eq!(client.send_line("DRIVE STOP").await.unwrap(), Reply::Ack);
    client.end().await.unwrap();

    assert_eq!(gateway.journal.entries(), vec!["mode full", "stop"]);
    gateway.stop().await;
}

#[tokio::test]
async fn test_end_closes_connection() {
    let gateway = Gateway::start().await;

    let mut client = GatewayClient::connect_raw(gateway.addr)
        .await
        .unwrap()
        .with_timeout(Duration::from_secs(5));
    client.handshake().await.unwrap();
    assert_eq!(client.send_line("BEEP").await.unwrap(), Reply::Ack);

    // END gets no reply; the next read sees the close
    let result = client.send_line("END").await;
    assert!(matches!(result, Err(ClientError::ConnectionClosed)));

    gateway.stop().await;
}

#[tokio::test]
async fn test_missing_argument_is_err_without_device_call() {
    let gateway = Gateway::start().await;

    let mut client = gateway.client().await;
    assert_eq!(client.send_line("LED POWER").await.unwrap(), Reply::Err);
    assert!(gateway.journal.is_empty());

    // The session survives a malformed command
    assert_eq!(client.execute(&Command::Beep).await.unwrap(), Reply::Ack);
    assert_eq!(gateway.journal.entries(), vec!["beep"]);

    client.end().await.unwrap();
    gateway.stop().await;
}

#[tokio::test]
async fn test_second_connection_rejected_while_first_active() {
    let gateway = Gateway::start().await;

    let mut first = gateway.client().await;

    let second = GatewayClient::connect(gateway.addr).await;
    assert!(matches!(second, Err(ClientError::Rejected)));

    // Rejection happens before any handshake
    let mut raw = GatewayClient::connect_raw(gateway.addr)
        .await
        .unwrap()
        .with_timeout(Duration::from_secs(5));
    assert_eq!(raw.next_line().await.unwrap().as_deref(), Some("ERR"));
    assert_eq!(raw.next_line().await.unwrap(), None);

    // The first session is unaffected
    assert_eq!(first.execute(&Command::Beep).await.unwrap(), Reply::Ack);
    assert_eq!(
        first.execute(&Command::Mode(Mode::Safe)).await.unwrap(),
        Reply::Ack
    );

    first.end().await.unwrap();
    gateway.stop().await;
}

#[tokio::test]
async fn test_next_session_admitted_after_end() {
    let gateway = Gateway::start().await;

    let mut first = gateway.raw_client().await;
    first.handshake().await.unwrap();
    let closed = first.send_line("END").await;
    assert!(matches!(closed, Err(ClientError::ConnectionClosed)));

    // The slot is free by the time the close is visible, so no retry
    let mut second = gateway.client().await;
    assert_eq!(second.send_line("BEEP").await.unwrap(), Reply::Ack);
    second.end().await.unwrap();

    gateway.stop().await;
}

#[tokio::test]
async fn test_next_session_admitted_after_disconnect() {
    let gateway = Gateway::start().await;

    let first = gateway.client().await;
    drop(first);

    let mut second = gateway.client_when_free().await;
    assert_eq!(second.send_line("DRIVE STOP").await.unwrap(), Reply::Ack);
    second.end().await.unwrap();

    gateway.stop().await;
}

#[tokio::test]
async fn test_command_before_handshake_gets_no_reply() {
    let gateway = Gateway::start().await;

    let mut client = gateway.raw_client().await;
    let result = client.send_line("BEEP").await;
    assert!(matches!(result, Err(ClientError::ConnectionClosed)));
    assert!(gateway.journal.is_empty());

    // The failed handshake freed the slot before the connection closed
    let mut next = gateway.client().await;
    assert_eq!(next.send_line("BEEP").await.unwrap(), Reply::Ack);
    next.end().await.unwrap();

    gateway.stop().await;
}

#[tokio::test]
async fn test_strict_policy_rejects_non_numeric_arguments() {
    let gateway = Gateway::start_with(LoggingDevice::new(), ArgPolicy::Strict).await;

    let mut client = gateway.client().await;
    assert_eq!(
        client.send_line("DRIVE NORMAL fast 0").await.unwrap(),
        Reply::Err
    );
    assert_eq!(
        client.send_line("DRIVE NORMAL 100 0").await.unwrap(),
        Reply::Ack
    );
    assert_eq!(gateway.journal.entries(), vec!["drive 100 0"]);

    client.end().await.unwrap();
    gateway.stop().await;
}

#[tokio::test]
async fn test_device_failure_replies_err() {
    let gateway = Gateway::start_with(LoggingDevice::rejecting(), ArgPolicy::Lenient).await;

    let mut client = gateway.client().await;
    assert_eq!(client.send_line("BEEP").await.unwrap(), Reply::Err);
    assert_eq!(client.send_line("MODE FULL").await.unwrap(), Reply::Err);

    client.end().await.unwrap();
    gateway.stop().await;
}

#[tokio::test]
async fn test_shutdown_aborts_active_session() {
    let gateway = Gateway::start().await;

    let mut client = gateway.client().await;
    assert_eq!(client.send_line("BEEP").await.unwrap(), Reply::Ack);
    assert!(gateway.ctx.slot().is_active());

    let ctx = gateway.ctx.clone();
    gateway.stop().await;

    assert!(!ctx.slot().is_active());
    assert!(!matches!(client.next_line().await, Ok(Some(_))));
}

#[tokio::test]
async fn test_bad_greeting_frees_slot_before_close() {
    let gateway = Gateway::start().await;

    for _ in 0..3 {
        let mut client = gateway.raw_client().await;
        let result = client.send_line("helo").await;
        assert!(matches!(result, Err(ClientError::ConnectionClosed)));
        assert!(!gateway.ctx.slot().is_active());
    }

    let mut client = gateway.client().await;
    assert_eq!(client.send_line("MODE SAFE").await.unwrap(), Reply::Ack);
    client.end().await.unwrap();

    gateway.stop().await;
}
