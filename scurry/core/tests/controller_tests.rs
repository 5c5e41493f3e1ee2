//! Controller integration tests
//!
//! Each test runs a scripted stand-in for scamper on a real socket and
//! drives a [`Controller`] against it end to end:
//! - every submitted task is delivered exactly once
//! - results are matched by `userid`, whatever order they arrive in
//! - nothing is written before scamper grants a credit
//! - the linger gives up on missing results and delivers them abandoned
//! - rejections and hang-ups end the linger early

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

use pretty_assertions::assert_eq;
use scurry_core::{
    Controller, ControllerConfig, ControllerError, DaemonEndpoint, PingOptions, Task, TaskState,
    TransportConfig, TransportError,
};

// =============================================================================
// Fake scamper
// =============================================================================

const LINE_TIMEOUT: Duration = Duration::from_secs(5);

struct FakeScamper<R, W> {
    lines: Lines<BufReader<R>>,
    writer: W,
}

impl<R, W> FakeScamper<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    fn new(reader: R, writer: W) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn say(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn next_line(&mut self) -> Option<String> {
        tokio::time::timeout(LINE_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
    }

    async fn quiet_for(&mut self, period: Duration) -> bool {
        tokio::time::timeout(period, self.lines.next_line())
            .await
            .is_err()
    }

    /// Accept the handshake and announce the cycle, as scamper does
    async fn attach(&mut self) {
        assert_eq!(self.next_line().await.as_deref(), Some("attach format json"));
        self.say("OK").await;
        self.say(r#"{"type":"cycle-start","list_name":"default","id":1,"hostname":"fake","start_time":1700000000}"#)
            .await;
    }

    /// Grant one credit and read the command it buys
    async fn accept_command(&mut self) -> String {
        self.say("MORE").await;
        let command = self.next_line().await.expect("connection closed");
        self.say(&format!("OK id-{}", userid(&command))).await;
        command
    }

    async fn send_result(&mut self, id: u64) {
        let json = format!(
            r#"{{"type":"ping","version":"0.4","method":"icmp-echo","src":"192.0.2.10","dst":"192.0.2.1","userid":{id},"ping_sent":1,"statistics":{{"replies":1}}}}"#
        );
        self.say(&format!("DATA {}", json.len() + 1)).await;
        self.say(&json).await;
    }

    /// Wait for the client to hang up
    async fn wait_for_close(&mut self) {
        while let Ok(Some(_)) = self.lines.next_line().await {}
    }
}

fn userid(command: &str) -> u64 {
    let mut parts = command.split_whitespace();
    while let Some(part) = parts.next() {
        if part == "-U" {
            return parts.next().unwrap().parse().unwrap();
        }
    }
    panic!("no -U in command: {command}");
}

async fn tcp_listener() -> (TcpListener, ControllerConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ControllerConfig::new(TransportConfig::new(DaemonEndpoint::tcp("127.0.0.1", port)));
    (listener, config)
}

async fn accept_tcp(
    listener: &TcpListener,
) -> FakeScamper<tokio::net::tcp::OwnedReadHalf, tokio::net::tcp::OwnedWriteHalf> {
    let (stream, _) = listener.accept().await.unwrap();
    let (reader, writer) = stream.into_split();
    FakeScamper::new(reader, writer)
}

async fn collect(mut results: mpsc::Receiver<Task>) -> Vec<Task> {
    let mut delivered = Vec::new();
    while let Some(task) = results.recv().await {
        delivered.push(task);
    }
    delivered
}

fn target(n: usize) -> String {
    format!("192.0.2.{}", n + 1)
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_every_task_delivered_once() {
    const TASKS: usize = 20;
    let (listener, config) = tcp_listener().await;
    let config = config.with_linger(Duration::from_secs(5));

    let daemon = tokio::spawn(async move {
        let mut scamper = accept_tcp(&listener).await;
        scamper.attach().await;

        let mut ids = Vec::new();
        for _ in 0..TASKS {
            ids.push(userid(&scamper.accept_command().await));
        }
        // Answer in reverse to exercise correlation by ID
        for id in ids.iter().rev() {
            scamper.send_result(*id).await;
        }
        scamper.wait_for_close().await;
        ids
    });

    let mut controller = assert_ok!(Controller::connect(&config).await);
    let printer = tokio::spawn(collect(controller.take_results().unwrap()));

    for n in 0..TASKS {
        assert_ok!(controller.submit(Task::ping(target(n), PingOptions::default())).await);
    }
    controller.drain().await;

    let delivered = printer.await.unwrap();
    let report = controller.close().await;
    let sent_ids = daemon.await.unwrap();

    assert_eq!(delivered.len(), TASKS);
    assert!(delivered.iter().all(|t| t.state == TaskState::Resolved));

    let mut ids: Vec<u64> = delivered.iter().filter_map(|t| t.correlation_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=TASKS as u64).collect::<Vec<_>>());
    assert_eq!(sent_ids, (1..=TASKS as u64).collect::<Vec<_>>());

    assert_eq!(report.resolved, TASKS as u64);
    assert_eq!(report.abandoned, 0);
    assert_eq!(report.missed, 0);
    assert!(!report.timed_out);
}

#[tokio::test]
async fn test_commands_are_rendered_in_submission_order() {
    let (listener, config) = tcp_listener().await;
    let config = config.with_linger(Duration::from_secs(5));

    let daemon = tokio::spawn(async move {
        let mut scamper = accept_tcp(&listener).await;
        scamper.attach().await;
        let first = scamper.accept_command().await;
        let second = scamper.accept_command().await;
        scamper.send_result(userid(&first)).await;
        scamper.send_result(userid(&second)).await;
        scamper.wait_for_close().await;
        (first, second)
    });

    let mut controller = assert_ok!(Controller::connect(&config).await);
    let printer = tokio::spawn(collect(controller.take_results().unwrap()));

    let options = PingOptions {
        probe_count: Some(3),
        ..PingOptions::default()
    };
    assert_ok!(controller.submit(Task::ping("8.8.8.8", options)).await);
    assert_ok!(controller.submit(Task::ping("9.9.9.9", PingOptions::default())).await);
    controller.drain().await;

    let delivered = printer.await.unwrap();
    controller.close().await;
    let (first, second) = daemon.await.unwrap();

    assert_eq!(first, "ping -U 1 -c 3 8.8.8.8");
    assert_eq!(second, "ping -U 2 9.9.9.9");
    assert_eq!(delivered.len(), 2);
    let result = delivered[0].result.as_ref().unwrap();
    assert_eq!(result.kind, "ping");
    assert_eq!(result.extra["ping_sent"], 1);
}

// =============================================================================
// Flow control
// =============================================================================

#[tokio::test]
async fn test_no_command_before_credit() {
    let (listener, config) = tcp_listener().await;
    let config = config.with_linger(Duration::from_secs(5));

    let daemon = tokio::spawn(async move {
        let mut scamper = accept_tcp(&listener).await;
        scamper.attach().await;

        let held_back = scamper.quiet_for(Duration::from_millis(300)).await;

        let command = scamper.accept_command().await;
        scamper.send_result(userid(&command)).await;
        scamper.wait_for_close().await;
        (held_back, command)
    });

    let mut controller = assert_ok!(Controller::connect(&config).await);
    let printer = tokio::spawn(collect(controller.take_results().unwrap()));

    assert_ok!(controller.submit(Task::ping("192.0.2.1", PingOptions::default())).await);
    controller.drain().await;

    let delivered = printer.await.unwrap();
    controller.close().await;
    let (held_back, command) = daemon.await.unwrap();

    assert!(held_back, "command written before MORE");
    assert_eq!(command, "ping -U 1 192.0.2.1");
    assert_eq!(delivered.len(), 1);
}

#[tokio::test]
async fn test_one_credit_buys_one_line() {
    let (listener, config) = tcp_listener().await;
    let config = config.with_linger(Duration::from_secs(5));

    let daemon = tokio::spawn(async move {
        let mut scamper = accept_tcp(&listener).await;
        scamper.attach().await;

        let command = scamper.accept_command().await;
        let nothing_more = scamper.quiet_for(Duration::from_millis(300)).await;
        scamper.send_result(userid(&command)).await;
        scamper.wait_for_close().await;
        (command, nothing_more)
    });

    let mut controller = assert_ok!(Controller::connect(&config).await);
    let printer = tokio::spawn(collect(controller.take_results().unwrap()));

    let smuggled = Task::ping("8.8.8.8\nshutdown cancel", PingOptions::default());
    assert_ok!(controller.submit(smuggled).await);
    assert_ok!(controller.submit(Task::ping("9.9.9.9", PingOptions::default())).await);
    controller.drain().await;

    let delivered = printer.await.unwrap();
    let report = controller.close().await;
    let (command, nothing_more) = daemon.await.unwrap();

    assert_eq!(command, "ping -U 1 9.9.9.9");
    assert!(nothing_more, "a second line went out on one credit");

    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].target, "8.8.8.8\nshutdown cancel");
    assert_eq!(delivered[0].state, TaskState::Abandoned);
    assert_eq!(delivered[0].correlation_id, None);
    assert_eq!(delivered[1].state, TaskState::Resolved);
    assert_eq!(report.resolved, 1);
    assert_eq!(report.abandoned, 1);
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn test_linger_abandons_missing_result() {
    let (listener, config) = tcp_listener().await;
    let config = config.with_linger(Duration::from_millis(300));

    let daemon = tokio::spawn(async move {
        let mut scamper = accept_tcp(&listener).await;
        scamper.attach().await;
        for _ in 0..3 {
            scamper.accept_command().await;
        }
        scamper.send_result(2).await;
        scamper.send_result(1).await;
        // Never answers 3
        scamper.wait_for_close().await;
    });

    let mut controller = assert_ok!(Controller::connect(&config).await);
    let printer = tokio::spawn(collect(controller.take_results().unwrap()));

    for n in 0..3 {
        assert_ok!(controller.submit(Task::ping(target(n), PingOptions::default())).await);
    }
    controller.drain().await;

    let delivered = printer.await.unwrap();
    let report = controller.close().await;
    daemon.await.unwrap();

    let order: Vec<(Option<u64>, TaskState)> = delivered
        .iter()
        .map(|t| (t.correlation_id, t.state))
        .collect();
    assert_eq!(
        order,
        vec![
            (Some(2), TaskState::Resolved),
            (Some(1), TaskState::Resolved),
            (Some(3), TaskState::Abandoned),
        ]
    );
    assert!(delivered[2].result.is_none());
    assert!(report.timed_out);
    assert_eq!(report.resolved, 2);
    assert_eq!(report.abandoned, 1);
}

#[tokio::test]
async fn test_rejections_shorten_linger() {
    let (listener, config) = tcp_listener().await;
    let config = config.with_linger(Duration::from_secs(60));

    let daemon = tokio::spawn(async move {
        let mut scamper = accept_tcp(&listener).await;
        scamper.attach().await;
        for _ in 0..3 {
            scamper.accept_command().await;
        }
        for _ in 0..5 {
            scamper.say("ERR command not accepted").await;
        }
        scamper.wait_for_close().await;
    });

    let mut controller = assert_ok!(Controller::connect(&config).await);
    let printer = tokio::spawn(collect(controller.take_results().unwrap()));

    for n in 0..3 {
        assert_ok!(controller.submit(Task::ping(target(n), PingOptions::default())).await);
    }
    controller.drain().await;

    let delivered = tokio::time::timeout(Duration::from_secs(10), printer)
        .await
        .expect("linger ran its full length")
        .unwrap();
    let report = controller.close().await;
    daemon.await.unwrap();

    assert_eq!(delivered.len(), 3);
    assert!(delivered.iter().all(Task::is_abandoned));
    // The linger ends as soon as rejections cover the outstanding tasks
    assert!(report.rejected >= 3);
    assert!(!report.timed_out);
}

#[tokio::test]
async fn test_hang_up_abandons_everything() {
    let (listener, config) = tcp_listener().await;
    let config = config.with_linger(Duration::from_secs(60));

    let daemon = tokio::spawn(async move {
        let mut scamper = accept_tcp(&listener).await;
        scamper.attach().await;
        scamper.accept_command().await;
        // Drop the connection without answering
    });

    let mut controller = assert_ok!(Controller::connect(&config).await);
    let printer = tokio::spawn(collect(controller.take_results().unwrap()));

    assert_ok!(controller.submit(Task::ping(target(0), PingOptions::default())).await);
    assert_ok!(controller.submit(Task::ping(target(1), PingOptions::default())).await);
    daemon.await.unwrap();
    controller.drain().await;

    let delivered = tokio::time::timeout(Duration::from_secs(10), printer)
        .await
        .expect("pipeline lingered after hang-up")
        .unwrap();
    let report = controller.close().await;

    assert_eq!(delivered.len(), 2);
    assert!(delivered.iter().all(Task::is_abandoned));
    assert_eq!(report.abandoned, 2);
}

#[tokio::test]
async fn test_submit_after_drain_is_refused() {
    let (listener, config) = tcp_listener().await;

    let daemon = tokio::spawn(async move {
        let mut scamper = accept_tcp(&listener).await;
        scamper.attach().await;
        scamper.wait_for_close().await;
    });

    let mut controller = assert_ok!(Controller::connect(&config).await);
    let submitter = controller.submitter();
    controller.drain().await;

    let err = assert_err!(submitter.submit(Task::ping("192.0.2.1", PingOptions::default())).await);
    assert!(matches!(err, ControllerError::Closed));
    assert!(submitter.is_closed());

    let report = controller.close().await;
    assert_eq!(report.delivered(), 0);
    daemon.await.unwrap();
}

// =============================================================================
// Transports
// =============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_unix_socket_endpoint() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("scamper.sock");
    let listener = tokio::net::UnixListener::bind(&path).unwrap();
    let config = ControllerConfig::new(TransportConfig::new(DaemonEndpoint::unix(&path)))
        .with_linger(Duration::from_secs(5));

    let daemon = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, writer) = stream.into_split();
        let mut scamper = FakeScamper::new(reader, writer);
        scamper.attach().await;
        let command = scamper.accept_command().await;
        scamper.send_result(userid(&command)).await;
        scamper.wait_for_close().await;
    });

    let mut controller = assert_ok!(Controller::connect(&config).await);
    let printer = tokio::spawn(collect(controller.take_results().unwrap()));
    assert_ok!(controller.submit(Task::ping("192.0.2.1", PingOptions::default())).await);
    controller.drain().await;

    let delivered = printer.await.unwrap();
    let report = controller.close().await;
    daemon.await.unwrap();

    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].state, TaskState::Resolved);
    assert_eq!(report.resolved, 1);
}

#[tokio::test]
async fn test_connect_refused() {
    let (listener, config) = tcp_listener().await;
    drop(listener);

    let err = assert_err!(Controller::connect(&config).await);
    assert!(matches!(
        err,
        ControllerError::Transport(TransportError::ConnectionFailed { .. })
    ));
}
