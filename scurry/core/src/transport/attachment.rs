//! scamper Attachment
//!
//! One control connection to a running scamper, attached in JSON mode.
//!
//! Three tasks run per attachment:
//!
//! ```text
//!   socket ──► reader ──lines──► inbound ──┬──► results
//!                                          ├──► errors
//!                                          └──► credit bank
//!                                                    │
//!   commands ──────────────────────────► outbound ◄──┘ ──► socket
//! ```
//!
//! The reader only frames bytes into lines. It cannot be interrupted while
//! blocked on the socket, so it is aborted after the connection is shut down
//! in [`Attachment::close`].

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::config::TransportConfig;
use super::credit::{credit_bank, CreditGranter, CreditWaiter, GrantOutcome};
use super::endpoint::DaemonEndpoint;
use super::{BoxedReader, BoxedWriter};
use crate::error::TransportError;
use crate::protocol::{classify, ControlLine, ATTACH_COMMAND};
use crate::worker::{StopSignal, Worker};

type CommandWriter = BufWriter<BoxedWriter>;

/// An attached control connection
///
/// Dropping an `Attachment` without calling [`close`](Self::close) stops the
/// workers but leaves the socket to be closed when the tasks unwind.
#[derive(Debug)]
pub struct Attachment {
    commands: mpsc::Sender<String>,
    results: Option<mpsc::Receiver<String>>,
    errors: Option<mpsc::Receiver<String>>,
    outbound: Worker<CommandWriter>,
    inbound: Worker<()>,
    reader: JoinHandle<()>,
    span: tracing::Span,
}

impl Attachment {
    /// Dial the configured endpoint and attach
    ///
    /// A failed or timed-out dial is returned as is. Nothing here retries.
    pub async fn open(config: &TransportConfig) -> Result<Self, TransportError> {
        let endpoint = &config.endpoint;
        let (reader, writer) = tokio::time::timeout(config.connect_timeout(), dial(endpoint))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                endpoint: endpoint.to_string(),
                timeout_ms: config.connect_timeout_ms,
            })??;

        info!(endpoint = %endpoint, "Connected to scamper");
        Self::attach(reader, writer, config, info_span!("attachment", endpoint = %endpoint)).await
    }

    /// Attach over an already connected stream pair
    ///
    /// Only the queue and credit limits of `config` are used.
    pub async fn from_stream<R, W>(
        reader: R,
        writer: W,
        config: &TransportConfig,
    ) -> Result<Self, TransportError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::attach(
            Box::new(reader),
            Box::new(writer),
            config,
            info_span!("attachment", endpoint = "stream"),
        )
        .await
    }

    async fn attach(
        reader: BoxedReader,
        writer: BoxedWriter,
        config: &TransportConfig,
        span: tracing::Span,
    ) -> Result<Self, TransportError> {
        let mut writer = BufWriter::new(writer);
        write_line(&mut writer, ATTACH_COMMAND).await?;
        debug!(parent: &span, "Sent attach handshake");

        let capacity = config.queue_capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (line_tx, line_rx) = mpsc::channel(capacity);
        let (result_tx, result_rx) = mpsc::channel(capacity);
        let (error_tx, error_rx) = mpsc::channel(capacity);
        let (granter, waiter) = credit_bank(config.credit_capacity);

        let reader = tokio::spawn(read_lines(reader, line_tx).instrument(span.clone()));
        let inbound = Worker::spawn(span.clone(), |stop| {
            run_inbound(line_rx, result_tx, error_tx, granter, stop)
        });
        let outbound = Worker::spawn(span.clone(), |stop| {
            run_outbound(writer, command_rx, waiter, stop)
        });

        Ok(Self {
            commands: command_tx,
            results: Some(result_rx),
            errors: Some(error_rx),
            outbound,
            inbound,
            reader,
            span,
        })
    }

    /// Queue for outgoing command lines
    ///
    /// Sending waits while the queue is full.
    #[must_use]
    pub fn commands(&self) -> mpsc::Sender<String> {
        self.commands.clone()
    }

    /// Take the stream of JSON result lines
    ///
    /// Returns `None` if already taken. The stream ends when the connection
    /// closes or the attachment is closed.
    pub fn take_results(&mut self) -> Option<mpsc::Receiver<String>> {
        self.results.take()
    }

    /// Take the stream of rejection messages
    ///
    /// Returns `None` if already taken.
    pub fn take_errors(&mut self) -> Option<mpsc::Receiver<String>> {
        self.errors.take()
    }

    /// Shut the attachment down
    ///
    /// Stops the outbound worker, then the inbound worker, then closes the
    /// connection and reaps the reader.
    pub async fn close(self) {
        let Self {
            commands,
            results,
            errors,
            outbound,
            inbound,
            reader,
            span,
        } = self;
        // Untaken queues would otherwise hold the inbound worker in a full send
        drop((commands, results, errors));

        async move {
            let writer = outbound.stop().await;
            inbound.stop().await;

            if let Some(mut writer) = writer {
                if let Err(e) = writer.shutdown().await {
                    debug!(error = %e, "Error shutting down connection");
                }
            }

            reader.abort();
            let _ = reader.await;
            info!("Detached from scamper");
        }
        .instrument(span)
        .await;
    }
}

async fn dial(endpoint: &DaemonEndpoint) -> Result<(BoxedReader, BoxedWriter), TransportError> {
    let failed = |source| TransportError::ConnectionFailed {
        endpoint: endpoint.to_string(),
        source,
    };

    match endpoint {
        DaemonEndpoint::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(failed)?;
            stream.set_nodelay(true).map_err(failed)?;
            let (read_half, write_half) = stream.into_split();
            Ok((Box::new(read_half), Box::new(write_half)))
        }
        #[cfg(unix)]
        DaemonEndpoint::Unix { path } => {
            let stream = tokio::net::UnixStream::connect(path)
                .await
                .map_err(failed)?;
            let (read_half, write_half) = stream.into_split();
            Ok((Box::new(read_half), Box::new(write_half)))
        }
        #[cfg(not(unix))]
        DaemonEndpoint::Unix { .. } => Err(TransportError::UnsupportedTransport(
            endpoint.to_string(),
        )),
    }
}

async fn write_line(writer: &mut CommandWriter, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Frame the socket into lines until EOF or a read error
async fn read_lines(reader: BoxedReader, lines: mpsc::Sender<String>) {
    let mut framed = BufReader::new(reader).lines();
    loop {
        match framed.next_line().await {
            Ok(Some(line)) => {
                if lines.send(line).await.is_err() {
                    debug!("Inbound worker gone, reader exiting");
                    break;
                }
            }
            Ok(None) => {
                info!("scamper closed the connection");
                break;
            }
            Err(e) => {
                error!(error = %e, "Read error on control connection");
                break;
            }
        }
    }
}

/// Classify lines and fan them out
///
/// Exits on stop or when the reader ends. The result and error queues close
/// with it.
async fn run_inbound(
    mut lines: mpsc::Receiver<String>,
    results: mpsc::Sender<String>,
    errors: mpsc::Sender<String>,
    credits: CreditGranter,
    mut stop: StopSignal,
) {
    loop {
        let line = tokio::select! {
            biased;
            _ = &mut stop => break,
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        match classify(&line) {
            ControlLine::Ack => debug!("OK"),
            ControlLine::Credit => match credits.grant() {
                GrantOutcome::Banked { available } => debug!(available, "MORE"),
                GrantOutcome::Overflow => warn!(
                    capacity = credits.capacity(),
                    "Credit bank full, dropping MORE"
                ),
                GrantOutcome::Closed => debug!("MORE after outbound worker exited"),
            },
            ControlLine::Data(Ok(len)) => debug!(len, "DATA"),
            ControlLine::Data(Err(e)) => warn!(error = %e, "Ignoring DATA line"),
            ControlLine::Error(message) => tokio::select! {
                biased;
                _ = &mut stop => break,
                sent = errors.send(message.to_owned()) => if sent.is_err() {
                    debug!(rejection = message, "No error consumer, dropping rejection");
                },
            },
            ControlLine::Result(payload) => tokio::select! {
                biased;
                _ = &mut stop => break,
                sent = results.send(payload.to_owned()) => if sent.is_err() {
                    debug!("No result consumer, dropping result");
                },
            },
        }
    }
    info!("Inbound worker stopped");
}

/// Write commands, one credit each
///
/// Hands the writer back so the owner can close the connection.
async fn run_outbound(
    mut writer: CommandWriter,
    mut commands: mpsc::Receiver<String>,
    mut credits: CreditWaiter,
    mut stop: StopSignal,
) -> CommandWriter {
    loop {
        let command = tokio::select! {
            biased;
            _ = &mut stop => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let granted = tokio::select! {
            biased;
            _ = &mut stop => {
                debug!(command = %command, "Stopped while waiting for credit");
                break;
            }
            granted = credits.acquire() => granted,
        };
        if !granted {
            warn!(command = %command, "Connection gone, command not sent");
            break;
        }

        if let Err(e) = write_line(&mut writer, &command).await {
            error!(error = %e, "Failed to write command");
            break;
        }
        debug!(command = %command, "Sent command");
    }
    info!("Outbound worker stopped");
    writer
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, DuplexStream, ReadHalf, WriteHalf};

    struct FakeDaemon {
        lines: tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeDaemon {
        async fn say(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn hear(&mut self) -> Option<String> {
            tokio::time::timeout(Duration::from_millis(200), self.lines.next_line())
                .await
                .ok()
                .and_then(|line| line.unwrap())
        }
    }

    async fn attached(config: TransportConfig) -> (Attachment, FakeDaemon) {
        let (client, daemon) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (daemon_read, daemon_write) = tokio::io::split(daemon);
        let attachment = Attachment::from_stream(client_read, client_write, &config)
            .await
            .unwrap();
        let daemon = FakeDaemon {
            lines: BufReader::new(daemon_read).lines(),
            writer: daemon_write,
        };
        (attachment, daemon)
    }

    #[tokio::test]
    async fn test_handshake_is_first_line() {
        let (attachment, mut daemon) = attached(TransportConfig::default()).await;
        assert_eq!(daemon.hear().await.as_deref(), Some(ATTACH_COMMAND));
        attachment.close().await;
    }

    #[tokio::test]
    async fn test_command_waits_for_credit() {
        let (attachment, mut daemon) = attached(TransportConfig::default()).await;
        daemon.hear().await;

        attachment.commands().send("ping -U 1 192.0.2.1".into()).await.unwrap();
        assert_eq!(daemon.hear().await, None, "sent without credit");

        daemon.say("MORE").await;
        assert_eq!(daemon.hear().await.as_deref(), Some("ping -U 1 192.0.2.1"));

        attachment.close().await;
    }

    #[tokio::test]
    async fn test_lines_are_routed() {
        let (mut attachment, mut daemon) = attached(TransportConfig::default()).await;
        let mut results = attachment.take_results().unwrap();
        let mut errors = attachment.take_errors().unwrap();
        assert!(attachment.take_results().is_none());

        daemon.say("OK").await;
        daemon.say("DATA 24").await;
        daemon.say(r#"{"type":"ping","userid":1}"#).await;
        daemon.say("ERR command not understood").await;

        assert_eq!(
            results.recv().await.as_deref(),
            Some(r#"{"type":"ping","userid":1}"#)
        );
        assert_eq!(
            errors.recv().await.as_deref(),
            Some("command not understood")
        );

        attachment.close().await;
        assert_eq!(results.recv().await, None);
        assert_eq!(errors.recv().await, None);
    }

    #[tokio::test]
    async fn test_excess_credit_is_dropped() {
        let config = TransportConfig {
            credit_capacity: 1,
            ..Default::default()
        };
        let (attachment, mut daemon) = attached(config).await;
        daemon.hear().await;

        daemon.say("MORE").await;
        daemon.say("MORE").await;
        daemon.say("MORE").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let commands = attachment.commands();
        commands.send("ping -U 1 a".into()).await.unwrap();
        commands.send("ping -U 2 b".into()).await.unwrap();

        assert_eq!(daemon.hear().await.as_deref(), Some("ping -U 1 a"));
        assert_eq!(daemon.hear().await, None);

        daemon.say("MORE").await;
        assert_eq!(daemon.hear().await.as_deref(), Some("ping -U 2 b"));

        attachment.close().await;
    }

    #[tokio::test]
    async fn test_queues_close_when_daemon_hangs_up() {
        let (mut attachment, daemon) = attached(TransportConfig::default()).await;
        let mut results = attachment.take_results().unwrap();
        drop(daemon);

        let end = tokio::time::timeout(Duration::from_secs(1), results.recv()).await;
        assert_eq!(end.unwrap(), None);
        attachment.close().await;
    }

    #[tokio::test]
    async fn test_close_with_full_untaken_result_queue() {
        let config = TransportConfig {
            queue_capacity: 1,
            ..Default::default()
        };
        let (attachment, mut daemon) = attached(config).await;
        daemon.hear().await;

        for id in 1..=5 {
            daemon.say(&format!(r#"{{"type":"ping","userid":{id}}}"#)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let closed = tokio::time::timeout(Duration::from_secs(2), attachment.close()).await;
        assert!(closed.is_ok(), "close blocked on a full result queue");
    }

    #[tokio::test]
    async fn test_open_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = TransportConfig::new(DaemonEndpoint::tcp("127.0.0.1", port));
        let err = Attachment::open(&config).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
    }
}
