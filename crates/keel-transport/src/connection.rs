//! The reconnecting framed connection.
//!
//! Each connection is an actor task that owns its socket exclusively:
//! connects, reconnects, sends, suspends and reads all happen on that one
//! task, so no locking guards the socket or the decoder carry-over state.
//! Owners talk to the actor through a command channel and receive traffic
//! through the [`ConnectionDelegate`] trait, whose callbacks are awaited
//! in-order from the actor (they form the serialized protocol context).
//!
//! Failure policy: a connection that never exchanged data fails fast
//! (short timeout, single retry before rotating endpoints); one that has
//! proven the endpoint good gets a relaxed timeout and a larger retry
//! budget before rotation.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::framing::{FrameDecoder, FrameEvent, encode_frame};
use crate::socket::{BoxedSocket, Connector};

/// Socket timeout before any data has been exchanged on this connect
const FAIL_FAST_TIMEOUT: Duration = Duration::from_secs(8);
/// Socket timeout once the endpoint has proven itself
const ESTABLISHED_TIMEOUT: Duration = Duration::from_secs(35);
/// Reconnect delay while the failure count is low
const RECONNECT_DELAY_SHORT: Duration = Duration::from_millis(300);
/// Reconnect delay once failures accumulate
const RECONNECT_DELAY_LONG: Duration = Duration::from_millis(500);
/// Failure count at which the longer reconnect delay kicks in
const LONG_DELAY_THRESHOLD: u32 = 3;
/// Retry budget after a successful data exchange
const RETRIES_AFTER_DATA: u32 = 5;
/// Retry budget for a connection that never exchanged data
const RETRIES_WITHOUT_DATA: u32 = 1;
/// Consecutive dataless failures before jumping every cursor back to the
/// preferred (443) port
const PREFERRED_PORT_THRESHOLD: u32 = 12;

/// Traffic class a connection serves. Each class rotates through its own
/// address list independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficClass {
    /// Control traffic and small RPCs
    Generic,
    /// Bulk upload
    Upload,
    /// Bulk download (enables partial-frame progress reporting)
    Download,
    /// Push notification channel
    Push,
}

impl TrafficClass {
    /// Whether frames on this class report partial-frame progress.
    #[must_use]
    pub fn reports_progress(self) -> bool {
        matches!(self, TrafficClass::Download)
    }
}

/// Endpoint selection interface the connection rotates through.
///
/// Implemented by the datacenter registry; the connection only ever walks
/// the rotation forward and reports known-good endpoints back.
pub trait EndpointProvider: Send + Sync + 'static {
    /// Address and port at the current rotation cursor.
    fn current_endpoint(&self, class: TrafficClass, ipv6: bool) -> Option<(String, u16)>;
    /// Rotate to the next port, or the next address once ports are
    /// exhausted.
    fn advance(&self, class: TrafficClass, ipv6: bool);
    /// Persist the current cursors as a known-good choice.
    fn persist_active(&self);
    /// Jump every cursor to the first address with the preferred port.
    fn switch_to_preferred_port(&self);
}

/// Reachability oracle consulted before endpoint rotation: rotating while
/// the network is down would just burn through the list.
pub trait ConnectivityOracle: Send + Sync + 'static {
    /// Whether the network currently looks reachable.
    fn is_reachable(&self) -> bool;
}

/// Oracle that always reports the network as reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReachable;

impl ConnectivityOracle for AlwaysReachable {
    fn is_reachable(&self) -> bool {
        true
    }
}

/// Callbacks a connection owner implements.
///
/// Every callback carries the channel token current at delivery time;
/// owners compare it against the token they captured when they started an
/// exchange and discard stale events from a previous socket generation.
#[async_trait]
pub trait ConnectionDelegate: Send + Sync {
    /// Socket established (fires on every successful connect, including
    /// reconnects).
    async fn on_connected(&self, token: u32);
    /// Socket lost; the connection is already scheduling a reconnect.
    async fn on_closed(&self, token: u32);
    /// A complete frame payload arrived.
    async fn on_data(&self, token: u32, payload: Vec<u8>);
    /// The peer quick-acked a message.
    async fn on_quick_ack(&self, token: u32, ack_id: u32);
    /// Partial-frame progress on a download-class connection.
    async fn on_progress(&self, token: u32, message_id: i64, received: u32, total: u32);
}

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Created, never connected
    Idle = 0,
    /// Connect attempt in flight
    Connecting = 1,
    /// Waiting out the backoff delay before the next attempt
    Reconnecting = 2,
    /// Socket established
    Connected = 3,
    /// Deliberately paused; only an explicit connect resumes it
    Suspended = 4,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Reconnecting,
            3 => ConnectionState::Connected,
            4 => ConnectionState::Suspended,
            _ => ConnectionState::Idle,
        }
    }
}

enum Command {
    Connect,
    Send { payload: Vec<u8>, quick_ack: bool },
    Suspend,
    SetDelegate(Option<Arc<dyn ConnectionDelegate>>),
}

struct Shared {
    state: AtomicU8,
    channel_token: AtomicU32,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn token(&self) -> u32 {
        self.channel_token.load(Ordering::SeqCst)
    }
}

/// Handle to a reconnecting framed connection.
///
/// Cheap to clone; dropping every handle shuts the actor down once its
/// socket closes or its next command poll runs.
#[derive(Clone)]
pub struct Connection {
    cmd_tx: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl Connection {
    /// Create a connection for one traffic class of one datacenter and
    /// spawn its actor task. The connection starts [`ConnectionState::Idle`];
    /// nothing touches the network until [`Connection::connect`].
    pub fn new(
        class: TrafficClass,
        ipv6: bool,
        endpoints: Arc<dyn EndpointProvider>,
        connectivity: Arc<dyn ConnectivityOracle>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: AtomicU8::new(ConnectionState::Idle as u8),
            channel_token: AtomicU32::new(0),
        });
        let actor = Actor {
            class,
            ipv6,
            endpoints,
            connectivity,
            connector,
            cmd_rx,
            shared: Arc::clone(&shared),
            delegate: None,
            decoder: FrameDecoder::new(class.reports_progress()),
            socket: None,
            first_packet_sent: false,
            data_since_connect: false,
            exchanged_since_failure: false,
            failed_count: 0,
            retry_budget: RETRIES_WITHOUT_DATA,
            failures_since_data: 0,
            running: true,
        };
        tokio::spawn(actor.run());
        Self { cmd_tx, shared }
    }

    /// Begin connecting (also resumes a suspended connection).
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect);
    }

    /// Queue a payload for transmission. Payload length must be a
    /// positive multiple of 4; violations surface as a dropped send with
    /// a logged warning, like any send raced against a disconnect.
    pub fn send(&self, payload: Vec<u8>, request_quick_ack: bool) {
        let _ = self.cmd_tx.send(Command::Send {
            payload,
            quick_ack: request_quick_ack,
        });
    }

    /// Pause the connection: cancel any reconnect timer and release the
    /// socket without signalling a failure upstream. Idempotent.
    pub fn suspend(&self) {
        let _ = self.cmd_tx.send(Command::Suspend);
    }

    /// Install the delegate receiving this connection's traffic.
    pub fn set_delegate(&self, delegate: Arc<dyn ConnectionDelegate>) {
        let _ = self.cmd_tx.send(Command::SetDelegate(Some(delegate)));
    }

    /// Remove the delegate (ownership handoff between consumers).
    pub fn clear_delegate(&self) {
        let _ = self.cmd_tx.send(Command::SetDelegate(None));
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Current channel token. Bumped on every successful connect, so
    /// callbacks from an older socket generation can be recognized and
    /// discarded.
    #[must_use]
    pub fn channel_token(&self) -> u32 {
        self.shared.token()
    }
}

/// Reconnect delay for a given consecutive failure count.
#[must_use]
pub fn reconnect_delay(failed_count: u32) -> Duration {
    if failed_count >= LONG_DELAY_THRESHOLD {
        RECONNECT_DELAY_LONG
    } else {
        RECONNECT_DELAY_SHORT
    }
}

struct Actor {
    class: TrafficClass,
    ipv6: bool,
    endpoints: Arc<dyn EndpointProvider>,
    connectivity: Arc<dyn ConnectivityOracle>,
    connector: Arc<dyn Connector>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
    delegate: Option<Arc<dyn ConnectionDelegate>>,
    decoder: FrameDecoder,
    socket: Option<BoxedSocket>,
    first_packet_sent: bool,
    data_since_connect: bool,
    exchanged_since_failure: bool,
    failed_count: u32,
    retry_budget: u32,
    failures_since_data: u32,
    running: bool,
}

enum ConnectedStep {
    Cmd(Option<Command>),
    Read(Result<io::Result<usize>, tokio::time::error::Elapsed>),
}

impl Actor {
    async fn run(mut self) {
        while self.running {
            match self.shared.state() {
                ConnectionState::Idle | ConnectionState::Suspended => self.wait_command().await,
                ConnectionState::Connecting => self.attempt_connect().await,
                ConnectionState::Reconnecting => self.wait_reconnect_delay().await,
                ConnectionState::Connected => self.serve_connected().await,
            }
        }
    }

    async fn wait_command(&mut self) {
        match self.cmd_rx.recv().await {
            None => self.running = false,
            Some(Command::Connect) => self.shared.set_state(ConnectionState::Connecting),
            Some(Command::Suspend) => self.shared.set_state(ConnectionState::Suspended),
            Some(Command::SetDelegate(delegate)) => self.delegate = delegate,
            Some(Command::Send { .. }) => {
                warn!(class = ?self.class, "dropping send on inactive connection");
            }
        }
    }

    async fn attempt_connect(&mut self) {
        let Some((address, port)) = self.endpoints.current_endpoint(self.class, self.ipv6) else {
            warn!(class = ?self.class, ipv6 = self.ipv6, "no endpoint available");
            self.register_failure();
            return;
        };
        debug!(class = ?self.class, address = %address, port, "connecting");

        match tokio::time::timeout(FAIL_FAST_TIMEOUT, self.connector.connect(&address, port)).await
        {
            Ok(Ok(socket)) => {
                self.socket = Some(socket);
                self.decoder.reset();
                self.first_packet_sent = false;
                self.data_since_connect = false;
                let token = self.shared.channel_token.fetch_add(1, Ordering::SeqCst) + 1;
                self.shared.set_state(ConnectionState::Connected);
                debug!(class = ?self.class, token, "connected");
                if let Some(delegate) = self.delegate.clone() {
                    delegate.on_connected(token).await;
                }
            }
            Ok(Err(error)) => {
                debug!(class = ?self.class, %error, "connect failed");
                self.register_failure();
            }
            Err(_) => {
                debug!(class = ?self.class, "connect timed out");
                self.register_failure();
            }
        }
    }

    async fn wait_reconnect_delay(&mut self) {
        let delay = reconnect_delay(self.failed_count);
        debug!(class = ?self.class, ?delay, failures = self.failed_count, "reconnect scheduled");
        tokio::select! {
            cmd = self.cmd_rx.recv() => match cmd {
                // Dropping out of the select cancels the timer: at most
                // one reconnect is ever pending.
                None => self.running = false,
                Some(Command::Suspend) => self.shared.set_state(ConnectionState::Suspended),
                Some(Command::Connect) => self.shared.set_state(ConnectionState::Connecting),
                Some(Command::SetDelegate(delegate)) => self.delegate = delegate,
                Some(Command::Send { .. }) => {
                    warn!(class = ?self.class, "dropping send while reconnecting");
                }
            },
            () = tokio::time::sleep(delay) => {
                self.shared.set_state(ConnectionState::Connecting);
            }
        }
    }

    async fn serve_connected(&mut self) {
        let timeout = if self.data_since_connect {
            ESTABLISHED_TIMEOUT
        } else {
            FAIL_FAST_TIMEOUT
        };

        let mut buf = [0u8; 16 * 1024];
        let step = {
            let Some(socket) = self.socket.as_mut() else {
                self.shared.set_state(ConnectionState::Connecting);
                return;
            };
            tokio::select! {
                cmd = self.cmd_rx.recv() => ConnectedStep::Cmd(cmd),
                read = tokio::time::timeout(timeout, socket.read(&mut buf)) => ConnectedStep::Read(read),
            }
        };

        match step {
            ConnectedStep::Cmd(None) => {
                self.teardown_socket();
                self.running = false;
            }
            ConnectedStep::Cmd(Some(Command::Connect)) => {}
            ConnectedStep::Cmd(Some(Command::Suspend)) => {
                // A deliberate pause, not a failure: no on_closed.
                self.teardown_socket();
                self.shared.set_state(ConnectionState::Suspended);
                debug!(class = ?self.class, "suspended");
            }
            ConnectedStep::Cmd(Some(Command::SetDelegate(delegate))) => self.delegate = delegate,
            ConnectedStep::Cmd(Some(Command::Send { payload, quick_ack })) => {
                if let Err(error) = self.write_frame(&payload, quick_ack).await {
                    warn!(class = ?self.class, %error, "send failed");
                    self.handle_socket_failure().await;
                }
            }
            ConnectedStep::Read(Err(_elapsed)) => {
                debug!(class = ?self.class, "socket timed out");
                self.handle_socket_failure().await;
            }
            ConnectedStep::Read(Ok(Ok(0))) => {
                debug!(class = ?self.class, "peer closed connection");
                self.handle_socket_failure().await;
            }
            ConnectedStep::Read(Ok(Ok(n))) => {
                let data = buf[..n].to_vec();
                self.on_bytes(&data).await;
            }
            ConnectedStep::Read(Ok(Err(error))) => {
                debug!(class = ?self.class, %error, "socket read failed");
                self.handle_socket_failure().await;
            }
        }
    }

    async fn write_frame(&mut self, payload: &[u8], quick_ack: bool) -> Result<(), TransportError> {
        let frame = encode_frame(payload, quick_ack, !self.first_packet_sent)?;
        let socket = self.socket.as_mut().ok_or(TransportError::NotConnected)?;
        socket.write_all(&frame).await?;
        socket.flush().await?;
        self.first_packet_sent = true;
        Ok(())
    }

    async fn on_bytes(&mut self, data: &[u8]) {
        if !self.data_since_connect {
            // First data on this socket: the endpoint is good. Relax the
            // timeout, persist the cursors, forget accumulated failures.
            self.data_since_connect = true;
            self.exchanged_since_failure = true;
            self.failed_count = 0;
            self.failures_since_data = 0;
            self.endpoints.persist_active();
        }

        let mut events = Vec::new();
        if let Err(error) = self.decoder.feed(data, &mut events) {
            warn!(class = ?self.class, %error, "malformed frame, reconnecting");
            self.handle_socket_failure().await;
            return;
        }

        let token = self.shared.token();
        if let Some(delegate) = self.delegate.clone() {
            for event in events {
                match event {
                    FrameEvent::Frame(payload) => delegate.on_data(token, payload).await,
                    FrameEvent::QuickAck(ack_id) => delegate.on_quick_ack(token, ack_id).await,
                    FrameEvent::Progress {
                        message_id,
                        received,
                        total,
                    } => delegate.on_progress(token, message_id, received, total).await,
                }
            }
        }
    }

    async fn handle_socket_failure(&mut self) {
        self.teardown_socket();
        let token = self.shared.token();
        if let Some(delegate) = self.delegate.clone() {
            delegate.on_closed(token).await;
        }
        self.register_failure();
    }

    fn register_failure(&mut self) {
        self.failed_count += 1;
        self.failures_since_data += 1;

        if self.failed_count == 1 {
            self.retry_budget = if self.exchanged_since_failure {
                RETRIES_AFTER_DATA
            } else {
                RETRIES_WITHOUT_DATA
            };
            self.exchanged_since_failure = false;
        }

        if self.connectivity.is_reachable() {
            if self.failed_count > self.retry_budget {
                debug!(class = ?self.class, "retry budget exhausted, rotating endpoint");
                self.endpoints.advance(self.class, self.ipv6);
                self.failed_count = 0;
            }
            if self.failures_since_data >= PREFERRED_PORT_THRESHOLD {
                debug!(class = ?self.class, "repeated failures, switching to preferred port");
                self.endpoints.switch_to_preferred_port();
                self.failures_since_data = 0;
            }
        }

        self.shared.set_state(ConnectionState::Reconnecting);
    }

    fn teardown_socket(&mut self) {
        self.socket = None;
        self.decoder.reset();
        self.first_packet_sent = false;
        self.data_since_connect = false;
    }
}
