//! C4: the connection lifecycle state machine.
//!
//! [`Connection`] is one `async fn connect` that walks IDLE through to
//! READY, suspending at an `.await` point at every DNS lookup, TCP/TLS
//! connect, handshake read/write, and AMF command wait. There is no
//! separate idle-callback "async disconnect" to schedule: because this is a
//! single sequential future rather than a tree of re-entrant callbacks, a
//! protocol violation observed while decoding an inbound command simply
//! returns an error up the same call stack that is already unwinding, and
//! `disconnect` runs only after that unwind completes.
//!
//! The caller's own async task stands in for an externally-provided event
//! loop: after `connect()` reaches [`ConnectionState::Ready`], the caller
//! alternates between the publisher entry points and
//! [`Connection::poll_inbound`], which is where the watchdog and the
//! bandwidth/`onStatus`/`close` handling live.

use std::sync::Arc;
use std::time::Duration;

use rtmpub_amf0::Amf0Decoder;
use rtmpub_context::{Context, ContextFutExt, Handler};
use rtmpub_future_ext::FutureExt;
use tokio::net::TcpStream;

use crate::chunk::{ChunkMultiplexer, MuxEvent, Outgoing, CSID_COMMAND, CSID_VIDEO, PUBLISHER_CHUNK_SIZE};
use crate::command;
use crate::disconnect::{reason_from_io_error, DisconnectReason, StatusInfo};
use crate::error::{ConnectError, PublishError};
use crate::message_type::MessageType;
use crate::transport::Transport;
use crate::url::RtmpUrl;

/// Coarse connection lifecycle state.
///
/// The handshake's S0/S1/S2 sub-steps collapse into [`Self::WaitHandshake`]:
/// they never yield back to a caller mid-handshake, so they are not
/// independently observable states in an async rendering of the FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    WaitDns,
    WaitTcp,
    WaitHandshake,
    WaitFms,
    Ready,
}

/// An event observed while polling an already-`Ready` connection for
/// inbound traffic.
#[derive(Debug)]
pub enum SessionEvent {
    /// The session ended; no further sends will succeed.
    Disconnected(DisconnectReason),
    /// The peer changed its advertised bandwidth; purely informational.
    PeerBandwidthChanged { bandwidth: u32 },
}

/// Small per-session tunables, gathered into one `Default`-able options
/// struct rather than a config-file layer.
#[derive(Clone)]
pub struct ConnectOptions {
    /// How long the DNS watchdog waits before failing `connect` with
    /// [`DisconnectReason::Timeout`].
    pub dns_timeout: Duration,
    /// How long the session may go without any socket activity before the
    /// watchdog fires.
    pub watchdog_idle: Duration,
    /// Overrides the TLS SNI/certificate hostname; `None` uses the URL host.
    pub tls_server_name: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            dns_timeout: Duration::from_secs(10),
            watchdog_idle: Duration::from_secs(5),
            tls_server_name: None,
        }
    }
}

/// A cheap, cloneable handle that can interrupt an in-flight `connect()` or
/// an idle `poll_inbound()` from outside the task driving the [`Connection`]
///. Cancelling an idle connection is a no-op.
#[derive(Clone)]
pub struct AbortHandle(Arc<Handler>);

impl AbortHandle {
    /// Requests that the connection stop at its next suspension point.
    pub fn abort(&self) {
        self.0.cancel();
    }
}

enum Guarded<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

async fn guarded<F: std::future::Future>(fut: F, timeout: Duration, ctx: &Context) -> Guarded<F::Output> {
    match fut.with_timeout(timeout).with_context(ctx).await {
        None => Guarded::Cancelled,
        Some(Err(_elapsed)) => Guarded::TimedOut,
        Some(Ok(value)) => Guarded::Ready(value),
    }
}

/// An RTMP(S) publishing session: URL parsing through handshake, the AMF
/// command dialog, and — once `Ready` — the chunk-layer watchdog and
/// protocol-control dispatch.
pub struct Connection {
    state: ConnectionState,
    options: ConnectOptions,
    ctx: Context,
    handler: Arc<Handler>,
    mux: Option<ChunkMultiplexer<Transport>>,
    url: Option<RtmpUrl>,
    next_txn_id: f64,
    connect_txn_id: f64,
    create_stream_txn_id: f64,
    reason: DisconnectReason,
    on_state_change: Option<Box<dyn FnMut(ConnectionState) + Send>>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(ConnectOptions::default())
    }
}

impl Connection {
    /// Creates an idle connection. Call [`Connection::connect`] to bring it up.
    pub fn new(options: ConnectOptions) -> Self {
        let (ctx, handler) = Context::new();
        Self {
            state: ConnectionState::Idle,
            options,
            ctx,
            handler: Arc::new(handler),
            mux: None,
            url: None,
            next_txn_id: 1.0,
            connect_txn_id: 0.0,
            create_stream_txn_id: 0.0,
            reason: DisconnectReason::Unknown,
            on_state_change: None,
        }
    }

    /// Registers the mandatory connection-state callback.
    pub fn on_state_change(&mut self, callback: impl FnMut(ConnectionState) + Send + 'static) {
        self.on_state_change = Some(Box::new(callback));
    }

    /// Returns a cloneable handle that can interrupt this connection from
    /// another task.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(self.handler.clone())
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The reason recorded on the last `disconnect`, or [`DisconnectReason::Unknown`]
    /// before any connection attempt has ended.
    pub fn last_disconnect_reason(&self) -> DisconnectReason {
        self.reason
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        if let Some(cb) = self.on_state_change.as_mut() {
            cb(state);
        }
    }

    fn next_txn_id(&mut self) -> f64 {
        let id = self.next_txn_id;
        self.next_txn_id += 1.0;
        id
    }

    /// Parses `url`, resolves and connects the transport, performs the RTMP
    /// handshake, and runs the AMF `connect` → `releaseStream` → `FCPublish`
    /// → `createStream` → `publish` dialog through to
    /// [`ConnectionState::Ready`].
    ///
    /// May only be called once per `Connection`, from [`ConnectionState::Idle`]
    pub async fn connect(&mut self, url: &str) -> Result<(), ConnectError> {
        if self.state != ConnectionState::Idle {
            return Err(ConnectError::AlreadyConnecting);
        }
        let parsed = RtmpUrl::parse(url)?;
        tracing::info!(url = %parsed.anonymize(), "connecting");

        self.set_state(ConnectionState::WaitDns);
        let addr = match guarded(tokio::net::lookup_host((parsed.host.as_str(), parsed.port)), self.options.dns_timeout, &self.ctx).await {
            Guarded::Cancelled => return Err(self.abort_during_connect().await),
            Guarded::TimedOut => {
                self.teardown(DisconnectReason::Timeout);
                return Err(ConnectError::Timeout);
            }
            Guarded::Ready(Err(io_err)) => {
                self.teardown(reason_from_io_error(&io_err));
                return Err(ConnectError::Dns(io_err));
            }
            Guarded::Ready(Ok(mut addrs)) => match addrs.next() {
                Some(addr) => addr,
                None => {
                    self.teardown(DisconnectReason::NetworkError);
                    return Err(ConnectError::Dns(std::io::Error::from(std::io::ErrorKind::NotFound)));
                }
            },
        };

        self.set_state(ConnectionState::WaitTcp);
        let tcp = match guarded(TcpStream::connect(addr), self.options.dns_timeout, &self.ctx).await {
            Guarded::Cancelled => return Err(self.abort_during_connect().await),
            Guarded::TimedOut => {
                self.teardown(DisconnectReason::Timeout);
                return Err(ConnectError::Timeout);
            }
            Guarded::Ready(Err(io_err)) => {
                let reason = reason_from_io_error(&io_err);
                self.teardown(reason);
                return Err(ConnectError::Tcp(io_err));
            }
            Guarded::Ready(Ok(tcp)) => tcp,
        };

        let transport = if parsed.secure {
            #[cfg(feature = "tls")]
            {
                let sni_host = self.options.tls_server_name.clone().unwrap_or_else(|| parsed.host.clone());
                match crate::transport::connect_tls(tcp, &sni_host).await {
                    Ok(t) => t,
                    Err(err) => {
                        self.teardown(DisconnectReason::NetworkError);
                        return Err(ConnectError::Tls(std::io::Error::other(err)));
                    }
                }
            }
            #[cfg(not(feature = "tls"))]
            {
                self.teardown(DisconnectReason::InternalError);
                return Err(ConnectError::TlsUnsupported);
            }
        } else {
            Transport::Plain(tcp)
        };

        self.set_state(ConnectionState::WaitHandshake);
        let mut mux = ChunkMultiplexer::new(transport);
        match guarded(crate::handshake::perform(mux.stream_mut()), self.options.watchdog_idle, &self.ctx).await {
            Guarded::Cancelled => return Err(self.abort_during_connect().await),
            Guarded::TimedOut => {
                self.teardown(DisconnectReason::Timeout);
                return Err(ConnectError::Timeout);
            }
            Guarded::Ready(Err(err)) => {
                self.teardown(DisconnectReason::NetworkError);
                return Err(ConnectError::Handshake(err));
            }
            Guarded::Ready(Ok(())) => {}
        }
        self.mux = Some(mux);
        self.url = Some(parsed);

        self.set_state(ConnectionState::WaitFms);
        if let Err(err) = self.run_connect_dialog().await {
            return Err(err);
        }
        Ok(())
    }

    async fn abort_during_connect(&mut self) -> ConnectError {
        self.teardown(DisconnectReason::ClientRequest);
        ConnectError::Rejected(DisconnectReason::ClientRequest)
    }

    fn mux_mut(&mut self) -> Result<&mut ChunkMultiplexer<Transport>, ConnectError> {
        self.mux.as_mut().ok_or(ConnectError::AlreadyConnecting)
    }

    async fn send_connect_dialog_open(&mut self) -> Result<(), ConnectError> {
        let url = self.url.clone().expect("set before WaitFms");
        let connect_txn = self.next_txn_id();
        self.connect_txn_id = connect_txn;
        let payload = command::encode_connect(connect_txn, &url.app, &url.tc_url())?;
        self.mux_mut()?
            .send_message(Outgoing {
                csid: CSID_COMMAND,
                mtid: MessageType::CommandAmf0.0,
                msid: 0,
                timestamp: 0,
                data_header: None,
                payload: payload.into(),
                token: 0,
                internal: true,
                next_chunk_size: None,
                release: None,
            })
            .await?;
        self.mux_mut()?.set_chunk_size(PUBLISHER_CHUNK_SIZE).await?;
        Ok(())
    }

    async fn send_release_fcpublish_create_stream(&mut self) -> Result<(), ConnectError> {
        let url = self.url.clone().expect("set before WaitFms");
        let release_txn = self.next_txn_id();
        let fcpublish_txn = self.next_txn_id();
        let create_txn = self.next_txn_id();
        self.create_stream_txn_id = create_txn;

        for payload in [
            command::encode_release_stream(release_txn, &url.key)?,
            command::encode_fc_publish(fcpublish_txn, &url.key)?,
            command::encode_create_stream(create_txn)?,
        ] {
            self.mux_mut()?
                .send_message(Outgoing {
                    csid: CSID_COMMAND,
                    mtid: MessageType::CommandAmf0.0,
                    msid: 0,
                    timestamp: 0,
                    data_header: None,
                    payload: payload.into(),
                    token: 0,
                    internal: true,
                    next_chunk_size: None,
                    release: None,
                })
                .await?;
        }
        Ok(())
    }

    async fn send_publish(&mut self) -> Result<(), ConnectError> {
        let key = self.url.clone().expect("set before WaitFms").key;
        let txn = self.next_txn_id();
        let payload = command::encode_publish(txn, &key)?;
        let msid = self.mux_mut()?.published_message_stream_id();
        self.mux_mut()?
            .send_message(Outgoing {
                csid: CSID_VIDEO,
                mtid: MessageType::CommandAmf0.0,
                msid,
                timestamp: 0,
                data_header: None,
                payload: payload.into(),
                token: 0,
                internal: true,
                next_chunk_size: None,
                release: None,
            })
            .await?;
        Ok(())
    }

    /// Drives the AMF command dialog from `connect` through to the
    /// `NetStream.Publish.Start` `onStatus`.
    async fn run_connect_dialog(&mut self) -> Result<(), ConnectError> {
        self.send_connect_dialog_open().await?;

        loop {
            let event = match self.guarded_read_event().await {
                Ok(event) => event,
                Err(err) => return Err(err),
            };
            match event {
                MuxEvent::PeerBandwidthUpdate { bandwidth, limit_type } => {
                    tracing::debug!(bandwidth, ?limit_type, "peer bandwidth update during connect dialog");
                }
                MuxEvent::Command { payload, .. } => {
                    let mut decoder = Amf0Decoder::new(payload);
                    let (name, txn) = decoder.get_msg_name()?;
                    match name.as_str() {
                        "_result" if txn == self.connect_txn_id => {
                            self.send_release_fcpublish_create_stream().await?;
                        }
                        "_result" if txn == self.create_stream_txn_id => {
                            decoder.skip_any()?;
                            let stream_id = decoder.get_number()? as u32;
                            self.mux_mut()?.store_message_stream_id(stream_id);
                            self.send_publish().await?;
                        }
                        "_error" => {
                            let info = StatusInfo::decode(&mut decoder)?;
                            let reason = info.to_disconnect_reason().unwrap_or(DisconnectReason::Refused);
                            self.teardown(reason);
                            return Err(ConnectError::Rejected(reason));
                        }
                        "onStatus" => {
                            let info = StatusInfo::decode(&mut decoder)?;
                            if let Some(reason) = info.to_disconnect_reason() {
                                self.teardown(reason);
                                return Err(ConnectError::Rejected(reason));
                            }
                            if info.code.as_deref() == Some("NetStream.Publish.Start") {
                                self.set_state(ConnectionState::Ready);
                                tracing::info!("publish started");
                                return Ok(());
                            }
                        }
                        "close" => {
                            self.teardown(DisconnectReason::ServerRequest);
                            return Err(ConnectError::Rejected(DisconnectReason::ServerRequest));
                        }
                        other => tracing::debug!(name = other, "ignoring unhandled command during connect dialog"),
                    }
                }
            }
        }
    }

    async fn guarded_read_event(&mut self) -> Result<MuxEvent, ConnectError> {
        let timeout = self.options.watchdog_idle;
        let ctx = self.ctx.clone();
        let mux = self.mux_mut()?;
        match guarded(mux.read_event(), timeout, &ctx).await {
            Guarded::Cancelled => Err(self.abort_during_connect().await),
            Guarded::TimedOut => {
                self.teardown(DisconnectReason::Timeout);
                Err(ConnectError::Timeout)
            }
            Guarded::Ready(Err(err)) => {
                self.teardown(DisconnectReason::NetworkError);
                Err(ConnectError::Chunk(err))
            }
            Guarded::Ready(Ok(event)) => Ok(event),
        }
    }

    /// Polls once for inbound traffic on a `Ready` connection: the watchdog,
    /// `onStatus`/`_error`/`close` handling, and peer-bandwidth updates
    ///. Returns `Ok(None)` for traffic that
    /// does not need the caller's attention (e.g. an informational
    /// `onStatus`).
    pub async fn poll_inbound(&mut self) -> Result<Option<SessionEvent>, ConnectError> {
        if self.state != ConnectionState::Ready {
            return Err(ConnectError::Rejected(DisconnectReason::InternalError));
        }
        let event = self.guarded_read_event().await?;
        match event {
            MuxEvent::PeerBandwidthUpdate { bandwidth, .. } => Ok(Some(SessionEvent::PeerBandwidthChanged { bandwidth })),
            MuxEvent::Command { payload, .. } => {
                let mut decoder = Amf0Decoder::new(payload);
                let (name, txn) = decoder.get_msg_name().map_err(ConnectError::Amf0)?;
                let _ = txn;
                match name.as_str() {
                    "onStatus" => {
                        let info = StatusInfo::decode(&mut decoder).map_err(ConnectError::Amf0)?;
                        if let Some(reason) = info.to_disconnect_reason() {
                            self.teardown(reason);
                            return Ok(Some(SessionEvent::Disconnected(reason)));
                        }
                        Ok(None)
                    }
                    "_error" => {
                        let info = StatusInfo::decode(&mut decoder).map_err(ConnectError::Amf0)?;
                        let reason = info.to_disconnect_reason().unwrap_or(DisconnectReason::Refused);
                        self.teardown(reason);
                        Ok(Some(SessionEvent::Disconnected(reason)))
                    }
                    "close" => {
                        self.teardown(DisconnectReason::ServerRequest);
                        Ok(Some(SessionEvent::Disconnected(DisconnectReason::ServerRequest)))
                    }
                    other => {
                        tracing::debug!(name = other, "ignoring unhandled command while ready");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Gives the publisher entry points in [`crate::publisher`] access to
    /// the multiplexer, gated to [`ConnectionState::Ready`].
    pub fn ready_mux(&mut self) -> Result<&mut ChunkMultiplexer<Transport>, PublishError> {
        if self.state != ConnectionState::Ready {
            return Err(PublishError::NotReady);
        }
        self.mux.as_mut().ok_or(PublishError::NotReady)
    }

    /// Ends the session, idempotently, from any non-`Idle` state. Best-effort sends `deleteStream` first if
    /// publishing had started, then destroys the multiplexer, which
    /// releases every queued caller buffer through its release callback
    pub async fn disconnect(&mut self, reason: DisconnectReason) {
        if self.state == ConnectionState::Idle {
            return;
        }
        if self.state == ConnectionState::Ready {
            if let Some(mux) = self.mux.as_mut() {
                let msid = mux.published_message_stream_id();
                let txn = self.next_txn_id();
                if let Ok(payload) = command::encode_delete_stream(txn, msid) {
                    let _ = mux
                        .send_message(Outgoing {
                            csid: CSID_COMMAND,
                            mtid: MessageType::CommandAmf0.0,
                            msid: 0,
                            timestamp: 0,
                            data_header: None,
                            payload: payload.into(),
                            token: 0,
                            internal: true,
                            next_chunk_size: None,
                            release: None,
                        })
                        .await;
                }
            }
        }
        self.teardown(reason);
    }

    /// Synchronous teardown shared by every disconnect path: destroys the
    /// multiplexer (releasing every queued buffer), records the reason, and
    /// resets to `Idle`.
    fn teardown(&mut self, reason: DisconnectReason) {
        if let Some(mux) = self.mux.as_mut() {
            mux.destroy();
        }
        self.mux = None;
        self.reason = reason;
        self.set_state(ConnectionState::Idle);
        tracing::info!(?reason, "disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connection_starts_idle() {
        let conn = Connection::default();
        assert_eq!(conn.state(), ConnectionState::Idle);
        assert_eq!(conn.last_disconnect_reason(), DisconnectReason::Unknown);
    }

    #[tokio::test]
    async fn disconnect_from_idle_is_a_harmless_no_op() {
        let mut conn = Connection::default();
        conn.disconnect(DisconnectReason::ClientRequest).await;
        assert_eq!(conn.state(), ConnectionState::Idle);
        // No reason was recorded: disconnect() from Idle never ran teardown.
        assert_eq!(conn.last_disconnect_reason(), DisconnectReason::Unknown);
    }

    #[tokio::test]
    async fn connect_rejects_a_second_call() {
        let mut conn = Connection::default();
        conn.state = ConnectionState::WaitFms;
        let err = conn.connect("rtmp://host/app/key").await.unwrap_err();
        assert!(matches!(err, ConnectError::AlreadyConnecting));
    }

    #[tokio::test]
    async fn connect_surfaces_url_parse_errors_without_touching_state() {
        let mut conn = Connection::default();
        let err = conn.connect("not-a-url").await.unwrap_err();
        assert!(matches!(err, ConnectError::Url(_)));
        assert_eq!(conn.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn abort_handle_cancels_the_context() {
        let conn = Connection::default();
        let handle = conn.abort_handle();
        assert!(!conn.ctx.is_done());
        handle.abort();
        assert!(conn.ctx.is_done());
    }
}
