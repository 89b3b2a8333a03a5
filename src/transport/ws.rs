//! WebSocket transport.
//!
//! A tokio task owns the socket. It forwards decoded frames and link
//! events into an unbounded channel that the hub drains on its own
//! context (see `Hub::run`), and writes whatever the hub sends. When the
//! link drops it waits `reconnect_delay` and dials again. Only the socket
//! comes back: subscriptions severed by the drop stay severed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{DisconnectReason, Frame, Transport, TransportEvent};
use crate::config::LinkConfig;
use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    connected: Arc<AtomicBool>,
    outbound: UnboundedSender<Frame>,
}

impl WsTransport {
    /// Starts the link task on the current tokio runtime.
    ///
    /// Returns the transport handle for the hub, the inbound event stream
    /// to feed `Hub::run`, and the task handle. The task exits once the
    /// event receiver is dropped or the transport handle goes away.
    ///
    /// # Errors
    ///
    /// `Error::Config` if the configuration is invalid or the URL does not
    /// parse.
    pub fn spawn(
        config: LinkConfig,
    ) -> Result<(Self, UnboundedReceiver<TransportEvent>, JoinHandle<()>)> {
        config.validate()?;
        let url = Url::parse(&config.url).map_err(|e| Error::Config(e.to_string()))?;

        let connected = Arc::new(AtomicBool::new(false));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let link = Link {
            url,
            config,
            connected: Arc::clone(&connected),
            outbound: outbound_rx,
            events: events_tx,
        };
        let handle = tokio::spawn(link.run());

        let transport = Self {
            connected,
            outbound: outbound_tx,
        };
        Ok((transport, events_rx, handle))
    }
}

impl Transport for WsTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, frame: Frame) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::Disconnected);
        }
        self.outbound.send(frame).map_err(|_| Error::Disconnected)
    }
}

struct Link {
    url: Url,
    config: LinkConfig,
    connected: Arc<AtomicBool>,
    outbound: UnboundedReceiver<Frame>,
    events: UnboundedSender<TransportEvent>,
}

impl Link {
    async fn run(mut self) {
        loop {
            if self.events.is_closed() {
                break;
            }
            info!("connecting to {}", self.url);
            let mut ws = match self.connect().await {
                Ok(ws) => ws,
                Err(err) => {
                    error!("{err}. Retrying in {:?}", self.config.reconnect_delay());
                    sleep(self.config.reconnect_delay()).await;
                    continue;
                }
            };

            // Anything queued before this connection belongs to the old one.
            while self.outbound.try_recv().is_ok() {}

            self.connected.store(true, Ordering::Release);
            info!("connected to {}", self.url);
            if self.events.send(TransportEvent::Connected).is_err() {
                break;
            }

            let reason = self.pump(&mut ws).await;
            self.connected.store(false, Ordering::Release);
            info!("link to {} lost: {reason}", self.url);

            let shutdown = reason == DisconnectReason::Shutdown;
            if self.events.send(TransportEvent::Disconnected(reason)).is_err() || shutdown {
                break;
            }
            sleep(self.config.reconnect_delay()).await;
        }
        debug!("link task for {} finished", self.url);
    }

    async fn connect(&self) -> Result<WsStream> {
        match timeout(self.config.connect_timeout(), connect_async(self.url.clone())).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(err)) => Err(Error::WebSocket(format!("connect to {} failed: {err}", self.url))),
            Err(_) => Err(Error::WebSocket(format!("connect to {} timed out", self.url))),
        }
    }

    async fn pump(&mut self, ws: &mut WsStream) -> DisconnectReason {
        loop {
            tokio::select! {
                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => match Frame::decode(&text) {
                        Ok(frame) => {
                            if self.events.send(TransportEvent::Frame(frame)).is_err() {
                                let _ = ws.close(None).await;
                                return DisconnectReason::Shutdown;
                            }
                        }
                        Err(err) => warn!("dropping undecodable frame: {err}"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(err) = ws.send(Message::Pong(data)).await {
                            return DisconnectReason::Failed(err.to_string());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return DisconnectReason::Closed {
                            code: frame.map(|f| u16::from(f.code)),
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return DisconnectReason::Failed(err.to_string()),
                    None => return DisconnectReason::Closed { code: None },
                },
                frame = self.outbound.recv() => match frame {
                    Some(frame) => {
                        let text = match frame.encode() {
                            Ok(text) => text,
                            Err(err) => {
                                warn!("dropping unencodable frame on {}: {err}", frame.topic);
                                continue;
                            }
                        };
                        if let Err(err) = ws.send(Message::Text(text)).await {
                            return DisconnectReason::Failed(err.to_string());
                        }
                    }
                    None => {
                        let _ = ws.close(None).await;
                        return DisconnectReason::Shutdown;
                    }
                },
            }
        }
    }
}
