//! Transport to the reader: a real WebSocket or the in-process simulator.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::BridgeError;
use crate::protocol::{Command, Event};
use crate::simulator::Simulator;

pub(crate) type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub(crate) enum Link {
    Socket(Box<Socket>),
    Simulated(Simulator),
}

impl Link {
    pub(crate) fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated(_))
    }

    pub(crate) async fn send(&mut self, command: &Command) -> Result<(), BridgeError> {
        match self {
            Self::Socket(socket) => {
                let frame = serde_json::to_string(command)
                    .map_err(|e| BridgeError::Protocol(e.to_string()))?;
                tracing::debug!(frame = %frame, "sending command to fingerprint service");
                socket.send(Message::Text(frame)).await?;
                Ok(())
            }
            Self::Simulated(sim) => {
                sim.handle(command);
                Ok(())
            }
        }
    }

    /// Next protocol event. `Ok(None)` means the peer closed the connection.
    pub(crate) async fn recv(&mut self) -> Result<Option<Event>, BridgeError> {
        match self {
            Self::Simulated(sim) => Ok(Some(sim.next_event().await)),
            Self::Socket(socket) => loop {
                match socket.next().await {
                    None => return Ok(None),
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<Event>(&text) {
                        Ok(event) => return Ok(Some(event)),
                        Err(e) => {
                            tracing::debug!(error = %e, frame = %text, "ignoring malformed frame");
                        }
                    },
                    Some(Ok(Message::Close(_))) => return Ok(None),
                    Some(Ok(_)) => {}
                    Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                        return Ok(None)
                    }
                    Some(Err(e)) => return Err(e.into()),
                }
            },
        }
    }

    pub(crate) async fn close(&mut self) {
        if let Self::Socket(socket) = self {
            if let Err(e) = WebSocketStream::close(socket.as_mut(), None).await {
                tracing::debug!(error = %e, "error closing fingerprint socket");
            }
        }
    }
}
