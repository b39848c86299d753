//! Socket transport abstraction.
//!
//! The connection state machine only sees a [`Transport`]: a sink of
//! [`OutboundFrame`]s and a stream of [`InboundFrame`]s. The bundled
//! implementation uses `tokio-tungstenite` (feature `tungstenite`); tests and
//! embedders can supply their own [`TransportFactory`].

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream};

use crate::realtime::error::{RealtimeError, RealtimeResult};

/// Frame written by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    /// Transport-level ping frame
    Ping,
    Close { code: u16, reason: String },
}

/// Frame received from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

pub type FrameSink = Pin<Box<dyn Sink<OutboundFrame, Error = RealtimeError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = RealtimeResult<InboundFrame>> + Send>>;

/// An open socket split into its write and read halves.
///
/// The stream ending without a close frame is treated as an abnormal
/// closure (1006).
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Transport {
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<OutboundFrame, Error = RealtimeError> + Send + 'static,
        R: Stream<Item = RealtimeResult<InboundFrame>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Opens sockets for the realtime client.
pub trait TransportFactory: Send + Sync {
    /// Open a socket to `url` (already carrying the access token).
    fn connect(&self, url: &str) -> BoxFuture<'static, RealtimeResult<Transport>>;
}

#[cfg(feature = "tungstenite")]
pub use native::TungsteniteTransport;

#[cfg(feature = "tungstenite")]
mod native {
    use futures_util::future::{self, BoxFuture};
    use futures_util::{FutureExt, SinkExt, StreamExt};
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Message;

    use super::{InboundFrame, OutboundFrame, Transport, TransportFactory};
    use crate::realtime::error::{RealtimeError, RealtimeResult};

    /// `tokio-tungstenite` backed transport.
    ///
    /// Server pings are answered by tungstenite itself; binary frames are ignored.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct TungsteniteTransport;

    impl TungsteniteTransport {
        pub fn new() -> Self {
            Self
        }
    }

    impl TransportFactory for TungsteniteTransport {
        fn connect(&self, url: &str) -> BoxFuture<'static, RealtimeResult<Transport>> {
            let url = url.to_string();
            async move {
                let (ws_stream, _) = connect_async(url.as_str()).await?;
                let (sink, stream) = ws_stream.split();

                let sink = sink
                    .sink_map_err(RealtimeError::from)
                    .with(|frame: OutboundFrame| future::ready(Ok::<_, RealtimeError>(to_message(frame))));

                let stream = stream.filter_map(|msg| future::ready(from_message(msg)));

                Ok(Transport::new(sink, stream))
            }
            .boxed()
        }
    }

    fn to_message(frame: OutboundFrame) -> Message {
        match frame {
            OutboundFrame::Text(text) => Message::Text(text.into()),
            OutboundFrame::Ping => Message::Ping(Default::default()),
            OutboundFrame::Close { code, reason } => Message::Close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            })),
        }
    }

    fn from_message(
        msg: Result<Message, tokio_tungstenite::tungstenite::Error>,
    ) -> Option<RealtimeResult<InboundFrame>> {
        match msg {
            Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text.as_str().to_string()))),
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                    .unwrap_or((1005, String::new()));
                Some(Ok(InboundFrame::Close { code, reason }))
            }
            Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
            Err(e) => Some(Err(RealtimeError::from(e))),
        }
    }

}
