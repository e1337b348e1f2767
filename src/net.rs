//! TCP transport for peer-to-peer payload exchange.
//!
//! Reference implementation of the peer channel: length-delimited frames
//! carrying a bincode envelope. The payload bytes inside an envelope are
//! opaque here and classified by the protocol module on receipt.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Envelope exchanged between two peers.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum PeerMessage {
    /// First message on a connection: the sender's transport peer id.
    Hello { peer_id: String },
    /// An opaque protocol payload (anchor data, hand constraints, or a
    /// session-id command). `reliable` mirrors the sender's delivery intent;
    /// TCP delivers both the same way.
    Payload { reliable: bool, data: Vec<u8> },
    /// Graceful disconnect.
    Goodbye,
}

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(64 * 1024) // hand payloads are ~256 bytes
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T: Serialize>(stream: &mut MessageStream, msg: &T) -> anyhow::Result<()> {
    let data = bincode::serialize(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message.
pub async fn recv_message<T: DeserializeOwned>(stream: &mut MessageStream) -> anyhow::Result<T> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(bincode::deserialize(&bytes)?),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}
