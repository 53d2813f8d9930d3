use async_trait::async_trait;

use crate::{
    algorithm::{cipher::Cipher, hmac::Mac, Compress},
    Result,
};

/// The packet transport carrying the key-exchange, as seen from the [`super::Session`].
#[async_trait]
pub trait Pipe: Send {
    /// Send a packet `payload`, starting with its message number.
    async fn send(&mut self, payload: &[u8]) -> Result<()>;

    /// Receive the next packet payload.
    async fn recv(&mut self) -> Result<Vec<u8>>;

    /// Replace the algorithms of both directions, after `SSH_MSG_NEWKEYS` has been exchanged.
    fn install(&mut self, pair: TransportPair);
}

/// The algorithms of both directions of the transport.
#[derive(Debug)]
pub struct TransportPair {
    /// Algorithms opening the received packets.
    pub rx: Transport,

    /// Algorithms sealing the sent packets.
    pub tx: Transport,
}

/// The algorithms of one direction of the transport.
#[derive(Debug)]
pub struct Transport {
    /// The initialized cipher.
    pub cipher: Box<dyn Cipher>,

    /// The initialized message authentication code.
    pub hmac: Box<dyn Mac>,

    /// The compression mode.
    pub compress: Compress,
}
