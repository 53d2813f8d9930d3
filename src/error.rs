use thiserror::Error;

use crate::algorithm::{Category, NameList};

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// I/O Error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Binary serialization error.
    #[error(transparent)]
    Binary(#[from] ssh_packet::binrw::Error),

    /// SSH Key error.
    #[error(transparent)]
    Key(#[from] ssh_key::Error),

    /// Packet integrity error.
    #[error(transparent)]
    Integrity(#[from] digest::MacError),

    /// Error while encrypting or decrypting messages.
    #[error("The cipher ended up in an error")]
    Cipher,

    /// No common algorithm found between both sides for a required category.
    #[error("Unable to negotiate a common {category} algorithm, unsupported peer preferences: {unsupported:?}")]
    NegotiationFailure {
        /// The category that failed to negotiate.
        category: Category,

        /// The peer's names that are absent from the local list.
        unsupported: NameList,
    },

    /// The peer's algorithm announcement couldn't be decoded.
    #[error("Malformed algorithm announcement: {0}")]
    MalformedAnnouncement(String),

    /// The negotiated key-exchange method has no registered implementation.
    #[error("Key-exchange algorithm `{0}` is unsupported")]
    UnsupportedKexAlgorithm(String),

    /// The negotiated algorithm is unknown to the factories.
    #[error("The {category} algorithm `{name}` is unsupported")]
    UnsupportedAlgorithm {
        /// The category of the algorithm.
        category: Category,

        /// The name of the algorithm.
        name: String,
    },

    /// The key-exchange algorithm itself failed.
    #[error("Error in the key-exchange algorithm: {0}")]
    KeyExchangeFailure(String),

    /// The key-exchange has been torn down while in flight.
    #[error("The key-exchange has been aborted")]
    Aborted,

    /// The session has been disconnected.
    #[error("The session has been disconnected")]
    Disconnected,
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
