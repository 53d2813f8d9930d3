//! Algorithm negotiation for **key-exchange**, **host keys**, **encryption**, **integrity** and **compression**.

use strum::{AsRefStr, Display, EnumCount, EnumIter};

use crate::{Error, Result};

pub mod pattern;
pub mod preference;

pub mod cipher;
pub mod hmac;

mod compress;
pub use compress::Compress;

pub mod kex;
pub mod key;

#[doc(no_inline)]
pub use ssh_packet::arch::NameList;

/// One of the ten independently negotiated algorithm slots,
/// in the order they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter, EnumCount)]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    /// Key-exchange method.
    Kex,

    /// Server host key signature algorithm.
    HostKey,

    /// Encryption, _client-to-server_.
    EncryptionClient,

    /// Encryption, _server-to-client_.
    EncryptionServer,

    /// Message authentication, _client-to-server_.
    HmacClient,

    /// Message authentication, _server-to-client_.
    HmacServer,

    /// Compression, _client-to-server_.
    CompressionClient,

    /// Compression, _server-to-client_.
    CompressionServer,

    /// Language tag, _client-to-server_.
    LanguageClient,

    /// Language tag, _server-to-client_.
    LanguageServer,
}

impl Category {
    /// Whether an empty intersection for this category ends the handshake.
    ///
    /// Languages are the only optional categories, they negotiate to an empty name.
    pub fn is_required(&self) -> bool {
        !matches!(self, Self::LanguageClient | Self::LanguageServer)
    }
}

/// Select the winner of a `category` by walking the `local` list in order
/// and returning the first name the `remote` peer also announced.
pub fn negotiate(category: Category, local: &NameList, remote: &NameList) -> Result<String> {
    let unsupported = remote
        .into_iter()
        .filter(|name| !local.into_iter().any(|known| known == *name))
        .collect::<Vec<_>>();
    if !unsupported.is_empty() {
        tracing::debug!(
            "Peer announced unsupported {category} algorithms: `{}`",
            unsupported.join(",")
        );
    }

    match local.preferred_in(remote) {
        Some(name) => Ok(name.to_string()),
        None if !category.is_required() => Ok(String::new()),
        None => Err(Error::NegotiationFailure {
            category,
            unsupported: NameList::new(&unsupported),
        }),
    }
}
