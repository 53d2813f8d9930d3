//! Encryption algorithms, as produced from a negotiated name and derived key material.

use std::fmt;

use cipher::{KeyIvInit, StreamCipher};
use strum::{AsRefStr, EnumString};

use super::Category;
use crate::{Error, Result};

/// Whether a cipher seals outgoing or opens incoming packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Encryption of the packets we send.
    Encrypt,

    /// Decryption of the packets we receive.
    Decrypt,
}

/// Key material sizes required by a cipher, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sizes {
    /// Size of the _key_.
    pub key: usize,

    /// Size of the _initialization vector_.
    pub iv: usize,
}

/// An initialized cipher, sole owner of its per-direction state.
pub trait Cipher: fmt::Debug + Send {
    /// The block size of the cipher.
    fn block_size(&self) -> usize;

    /// Encrypt or decrypt `buffer` in place, depending on the [`Mode`] it was built with.
    fn apply(&mut self, buffer: &mut [u8]) -> Result<()>;
}

/// A factory of [`Cipher`]s from negotiated algorithm names.
pub trait CipherFactory: Send + Sync {
    /// The key material sizes required by the cipher `name`, or `None` if unsupported.
    fn sizes(&self, name: &str) -> Option<Sizes>;

    /// Build the cipher `name` negotiated for `category` from its derived `key` and `iv`.
    fn build(
        &self,
        category: Category,
        name: &str,
        key: &[u8],
        iv: &[u8],
        mode: Mode,
    ) -> Result<Box<dyn Cipher>>;
}

/// Built-in cipher algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Builtin {
    /// AES-256 in counter (CTR) mode.
    Aes256Ctr,

    /// AES-192 in counter (CTR) mode.
    Aes192Ctr,

    /// AES-128 in counter (CTR) mode.
    Aes128Ctr,

    /// No cipher algorithm.
    None,
}

impl Builtin {
    /// The block size of the cipher.
    pub fn block_size(&self) -> usize {
        match self {
            Self::None => 8,
            Self::Aes128Ctr | Self::Aes192Ctr | Self::Aes256Ctr => 16,
        }
    }

    /// The key material sizes of the cipher.
    pub fn sizes(&self) -> Sizes {
        match self {
            Self::None => Sizes { key: 0, iv: 0 },
            Self::Aes128Ctr => Sizes { key: 16, iv: 16 },
            Self::Aes192Ctr => Sizes { key: 24, iv: 16 },
            Self::Aes256Ctr => Sizes { key: 32, iv: 16 },
        }
    }
}

/// The [`CipherFactory`] for [`Builtin`] ciphers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ciphers;

impl CipherFactory for Ciphers {
    fn sizes(&self, name: &str) -> Option<Sizes> {
        name.parse::<Builtin>().ok().map(|cipher| cipher.sizes())
    }

    fn build(
        &self,
        category: Category,
        name: &str,
        key: &[u8],
        iv: &[u8],
        mode: Mode,
    ) -> Result<Box<dyn Cipher>> {
        fn stream<C: KeyIvInit + StreamCipher + Send + 'static>(
            algorithm: Builtin,
            key: &[u8],
            iv: &[u8],
        ) -> Result<Box<dyn Cipher>> {
            Ok(Box::new(Ctr {
                algorithm,
                inner: C::new_from_slices(key, iv).map_err(|_| Error::Cipher)?,
            }))
        }

        let algorithm = name
            .parse::<Builtin>()
            .map_err(|_| Error::UnsupportedAlgorithm {
                category,
                name: name.into(),
            })?;

        tracing::trace!("Building `{name}` cipher for {mode:?}");

        // In CTR mode, encryption and decrytion are the same
        match algorithm {
            Builtin::Aes256Ctr => stream::<ctr::Ctr128BE<aes::Aes256>>(algorithm, key, iv),
            Builtin::Aes192Ctr => stream::<ctr::Ctr128BE<aes::Aes192>>(algorithm, key, iv),
            Builtin::Aes128Ctr => stream::<ctr::Ctr128BE<aes::Aes128>>(algorithm, key, iv),
            Builtin::None => Ok(Box::new(Plain)),
        }
    }
}

struct Ctr<C> {
    algorithm: Builtin,
    inner: C,
}

impl<C> fmt::Debug for Ctr<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ctr")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl<C: StreamCipher + Send> Cipher for Ctr<C> {
    fn block_size(&self) -> usize {
        self.algorithm.block_size()
    }

    fn apply(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.inner
            .try_apply_keystream(buffer)
            .map_err(|_| Error::Cipher)
    }
}

#[derive(Debug)]
struct Plain;

impl Cipher for Plain {
    fn block_size(&self) -> usize {
        Builtin::None.block_size()
    }

    fn apply(&mut self, _buffer: &mut [u8]) -> Result<()> {
        Ok(())
    }
}
