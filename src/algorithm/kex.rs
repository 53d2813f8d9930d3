//! Key-exchange methods, dispatched by their negotiated name through a [`Registry`].

use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use ssh_packet::SshId;
use strum::{AsRefStr, EnumString};

use crate::{
    session::{Pipe, Side},
    Error, Result,
};

/// The digest a key-exchange method hashes with, also used to derive the session keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Hash {
    /// The _SHA-1_ digest.
    Sha1,

    /// The _SHA-256_ digest.
    Sha256,

    /// The _SHA-384_ digest.
    Sha384,

    /// The _SHA-512_ digest.
    Sha512,
}

impl Hash {
    /// The digest conventionally associated with the key-exchange method `kex`.
    pub fn of(kex: &str) -> Option<Self> {
        let kex = kex.split('@').next().unwrap_or(kex);

        match kex {
            "curve25519-sha256"
            | "ecdh-sha2-nistp256"
            | "diffie-hellman-group-exchange-sha256"
            | "diffie-hellman-group14-sha256" => Some(Self::Sha256),
            "ecdh-sha2-nistp384" => Some(Self::Sha384),
            "ecdh-sha2-nistp521" => Some(Self::Sha512),
            "diffie-hellman-group-exchange-sha1"
            | "diffie-hellman-group14-sha1"
            | "diffie-hellman-group1-sha1" => Some(Self::Sha1),
            _ => None,
        }
    }
}

/// The outcome of a successful key-exchange.
#[derive(securefmt::Debug)]
pub struct Exchange {
    /// The shared secret `K`, as an unsigned big-endian integer.
    #[sensitive]
    pub secret: Vec<u8>,

    /// The exchange hash `H`.
    pub hash: Vec<u8>,

    /// The digest of the exchange.
    pub digest: Hash,
}

/// Everything a key-exchange method needs to know about the ongoing handshake.
#[derive(Debug, Clone, Copy)]
pub struct KexParams<'a> {
    /// Our role in the session.
    pub side: Side,

    /// The client's identification, `V_C`.
    pub client_id: &'a SshId,

    /// The server's identification, `V_S`.
    pub server_id: &'a SshId,

    /// The client's raw `SSH_MSG_KEXINIT` payload, `I_C`.
    pub client_kexinit: &'a [u8],

    /// The server's raw `SSH_MSG_KEXINIT` payload, `I_S`.
    pub server_kexinit: &'a [u8],

    /// The negotiated host key algorithm.
    pub host_key: &'a str,

    /// The number of bytes the derived keys will need at most.
    pub need_bytes: usize,

    /// A lower bound on the group size for _group-exchange_ methods.
    pub minimum_dh_bits: Option<u32>,

    /// Whether the first exchange packet from the peer was a wrong guess, and must be discarded.
    pub ignore_first_packet: bool,
}

/// A key-exchange method, performing its round-trips over the [`Pipe`].
#[async_trait]
pub trait KeyExchange: Send {
    /// Run the exchange to completion.
    async fn exchange(&mut self, pipe: &mut dyn Pipe) -> Result<Exchange>;
}

/// A constructor of [`KeyExchange`] methods.
pub type Constructor =
    Box<dyn Fn(&KexParams<'_>) -> Result<Box<dyn KeyExchange>> + Send + Sync + 'static>;

/// A mapping from key-exchange method names to their [`Constructor`].
#[derive(Default)]
pub struct Registry {
    methods: HashMap<String, Constructor>,
}

impl Registry {
    /// Register the `constructor` for the method `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&KexParams<'_>) -> Result<Box<dyn KeyExchange>> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Box::new(constructor));
        self
    }

    /// Same as [`Registry::register`], in a builder fashion.
    pub fn with<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&KexParams<'_>) -> Result<Box<dyn KeyExchange>> + Send + Sync + 'static,
    {
        self.register(name, constructor);
        self
    }

    /// Whether a method `name` has been registered.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Iterate over the registered method names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Instantiate the method `name` for this handshake.
    pub fn build(&self, name: &str, params: &KexParams<'_>) -> Result<Box<dyn KeyExchange>> {
        let constructor = self
            .methods
            .get(name)
            .ok_or_else(|| Error::UnsupportedKexAlgorithm(name.to_string()))?;

        constructor(params)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
