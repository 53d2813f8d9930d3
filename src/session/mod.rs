//! Orchestration of the **key-exchange**, from the algorithm announcements to the new keys.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{AbortHandle, Abortable};
use futures_time::future::FutureExt;

use crate::{
    algorithm::{
        self,
        cipher::{CipherFactory, Ciphers, Mode},
        hmac::{MacFactory, Macs},
        kex::{KexParams, Registry},
        key::{self, KnownHosts, KnownHostsFiles},
        Category, Compress,
    },
    kexinit::{Announcement, KexInit, SSH_MSG_DISCONNECT, SSH_MSG_NEWKEYS},
    Error, Result,
};

mod config;
pub use config::{Config, Side, SshId};

mod keys;
pub use keys::Keys;

mod pipe;
pub use pipe::{Pipe, Transport, TransportPair};

const CLIENT_TO_SERVER: [Category; 3] = [
    Category::EncryptionClient,
    Category::HmacClient,
    Category::CompressionClient,
];

const SERVER_TO_CLIENT: [Category; 3] = [
    Category::EncryptionServer,
    Category::HmacServer,
    Category::CompressionServer,
];

/// Whether a packet of type `kind` may be processed while a key-exchange is pending.
///
/// Only the transport-level messages (`1..=4` and `6..=19`, except the service request)
/// and the key-exchange messages (`21..=49`, except `SSH_MSG_KEXINIT`) are.
pub fn allowed_during_kex(kind: u8) -> bool {
    matches!(kind, 1..=4 | 6..=19 | 21..=49)
}

/// The key-exchange state of a [`Session`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    /// No key-exchange happened yet.
    #[default]
    Uninitialized,

    /// Our announcement is sent, and a key-exchange is in progress.
    Pending,

    /// The keys of the last key-exchange are installed.
    Initialized,

    /// A key-exchange failed or was torn down, the connection must be closed.
    Failed,
}

/// The algorithms selected by one negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Negotiated {
    /// Key-exchange method.
    pub kex: String,

    /// Server host key algorithm.
    pub host_key: String,

    /// Encryption, _client-to-server_.
    pub encryption_client: String,

    /// Encryption, _server-to-client_.
    pub encryption_server: String,

    /// Message authentication, _client-to-server_.
    pub hmac_client: String,

    /// Message authentication, _server-to-client_.
    pub hmac_server: String,

    /// Compression, _client-to-server_.
    pub compression_client: String,

    /// Compression, _server-to-client_.
    pub compression_server: String,

    /// Language tag, _client-to-server_, possibly empty.
    pub language_client: String,

    /// Language tag, _server-to-client_, possibly empty.
    pub language_server: String,
}

impl Negotiated {
    /// Negotiate every category, the `client`'s order winning amongst common algorithms.
    ///
    /// This holds for both [`Side`]s: as a server, the peer's list is walked first
    /// and our own order only filters it.
    pub fn new(client: &KexInit, server: &KexInit) -> Result<Self> {
        let negotiate = |category| {
            algorithm::negotiate(category, client.list(category), server.list(category))
        };

        Ok(Self {
            kex: negotiate(Category::Kex)?,
            host_key: negotiate(Category::HostKey)?,
            encryption_client: negotiate(Category::EncryptionClient)?,
            encryption_server: negotiate(Category::EncryptionServer)?,
            hmac_client: negotiate(Category::HmacClient)?,
            hmac_server: negotiate(Category::HmacServer)?,
            compression_client: negotiate(Category::CompressionClient)?,
            compression_server: negotiate(Category::CompressionServer)?,
            language_client: negotiate(Category::LanguageClient)?,
            language_server: negotiate(Category::LanguageServer)?,
        })
    }

    /// The algorithm selected for the `category`.
    pub fn get(&self, category: Category) -> &str {
        match category {
            Category::Kex => &self.kex,
            Category::HostKey => &self.host_key,
            Category::EncryptionClient => &self.encryption_client,
            Category::EncryptionServer => &self.encryption_server,
            Category::HmacClient => &self.hmac_client,
            Category::HmacServer => &self.hmac_server,
            Category::CompressionClient => &self.compression_client,
            Category::CompressionServer => &self.compression_server,
            Category::LanguageClient => &self.language_client,
            Category::LanguageServer => &self.language_server,
        }
    }

    /// The signature algorithm of the selected host key, without its certificate wrapper.
    pub fn host_key_format(&self) -> &str {
        key::base_signature_type(&self.host_key)
    }
}

/// A handle to tear down the [`Session`]'s in-flight key-exchange from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct Teardown {
    inner: Arc<Mutex<Flight>>,
}

#[derive(Debug, Default)]
struct Flight {
    closed: bool,
    handle: Option<AbortHandle>,
}

impl Teardown {
    fn lock(&self) -> MutexGuard<'_, Flight> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Abort any in-flight key-exchange, and refuse the next ones.
    pub fn shutdown(&self) {
        let mut flight = self.lock();

        flight.closed = true;
        if let Some(handle) = flight.handle.take() {
            handle.abort();
        }
    }

    /// Whether [`Teardown::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn arm(&self, handle: AbortHandle) -> Result<()> {
        let mut flight = self.lock();

        if flight.closed {
            return Err(Error::Aborted);
        }
        flight.handle = Some(handle);

        Ok(())
    }

    fn disarm(&self) {
        self.lock().handle = None;
    }
}

#[derive(Debug)]
struct Sent {
    kexinit: KexInit,
    payload: Vec<u8>,
}

/// A session driving **key-exchanges** over a [`Pipe`], for the initial handshake and rekeys.
pub struct Session<P> {
    pipe: P,
    config: Config,
    peer_id: SshId,

    registry: Registry,
    ciphers: Box<dyn CipherFactory>,
    macs: Box<dyn MacFactory>,
    known_hosts: Box<dyn KnownHosts>,

    state: State,
    announcement: Option<Sent>,
    negotiated: Option<Negotiated>,
    session_id: Option<Vec<u8>>,
    teardown: Teardown,
}

impl<P: Pipe> Session<P> {
    /// Create a new [`Session`] over the `pipe`, with the peer identified as `peer_id`,
    /// key-exchange methods being instantiated from the `registry`.
    pub fn new(pipe: P, config: Config, peer_id: SshId, registry: Registry) -> Self {
        tracing::debug!("Session created with peer `{peer_id}` as {:?}", config.side);

        Self {
            pipe,
            config,
            peer_id,
            registry,
            ciphers: Box::new(Ciphers),
            macs: Box::new(Macs),
            known_hosts: Box::new(KnownHostsFiles),
            state: State::Uninitialized,
            announcement: None,
            negotiated: None,
            session_id: None,
            teardown: Default::default(),
        }
    }

    /// Build the ciphers from the provided factory, instead of [`Ciphers`].
    pub fn with_ciphers(mut self, ciphers: impl CipherFactory + 'static) -> Self {
        self.ciphers = Box::new(ciphers);
        self
    }

    /// Build the MACs from the provided factory, instead of [`Macs`].
    pub fn with_macs(mut self, macs: impl MacFactory + 'static) -> Self {
        self.macs = Box::new(macs);
        self
    }

    /// Look the host keys up in the provided collaborator, instead of [`KnownHostsFiles`].
    pub fn with_known_hosts(mut self, known_hosts: impl KnownHosts + 'static) -> Self {
        self.known_hosts = Box::new(known_hosts);
        self
    }

    /// The key-exchange state, [`State::Failed`] as soon as the [`Teardown`] is shut down.
    pub fn state(&self) -> State {
        if self.teardown.is_closed() {
            State::Failed
        } else {
            self.state
        }
    }

    /// Whether a key-exchange is in progress.
    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// Whether the keys of a key-exchange are installed, and no other is in progress.
    pub fn is_initialized(&self) -> bool {
        self.state() == State::Initialized
    }

    /// The session identifier, being the exchange hash of the first key-exchange.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.session_id.as_deref()
    }

    /// The algorithms selected by the last completed key-exchange.
    pub fn negotiated(&self) -> Option<&Negotiated> {
        self.negotiated.as_ref()
    }

    /// Access [`SshId`] of the connected peer.
    pub fn peer_id(&self) -> &SshId {
        &self.peer_id
    }

    /// Access the underlying [`Pipe`].
    pub fn pipe(&self) -> &P {
        &self.pipe
    }

    /// A [`Teardown`] handle, to abort the key-exchanges from another task.
    pub fn teardown(&self) -> Teardown {
        self.teardown.clone()
    }

    /// Abort any in-flight key-exchange, leaving the session [`State::Failed`].
    pub fn shutdown(&mut self) {
        self.teardown.shutdown();

        self.state = State::Failed;
        self.announcement = None;
    }

    /// Whether a packet of type `kind` may currently be processed, see [`allowed_during_kex`].
    pub fn allowed_packet_type(&self, kind: u8) -> bool {
        if !self.is_pending() || allowed_during_kex(kind) {
            true
        } else {
            tracing::warn!("Refusing packet of type {kind} during the key-exchange");

            false
        }
    }

    /// Start a key-exchange by announcing our algorithms, for the initial handshake or a rekey.
    pub async fn start_handshake(&mut self) -> Result<()> {
        let result = self.announce().await;

        self.settle(result)
    }

    /// Handle the peer's `SSH_MSG_KEXINIT` `payload`, running the key-exchange to completion.
    ///
    /// Any error leaves the session [`State::Failed`], the connection is then to be closed.
    pub async fn on_remote_announcement(&mut self, payload: &[u8]) -> Result<()> {
        let result = self.exchange(payload).await;

        self.settle(result)
    }

    fn settle(&mut self, result: Result<()>) -> Result<()> {
        if let Err(err) = &result {
            tracing::debug!("Key-exchange failed: {err}");

            self.state = State::Failed;
            self.announcement = None;
        }

        result
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.teardown.is_closed() {
            Err(Error::Aborted)
        } else if self.state == State::Failed {
            Err(Error::Disconnected)
        } else {
            Ok(())
        }
    }

    async fn announce(&mut self) -> Result<()> {
        self.ensure_alive()?;

        if self.is_pending() {
            tracing::trace!("Key-exchange already pending, not announcing twice");

            return Ok(());
        }

        let kexinit = self
            .config
            .kexinit(&*self.known_hosts, &*self.ciphers, &*self.macs);
        let payload = kexinit.encode()?;

        self.state = State::Pending;
        self.pipe.send(&payload).await?;

        tracing::debug!("Sent our algorithm announcement");
        tracing::trace!("Announcement payload is {} bytes", payload.len());

        self.announcement = Some(Sent { kexinit, payload });

        Ok(())
    }

    async fn exchange(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_alive()?;

        let peer = KexInit::decode(payload)?;

        tracing::debug!("Received the peer's algorithm announcement");
        tracing::trace!("Peer announcement payload is {} bytes", payload.len());

        if !self.is_pending() {
            self.announce().await?;
        }

        let ours = self
            .announcement
            .take()
            .ok_or_else(|| Error::KeyExchangeFailure("no announcement of ours is pending".into()))?;

        let ((client, client_kexinit), (server, server_kexinit)) = match self.config.side {
            Side::Client => ((&ours.kexinit, &*ours.payload), (&peer, payload)),
            Side::Server => ((&peer, payload), (&ours.kexinit, &*ours.payload)),
        };
        let (client_id, server_id) = match self.config.side {
            Side::Client => (&self.config.id, &self.peer_id),
            Side::Server => (&self.peer_id, &self.config.id),
        };

        let negotiated = Negotiated::new(client, server)?;

        tracing::debug!(
            "Negotiated `{}` with `{}` host key, `{}`/`{}` ciphers and `{}`/`{}` MACs",
            negotiated.kex,
            negotiated.host_key,
            negotiated.encryption_client,
            negotiated.encryption_server,
            negotiated.hmac_client,
            negotiated.hmac_server,
        );

        let sizes = |category| {
            let name = negotiated.get(category);

            self.ciphers
                .sizes(name)
                .ok_or_else(|| Error::UnsupportedAlgorithm {
                    category,
                    name: name.into(),
                })
        };
        let keysize = |category| {
            let name = negotiated.get(category);

            self.macs
                .key_size(name)
                .ok_or_else(|| Error::UnsupportedAlgorithm {
                    category,
                    name: name.into(),
                })
        };

        let (cipher_client, cipher_server) = (
            sizes(Category::EncryptionClient)?,
            sizes(Category::EncryptionServer)?,
        );
        let (hmac_client, hmac_server) =
            (keysize(Category::HmacClient)?, keysize(Category::HmacServer)?);

        let need_bytes = [
            cipher_client.key,
            cipher_client.iv,
            cipher_server.key,
            cipher_server.iv,
            hmac_client,
            hmac_server,
        ]
        .into_iter()
        .fold(8, usize::max);

        let ignore_first_packet = *peer.first_kex_packet_follows
            && (peer.first(Category::Kex) != Some(negotiated.kex.as_str())
                || peer.first(Category::HostKey) != Some(negotiated.host_key.as_str()));
        if ignore_first_packet {
            tracing::debug!("Peer guessed the key-exchange wrong, discarding its first packet");
        }

        let mut method = self.registry.build(
            &negotiated.kex,
            &KexParams {
                side: self.config.side,
                client_id,
                server_id,
                client_kexinit,
                server_kexinit,
                host_key: &negotiated.host_key,
                need_bytes,
                minimum_dh_bits: self.config.minimum_dh_bits,
                ignore_first_packet,
            },
        )?;

        let pipe = &mut self.pipe;
        let flight = async move {
            let exchange = method.exchange(&mut *pipe).await?;

            pipe.send(&[SSH_MSG_NEWKEYS]).await?;
            tracing::debug!("Sent NEWKEYS, awaiting the peer's");

            Self::await_newkeys(pipe).await?;

            Ok::<_, Error>(exchange)
        };

        let (handle, registration) = AbortHandle::new_pair();
        self.teardown.arm(handle)?;

        let outcome = Abortable::new(flight, registration)
            .timeout(self.config.timeout)
            .await;
        self.teardown.disarm();

        let exchange = outcome?.map_err(|_| Error::Aborted)??;

        let session_id = self
            .session_id
            .get_or_insert_with(|| exchange.hash.clone())
            .clone();

        let client_keys = Keys::as_client(
            exchange.digest,
            &exchange.secret,
            &exchange.hash,
            &session_id,
            cipher_client,
            hmac_client,
        )?;
        let server_keys = Keys::as_server(
            exchange.digest,
            &exchange.secret,
            &exchange.hash,
            &session_id,
            cipher_server,
            hmac_server,
        )?;

        let pair = match self.config.side {
            Side::Client => TransportPair {
                rx: self.transport(&negotiated, &server_keys, SERVER_TO_CLIENT, Mode::Decrypt)?,
                tx: self.transport(&negotiated, &client_keys, CLIENT_TO_SERVER, Mode::Encrypt)?,
            },
            Side::Server => TransportPair {
                rx: self.transport(&negotiated, &client_keys, CLIENT_TO_SERVER, Mode::Decrypt)?,
                tx: self.transport(&negotiated, &server_keys, SERVER_TO_CLIENT, Mode::Encrypt)?,
            },
        };

        self.pipe.install(pair);
        self.negotiated = Some(negotiated);
        self.state = State::Initialized;

        tracing::debug!("New keys installed, key-exchange complete");

        Ok(())
    }

    async fn await_newkeys(pipe: &mut P) -> Result<()> {
        loop {
            let packet = pipe.recv().await?;

            match packet.first() {
                Some(&SSH_MSG_NEWKEYS) => break Ok(()),
                Some(&SSH_MSG_DISCONNECT) => break Err(Error::Disconnected),
                Some(&kind) if allowed_during_kex(kind) => {
                    tracing::trace!("Skipping packet of type {kind} while awaiting NEWKEYS");
                }
                kind => {
                    tracing::trace!("Dropping packet of type {kind:?} while awaiting NEWKEYS");
                }
            }
        }
    }

    fn transport(
        &self,
        negotiated: &Negotiated,
        keys: &Keys,
        [cipher, hmac, compress]: [Category; 3],
        mode: Mode,
    ) -> Result<Transport> {
        Ok(Transport {
            cipher: self.ciphers.build(
                cipher,
                negotiated.get(cipher),
                &keys.key,
                &keys.iv,
                mode,
            )?,
            hmac: self.macs.build(hmac, negotiated.get(hmac), &keys.hmac)?,
            compress: Compress::from(negotiated.get(compress)),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1, true)]
    #[case(4, true)]
    #[case(5, false)]
    #[case(6, true)]
    #[case(19, true)]
    #[case(20, false)]
    #[case(21, true)]
    #[case(49, true)]
    #[case(50, false)]
    #[case(94, false)]
    #[case(0, false)]
    #[case(255, false)]
    fn packets_allowed_during_kex(#[case] kind: u8, #[case] allowed: bool) {
        assert_eq!(allowed_during_kex(kind), allowed);
    }

    #[test]
    fn host_key_format_strips_certificates() {
        let negotiated = Negotiated {
            host_key: "ssh-ed25519-cert-v01@openssh.com".into(),
            ..Default::default()
        };

        assert_eq!(negotiated.host_key_format(), "ssh-ed25519");
    }

    #[test]
    fn teardown_refuses_to_arm_once_closed() {
        let teardown = Teardown::default();
        let (handle, _) = AbortHandle::new_pair();

        teardown.arm(handle.clone()).unwrap();
        teardown.shutdown();

        assert!(handle.is_aborted());
        assert!(teardown.is_closed());
        assert!(matches!(teardown.arm(handle), Err(Error::Aborted)));
    }

    #[test]
    fn assert_session_is_send() {
        fn is_send<T: Send>() {}

        struct Stub;

        #[async_trait::async_trait]
        impl Pipe for Stub {
            async fn send(&mut self, _payload: &[u8]) -> Result<()> {
                Ok(())
            }

            async fn recv(&mut self) -> Result<Vec<u8>> {
                Err(Error::Disconnected)
            }

            fn install(&mut self, _pair: TransportPair) {}
        }

        is_send::<Session<Stub>>();
    }
}
