#![allow(dead_code)]

use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use assh_kex::{
    algorithm::{
        kex::{Exchange, Hash, KexParams, KeyExchange, Registry},
        key::KnownHosts,
        NameList,
    },
    kexinit::{Announcement, KexInit},
    session::{Config, Pipe, Session, SshId, TransportPair},
    Error, Result,
};
use async_trait::async_trait;

/// Message number of the fake exchange's request.
pub const KEX_INIT: u8 = 30;

/// Message number of the fake exchange's reply.
pub const KEX_REPLY: u8 = 31;

pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}

/// A peer replaying scripted packets, and recording what it's sent.
#[derive(Debug, Default)]
pub struct Scripted {
    pub incoming: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
    pub installed: Vec<TransportPair>,
    pub hang: bool,
}

impl Scripted {
    pub fn new(incoming: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            incoming: incoming.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Never answer once the script is exhausted, instead of disconnecting.
    pub fn hanging(self) -> Self {
        Self { hang: true, ..self }
    }
}

#[async_trait]
impl Pipe for Scripted {
    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.sent.push(payload.to_vec());

        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        match self.incoming.pop_front() {
            Some(packet) => Ok(packet),
            None if self.hang => futures::future::pending().await,
            None => Err(Error::Disconnected),
        }
    }

    fn install(&mut self, pair: TransportPair) {
        self.installed.push(pair);
    }
}

/// The parameters a key-exchange method has been built with.
#[derive(Debug, Clone)]
pub struct Call {
    pub name: String,
    pub client_kexinit: Vec<u8>,
    pub server_kexinit: Vec<u8>,
    pub host_key: String,
    pub need_bytes: usize,
    pub minimum_dh_bits: Option<u32>,
    pub ignore_first_packet: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<Call>>>);

impl Calls {
    pub fn get(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }
}

/// A key-exchange sending one request and expecting a reply carrying the exchange hash.
struct Fake {
    ignore_first_packet: bool,
}

#[async_trait]
impl KeyExchange for Fake {
    async fn exchange(&mut self, pipe: &mut dyn Pipe) -> Result<Exchange> {
        pipe.send(&[KEX_INIT]).await?;

        if self.ignore_first_packet {
            pipe.recv().await?;
        }

        match pipe.recv().await?.split_first() {
            Some((&KEX_REPLY, hash)) => Ok(Exchange {
                secret: b"shared secret".to_vec(),
                hash: hash.to_vec(),
                digest: Hash::Sha256,
            }),
            other => Err(Error::KeyExchangeFailure(format!(
                "unexpected reply: {other:?}"
            ))),
        }
    }
}

pub fn registry(calls: &Calls, names: &[&str]) -> Registry {
    let mut registry = Registry::default();

    for name in names {
        let (name, calls) = (name.to_string(), calls.clone());

        registry.register(name.clone(), move |params: &KexParams<'_>| {
            calls.0.lock().unwrap().push(Call {
                name: name.clone(),
                client_kexinit: params.client_kexinit.to_vec(),
                server_kexinit: params.server_kexinit.to_vec(),
                host_key: params.host_key.to_string(),
                need_bytes: params.need_bytes,
                minimum_dh_bits: params.minimum_dh_bits,
                ignore_first_packet: params.ignore_first_packet,
            });

            Ok(Box::new(Fake {
                ignore_first_packet: params.ignore_first_packet,
            }) as Box<dyn KeyExchange>)
        });
    }

    registry
}

/// A known hosts lookup answering the same algorithms for every host.
#[derive(Debug, Default)]
pub struct Recorded(pub Vec<String>);

impl KnownHosts for Recorded {
    fn search_for(&self, _host: &str, _files: &[PathBuf]) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

pub fn session(config: Config, registry: Registry, pipe: Scripted) -> Session<Scripted> {
    Session::new(pipe, config, SshId::v2("peer_1.0", None::<&str>), registry)
        .with_known_hosts(Recorded::default())
}

/// The fake exchange's reply, carrying the exchange `hash`.
pub fn reply(hash: &[u8]) -> Vec<u8> {
    [&[KEX_REPLY][..], hash].concat()
}

/// A typical peer announcement.
pub fn peer() -> KexInit {
    KexInit::announce([
        NameList::new(&["curve25519-sha256", "diffie-hellman-group14-sha256"]),
        NameList::new(&["ssh-ed25519", "rsa-sha2-256"]),
        NameList::new(&["aes128-ctr", "aes256-ctr"]),
        NameList::new(&["aes128-ctr", "aes256-ctr"]),
        NameList::new(&["hmac-sha2-256", "hmac-sha2-512"]),
        NameList::new(&["hmac-sha2-256", "hmac-sha2-512"]),
        NameList::new(&["none"]),
        NameList::new(&["none"]),
        NameList::default(),
        NameList::default(),
    ])
}
