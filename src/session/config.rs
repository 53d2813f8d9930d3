use std::path::PathBuf;

use futures_time::time::Duration;

use crate::{
    algorithm::{
        cipher::CipherFactory,
        hmac::MacFactory,
        key::{self, KnownHosts},
        preference::{self, Family, Preference},
        NameList,
    },
    kexinit::{Announcement, KexInit},
};

#[doc(no_inline)]
pub use ssh_packet::SshId;

#[cfg(doc)]
use super::Session;

/// Our role in the session, deciding who is `V_C`/`I_C` and which derived keys we send with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Side {
    /// The side initiating the connection.
    #[default]
    Client,

    /// The side accepting the connection.
    Server,
}

/// Configuration parameters for the [`Session`].
#[derive(Debug)]
pub struct Config {
    /// Our identification string.
    pub id: SshId,

    /// Our role in the session.
    pub side: Side,

    /// The time allowed for a key-exchange method and the `SSH_MSG_NEWKEYS` to complete.
    pub timeout: Duration,

    /// Key-exchange methods preference.
    pub kex: Preference,

    /// Host key algorithms preference.
    pub host_key: Preference,

    /// Encryption algorithms preference, for both directions.
    pub encryption: Preference,

    /// MAC algorithms preference, for both directions.
    pub hmac: Preference,

    /// Compression algorithms preference, for both directions.
    pub compression: Preference,

    /// Start from the extended algorithm sets, including legacy algorithms.
    pub append_all_supported_algorithms: bool,

    /// The host identifier looked up in the `known_hosts` files,
    /// like `example.com` or `[example.com]:2222,192.0.2.1`.
    pub host: Option<String>,

    /// The _known hosts_ files to search for the `host`.
    pub known_hosts: Vec<PathBuf>,

    /// A lower bound on the group size for _group-exchange_ methods.
    pub minimum_dh_bits: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: SshId::v2(
                concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION")),
                None::<&str>,
            ),
            side: Default::default(),
            timeout: Duration::from_secs(30),
            kex: Default::default(),
            host_key: Default::default(),
            encryption: Default::default(),
            hmac: Default::default(),
            compression: Default::default(),
            append_all_supported_algorithms: false,
            host: None,
            known_hosts: Vec::new(),
            minimum_dh_bits: None,
        }
    }
}

impl Config {
    fn list(&self, family: Family) -> Vec<String> {
        let preference = match family {
            Family::Kex => &self.kex,
            Family::HostKey => &self.host_key,
            Family::Encryption => &self.encryption,
            Family::Hmac => &self.hmac,
            Family::Compression => &self.compression,
            Family::Language => return Vec::new(),
        };

        preference::build(family, preference, self.append_all_supported_algorithms)
    }

    fn host_key_list(&self, known_hosts: &dyn KnownHosts) -> Vec<String> {
        let mut list = self.list(Family::HostKey);

        let Some(host) = self.host.as_deref() else {
            return list;
        };

        match key::preferred_host_key_for(host, known_hosts, &self.known_hosts) {
            Some(known) if Family::HostKey.supported().contains(&known.as_str()) => {
                tracing::debug!("Preferring the `{known}` host key recorded for `{host}`");

                list.retain(|name| *name != known);
                list.insert(0, known);

                list
            }
            Some(known) => {
                tracing::debug!("Ignoring the unsupported `{known}` host key recorded for `{host}`");

                list
            }
            None => list,
        }
    }

    /// Build a fresh announcement of our preferences, consulting `known_hosts` for the host key.
    ///
    /// Encryption and MAC algorithms the factories are unable to build are not announced.
    pub fn kexinit(
        &self,
        known_hosts: &dyn KnownHosts,
        ciphers: &dyn CipherFactory,
        macs: &dyn MacFactory,
    ) -> KexInit {
        let mut encryption = self.list(Family::Encryption);
        encryption.retain(|name| ciphers.sizes(name).is_some());
        let encryption = NameList::new(&encryption);

        let mut hmac = self.list(Family::Hmac);
        hmac.retain(|name| macs.key_size(name).is_some());
        let hmac = NameList::new(&hmac);

        let compression = NameList::new(&self.list(Family::Compression));
        let language = NameList::new(&self.list(Family::Language));

        KexInit::announce([
            NameList::new(&self.list(Family::Kex)),
            NameList::new(&self.host_key_list(known_hosts)),
            encryption.clone(),
            encryption,
            hmac.clone(),
            hmac,
            compression.clone(),
            compression,
            language.clone(),
            language,
        ])
    }
}
