//! Construction, encoding and decoding of the `SSH_MSG_KEXINIT` algorithm announcement.

use std::io::Cursor;

use rand::RngCore;
use ssh_packet::binrw::{BinRead, BinWrite};
use strum::EnumCount;

use crate::{
    algorithm::{Category, NameList},
    Error, Result,
};

#[doc(no_inline)]
pub use ssh_packet::trans::KexInit;

/// Message number of the `SSH_MSG_KEXINIT` announcement.
pub const SSH_MSG_KEXINIT: u8 = 20;

/// Message number of the `SSH_MSG_NEWKEYS` signal.
pub const SSH_MSG_NEWKEYS: u8 = 21;

/// Message number of the `SSH_MSG_DISCONNECT` message.
pub const SSH_MSG_DISCONNECT: u8 = 1;

/// Offset of the first name-list, past the message number and the cookie.
const LISTS_OFFSET: usize = 1 + 16;

/// Operations on the [`KexInit`] announcement, as needed by the key-exchange.
pub trait Announcement: Sized {
    /// Create an announcement from the ten lists in wire order, with a fresh random cookie.
    fn announce(lists: [NameList; 10]) -> Self;

    /// The announced list for the `category`.
    fn list(&self, category: Category) -> &NameList;

    /// The most preferred name announced for the `category`.
    fn first(&self, category: Category) -> Option<&str> {
        self.list(category).into_iter().next()
    }

    /// Encode the announcement as a packet payload, starting with its message number.
    fn encode(&self) -> Result<Vec<u8>>;

    /// Decode the announcement from a packet payload, ignoring the reserved field and anything after it.
    fn decode(payload: &[u8]) -> Result<Self>;
}

impl Announcement for KexInit {
    fn announce(lists: [NameList; 10]) -> Self {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        let [kex, host_key, enc_c, enc_s, mac_c, mac_s, comp_c, comp_s, lang_c, lang_s] = lists;

        Self {
            cookie,
            kex_algorithms: kex,
            server_host_key_algorithms: host_key,
            encryption_algorithms_client_to_server: enc_c,
            encryption_algorithms_server_to_client: enc_s,
            mac_algorithms_client_to_server: mac_c,
            mac_algorithms_server_to_client: mac_s,
            compression_algorithms_client_to_server: comp_c,
            compression_algorithms_server_to_client: comp_s,
            languages_client_to_server: lang_c,
            languages_server_to_client: lang_s,
            first_kex_packet_follows: false.into(),
        }
    }

    fn list(&self, category: Category) -> &NameList {
        match category {
            Category::Kex => &self.kex_algorithms,
            Category::HostKey => &self.server_host_key_algorithms,
            Category::EncryptionClient => &self.encryption_algorithms_client_to_server,
            Category::EncryptionServer => &self.encryption_algorithms_server_to_client,
            Category::HmacClient => &self.mac_algorithms_client_to_server,
            Category::HmacServer => &self.mac_algorithms_server_to_client,
            Category::CompressionClient => &self.compression_algorithms_client_to_server,
            Category::CompressionServer => &self.compression_algorithms_server_to_client,
            Category::LanguageClient => &self.languages_client_to_server,
            Category::LanguageServer => &self.languages_server_to_client,
        }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = Cursor::new(Vec::new());
        self.write(&mut writer)?;

        Ok(writer.into_inner())
    }

    fn decode(payload: &[u8]) -> Result<Self> {
        check_bounds(payload)?;

        Self::read(&mut Cursor::new(payload))
            .map_err(|err| Error::MalformedAnnouncement(err.to_string()))
    }
}

/// Refuse name-lists claiming more bytes than the payload holds, before anything gets allocated for them.
fn check_bounds(payload: &[u8]) -> Result<()> {
    let mut offset = LISTS_OFFSET;

    for _ in 0..Category::COUNT {
        let Some(&[a, b, c, d]) = payload.get(offset..offset + 4) else {
            // Truncation is reported while reading.
            return Ok(());
        };

        let len = u32::from_be_bytes([a, b, c, d]) as usize;
        let remaining = payload.len() - offset - 4;

        if len > remaining {
            return Err(Error::MalformedAnnouncement(format!(
                "name-list of {len} bytes exceeds the {remaining} remaining"
            )));
        }

        offset += 4 + len;
    }

    Ok(())
}
