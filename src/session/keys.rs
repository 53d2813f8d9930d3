use std::io::Cursor;

use digest::{Digest, FixedOutputReset};
use securefmt::Debug;
use ssh_packet::{arch::MpInt, binrw::BinWrite};

use crate::{
    algorithm::{cipher::Sizes, kex::Hash},
    Result,
};

/// The key material of one direction of the transport.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Keys {
    /// Cipher _initialization vector_.
    #[sensitive]
    pub iv: Vec<u8>,

    /// Cipher _key_.
    #[sensitive]
    pub key: Vec<u8>,

    /// Hmac _key_.
    #[sensitive]
    pub hmac: Vec<u8>,
}

impl Keys {
    /// Derive the _client-to-server_ keys, salted with `A`, `C` and `E`.
    pub fn as_client(
        digest: Hash,
        secret: &[u8],
        hash: &[u8],
        session_id: &[u8],
        cipher: Sizes,
        hmacsize: usize,
    ) -> Result<Self> {
        let secret = mpint(secret)?;

        Ok(Self {
            iv: Self::derive(digest, &secret, hash, b'A', session_id, cipher.iv),
            key: Self::derive(digest, &secret, hash, b'C', session_id, cipher.key),
            hmac: Self::derive(digest, &secret, hash, b'E', session_id, hmacsize),
        })
    }

    /// Derive the _server-to-client_ keys, salted with `B`, `D` and `F`.
    pub fn as_server(
        digest: Hash,
        secret: &[u8],
        hash: &[u8],
        session_id: &[u8],
        cipher: Sizes,
        hmacsize: usize,
    ) -> Result<Self> {
        let secret = mpint(secret)?;

        Ok(Self {
            iv: Self::derive(digest, &secret, hash, b'B', session_id, cipher.iv),
            key: Self::derive(digest, &secret, hash, b'D', session_id, cipher.key),
            hmac: Self::derive(digest, &secret, hash, b'F', session_id, hmacsize),
        })
    }

    fn derive(
        digest: Hash,
        secret: &[u8],
        hash: &[u8],
        kind: u8,
        session_id: &[u8],
        size: usize,
    ) -> Vec<u8> {
        match digest {
            Hash::Sha1 => Self::derive_with::<sha1::Sha1>(secret, hash, kind, session_id, size),
            Hash::Sha256 => Self::derive_with::<sha2::Sha256>(secret, hash, kind, session_id, size),
            Hash::Sha384 => Self::derive_with::<sha2::Sha384>(secret, hash, kind, session_id, size),
            Hash::Sha512 => Self::derive_with::<sha2::Sha512>(secret, hash, kind, session_id, size),
        }
    }

    /// Derive a key of `size` bytes, `secret` being already encoded as an _mpint_.
    fn derive_with<D: Digest + FixedOutputReset>(
        secret: &[u8],
        hash: &[u8],
        kind: u8,
        session_id: &[u8],
        size: usize,
    ) -> Vec<u8> {
        let mut hasher = D::new()
            .chain_update(secret)
            .chain_update(hash)
            .chain_update([kind])
            .chain_update(session_id);

        let mut key = hasher.finalize_reset().to_vec();

        while key.len() < size {
            hasher = hasher
                .chain_update(secret)
                .chain_update(hash)
                .chain_update(&key);

            key.extend_from_slice(&hasher.finalize_reset());
        }

        key.truncate(size);

        key
    }
}

/// Encode an unsigned big-endian integer as an SSH _mpint_, length prefix included.
fn mpint(value: &[u8]) -> Result<Vec<u8>> {
    let value = &value[value.iter().take_while(|&&byte| byte == 0).count()..];

    let mut encoded = Cursor::new(Vec::with_capacity(4 + 1 + value.len()));
    MpInt::new(value.to_vec()).write(&mut encoded)?;

    Ok(encoded.into_inner())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const AES256: Sizes = Sizes { key: 32, iv: 16 };

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    #[test]
    fn mpint_encoding() {
        assert_eq!(mpint(&[]).unwrap(), [0, 0, 0, 0]);
        assert_eq!(mpint(&[0, 0, 0x7f]).unwrap(), [0, 0, 0, 1, 0x7f]);
        assert_eq!(mpint(&[0x80, 1]).unwrap(), [0, 0, 0, 3, 0, 0x80, 1]);
    }

    #[test]
    fn derivation_extends_then_truncates() {
        let keys = Keys::as_client(
            Hash::Sha256,
            &[0, 0x80, 1],
            &[2; 32],
            &[3; 32],
            Sizes { key: 0, iv: 40 },
            0,
        )
        .unwrap();

        assert_eq!(
            hex(&keys.iv),
            "7e59f46c98173f271ba67b3f0010df9396a0e7931007c5387095e39bc6d75c91ff82ec7516f2274c"
        );
        assert!(keys.key.is_empty());
        assert!(keys.hmac.is_empty());

        let keys = Keys::as_client(Hash::Sha1, &[0x80, 1], &[2; 32], &[3; 32], AES256, 0).unwrap();

        assert_eq!(
            hex(&keys.key),
            "a445a4a717b404c129a52fbc1bb2263b47b656b3ff11e50fb0c202fd9b642efe"
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let derive = |secret: &[u8], hash: &[u8], session_id: &[u8]| {
            (
                Keys::as_client(Hash::Sha256, secret, hash, session_id, AES256, 32).unwrap(),
                Keys::as_server(Hash::Sha256, secret, hash, session_id, AES256, 32).unwrap(),
            )
        };

        let reference = derive(b"secret", b"hash", b"session");
        assert_eq!(reference, derive(b"secret", b"hash", b"session"));

        let all = |(client, server): &(Keys, Keys)| {
            [
                client.iv.clone(),
                client.key.clone(),
                client.hmac.clone(),
                server.iv.clone(),
                server.key.clone(),
                server.hmac.clone(),
            ]
        };

        for other in [
            derive(b"secreT", b"hash", b"session"),
            derive(b"secret", b"hasH", b"session"),
            derive(b"secret", b"hash", b"sessioN"),
        ] {
            for (a, b) in all(&reference).iter().zip(all(&other).iter()) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn keys_are_not_printed() {
        let keys = Keys::as_server(Hash::Sha512, b"secret", b"hash", b"session", AES256, 64).unwrap();

        assert!(!format!("{keys:?}").contains(&format!("{:?}", keys.key)));
    }
}
