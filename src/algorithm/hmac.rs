//! Message authentication algorithms, as produced from a negotiated name and a derived key.

use std::fmt;

use digest::OutputSizeUser;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use strum::{AsRefStr, EnumString};

use super::Category;
use crate::{Error, Result};

/// An initialized message authentication code, sole owner of its key.
pub trait Mac: fmt::Debug + Send {
    /// The size of the produced tags.
    fn size(&self) -> usize;

    /// Whether the tag is computed on the encrypted packet (_encrypt-then-mac_).
    fn etm(&self) -> bool;

    /// Compute the tag of the packet `buf` with sequence number `seq`.
    fn sign(&self, seq: u32, buf: &[u8]) -> Result<Vec<u8>>;

    /// Verify the `mac` of the packet `buf` with sequence number `seq`.
    fn verify(&self, seq: u32, buf: &[u8], mac: &[u8]) -> Result<()>;
}

/// A factory of [`Mac`]s from negotiated algorithm names.
pub trait MacFactory: Send + Sync {
    /// The key size required by the algorithm `name`, or `None` if unsupported.
    fn key_size(&self, name: &str) -> Option<usize>;

    /// Build the algorithm `name` negotiated for `category` from its derived `key`.
    fn build(&self, category: Category, name: &str, key: &[u8]) -> Result<Box<dyn Mac>>;
}

/// Built-in MAC algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Builtin {
    /// HMAC with sha-2-512 digest on encrypted message.
    #[strum(serialize = "hmac-sha2-512-etm@openssh.com")]
    HmacSha512ETM,

    /// HMAC with sha-2-256 digest on encrypted message.
    #[strum(serialize = "hmac-sha2-256-etm@openssh.com")]
    HmacSha256ETM,

    /// HMAC with sha-2-512 digest.
    #[strum(serialize = "hmac-sha2-512")]
    HmacSha512,

    /// HMAC with sha-2-256 digest.
    #[strum(serialize = "hmac-sha2-256")]
    HmacSha256,

    /// HMAC with sha-1 digest on encrypted message.
    #[strum(serialize = "hmac-sha1-etm@openssh.com")]
    HmacSha1ETM,

    /// HMAC with sha-1 digest.
    HmacSha1,

    /// HMAC with sha-1 digest, truncated to 96 bits.
    #[strum(serialize = "hmac-sha1-96")]
    HmacSha1Trunc,

    /// HMAC with md5 digest.
    HmacMd5,

    /// HMAC with md5 digest, truncated to 96 bits.
    #[strum(serialize = "hmac-md5-96")]
    HmacMd5Trunc,

    /// No HMAC algorithm.
    None,
}

impl Builtin {
    /// Size of the truncated tags.
    const TRUNCATED: usize = 12;

    /// The size of the key, which is the size of the underlying digest.
    pub fn key_size(&self) -> usize {
        match self {
            Self::HmacSha512ETM | Self::HmacSha512 => Sha512::output_size(),
            Self::HmacSha256ETM | Self::HmacSha256 => Sha256::output_size(),
            Self::HmacSha1ETM | Self::HmacSha1 | Self::HmacSha1Trunc => Sha1::output_size(),
            Self::HmacMd5 | Self::HmacMd5Trunc => Md5::output_size(),
            Self::None => 0,
        }
    }

    /// The size of the produced tags.
    pub fn size(&self) -> usize {
        match self {
            Self::HmacSha1Trunc | Self::HmacMd5Trunc => Self::TRUNCATED,
            _ => self.key_size(),
        }
    }

    /// Whether the tag is computed on the encrypted packet.
    pub fn etm(&self) -> bool {
        matches!(
            self,
            Self::HmacSha512ETM | Self::HmacSha256ETM | Self::HmacSha1ETM
        )
    }
}

/// The [`MacFactory`] for [`Builtin`] algorithms.
#[derive(Debug, Clone, Copy, Default)]
pub struct Macs;

impl MacFactory for Macs {
    fn key_size(&self, name: &str) -> Option<usize> {
        name.parse::<Builtin>().ok().map(|mac| mac.key_size())
    }

    fn build(&self, category: Category, name: &str, key: &[u8]) -> Result<Box<dyn Mac>> {
        let algorithm = name
            .parse::<Builtin>()
            .map_err(|_| Error::UnsupportedAlgorithm {
                category,
                name: name.into(),
            })?;

        Ok(Box::new(Keyed {
            algorithm,
            key: key.to_vec(),
        }))
    }
}

#[derive(securefmt::Debug)]
struct Keyed {
    algorithm: Builtin,
    #[sensitive]
    key: Vec<u8>,
}

impl Keyed {
    fn tag<D: digest::Mac + digest::KeyInit>(&self, seq: u32, buf: &[u8]) -> Result<D> {
        Ok(<D as digest::Mac>::new_from_slice(&self.key)
            .map_err(|_| Error::Cipher)?
            .chain_update(seq.to_be_bytes())
            .chain_update(buf))
    }

    fn sign_with<D: digest::Mac + digest::KeyInit>(&self, seq: u32, buf: &[u8]) -> Result<Vec<u8>> {
        let mut tag = self.tag::<D>(seq, buf)?.finalize().into_bytes().to_vec();
        tag.truncate(self.algorithm.size());

        Ok(tag)
    }

    fn verify_with<D: digest::Mac + digest::KeyInit>(
        &self,
        seq: u32,
        buf: &[u8],
        mac: &[u8],
    ) -> Result<()> {
        let tag = self.tag::<D>(seq, buf)?;

        if mac.len() != self.algorithm.size() {
            return Err(digest::MacError.into());
        }

        Ok(tag.verify_truncated_left(mac)?)
    }
}

impl Mac for Keyed {
    fn size(&self) -> usize {
        self.algorithm.size()
    }

    fn etm(&self) -> bool {
        self.algorithm.etm()
    }

    fn sign(&self, seq: u32, buf: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            Builtin::HmacSha512ETM | Builtin::HmacSha512 => {
                self.sign_with::<hmac::Hmac<Sha512>>(seq, buf)
            }
            Builtin::HmacSha256ETM | Builtin::HmacSha256 => {
                self.sign_with::<hmac::Hmac<Sha256>>(seq, buf)
            }
            Builtin::HmacSha1ETM | Builtin::HmacSha1 | Builtin::HmacSha1Trunc => {
                self.sign_with::<hmac::Hmac<Sha1>>(seq, buf)
            }
            Builtin::HmacMd5 | Builtin::HmacMd5Trunc => self.sign_with::<hmac::Hmac<Md5>>(seq, buf),
            Builtin::None => Ok(Default::default()),
        }
    }

    fn verify(&self, seq: u32, buf: &[u8], mac: &[u8]) -> Result<()> {
        match self.algorithm {
            Builtin::HmacSha512ETM | Builtin::HmacSha512 => {
                self.verify_with::<hmac::Hmac<Sha512>>(seq, buf, mac)
            }
            Builtin::HmacSha256ETM | Builtin::HmacSha256 => {
                self.verify_with::<hmac::Hmac<Sha256>>(seq, buf, mac)
            }
            Builtin::HmacSha1ETM | Builtin::HmacSha1 | Builtin::HmacSha1Trunc => {
                self.verify_with::<hmac::Hmac<Sha1>>(seq, buf, mac)
            }
            Builtin::HmacMd5 | Builtin::HmacMd5Trunc => {
                self.verify_with::<hmac::Hmac<Md5>>(seq, buf, mac)
            }
            Builtin::None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("hmac-sha2-512-etm@openssh.com", 64, 64, true)]
    #[case("hmac-sha2-256", 32, 32, false)]
    #[case("hmac-sha1", 20, 20, false)]
    #[case("hmac-sha1-96", 20, 12, false)]
    #[case("hmac-md5-96", 16, 12, false)]
    fn sign_then_verify(
        #[case] name: &str,
        #[case] keysize: usize,
        #[case] size: usize,
        #[case] etm: bool,
    ) {
        assert_eq!(Macs.key_size(name), Some(keysize));

        let mac = Macs
            .build(Category::HmacClient, name, &vec![7; keysize])
            .unwrap();
        assert_eq!(mac.size(), size);
        assert_eq!(mac.etm(), etm);

        let tag = mac.sign(3, b"payload").unwrap();
        assert_eq!(tag.len(), size);

        mac.verify(3, b"payload", &tag).unwrap();
        assert!(mac.verify(4, b"payload", &tag).is_err());
        assert!(mac.verify(3, b"tampered", &tag).is_err());
    }

    #[test]
    fn keys_are_not_printed() {
        let mac = Macs
            .build(Category::HmacServer, "hmac-sha2-256", b"super secret key")
            .unwrap();

        assert!(!format!("{mac:?}").contains("115"));
    }

    #[test]
    fn unsupported_names_have_no_key_size() {
        assert_eq!(Macs.key_size("hmac-ripemd160"), None);
    }

    #[test]
    fn unsupported_names_are_reported_with_their_category() {
        assert!(matches!(
            Macs.build(Category::HmacServer, "hmac-ripemd160", &[0; 20]),
            Err(Error::UnsupportedAlgorithm {
                category: Category::HmacServer,
                name,
            }) if name == "hmac-ripemd160"
        ));
    }
}
