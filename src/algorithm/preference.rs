//! Resolution of the ordered candidate lists announced for each [`Family`] of algorithms.
//!
//! Each family has a curated list of defaults, and an _extended_ set made of those defaults
//! followed by legacy (weaker) algorithms; the extended set is the universe of names a
//! [`Preference`] may refer to.

use strum::{Display, EnumIter};

use super::{pattern, Category};

/// Curated key-exchange methods, most preferred first.
pub const KEX: &[&str] = &[
    "curve25519-sha256",
    "curve25519-sha256@libssh.org",
    "ecdh-sha2-nistp521",
    "ecdh-sha2-nistp384",
    "ecdh-sha2-nistp256",
    "diffie-hellman-group-exchange-sha256",
    "diffie-hellman-group14-sha256",
    "diffie-hellman-group14-sha1",
];

/// Legacy key-exchange methods.
pub const KEX_LEGACY: &[&str] = &["diffie-hellman-group-exchange-sha1", "diffie-hellman-group1-sha1"];

/// Curated host key algorithms, most preferred first.
pub const HOST_KEY: &[&str] = &[
    "ssh-ed25519-cert-v01@openssh.com",
    "ssh-ed25519",
    "ecdsa-sha2-nistp521-cert-v01@openssh.com",
    "ecdsa-sha2-nistp384-cert-v01@openssh.com",
    "ecdsa-sha2-nistp256-cert-v01@openssh.com",
    "ecdsa-sha2-nistp521",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp256",
    "ssh-rsa-cert-v01@openssh.com",
    "ssh-rsa-cert-v00@openssh.com",
    "ssh-rsa",
    "rsa-sha2-256",
    "rsa-sha2-512",
];

/// Legacy host key algorithms.
pub const HOST_KEY_LEGACY: &[&str] = &["ssh-dss"];

/// Curated encryption algorithms, most preferred first.
pub const ENCRYPTION: &[&str] = &["aes256-ctr", "aes192-ctr", "aes128-ctr"];

/// Legacy encryption algorithms.
pub const ENCRYPTION_LEGACY: &[&str] = &[
    "aes256-cbc",
    "aes192-cbc",
    "aes128-cbc",
    "rijndael-cbc@lysator.liu.se",
    "blowfish-ctr",
    "blowfish-cbc",
    "cast128-ctr",
    "cast128-cbc",
    "3des-ctr",
    "3des-cbc",
    "idea-cbc",
    "none",
];

/// Curated MAC algorithms, most preferred first.
pub const HMAC: &[&str] = &[
    "hmac-sha2-512-etm@openssh.com",
    "hmac-sha2-256-etm@openssh.com",
    "hmac-sha2-512",
    "hmac-sha2-256",
    "hmac-sha1",
];

/// Legacy MAC algorithms.
pub const HMAC_LEGACY: &[&str] = &[
    "hmac-sha2-512-96",
    "hmac-sha2-256-96",
    "hmac-sha1-96",
    "hmac-ripemd160",
    "hmac-ripemd160@openssh.com",
    "hmac-md5",
    "hmac-md5-96",
    "none",
];

/// Compression algorithms, most preferred first.
pub const COMPRESSION: &[&str] = &["none", "zlib@openssh.com", "zlib"];

/// The name meaning _no algorithm_ in the encryption, MAC and compression families.
pub const NONE: &str = "none";

/// A family of algorithms sharing one preference, the per-direction
/// [`Category`]s of a family start from identical lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Family {
    /// Key-exchange methods.
    Kex,

    /// Host key algorithms.
    HostKey,

    /// Encryption algorithms.
    Encryption,

    /// MAC algorithms.
    Hmac,

    /// Compression algorithms.
    Compression,

    /// Language tags.
    Language,
}

impl Family {
    /// The curated defaults of this family.
    pub fn defaults(&self) -> &'static [&'static str] {
        match self {
            Self::Kex => KEX,
            Self::HostKey => HOST_KEY,
            Self::Encryption => ENCRYPTION,
            Self::Hmac => HMAC,
            Self::Compression => COMPRESSION,
            Self::Language => &[],
        }
    }

    /// The legacy algorithms of this family, only reachable from the extended set.
    pub fn legacy(&self) -> &'static [&'static str] {
        match self {
            Self::Kex => KEX_LEGACY,
            Self::HostKey => HOST_KEY_LEGACY,
            Self::Encryption => ENCRYPTION_LEGACY,
            Self::Hmac => HMAC_LEGACY,
            Self::Compression | Self::Language => &[],
        }
    }

    /// The extended set of this family: defaults, then legacy algorithms.
    pub fn supported(&self) -> Vec<&'static str> {
        self.defaults().iter().chain(self.legacy()).copied().collect()
    }
}

impl From<Category> for Family {
    fn from(category: Category) -> Self {
        match category {
            Category::Kex => Self::Kex,
            Category::HostKey => Self::HostKey,
            Category::EncryptionClient | Category::EncryptionServer => Self::Encryption,
            Category::HmacClient | Category::HmacServer => Self::Hmac,
            Category::CompressionClient | Category::CompressionServer => Self::Compression,
            Category::LanguageClient | Category::LanguageServer => Self::Language,
        }
    }
}

/// A configured preference for a [`Family`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Preference {
    /// Use the curated defaults.
    #[default]
    Default,

    /// Either an ordered list of names moved to the front of the defaults, or
    /// (when the first name starts with `+` or `-`) a list of modifiers:
    /// `+name` appends `name` if absent and `-pattern` removes every
    /// name matched by the glob `pattern`, both applied on the extended set.
    Names(Vec<String>),

    /// Prefer anything over `none`, which is kept last.
    Any,
}

impl Preference {
    fn is_modifier(name: &str) -> bool {
        name.starts_with('+') || name.starts_with('-')
    }
}

impl From<&str> for Preference {
    fn from(name: &str) -> Self {
        Self::Names(vec![name.to_string()])
    }
}

impl<const N: usize> From<[&str; N]> for Preference {
    fn from(names: [&str; N]) -> Self {
        Self::Names(names.iter().map(|name| name.to_string()).collect())
    }
}

impl From<Vec<String>> for Preference {
    fn from(names: Vec<String>) -> Self {
        Self::Names(names)
    }
}

impl From<bool> for Preference {
    fn from(any: bool) -> Self {
        if any {
            Self::Any
        } else {
            Self::Default
        }
    }
}

/// Build the ordered candidate list of a `family` from its `preference`, without duplicates.
///
/// Plain names are moved to the front of the defaults, or of the whole extended set
/// when `append_all` is set. Names outside of the extended set are dropped.
pub fn build(family: Family, preference: &Preference, append_all: bool) -> Vec<String> {
    let supported = family.supported();

    let list = match preference {
        Preference::Default => compose(family, &supported, &[] as &[&str], append_all),
        Preference::Names(names)
            if names
                .first()
                .is_some_and(|name| Preference::is_modifier(name)) =>
        {
            modify(&supported, names)
        }
        // Unknown host key names are dropped here, which collapses the
        // preference to the default order.
        Preference::Names(names) => compose(family, &supported, names, append_all),
        Preference::Any => supported
            .iter()
            .filter(|name| **name != NONE)
            .chain(supported.iter().filter(|name| **name == NONE))
            .map(|name| name.to_string())
            .collect(),
    };

    filter(family, &supported, list)
}

fn dedup<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut list = Vec::<String>::with_capacity(names.len());

    for name in names.iter().map(AsRef::as_ref) {
        if !list.iter().any(|existing| existing == name) {
            list.push(name.to_string());
        }
    }

    list
}

fn compose<S: AsRef<str>>(
    family: Family,
    supported: &[&str],
    names: &[S],
    append_all: bool,
) -> Vec<String> {
    let mut list = filter(family, supported, dedup(names));

    let base = if append_all {
        supported
    } else {
        family.defaults()
    };

    let rest = base
        .iter()
        .filter(|name| !list.iter().any(|existing| existing == *name))
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    list.extend(rest);

    list
}

fn modify(supported: &[&str], modifiers: &[String]) -> Vec<String> {
    let mut list = dedup(supported);

    for modifier in modifiers {
        match modifier.strip_prefix('+') {
            Some(name) if !list.iter().any(|existing| existing == name) => {
                list.push(name.to_string())
            }
            Some(_) => (),
            None if !modifier.starts_with('-') => {
                tracing::warn!("Ignoring `{modifier}` amongst preference modifiers");
            }
            None => (),
        }
    }

    for pattern in modifiers.iter().filter_map(|modifier| modifier.strip_prefix('-')) {
        list.retain(|name| !pattern::matches(pattern, name));
    }

    list
}

fn filter(family: Family, supported: &[&str], mut list: Vec<String>) -> Vec<String> {
    let unsupported = list
        .iter()
        .filter(|name| !supported.contains(&name.as_str()))
        .cloned()
        .collect::<Vec<_>>();

    if !unsupported.is_empty() {
        tracing::warn!(
            "Ignoring unsupported {family} algorithms: `{}`",
            unsupported.join(",")
        );

        list.retain(|name| supported.contains(&name.as_str()));
    }

    list
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn curated_defaults_exclude_legacy() {
        for family in Family::iter() {
            let list = build(family, &Preference::Default, false);

            assert_eq!(list, family.defaults());
            assert!(family
                .legacy()
                .iter()
                .all(|name| !list.iter().any(|known| known == name)));
        }
    }

    #[test]
    fn append_all_exposes_the_extended_set() {
        for family in Family::iter() {
            assert_eq!(
                build(family, &Preference::Default, true),
                family.supported()
            );
        }
    }

    #[test]
    fn any_keeps_none_last() {
        assert_eq!(
            build(Family::Compression, &Preference::Any, false),
            ["zlib@openssh.com", "zlib", "none"]
        );
    }

    #[test]
    fn names_move_to_front() {
        let list = build(Family::Encryption, &["aes128-ctr", "aes192-ctr"].into(), false);

        assert_eq!(list, ["aes128-ctr", "aes192-ctr", "aes256-ctr"]);
    }

    #[test]
    fn legacy_names_can_be_picked() {
        let list = build(Family::HostKey, &"ssh-dss".into(), false);

        assert_eq!(list[0], "ssh-dss");
        assert_eq!(list.len(), HOST_KEY.len() + 1);
    }

    #[test]
    fn unknown_host_key_falls_back_to_defaults() {
        assert_eq!(
            build(Family::HostKey, &"bogus".into(), false),
            build(Family::HostKey, &Preference::Default, false)
        );
    }

    #[test]
    fn removal_matching_nothing_is_a_noop() {
        assert_eq!(
            build(Family::Kex, &["-nothing-*"].into(), false),
            Family::Kex.supported()
        );
    }

    #[test]
    fn addition_of_a_present_name_is_a_noop() {
        assert_eq!(
            build(Family::Hmac, &["+hmac-sha1"].into(), false),
            Family::Hmac.supported()
        );
    }

    #[test]
    fn addition_of_an_unsupported_name_is_dropped() {
        assert_eq!(
            build(Family::Encryption, &["+bogus-cipher"].into(), false),
            Family::Encryption.supported()
        );
    }

    #[test]
    fn duplicates_are_dropped() {
        assert_eq!(
            build(
                Family::Compression,
                &["zlib", "none", "zlib"].into(),
                false
            ),
            ["zlib", "none", "zlib@openssh.com"]
        );
    }

    #[test]
    fn category_families() {
        assert_eq!(Family::from(Category::HmacServer), Family::Hmac);
        assert_eq!(Family::from(Category::EncryptionClient), Family::Encryption);
        assert_eq!(Family::from(Category::LanguageServer), Family::Language);
    }
}
