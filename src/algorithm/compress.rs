use strum::AsRefStr;

use super::preference::NONE;

/// Suffix of the OpenSSH compression methods only engaged once the user is authenticated.
const DELAYED_SUFFIX: &str = "@openssh.com";

/// SSH compression modes, derived from the negotiated compression name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Compress {
    /// No compression.
    #[default]
    None,

    /// Compression engaged as soon as the new keys are in use (`zlib`).
    Standard,

    /// Compression engaged only after user authentication succeeded (`zlib@openssh.com`).
    Delayed,
}

impl Compress {
    /// Whether the compression is engaged, given the user authentication status.
    pub fn is_active(&self, authenticated: bool) -> bool {
        match self {
            Self::None => false,
            Self::Standard => true,
            Self::Delayed => authenticated,
        }
    }
}

impl From<&str> for Compress {
    fn from(name: &str) -> Self {
        if name == NONE {
            Self::None
        } else if name.ends_with(DELAYED_SUFFIX) {
            Self::Delayed
        } else {
            Self::Standard
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("none", Compress::None)]
    #[case("zlib", Compress::Standard)]
    #[case("zlib@openssh.com", Compress::Delayed)]
    fn mode_from_name(#[case] name: &str, #[case] mode: Compress) {
        assert_eq!(Compress::from(name), mode);
    }

    #[test]
    fn delayed_waits_for_authentication() {
        assert!(!Compress::Delayed.is_active(false));
        assert!(Compress::Delayed.is_active(true));
        assert!(Compress::Standard.is_active(false));
        assert!(!Compress::None.is_active(true));
    }
}
