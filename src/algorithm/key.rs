//! Host key resolution from the _known hosts_ files, and host key naming helpers.

use std::path::{Path, PathBuf};

use digest::Mac;
use ssh_key::known_hosts::{self, HostPatterns};

use super::pattern;
use crate::Result;

/// A lookup of previously recorded host key algorithms.
pub trait KnownHosts: Send + Sync {
    /// The algorithms recorded for `host` in the `files`, in their order of appearance.
    fn search_for(&self, host: &str, files: &[PathBuf]) -> Result<Vec<String>>;
}

/// A [`KnownHosts`] lookup reading OpenSSH `known_hosts` files.
///
/// Entries carrying a marker (`@cert-authority`, `@revoked`) are skipped, as are missing files.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownHostsFiles;

impl KnownHostsFiles {
    fn read(path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl KnownHosts for KnownHostsFiles {
    fn search_for(&self, host: &str, files: &[PathBuf]) -> Result<Vec<String>> {
        let candidates = host
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>();

        let mut found = Vec::new();

        for path in files {
            let Some(content) = Self::read(path)? else {
                tracing::trace!("Skipping missing known hosts file `{}`", path.display());
                continue;
            };

            for entry in known_hosts::KnownHosts::new(&content) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::debug!("Skipping malformed entry in `{}`: {err}", path.display());
                        continue;
                    }
                };

                if entry.marker().is_some() {
                    continue;
                }

                if candidates
                    .iter()
                    .any(|candidate| host_matches(entry.host_patterns(), candidate))
                {
                    found.push(entry.public_key().algorithm().as_str().to_string());
                }
            }
        }

        Ok(found)
    }
}

/// Whether the `host` is matched by an entry's `patterns`.
fn host_matches(patterns: &HostPatterns, host: &str) -> bool {
    match patterns {
        HostPatterns::Patterns(patterns) => {
            let mut matched = false;

            for pattern in patterns {
                let pattern = pattern.to_ascii_lowercase();

                match pattern.strip_prefix('!') {
                    Some(negated) if pattern::matches(negated, host) => return false,
                    Some(_) => (),
                    None => matched |= pattern::matches(&pattern, host),
                }
            }

            matched
        }
        HostPatterns::HashedName { salt, hash } => {
            hmac::Hmac::<sha1::Sha1>::new_from_slice(salt)
                .map(|mac| mac.chain_update(host).verify_slice(hash).is_ok())
                .unwrap_or(false)
        }
    }
}

/// Resolve the host key algorithm to prefer for `host`, being the first recorded one.
pub fn preferred_host_key_for(
    host: &str,
    known_hosts: &dyn KnownHosts,
    files: &[PathBuf],
) -> Option<String> {
    match known_hosts.search_for(host, files) {
        Ok(found) => found.into_iter().next(),
        Err(err) => {
            tracing::warn!("Unable to search known hosts for `{host}`: {err}");

            None
        }
    }
}

/// The signature algorithm underlying the host key algorithm `name`,
/// stripping the certificate suffix (`-cert-v01@openssh.com`) if any.
pub fn base_signature_type(name: &str) -> &str {
    let Some((base, suffix)) = name.rsplit_once("-cert-v") else {
        return name;
    };

    match suffix.split_once('@') {
        Some((version, _)) if !version.is_empty() && version.bytes().all(|c| c.is_ascii_digit()) => {
            base
        }
        _ => name,
    }
}
