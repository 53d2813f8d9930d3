//! Glob-style wildcard matching, used by `-pattern` preference modifiers and host patterns.
//!
//! A `*` matches any run of characters (including none) and a `?` matches exactly one,
//! every other character matches itself, so `@`, `.` or `-` in algorithm names carry no
//! special meaning.

/// Whether `name` is matched as a whole by the `pattern`.
pub fn matches(pattern: &str, name: &str) -> bool {
    let (pattern, name) = (pattern.as_bytes(), name.as_bytes());
    let (mut p, mut n) = (0, 0);

    // Position of the last `*` seen, and the name position it currently absorbs up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(&c) if c == b'?' || c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    backtrack = Some((star, absorbed + 1));
                    p = star + 1;
                    n = absorbed + 1;
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("diffie-hellman-group*-sha1", "diffie-hellman-group14-sha1", true)]
    #[case("diffie-hellman-group*-sha1", "diffie-hellman-group1-sha1", true)]
    #[case("diffie-hellman-group*-sha1", "diffie-hellman-group-exchange-sha1", true)]
    #[case("diffie-hellman-group*-sha1", "diffie-hellman-group14-sha256", false)]
    #[case("*-cbc", "aes128-cbc", true)]
    #[case("*-cbc", "rijndael-cbc@lysator.liu.se", false)]
    #[case("hmac-sha1*", "hmac-sha1", true)]
    #[case("hmac-sha1*", "hmac-sha1-96", true)]
    #[case("hmac-sha1*", "hmac-sha2-256", false)]
    #[case("3des-*", "3des-cbc", true)]
    #[case("*", "anything@openssh.com", true)]
    #[case("*", "", true)]
    #[case("none", "none", true)]
    #[case("none", "nonex", false)]
    #[case("a*b*c", "aXbYbZc", true)]
    #[case("a*b*c", "aXbYbZ", false)]
    #[case("10.0.0.?", "10.0.0.7", true)]
    #[case("10.0.0.?", "10.0.0.17", false)]
    #[case("rijndael-cbc@lysator.liu.se", "rijndael-cbcXlysatorXliuXse", false)]
    fn glob(#[case] pattern: &str, #[case] name: &str, #[case] expected: bool) {
        assert_eq!(matches(pattern, name), expected, "`{pattern}` vs `{name}`");
    }
}
