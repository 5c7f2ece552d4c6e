//! A single VPN client credential as stored in the daemon's auth list.

/// A `username<delim>secret` token from the auth list.
///
/// The username is everything before the first delimiter. A token with no
/// delimiter at all is a legacy plain token: the whole token is the
/// username and the secret is empty. `encoded` is kept verbatim so that an
/// unmodified entry is written back byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret: String,
    encoded: String,
}

impl Credential {
    pub fn new(username: &str, secret: &str, delimiter: char) -> Self {
        Self {
            username: username.to_string(),
            secret: secret.to_string(),
            encoded: format!("{}{}{}", username, delimiter, secret),
        }
    }

    /// Split an on-disk token on the first occurrence of `delimiter`.
    pub fn parse(token: &str, delimiter: char) -> Self {
        let (username, secret) = match token.split_once(delimiter) {
            Some((user, secret)) => (user, secret),
            None => (token, ""),
        };
        Self {
            username: username.to_string(),
            secret: secret.to_string(),
            encoded: token.to_string(),
        }
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_first_delimiter() {
        let cred = Credential::parse("alice:pa:ss", ':');
        assert_eq!(cred.username, "alice");
        assert_eq!(cred.secret, "pa:ss");
        assert_eq!(cred.encoded(), "alice:pa:ss");
    }

    #[test]
    fn test_parse_plain_token() {
        let cred = Credential::parse("zi", ':');
        assert_eq!(cred.username, "zi");
        assert_eq!(cred.secret, "");
        assert_eq!(cred.encoded(), "zi");
    }

    #[test]
    fn test_new_uses_configured_delimiter() {
        let cred = Credential::new("bob", "x", '-');
        assert_eq!(cred.encoded(), "bob-x");
        assert_eq!(Credential::parse(cred.encoded(), '-'), cred);
    }
}
