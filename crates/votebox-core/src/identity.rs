//! Credential primitives: username syntax, salted password hashes and guest
//! token issuance.
//!
//! Password hashes are `hex(SHA-512(password ‖ salt))` where the salt is the
//! hex encoding of 32 random bytes. The salt bytes fed into the hash are the
//! ASCII hex digits, not the decoded bytes, which keeps hashes written by
//! earlier deployments verifiable.

use once_cell::sync::Lazy;
use rand_core::{OsRng, RngCore as _};
use regex::Regex;
use sha2::{Digest, Sha512};

use crate::user::UserId;

/// Random bytes behind a salt or a guest token.
pub const SECRET_BYTES: usize = 32;

/// Shortest accepted username, counted in characters.
pub const MIN_NAME_LEN: usize = 3;

// Words joined by single '.', '-' or ' '.
static NAME: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^\w+(([. -])?\w+)*$").expect("invalid username regex"));

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
  Created(UserId),
  InvalidName,
  /// Some user (of any role) already holds the identifier, ignoring case.
  AlreadyRegistered,
}

/// Result of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
  Authenticated(UserId),
  InvalidName,
  NotFound,
  WrongPassword,
}

impl Authentication {
  pub fn user_id(self) -> Option<UserId> {
    match self {
      Authentication::Authenticated(id) => Some(id),
      _ => None,
    }
  }
}

/// Whether `name` is acceptable as a registered identifier.
pub fn is_valid_name(name: &str) -> bool {
  name.chars().count() >= MIN_NAME_LEN && NAME.is_match(name)
}

/// Identifiers are stored case-folded.
pub fn normalize_name(name: &str) -> String { name.to_lowercase() }

/// A fresh hex-encoded salt.
pub fn new_salt() -> String { random_hex() }

/// A fresh opaque token naming a guest identity.
pub fn new_guest_token() -> String { random_hex() }

/// Whether `token` has the shape [`new_guest_token`] issues: lowercase hex
/// of [`SECRET_BYTES`] bytes.
pub fn is_guest_token(token: &str) -> bool {
  token.len() == 2 * SECRET_BYTES
    && token.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub fn hash_password(password: &str, salt: &[u8]) -> String {
  let mut hasher = Sha512::new();
  hasher.update(password.as_bytes());
  hasher.update(salt);
  hex::encode(hasher.finalize())
}

/// Check `password` against a stored hash. An empty stored hash (guests,
/// neutralised duplicates) never verifies.
pub fn verify_password(password: &str, salt: &[u8], stored_hash: &str) -> bool {
  !stored_hash.is_empty() && hash_password(password, salt) == stored_hash
}

fn random_hex() -> String {
  let mut buf = [0u8; SECRET_BYTES];
  OsRng.fill_bytes(&mut buf);
  hex::encode(buf)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_words_joined_by_single_separators() {
    assert!(is_valid_name("alice"));
    assert!(is_valid_name("mary-jane.doe"));
    assert!(is_valid_name("two words"));
    assert!(is_valid_name("a_b"));
  }

  #[test]
  fn rejects_bad_names() {
    assert!(!is_valid_name("ab"));
    assert!(!is_valid_name(""));
    assert!(!is_valid_name("double  space"));
    assert!(!is_valid_name("trailing-"));
    assert!(!is_valid_name(".leading"));
    assert!(!is_valid_name("semi;colon"));
  }

  #[test]
  fn salts_and_tokens_are_64_hex_chars() {
    let salt = new_salt();
    assert_eq!(salt.len(), 2 * SECRET_BYTES);
    assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(new_guest_token(), new_guest_token());
  }

  #[test]
  fn only_issued_tokens_look_like_guest_tokens() {
    assert!(is_guest_token(&new_guest_token()));
    assert!(!is_guest_token("alice"));
    assert!(!is_guest_token(""));
    assert!(!is_guest_token(&new_guest_token().to_uppercase()));
    assert!(!is_guest_token(&format!("{}0", new_guest_token())));
    assert!(!is_guest_token(&"g".repeat(2 * SECRET_BYTES)));
  }

  #[test]
  fn hash_is_sha512_of_password_then_salt() {
    let hash = hash_password("pw", b"salt");
    assert_eq!(hash, hash_password("pwsalt", b""));
    assert_eq!(hash.len(), 128);
  }

  #[test]
  fn verify_roundtrip_and_empty_hash() {
    let salt = new_salt();
    let hash = hash_password("secret", salt.as_bytes());
    assert!(verify_password("secret", salt.as_bytes(), &hash));
    assert!(!verify_password("wrong", salt.as_bytes(), &hash));
    assert!(!verify_password("", b"", ""));
  }
}
