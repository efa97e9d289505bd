//! The `record` module parses raw credential records and transforms
//! them into the blinded, bucket-assigned form that is persisted for the
//! PIR serving instances.

use hex::ToHex;
use sha2::{Digest, Sha256};

use crate::errors::WranglerError;
use crate::oprf::OprfEvaluator;
use crate::utils::{get_mod_prefix, BUCKET_HEX_PREFIX_LEN};

/// Field delimiter between username and password in raw records.
pub const RECORD_DELIMITER: char = ':';

/// Number of bytes of the full credential hash exposed in the
/// local-hash-prefix table.
pub const HASH_PREFIX_LEN: usize = 16;

/// How the pipeline reacts to an input line without a delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedLinePolicy {
  /// Log the offending line, count it and continue with the rest of the
  /// corpus.
  Skip,
  /// Abort the whole run.
  Abort,
}

/// The `CredentialRecord` struct is a single `username:password` pair
/// borrowed from one line of a source file.
#[derive(Debug, PartialEq, Eq)]
pub struct CredentialRecord<'a> {
  pub username: &'a str,
  pub password: &'a str,
}
impl<'a> CredentialRecord<'a> {
  /// Splits a raw line at the first delimiter occurrence. Usernames must
  /// not contain the delimiter; passwords may. Returns `None` when the
  /// line holds no delimiter at all.
  pub fn parse(line: &'a str) -> Option<Self> {
    line
      .split_once(RECORD_DELIMITER)
      .map(|(username, password)| Self { username, password })
  }
}

/// The `ProcessedCredential` struct holds the derived representation of
/// one credential: the username digest, the bucket assignment, the
/// OPRF-blinded entry and the local hash prefix. Values are computed
/// once and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ProcessedCredential {
  hashed_username: String,
  blinded_entry: String,
  hash_prefix: String,
  bucket: u32,
}
impl ProcessedCredential {
  /// Derives the stored form of `record`. The bucket index is a function
  /// of the username digest and `num_buckets` only, so credentials that
  /// share a username land in the same bucket on every run.
  pub fn process(
    record: &CredentialRecord,
    num_buckets: u32,
    evaluator: &OprfEvaluator,
  ) -> Result<Self, WranglerError> {
    let username_digest = Sha256::digest(record.username.as_bytes());
    let hashed_username = username_digest.encode_hex::<String>();
    let bucket = get_mod_prefix(
      username_digest.as_slice(),
      BUCKET_HEX_PREFIX_LEN,
      num_buckets,
    );

    // the full credential is hashed and evaluated without a separator
    let mut credential = record.username.as_bytes().to_vec();
    credential.extend_from_slice(record.password.as_bytes());

    let blinded_entry = base64::encode(evaluator.evaluate(&credential)?);
    let full_hash = Sha256::digest(&credential);
    let hash_prefix = base64::encode(&full_hash[..HASH_PREFIX_LEN]);

    Ok(Self {
      hashed_username,
      blinded_entry,
      hash_prefix,
      bucket,
    })
  }

  /// Bucket index in `[0, num_buckets)` this credential is assigned to.
  pub fn bucket(&self) -> u32 {
    self.bucket
  }

  /// Base64-encoded OPRF evaluation stored in the bucket file.
  pub fn blinded_entry(&self) -> &str {
    &self.blinded_entry
  }

  /// Base64-encoded 16-byte credential hash prefix stored in the LHP
  /// file.
  pub fn hash_prefix(&self) -> &str {
    &self.hash_prefix
  }

  /// Lowercase-hex SHA-256 digest of the username.
  pub fn hashed_username(&self) -> &str {
    &self.hashed_username
  }
}
