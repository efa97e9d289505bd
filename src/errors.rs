//! The `errors` module provides the set of errors surfaced by the
//! credential preparation pipeline.

use std::{error::Error, fmt, io};

// WranglerError encapsulates the possible failure cases of the credential
// wrangling pipeline. No variant is retried anywhere; callers propagate and
// the binary decides whether to terminate.
#[derive(Debug)]
pub enum WranglerError {
  Config(String),
  SourceIo(String, io::Error),
  StoreIo(String, io::Error),
  MalformedRecord(String, usize),
  KeyDecode(base64::DecodeError),
  Oprf(voprf::Error),
}

impl Error for WranglerError {}

impl fmt::Display for WranglerError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      WranglerError::Config(reason) => {
        write!(f, "Configuration error: {}", reason)
      }
      WranglerError::SourceIo(path, e) => {
        write!(f, "Error reading credential source {}: {}", path, e)
      }
      WranglerError::StoreIo(path, e) => {
        write!(f, "Error writing bucket artifact {}: {}", path, e)
      }
      WranglerError::MalformedRecord(path, line) => write!(
        f,
        "Malformed credential record at {}:{}, expected `username:password`",
        path, line
      ),
      WranglerError::KeyDecode(e) => {
        write!(f, "Failed to base64 decode OPRF key: {}", e)
      }
      WranglerError::Oprf(e) => {
        write!(f, "Error occurred during operation of OPRF: {}", e)
      }
    }
  }
}
