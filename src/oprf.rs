//! The `oprf` module wraps server-side evaluation of the oblivious PRF
//! that blinds stored credentials. Dataset preparation holds the private
//! key, so entries are derived with direct ("full") evaluation; the
//! interactive blinding protocol only exists between clients and the
//! serving instances.

use p256::NistP256;
use rand_core::{OsRng, RngCore};
use voprf::OprfServer;

use crate::errors::WranglerError;

/// Byte length of a serialized P-256 OPRF private key.
pub const OPRF_KEY_LEN: usize = 32;

/// The `OprfEvaluator` struct binds the OPRF private key for the
/// duration of a run. It holds no other state, so it can be shared
/// read-only across worker threads.
pub struct OprfEvaluator {
  server: OprfServer<NistP256>,
}
impl OprfEvaluator {
  /// Instantiates the evaluator from raw private key bytes, as produced
  /// by base64-decoding the configured key.
  pub fn new(key: &[u8]) -> Result<Self, WranglerError> {
    let server = OprfServer::new_with_key(key).map_err(WranglerError::Oprf)?;
    Ok(Self { server })
  }

  /// Evaluates the PRF over `input` and returns the raw output bytes.
  /// The same key evaluates every record of a run, so a failure here is
  /// a systemic key or primitive problem rather than a data problem.
  pub fn evaluate(&self, input: &[u8]) -> Result<Vec<u8>, WranglerError> {
    let output = self.server.evaluate(input).map_err(WranglerError::Oprf)?;
    Ok(output.to_vec())
  }
}

/// Mints a fresh base64-encoded OPRF private key. Sampled bytes are
/// rejected and redrawn until they form a valid P-256 scalar.
pub fn generate_key_base64() -> String {
  loop {
    let mut key = [0u8; OPRF_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    if OprfServer::<NistP256>::new_with_key(&key).is_ok() {
      return base64::encode(key);
    }
  }
}
