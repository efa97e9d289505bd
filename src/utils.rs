//! Bucket-assignment arithmetic shared, by contract, with the serving
//! side: clients derive the bucket to query from the same digest prefix
//! computation that is used here to place credentials.

use hex::ToHex;

/// Number of hex characters of the username digest that contribute to
/// bucket assignment. 15 characters (60 bits) keep the parsed value
/// inside a 64-bit integer while leaving the assignment uniform over any
/// realistic bucket count; bucket placement does not need to be
/// collision resistant.
pub const BUCKET_HEX_PREFIX_LEN: usize = 15;

/// Interprets the first `hex_prefix_len` lowercase-hex characters of
/// `bytes` as a base-16 integer and reduces it modulo `bound`.
pub fn get_mod_prefix(bytes: &[u8], hex_prefix_len: usize, bound: u32) -> u32 {
  let h = bytes.encode_hex::<String>();
  let val = u64::from_str_radix(&h[..hex_prefix_len], 16).unwrap();
  (val % bound as u64) as u32
}
