//! The `creds_wrangler` crate transforms raw leaked-credential dumps
//! into the bucketed, OPRF-blinded dataset that the leaked-credential
//! checking PIR instances serve. For every `username:password` record it
//! derives a blinded entry and a local hash prefix, assigns the record
//! to a bucket from the username digest alone, and appends both values
//! to the artifact pair of that bucket.

pub mod bucket;
pub mod configs;
pub mod errors;
pub mod oprf;
pub mod pipeline;
pub mod record;
pub mod utils;
