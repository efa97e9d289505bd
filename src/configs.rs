//! The `configs` module assembles the run configuration from CLI flags
//! and environment variables. Every parameter is validated here, once,
//! at startup; the pipeline itself receives ready values.

use clap::{App, Arg};
use std::env;

use crate::bucket::StoreMode;
use crate::errors::WranglerError;
use crate::record::MalformedLinePolicy;

/// The `WranglerConfig` struct carries the validated parameters of one
/// preparation run.
#[derive(Debug, Clone)]
pub struct WranglerConfig {
  /// Directory of raw credential files.
  pub creds_path: String,
  /// Directory receiving the per-bucket artifact pairs.
  pub buckets_path: String,
  /// Total number of buckets to shard the corpus into.
  pub number_buckets: u32,
  /// Decoded OPRF private key.
  pub oprf_key: Vec<u8>,
  /// Policy for input lines without a delimiter.
  pub on_malformed: MalformedLinePolicy,
  /// Whether the run rebuilds the store or extends it.
  pub store_mode: StoreMode,
}

/// What the binary was asked to do.
#[derive(Debug, Clone)]
pub enum WranglerCommand {
  /// Run the preparation pipeline.
  Process(WranglerConfig),
  /// Print a freshly generated OPRF key and exit.
  Keygen,
}

/// Parses CLI flags, falling back to environment variables for any flag
/// that is not provided.
pub fn get_configs() -> Result<WranglerCommand, WranglerError> {
  let matches = App::new("creds-wrangler")
    .version("0.0.1")
    .about("Prepares bucketed, OPRF-blinded credential artifacts for the PIR instances")
    .arg(
      Arg::with_name("creds_path")
        .long("creds-path")
        .takes_value(true)
        .help("Directory of raw `username:password` credential files (env: CREDS_PATH)"),
    )
    .arg(
      Arg::with_name("buckets_path")
        .long("buckets-path")
        .takes_value(true)
        .help("Directory receiving the per-bucket artifact pairs (env: BUCKETS_PATH)"),
    )
    .arg(
      Arg::with_name("number_buckets")
        .short("n")
        .long("number-buckets")
        .takes_value(true)
        .help("Total number of buckets to shard the corpus into (env: NUMBER_BUCKETS)"),
    )
    .arg(
      Arg::with_name("oprf_key")
        .long("oprf-key")
        .takes_value(true)
        .help("Base64-encoded OPRF private key (env: OPRF_KEY)"),
    )
    .arg(
      Arg::with_name("oprf_key_file")
        .long("oprf-key-file")
        .takes_value(true)
        .help("File holding the base64-encoded OPRF private key (env: OPRF_KEY_FILE)"),
    )
    .arg(
      Arg::with_name("on_malformed")
        .long("on-malformed")
        .takes_value(true)
        .possible_values(&["skip", "abort"])
        .help("Policy for input lines without a `:` delimiter (env: ON_MALFORMED)"),
    )
    .arg(
      Arg::with_name("append")
        .long("append")
        .help("Append to an existing bucket store instead of rebuilding it"),
    )
    .arg(
      Arg::with_name("keygen")
        .long("keygen")
        .help("Generate a fresh OPRF key, print it and exit"),
    )
    .get_matches();

  if matches.is_present("keygen") {
    return Ok(WranglerCommand::Keygen);
  }

  Ok(WranglerCommand::Process(WranglerConfig {
    creds_path: required(matches.value_of("creds_path"), "CREDS_PATH")?,
    buckets_path: required(matches.value_of("buckets_path"), "BUCKETS_PATH")?,
    number_buckets: get_number_buckets(matches.value_of("number_buckets"))?,
    oprf_key: get_oprf_key(
      matches.value_of("oprf_key"),
      matches.value_of("oprf_key_file"),
    )?,
    on_malformed: get_malformed_policy(matches.value_of("on_malformed"))?,
    store_mode: get_store_mode(matches.is_present("append"))?,
  }))
}

fn required(flag: Option<&str>, var: &str) -> Result<String, WranglerError> {
  if let Some(v) = flag {
    return Ok(v.to_string());
  }
  env::var(var)
    .map_err(|_| WranglerError::Config(format!("{} should be provided", var)))
}

fn get_number_buckets(flag: Option<&str>) -> Result<u32, WranglerError> {
  let n = match flag
    .map(str::to_string)
    .or_else(|| env::var("NUMBER_BUCKETS").ok())
  {
    Some(v) => parse_buckets(&v, "NUMBER_BUCKETS")?,
    // the original deployment surface sizes the store as
    // buckets-per-instance x number of server instances
    None => {
      let missing = || {
        WranglerError::Config(
          "NUMBER_BUCKETS (or BUCKETS_PER_INSTANCE and NUM_INSTANCES) \
           should be provided"
            .to_string(),
        )
      };
      let per_instance = env::var("BUCKETS_PER_INSTANCE").map_err(|_| missing())?;
      let instances = env::var("NUM_INSTANCES").map_err(|_| missing())?;
      parse_buckets(&per_instance, "BUCKETS_PER_INSTANCE")?
        * parse_buckets(&instances, "NUM_INSTANCES")?
    }
  };

  if n == 0 {
    return Err(WranglerError::Config(
      "bucket count must be non-zero".to_string(),
    ));
  }
  Ok(n)
}

fn parse_buckets(v: &str, name: &str) -> Result<u32, WranglerError> {
  v.parse().map_err(|_| {
    WranglerError::Config(format!("{} has a wrong format: {}", name, v))
  })
}

fn get_oprf_key(
  flag: Option<&str>,
  file_flag: Option<&str>,
) -> Result<Vec<u8>, WranglerError> {
  if let Some(v) = flag {
    return decode_oprf_key(v);
  }
  if let Ok(v) = env::var("OPRF_KEY") {
    return decode_oprf_key(&v);
  }

  let key_file = file_flag
    .map(str::to_string)
    .or_else(|| env::var("OPRF_KEY_FILE").ok())
    .ok_or_else(|| {
      WranglerError::Config(
        "OPRF_KEY or OPRF_KEY_FILE should be provided".to_string(),
      )
    })?;
  let contents = std::fs::read_to_string(&key_file).map_err(|e| {
    WranglerError::Config(format!(
      "error reading OPRF key file {}: {}",
      key_file, e
    ))
  })?;
  decode_oprf_key(&contents)
}

fn decode_oprf_key(key_b64: &str) -> Result<Vec<u8>, WranglerError> {
  base64::decode(key_b64.trim().replace(',', ""))
    .map_err(WranglerError::KeyDecode)
}

fn get_malformed_policy(
  flag: Option<&str>,
) -> Result<MalformedLinePolicy, WranglerError> {
  let raw = flag
    .map(str::to_string)
    .or_else(|| env::var("ON_MALFORMED").ok());
  match raw.as_deref() {
    None | Some("skip") => Ok(MalformedLinePolicy::Skip),
    Some("abort") => Ok(MalformedLinePolicy::Abort),
    Some(other) => Err(WranglerError::Config(format!(
      "ON_MALFORMED must be `skip` or `abort`, got {}",
      other
    ))),
  }
}

fn get_store_mode(append_flag: bool) -> Result<StoreMode, WranglerError> {
  if append_flag {
    return Ok(StoreMode::Append);
  }
  match env::var("STORE_MODE").ok().as_deref() {
    None | Some("rebuild") => Ok(StoreMode::Rebuild),
    Some("append") => Ok(StoreMode::Append),
    Some(other) => Err(WranglerError::Config(format!(
      "STORE_MODE must be `rebuild` or `append`, got {}",
      other
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn malformed_policy_parses() {
    assert_eq!(
      get_malformed_policy(Some("skip")).unwrap(),
      MalformedLinePolicy::Skip
    );
    assert_eq!(
      get_malformed_policy(Some("abort")).unwrap(),
      MalformedLinePolicy::Abort
    );
    assert!(get_malformed_policy(Some("bogus")).is_err());
  }

  #[test]
  fn bucket_count_must_be_a_positive_integer() {
    assert_eq!(get_number_buckets(Some("128")).unwrap(), 128);
    assert!(get_number_buckets(Some("0")).is_err());
    assert!(get_number_buckets(Some("sixteen")).is_err());
  }

  #[test]
  fn oprf_key_decoding_scrubs_wrapping() {
    let key =
      decode_oprf_key(" AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAE=\n")
        .unwrap();
    assert_eq!(key.len(), 32);
    assert!(decode_oprf_key("not base64!").is_err());
  }
}
