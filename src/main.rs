use std::path::Path;
use std::process;

use tracing_subscriber::EnvFilter;

use creds_wrangler::bucket::BucketStore;
use creds_wrangler::configs::{self, WranglerCommand};
use creds_wrangler::errors::WranglerError;
use creds_wrangler::oprf::{self, OprfEvaluator};
use creds_wrangler::pipeline;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  if let Err(e) = run() {
    tracing::error!("{}", e);
    process::exit(1);
  }
}

fn run() -> Result<(), WranglerError> {
  let confs = match configs::get_configs()? {
    WranglerCommand::Keygen => {
      println!("{}", oprf::generate_key_base64());
      return Ok(());
    }
    WranglerCommand::Process(confs) => confs,
  };

  tracing::info!(
    creds_path = %confs.creds_path,
    buckets_path = %confs.buckets_path,
    number_buckets = confs.number_buckets,
    store_mode = ?confs.store_mode,
    "starting credential preparation run"
  );

  let evaluator = OprfEvaluator::new(&confs.oprf_key)?;
  let store = BucketStore::open(
    Path::new(&confs.buckets_path),
    confs.number_buckets,
    confs.store_mode,
  )?;

  let summary = pipeline::process_directory(
    Path::new(&confs.creds_path),
    &store,
    &evaluator,
    confs.on_malformed,
  )?;

  tracing::info!(
    processed = summary.processed,
    skipped = summary.skipped,
    files = summary.files,
    "finished storing credentials"
  );
  Ok(())
}
