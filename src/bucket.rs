//! The `bucket` module persists processed credentials into the
//! per-bucket artifact pairs that PIR server instances load. Bucket `b`
//! owns a `{b}.bucket` file of blinded entries and a `{b}.lhp` file of
//! local hash prefixes; line `k` of one corresponds to line `k` of the
//! other, and that pairing is the contract the serving side consumes.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::WranglerError;
use crate::record::ProcessedCredential;

/// Whether opening a store wipes previous artifacts or extends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
  /// Truncate every artifact to empty before any write. A run in this
  /// mode is a full rebuild of the dataset.
  Rebuild,
  /// Keep existing artifact contents and append to them, creating any
  /// missing files empty.
  Append,
}

struct BucketFiles {
  entries: File,
  prefixes: File,
}

/// The `BucketStore` struct owns the artifact pair of every bucket for
/// the duration of a run. Appends to the same bucket are serialized
/// behind a per-bucket lock, which keeps the two files of a pair
/// positionally aligned when source files are processed in parallel.
pub struct BucketStore {
  dir: PathBuf,
  buckets: Vec<Mutex<BucketFiles>>,
}
impl BucketStore {
  /// Ensures the output directory and all `num_buckets` artifact pairs
  /// exist, truncating them first under `StoreMode::Rebuild`, and opens
  /// an append handle pair per bucket. Any failure here aborts before
  /// processing begins: partial bucket coverage would make the shard
  /// layout incorrect downstream.
  pub fn open(
    dir: &Path,
    num_buckets: u32,
    mode: StoreMode,
  ) -> Result<Self, WranglerError> {
    fs::create_dir_all(dir)
      .map_err(|e| WranglerError::StoreIo(dir.display().to_string(), e))?;

    let mut buckets = Vec::with_capacity(num_buckets as usize);
    for b in 0..num_buckets {
      let entries = Self::open_artifact(&Self::entries_path(dir, b), mode)?;
      let prefixes = Self::open_artifact(&Self::prefixes_path(dir, b), mode)?;
      buckets.push(Mutex::new(BucketFiles { entries, prefixes }));
    }
    Ok(Self {
      dir: dir.to_path_buf(),
      buckets,
    })
  }

  /// Appends the blinded entry and local hash prefix of `cred` to its
  /// bucket's artifact pair. The bucket lock spans both writes, so the
  /// entry and its prefix can never be split by a concurrent producer.
  /// `cred` must have been processed with this store's bucket count.
  pub fn append(&self, cred: &ProcessedCredential) -> Result<(), WranglerError> {
    let b = cred.bucket();
    let mut files = self.buckets[b as usize]
      .lock()
      .expect("bucket lock poisoned");
    writeln!(files.entries, "{}", cred.blinded_entry()).map_err(|e| {
      WranglerError::StoreIo(
        Self::entries_path(&self.dir, b).display().to_string(),
        e,
      )
    })?;
    writeln!(files.prefixes, "{}", cred.hash_prefix()).map_err(|e| {
      WranglerError::StoreIo(
        Self::prefixes_path(&self.dir, b).display().to_string(),
        e,
      )
    })
  }

  /// Number of buckets this store shards credentials into.
  pub fn num_buckets(&self) -> u32 {
    self.buckets.len() as u32
  }

  fn entries_path(dir: &Path, bucket: u32) -> PathBuf {
    dir.join(format!("{}.bucket", bucket))
  }

  fn prefixes_path(dir: &Path, bucket: u32) -> PathBuf {
    dir.join(format!("{}.lhp", bucket))
  }

  fn open_artifact(
    path: &Path,
    mode: StoreMode,
  ) -> Result<File, WranglerError> {
    if mode == StoreMode::Rebuild {
      // truncate first so stale lines from a previous run never survive
      File::create(path)
        .map_err(|e| WranglerError::StoreIo(path.display().to_string(), e))?;
    }
    OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .map_err(|e| WranglerError::StoreIo(path.display().to_string(), e))
  }
}
