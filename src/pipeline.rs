//! The `pipeline` module orchestrates a preparation run: it walks the
//! source directory and streams every credential record through parsing,
//! processing and bucket persistence.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::bucket::BucketStore;
use crate::errors::WranglerError;
use crate::oprf::OprfEvaluator;
use crate::record::{CredentialRecord, MalformedLinePolicy, ProcessedCredential};

/// The `ProcessSummary` struct reports what a run achieved. Counters are
/// accumulated through return values rather than shared mutable state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
  /// Credentials processed and persisted.
  pub processed: usize,
  /// Malformed lines skipped under `MalformedLinePolicy::Skip`.
  pub skipped: usize,
  /// Source files consumed.
  pub files: usize,
}

/// Streams every file in `creds_dir` through the processing pipeline.
/// Files are consumed in parallel; the per-bucket locks of `store` keep
/// each bucket's artifact pair aligned. Ordering between usernames
/// within a bucket is not part of the output contract.
pub fn process_directory(
  creds_dir: &Path,
  store: &BucketStore,
  evaluator: &OprfEvaluator,
  policy: MalformedLinePolicy,
) -> Result<ProcessSummary, WranglerError> {
  let files = list_source_files(creds_dir)?;

  let summaries = files
    .par_iter()
    .map(|path| process_credentials_file(path, store, evaluator, policy))
    .collect::<Result<Vec<ProcessSummary>, WranglerError>>()?;

  Ok(summaries.iter().fold(ProcessSummary::default(), |acc, s| {
    ProcessSummary {
      processed: acc.processed + s.processed,
      skipped: acc.skipped + s.skipped,
      files: acc.files + s.files,
    }
  }))
}

/// Streams one credential file, line by line, through
/// parse -> process -> append. Read errors, OPRF errors and write errors
/// abort the run; malformed lines follow `policy`.
pub fn process_credentials_file(
  path: &Path,
  store: &BucketStore,
  evaluator: &OprfEvaluator,
  policy: MalformedLinePolicy,
) -> Result<ProcessSummary, WranglerError> {
  let path_display = path.display().to_string();
  let fd =
    File::open(path).map_err(|e| WranglerError::SourceIo(path_display.clone(), e))?;

  let mut summary = ProcessSummary {
    files: 1,
    ..Default::default()
  };
  for (line_no, line) in BufReader::new(fd).lines().enumerate() {
    let line =
      line.map_err(|e| WranglerError::SourceIo(path_display.clone(), e))?;
    let record = match CredentialRecord::parse(&line) {
      Some(record) => record,
      None => match policy {
        MalformedLinePolicy::Skip => {
          tracing::warn!(
            file = %path_display,
            line = line_no + 1,
            "skipping malformed credential record"
          );
          summary.skipped += 1;
          continue;
        }
        MalformedLinePolicy::Abort => {
          return Err(WranglerError::MalformedRecord(path_display, line_no + 1));
        }
      },
    };

    let processed =
      ProcessedCredential::process(&record, store.num_buckets(), evaluator)?;
    store.append(&processed)?;
    summary.processed += 1;
  }

  tracing::info!(
    file = %path_display,
    processed = summary.processed,
    skipped = summary.skipped,
    "processed credentials file"
  );
  Ok(summary)
}

fn list_source_files(dir: &Path) -> Result<Vec<PathBuf>, WranglerError> {
  let path_display = dir.display().to_string();
  let entries = std::fs::read_dir(dir)
    .map_err(|e| WranglerError::SourceIo(path_display.clone(), e))?;

  let mut files = Vec::new();
  for entry in entries {
    let entry =
      entry.map_err(|e| WranglerError::SourceIo(path_display.clone(), e))?;
    let path = entry.path();
    if path.is_file() {
      files.push(path);
    }
  }
  files.sort();
  Ok(files)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bucket::StoreMode;
  use std::fs;
  use tempfile::tempdir;

  const TEST_OPRF_KEY_B64: &str =
    "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAE=";

  fn test_evaluator() -> OprfEvaluator {
    let key = base64::decode(TEST_OPRF_KEY_B64).unwrap();
    OprfEvaluator::new(&key).unwrap()
  }

  fn write_source_file(dir: &Path, name: &str, lines: &[&str]) {
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(dir.join(name), contents).unwrap();
  }

  fn bucket_line_counts(dir: &Path, num_buckets: u32) -> Vec<(usize, usize)> {
    (0..num_buckets)
      .map(|b| {
        let entries = fs::read_to_string(dir.join(format!("{}.bucket", b)))
          .unwrap()
          .lines()
          .count();
        let prefixes = fs::read_to_string(dir.join(format!("{}.lhp", b)))
          .unwrap()
          .lines()
          .count();
        (entries, prefixes)
      })
      .collect()
  }

  #[test]
  fn processes_all_files_in_directory() {
    let creds = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_source_file(
      creds.path(),
      "dump-0.txt",
      &["user1:pass1", "user2:pass2", "user3:pass3"],
    );
    write_source_file(
      creds.path(),
      "dump-1.txt",
      &["user4:pass4", "user5:pass5", "user6:pass6"],
    );

    let store = BucketStore::open(out.path(), 4, StoreMode::Rebuild).unwrap();
    let summary = process_directory(
      creds.path(),
      &store,
      &test_evaluator(),
      MalformedLinePolicy::Skip,
    )
    .unwrap();

    assert_eq!(summary.processed, 6);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.files, 2);

    // user1..user6 hash to buckets [2, 0, 2, 1, 2, 1] for 4 buckets
    let counts = bucket_line_counts(out.path(), 4);
    for (b, &(entries, prefixes)) in counts.iter().enumerate() {
      assert_eq!(entries, prefixes, "pair for bucket {} is misaligned", b);
    }
    let entries: Vec<usize> = counts.iter().map(|&(e, _)| e).collect();
    assert_eq!(entries, vec![1, 2, 3, 0]);
    assert_eq!(entries.iter().sum::<usize>(), 6);
  }

  #[test]
  fn malformed_lines_are_skipped_under_skip_policy() {
    let creds = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_source_file(
      creds.path(),
      "dump.txt",
      &["user1:pass1", "not-a-credential", "user2:pass2"],
    );

    let store = BucketStore::open(out.path(), 4, StoreMode::Rebuild).unwrap();
    let summary = process_directory(
      creds.path(),
      &store,
      &test_evaluator(),
      MalformedLinePolicy::Skip,
    )
    .unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 1);
  }

  #[test]
  fn malformed_lines_abort_under_abort_policy() {
    let creds = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_source_file(
      creds.path(),
      "dump.txt",
      &["user1:pass1", "not-a-credential", "user2:pass2"],
    );

    let store = BucketStore::open(out.path(), 4, StoreMode::Rebuild).unwrap();
    let result = process_directory(
      creds.path(),
      &store,
      &test_evaluator(),
      MalformedLinePolicy::Abort,
    );

    match result {
      Err(WranglerError::MalformedRecord(_, line)) => assert_eq!(line, 2),
      other => panic!("expected MalformedRecord error, got {:?}", other),
    }
  }

  #[test]
  fn empty_source_directory_yields_empty_store() {
    let creds = tempdir().unwrap();
    let out = tempdir().unwrap();
    let store = BucketStore::open(out.path(), 4, StoreMode::Rebuild).unwrap();
    let summary = process_directory(
      creds.path(),
      &store,
      &test_evaluator(),
      MalformedLinePolicy::Skip,
    )
    .unwrap();

    assert_eq!(summary, ProcessSummary::default());
    for &(entries, prefixes) in &bucket_line_counts(out.path(), 4) {
      assert_eq!(entries, 0);
      assert_eq!(prefixes, 0);
    }
  }

  #[test]
  fn missing_source_directory_is_fatal() {
    let out = tempdir().unwrap();
    let store = BucketStore::open(out.path(), 4, StoreMode::Rebuild).unwrap();
    let result = process_directory(
      Path::new("/nonexistent/creds"),
      &store,
      &test_evaluator(),
      MalformedLinePolicy::Skip,
    );
    assert!(matches!(result, Err(WranglerError::SourceIo(_, _))));
  }

  #[test]
  fn reruns_produce_identical_artifacts() {
    // a single source file processes sequentially, so two full rebuilds
    // must produce byte-identical buckets under the same key
    let creds = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_source_file(
      creds.path(),
      "dump.txt",
      &["user1:pass1", "user2:pass2", "user3:pass3", "user4:pass4"],
    );

    let mut runs = Vec::new();
    for _ in 0..2 {
      let store =
        BucketStore::open(out.path(), 4, StoreMode::Rebuild).unwrap();
      process_directory(
        creds.path(),
        &store,
        &test_evaluator(),
        MalformedLinePolicy::Skip,
      )
      .unwrap();

      let snapshot: Vec<(String, String)> = (0..4)
        .map(|b| {
          (
            fs::read_to_string(out.path().join(format!("{}.bucket", b)))
              .unwrap(),
            fs::read_to_string(out.path().join(format!("{}.lhp", b))).unwrap(),
          )
        })
        .collect();
      runs.push(snapshot);
    }
    assert_eq!(runs[0], runs[1]);
  }
}
