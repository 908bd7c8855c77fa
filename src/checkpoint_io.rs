//! Checkpoint files in a checkpoint directory, one `checkpoint-<id>.json` per snapshot.

use crate::types::Checkpoint;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const PREFIX: &str = "checkpoint-";
const SUFFIX: &str = ".json";

/// File for checkpoint `id` under `dir`.
pub fn checkpoint_path(dir: &Path, id: u64) -> PathBuf {
  dir.join(format!("{PREFIX}{id}{SUFFIX}"))
}

/// Checkpoint id encoded in a file name, if it is one of ours.
fn file_id(path: &Path) -> Option<u64> {
  path
    .file_name()?
    .to_str()?
    .strip_prefix(PREFIX)?
    .strip_suffix(SUFFIX)?
    .parse()
    .ok()
}

/// Writes `cp` into `dir` under its own id, creating the directory. Returns the file written.
#[instrument(level = "trace", skip(dir, cp), fields(checkpoint = cp.id()))]
pub fn save_checkpoint(dir: &Path, cp: &Checkpoint) -> io::Result<PathBuf> {
  let json =
    serde_json::to_string_pretty(cp).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
  fs::create_dir_all(dir)?;
  let path = checkpoint_path(dir, cp.id());
  fs::write(&path, json)?;
  debug!(path = %path.display(), label = ?cp.label(), "checkpoint saved");
  Ok(path)
}

/// Reads one checkpoint file. A file that is not a checkpoint is `InvalidData`.
#[instrument(level = "trace", skip(path))]
pub fn load_checkpoint(path: &Path) -> io::Result<Checkpoint> {
  let cp: Checkpoint = serde_json::from_slice(&fs::read(path)?)
    .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
  if file_id(path).is_some_and(|id| id != cp.id()) {
    return Err(io::Error::new(
      ErrorKind::InvalidData,
      format!("{} holds checkpoint {}", path.display(), cp.id()),
    ));
  }
  Ok(cp)
}

/// The highest-numbered checkpoint file in `dir`, if any.
pub fn latest_checkpoint_file(dir: &Path) -> io::Result<Option<PathBuf>> {
  let mut best: Option<(u64, PathBuf)> = None;
  for entry in fs::read_dir(dir)? {
    let path = entry?.path();
    if let Some(id) = file_id(&path) {
      if best.as_ref().is_none_or(|(b, _)| id > *b) {
        best = Some((id, path));
      }
    }
  }
  Ok(best.map(|(_, p)| p))
}

/// Loads `path` directly, or the newest checkpoint when `path` is a directory.
pub fn load_resume_point(path: &Path) -> io::Result<Checkpoint> {
  if !path.is_dir() {
    return load_checkpoint(path);
  }
  match latest_checkpoint_file(path)? {
    Some(file) => load_checkpoint(&file),
    None => Err(io::Error::new(
      ErrorKind::NotFound,
      format!("no checkpoint files in {}", path.display()),
    )),
  }
}
