use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::DriverError;

/// Keys the fetch identifier may be stored under, in order of precedence.
const FETCH_ID_KEYS: [&str; 2] = ["youtube_id", "fetch_id"];
const DOWNLOADED_KEY: &str = "downloaded";

/// One video entry of the work list.
///
/// The JSON object is kept as written and only interpreted on access, so a
/// load/save cycle changes nothing but the `downloaded` flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem {
    fields: Map<String, Value>,
}

impl WorkItem {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The fetch identifier, if it is present and non-blank.
    pub fn fetch_id(&self) -> Option<&str> {
        FETCH_ID_KEYS.iter().find_map(|key| {
            self.fields
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|id| !id.is_empty())
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }

    pub fn internal_id(&self) -> Option<&Value> {
        self.fields.get("internal_id")
    }

    /// Anything falsy (absent, null, false, 0, "") counts as pending.
    pub fn downloaded(&self) -> bool {
        match self.fields.get(DOWNLOADED_KEY) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(done)) => *done,
            Some(Value::Number(n)) => n.as_f64().map_or(true, |v| v != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
        }
    }

    pub fn set_downloaded(&mut self, done: bool) {
        self.fields
            .insert(DOWNLOADED_KEY.to_string(), Value::Bool(done));
    }

    pub fn label(&self) -> String {
        if let Some(title) = self.title().filter(|t| !t.trim().is_empty()) {
            return title.to_string();
        }
        match self.internal_id() {
            Some(Value::String(id)) if !id.is_empty() => format!("Video {}", id),
            Some(Value::Null) | Some(Value::String(_)) | None => "Video unknown".to_string(),
            Some(other) => format!("Video {}", other),
        }
    }
}

/// How a loaded list splits up before a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub total: usize,
    pub already_done: usize,
    pub skipped: usize,
    /// Indices into the list, in file order.
    pub pending: Vec<usize>,
}

/// The checkpoint file: input list and persisted progress at once.
#[derive(Debug)]
pub struct WorkList {
    path: PathBuf,
    items: Vec<WorkItem>,
}

impl WorkList {
    pub fn new(path: impl Into<PathBuf>, items: Vec<WorkItem>) -> Self {
        Self {
            path: path.into(),
            items,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref().to_path_buf();

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DriverError::WorkListMissing { path });
            }
            Err(source) => return Err(DriverError::WorkListRead { path, source }),
        };

        let items: Vec<WorkItem> = match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(source) => return Err(DriverError::WorkListInvalid { path, source }),
        };

        info!("Loaded {} work items from {}", items.len(), path.display());
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn partition(&self) -> Partition {
        let mut partition = Partition {
            total: self.items.len(),
            ..Partition::default()
        };

        for (index, item) in self.items.iter().enumerate() {
            if item.fetch_id().is_none() {
                partition.skipped += 1;
            } else if item.downloaded() {
                partition.already_done += 1;
            } else {
                partition.pending.push(index);
            }
        }

        partition
    }

    /// Marks an item done. The flag is never cleared here.
    pub fn mark_downloaded(&mut self, index: usize) {
        if let Some(item) = self.items.get_mut(index) {
            item.set_downloaded(true);
        }
    }

    /// Clears every completion flag, returning how many items the list holds.
    pub fn reset(&mut self) -> usize {
        for item in &mut self.items {
            item.set_downloaded(false);
        }
        self.items.len()
    }

    /// Loads the list at `path`, clears every flag and writes it back.
    pub fn reset_file(path: impl AsRef<Path>) -> Result<usize, DriverError> {
        let mut list = Self::load(path)?;
        let count = list.reset();
        list.save().map_err(|source| DriverError::Checkpoint {
            path: list.path.clone(),
            source,
        })?;
        info!("Reset {} items in {}", count, list.path.display());
        Ok(count)
    }

    /// Rewrites the whole list through a temp file in the same directory, then
    /// renames it over the checkpoint.
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

        serde_json::to_writer_pretty(&mut tmp, &self.items)
            .context("Failed to serialize work list")?;
        tmp.flush()?;
        tmp.as_file().sync_all().context("Failed to sync work list")?;

        // NamedTempFile is created 0600; keep whatever mode the checkpoint had.
        if let Ok(meta) = std::fs::metadata(&self.path) {
            std::fs::set_permissions(tmp.path(), meta.permissions())?;
        }

        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Saved checkpoint {}", self.path.display());
        Ok(())
    }
}
