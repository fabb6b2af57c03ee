use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use anyhow::Context as _;

use crate::{
    foundation::core::Point,
    foundation::error::{SignreelError, SignreelResult},
    gesture::model::{Gesture, GestureDef, GestureMeta, Joint, Keyframe, Pose},
};

/// One record read from a [`DefinitionStore`], before validation.
#[derive(Debug)]
pub struct StoredDefinition {
    /// Where the record came from (file path or store-specific label), for logs.
    pub origin: String,
    /// Parsed record, or the reason it could not be parsed.
    pub def: SignreelResult<GestureDef>,
}

/// Read-only backing store of gesture definitions.
///
/// A store reports per-record parse failures inside [`StoredDefinition::def`] and only returns
/// `Err` when the store as a whole cannot be read.
pub trait DefinitionStore: Send + Sync {
    /// Short label for logs.
    fn describe(&self) -> String;

    /// Read every record currently in the store.
    fn read_all(&self) -> SignreelResult<Vec<StoredDefinition>>;
}

impl<T: DefinitionStore + ?Sized> DefinitionStore for Arc<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn read_all(&self) -> SignreelResult<Vec<StoredDefinition>> {
        (**self).read_all()
    }
}

/// Directory of `*.json` files, one gesture per file.
#[derive(Clone, Debug)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Store rooted at `dir`. The directory is not touched until [`DefinitionStore::read_all`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DefinitionStore for JsonDirStore {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn read_all(&self) -> SignreelResult<Vec<StoredDefinition>> {
        if !self.dir.is_dir() {
            tracing::warn!(dir = %self.dir.display(), "gesture directory not found");
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("read gesture directory '{}'", self.dir.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("list gesture directory '{}'", self.dir.display()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        tracing::info!(count = files.len(), dir = %self.dir.display(), "found gesture files");

        Ok(files
            .into_iter()
            .map(|path| StoredDefinition {
                origin: path.display().to_string(),
                def: read_definition_file(&path),
            })
            .collect())
    }
}

fn read_definition_file(path: &Path) -> SignreelResult<GestureDef> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read gesture file '{}'", path.display()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// In-memory store, mainly for embedding and tests. Its contents can be replaced so that a
/// subsequent [`GestureLibrary::reload`] observes the change.
#[derive(Debug, Default)]
pub struct MemoryStore {
    defs: RwLock<Vec<GestureDef>>,
}

impl MemoryStore {
    /// Store holding `defs`.
    pub fn new(defs: Vec<GestureDef>) -> Self {
        Self {
            defs: RwLock::new(defs),
        }
    }

    /// Swap the stored records.
    pub fn replace(&self, defs: Vec<GestureDef>) {
        *self.defs.write().unwrap_or_else(|e| e.into_inner()) = defs;
    }
}

impl DefinitionStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn read_all(&self) -> SignreelResult<Vec<StoredDefinition>> {
        let defs = self.defs.read().unwrap_or_else(|e| e.into_inner());
        Ok(defs
            .iter()
            .enumerate()
            .map(|(i, def)| StoredDefinition {
                origin: format!("memory[{i}]"),
                def: Ok(def.clone()),
            })
            .collect())
    }
}

/// Validate a raw record and normalize it into a [`Gesture`].
///
/// Unknown joint names and out-of-range coordinates only warn; everything else that is
/// structurally wrong rejects the record.
pub fn validate_definition(def: GestureDef) -> SignreelResult<Gesture> {
    let name = def.name.trim().to_uppercase();
    if name.is_empty() {
        return Err(SignreelError::validation("gesture name must be non-empty"));
    }
    if def.frames == 0 {
        return Err(SignreelError::validation(format!(
            "{name}: frames must be >= 1"
        )));
    }
    if def.keyframes.is_empty() {
        return Err(SignreelError::validation(format!(
            "{name}: keyframes must be a non-empty list"
        )));
    }

    let mut keyframes = Vec::with_capacity(def.keyframes.len());
    for (i, kf) in def.keyframes.into_iter().enumerate() {
        if !kf.time.is_finite() || !(0.0..=1.0).contains(&kf.time) {
            return Err(SignreelError::validation(format!(
                "{name}: keyframe {i}: time must be between 0 and 1, got {}",
                kf.time
            )));
        }

        let mut pose = Pose::new();
        for (joint_name, [x, y]) in kf.pose {
            if !x.is_finite() || !y.is_finite() {
                return Err(SignreelError::validation(format!(
                    "{name}: keyframe {i}, joint {joint_name}: coordinates must be finite"
                )));
            }
            let Some(joint) = Joint::parse(&joint_name) else {
                tracing::warn!(gesture = %name, keyframe = i, joint = %joint_name, "unknown joint");
                continue;
            };
            if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
                tracing::warn!(
                    gesture = %name,
                    keyframe = i,
                    joint = %joint,
                    x,
                    y,
                    "joint coordinates out of bounds [0,1]"
                );
            }
            pose.set(joint, Point::new(x, y));
        }
        keyframes.push(Keyframe {
            time: kf.time,
            pose,
        });
    }
    keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));

    Ok(Gesture {
        name,
        frames: def.frames,
        keyframes,
        meta: GestureMeta {
            description: def.description,
            category: def.category,
            tags: def.tags,
        },
    })
}

type GestureIndex = BTreeMap<String, Arc<Gesture>>;

/// Name-indexed gesture collection backed by a [`DefinitionStore`].
///
/// Readers take a cheap snapshot of the current index; [`GestureLibrary::reload`] builds a
/// complete new index before swapping it in, so no reader sees a half-built one.
pub struct GestureLibrary {
    store: Box<dyn DefinitionStore>,
    index: RwLock<Arc<GestureIndex>>,
}

impl std::fmt::Debug for GestureLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureLibrary")
            .field("store", &self.store.describe())
            .field("gestures", &self.len())
            .finish()
    }
}

impl GestureLibrary {
    /// Load every definition in `store`. Invalid records are logged and skipped; only a store
    /// that cannot be read at all fails.
    pub fn load(store: impl DefinitionStore + 'static) -> SignreelResult<Self> {
        let store: Box<dyn DefinitionStore> = Box::new(store);
        let index = build_index(store.as_ref())?;
        Ok(Self {
            store,
            index: RwLock::new(Arc::new(index)),
        })
    }

    /// Load from a directory of JSON files.
    pub fn from_dir(dir: impl Into<PathBuf>) -> SignreelResult<Self> {
        Self::load(JsonDirStore::new(dir))
    }

    /// Re-read the store and atomically replace the index. Returns the new gesture count.
    ///
    /// On failure the previous index stays in place.
    pub fn reload(&self) -> SignreelResult<usize> {
        let fresh = Arc::new(build_index(self.store.as_ref())?);
        let count = fresh.len();
        *self.index.write().unwrap_or_else(|e| e.into_inner()) = fresh;
        tracing::info!(count, store = %self.store.describe(), "reloaded gestures");
        Ok(count)
    }

    fn snapshot(&self) -> Arc<GestureIndex> {
        Arc::clone(&self.index.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Look up a gesture by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<Arc<Gesture>> {
        self.snapshot().get(&name.trim().to_uppercase()).cloned()
    }

    /// Whether a gesture with this name is loaded.
    pub fn exists(&self, name: &str) -> bool {
        self.snapshot().contains_key(&name.trim().to_uppercase())
    }

    /// Sorted list of loaded names.
    pub fn names(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    /// Number of loaded gestures.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the library is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

fn build_index(store: &dyn DefinitionStore) -> SignreelResult<GestureIndex> {
    let records = store.read_all()?;
    let total = records.len();
    let mut index = GestureIndex::new();

    for StoredDefinition { origin, def } in records {
        let gesture = match def.and_then(validate_definition) {
            Ok(g) => g,
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "skipping gesture definition");
                continue;
            }
        };
        tracing::debug!(gesture = %gesture.name, origin = %origin, "loaded gesture");
        if let Some(prev) = index.insert(gesture.name.clone(), Arc::new(gesture)) {
            tracing::warn!(gesture = %prev.name, origin = %origin, "duplicate gesture name, later definition wins");
        }
    }

    tracing::info!(
        loaded = index.len(),
        total,
        store = %store.describe(),
        "loaded gestures"
    );
    Ok(index)
}

#[cfg(test)]
#[path = "../../tests/unit/gesture/library.rs"]
mod tests;
