use std::{collections::BTreeMap, path::Path};

use anyhow::Context as _;

use crate::foundation::error::SignreelResult;

/// One downloadable recording of a gloss.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoCandidate {
    /// Site the clip comes from; drives ranking.
    #[serde(default)]
    pub source: String,
    /// Where to fetch it.
    pub url: String,
    /// Opaque identifier; doubles as the cache key.
    pub video_id: String,
    /// Every other field of the catalog record (signer, split, frame range, ...).
    #[serde(flatten)]
    pub provenance: BTreeMap<String, serde_json::Value>,
}

impl VideoCandidate {
    /// Candidate without provenance metadata.
    pub fn new(
        source: impl Into<String>,
        url: impl Into<String>,
        video_id: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            url: url.into(),
            video_id: video_id.into(),
            provenance: BTreeMap::new(),
        }
    }
}

#[derive(serde::Deserialize)]
struct CatalogRecord {
    gloss: String,
    #[serde(default)]
    instances: Vec<VideoCandidate>,
}

/// Static gloss → candidates mapping, keyed by uppercase gloss.
#[derive(Clone, Debug, Default)]
pub struct VideoCatalog {
    entries: BTreeMap<String, Vec<VideoCandidate>>,
}

impl VideoCatalog {
    /// Build from `(gloss, candidates)` pairs. Repeated glosses accumulate candidates in order.
    pub fn from_entries<G, I>(entries: I) -> Self
    where
        G: AsRef<str>,
        I: IntoIterator<Item = (G, Vec<VideoCandidate>)>,
    {
        let mut out = BTreeMap::<String, Vec<VideoCandidate>>::new();
        for (gloss, candidates) in entries {
            out.entry(gloss.as_ref().trim().to_uppercase())
                .or_default()
                .extend(candidates);
        }
        Self { entries: out }
    }

    /// Parse a WLASL-style document: `[{"gloss": "...", "instances": [...]}, ...]`.
    pub fn from_json_slice(bytes: &[u8]) -> SignreelResult<Self> {
        let records: Vec<CatalogRecord> = serde_json::from_slice(bytes)?;
        let catalog = Self::from_entries(records.into_iter().map(|r| (r.gloss, r.instances)));
        tracing::info!(
            glosses = catalog.len(),
            videos = catalog.entries.values().map(Vec::len).sum::<usize>(),
            "loaded video catalog"
        );
        Ok(catalog)
    }

    /// Read and parse a catalog file.
    pub fn from_json_file(path: &Path) -> SignreelResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read video catalog '{}'", path.display()))?;
        Self::from_json_slice(&bytes)
    }

    /// Candidates in catalog order (empty when the gloss is absent).
    pub fn candidates(&self, gloss: &str) -> &[VideoCandidate] {
        self.entries
            .get(&gloss.trim().to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the gloss has an entry.
    pub fn exists(&self, gloss: &str) -> bool {
        self.entries.contains_key(&gloss.trim().to_uppercase())
    }

    /// Video identifiers for a gloss, in catalog order.
    pub fn video_ids(&self, gloss: &str) -> Vec<&str> {
        self.candidates(gloss)
            .iter()
            .map(|c| c.video_id.as_str())
            .collect()
    }

    /// Number of recordings for a gloss.
    pub fn video_count(&self, gloss: &str) -> usize {
        self.candidates(gloss).len()
    }

    /// Sorted vocabulary.
    pub fn glosses(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of glosses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered list of preferred sources; earlier is better.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SourcePreference(pub Vec<String>);

impl Default for SourcePreference {
    fn default() -> Self {
        Self(
            [
                "signschool",
                "asldeafined",
                "valencia-asl",
                "startasl",
                "handspeak",
                "signingsavvy",
                "aslu",
                "aslpro",
                "aslsignbank",
                "aslbrick",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }
}

impl SourcePreference {
    /// Rank of `source`; unlisted sources share the lowest priority.
    pub fn rank(&self, source: &str) -> usize {
        self.0
            .iter()
            .position(|s| s == source)
            .unwrap_or(self.0.len())
    }
}

/// Ranks catalog candidates per gloss by source preference.
#[derive(Clone, Debug, Default)]
pub struct GlossResolver {
    catalog: VideoCatalog,
    prefs: SourcePreference,
}

impl GlossResolver {
    /// Resolver over `catalog` using `prefs`.
    pub fn new(catalog: VideoCatalog, prefs: SourcePreference) -> Self {
        Self { catalog, prefs }
    }

    /// Underlying catalog.
    pub fn catalog(&self) -> &VideoCatalog {
        &self.catalog
    }

    /// Whether the gloss is in the catalog.
    pub fn exists(&self, gloss: &str) -> bool {
        self.catalog.exists(gloss)
    }

    /// Best-ranked candidate; ties keep catalog order, so with no ranked source the first
    /// catalog entry wins.
    pub fn best_candidate(&self, gloss: &str) -> Option<&VideoCandidate> {
        self.catalog
            .candidates(gloss)
            .iter()
            .min_by_key(|c| self.prefs.rank(&c.source))
    }

    /// Up to `max_results` candidates, best first, for sequential fallback.
    pub fn best_candidates_with_alternatives(
        &self,
        gloss: &str,
        max_results: usize,
    ) -> Vec<&VideoCandidate> {
        let mut ranked: Vec<&VideoCandidate> = self.catalog.candidates(gloss).iter().collect();
        ranked.sort_by_key(|c| self.prefs.rank(&c.source));
        ranked.truncate(max_results);
        ranked
    }

    /// Diagnostic suggestions: the exact gloss (if present) then any catalog gloss that
    /// contains, or is contained in, the query. Never used to substitute a gloss.
    pub fn similar_glosses(&self, gloss: &str, max_results: usize) -> Vec<String> {
        let query = gloss.trim().to_uppercase();
        let mut out = Vec::new();
        if query.is_empty() {
            return out;
        }
        if self.catalog.exists(&query) {
            out.push(query.clone());
        }
        for candidate in self.catalog.glosses() {
            if out.len() >= max_results {
                break;
            }
            if candidate != query && (candidate.contains(&query) || query.contains(candidate)) {
                out.push(candidate.to_string());
            }
        }
        out.truncate(max_results);
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/catalog.rs"]
mod tests;
