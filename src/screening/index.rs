//! Watchlist index snapshots for in-memory screening
//!
//! A `WatchlistIndex` is an immutable snapshot of every loaded list,
//! partitioned by source code and blocked by phonetic key and identifier so
//! a query only scores entries sharing one of its blocks. Refreshes build a new snapshot
//! and publish it through the `SnapshotStore`; in-flight batches keep the
//! `Arc` they started with.

use chrono::{DateTime, Utc};
use ob_screening_types::SubjectType;
use rphonetic::{DoubleMetaphone, Encoder};
use sha2::{Digest, Sha256};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use super::normalize::{normalize, normalize_country, normalize_identifier, NormalizedName};
use super::types::WatchlistEntry;

/// Tokens shorter than this never produce a blocking key
const MIN_BLOCK_TOKEN_CHARS: usize = 2;

/// Position of an entry within its list partition
pub type EntryIdx = u32;

/// Descriptive metadata for one list source
#[derive(Debug, Clone, PartialEq)]
pub struct ListDescriptor {
    pub code: String,
    pub name: String,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl ListDescriptor {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into().to_ascii_uppercase(),
            name: name.into(),
            last_refreshed: None,
        }
    }

    pub fn refreshed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_refreshed = Some(at);
        self
    }
}

/// A name on an entry, pre-normalized at load time
#[derive(Debug, Clone)]
pub struct IndexedName {
    pub raw: String,
    pub normalized: NormalizedName,
    pub is_alias: bool,
}

/// A watchlist entry with everything the scorer needs precomputed
#[derive(Debug, Clone)]
pub struct IndexedEntry {
    pub entry: Arc<WatchlistEntry>,
    /// Primary name first, then aliases in source order
    pub names: Vec<IndexedName>,
    pub country: Option<String>,
    pub identifiers: Vec<String>,
}

impl IndexedEntry {
    pub fn new(entry: WatchlistEntry) -> Self {
        let subject = entry.subject_type;
        let mut names = vec![IndexedName {
            raw: entry.primary_name.clone(),
            normalized: normalize(&entry.primary_name, subject),
            is_alias: false,
        }];
        names.extend(entry.aliases.iter().map(|alias| IndexedName {
            raw: alias.clone(),
            normalized: normalize(alias, subject),
            is_alias: true,
        }));
        names.retain(|n| !n.normalized.is_empty());

        let country = entry.country.as_deref().and_then(normalize_country);
        let identifiers = entry
            .identifiers
            .iter()
            .filter_map(|id| normalize_identifier(id))
            .collect();

        Self {
            entry: Arc::new(entry),
            names,
            country,
            identifiers,
        }
    }

    pub fn primary(&self) -> Option<&IndexedName> {
        self.names.iter().find(|n| !n.is_alias)
    }
}

/// Blocking keys for a normalized name.
///
/// One key per distinct core token of at least two characters: the Double
/// Metaphone code for ASCII-alphabetic tokens, the token itself otherwise.
pub fn blocking_keys(name: &NormalizedName) -> SmallVec<[String; 4]> {
    let encoder = DoubleMetaphone::default();
    let mut keys: SmallVec<[String; 4]> = SmallVec::new();

    for token in &name.tokens {
        if token.chars().count() < MIN_BLOCK_TOKEN_CHARS {
            continue;
        }
        let key = if token.chars().all(|c| c.is_ascii_alphabetic()) {
            let code = encoder.encode(&token.to_ascii_uppercase());
            if code.is_empty() {
                format!("T:{}", token)
            } else {
                format!("P:{}", code)
            }
        } else {
            format!("T:{}", token)
        };
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    keys
}

/// Blocking key for a normalized identifier.
///
/// Entries are filed under each of their identifiers so an exact identifier
/// reaches the scorer whatever the name says.
pub fn identifier_key(identifier: &str) -> String {
    format!("I:{}", identifier)
}

/// One list's entries plus its blocking structure
#[derive(Debug, Clone)]
pub struct ListPartition {
    pub descriptor: ListDescriptor,
    pub entries: Vec<IndexedEntry>,
    /// Blocking key → entries filed under it
    blocks: HashMap<String, SmallVec<[EntryIdx; 8]>>,
    /// Entries with no usable blocking key; scored against every query
    catch_all: Vec<EntryIdx>,
}

impl ListPartition {
    pub fn build(descriptor: ListDescriptor, entries: Vec<WatchlistEntry>) -> Self {
        let entries: Vec<IndexedEntry> = entries
            .into_iter()
            .map(|mut entry| {
                entry.list_code = descriptor.code.clone();
                IndexedEntry::new(entry)
            })
            .collect();

        let mut blocks: HashMap<String, SmallVec<[EntryIdx; 8]>> = HashMap::new();
        let mut catch_all = Vec::new();

        for (idx, indexed) in entries.iter().enumerate() {
            let idx = idx as EntryIdx;
            let mut filed = false;
            for name in &indexed.names {
                for key in blocking_keys(&name.normalized) {
                    let members = blocks.entry(key).or_default();
                    if members.last() != Some(&idx) {
                        members.push(idx);
                    }
                    filed = true;
                }
            }
            for identifier in &indexed.identifiers {
                let members = blocks.entry(identifier_key(identifier)).or_default();
                if members.last() != Some(&idx) {
                    members.push(idx);
                }
            }
            if !filed {
                catch_all.push(idx);
            }
        }

        debug!(
            list = %descriptor.code,
            entries = entries.len(),
            blocks = blocks.len(),
            catch_all = catch_all.len(),
            "Built list partition"
        );

        Self {
            descriptor,
            entries,
            blocks,
            catch_all,
        }
    }

    pub fn code(&self) -> &str {
        &self.descriptor.code
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sharing at least one block with `keys`, plus the catch-all block.
    ///
    /// Returned in entry order so scoring is deterministic.
    pub fn candidates(&self, keys: &[String]) -> Vec<&IndexedEntry> {
        let mut ids: Vec<EntryIdx> = self.catch_all.clone();
        for key in keys {
            if let Some(members) = self.blocks.get(key) {
                ids.extend_from_slice(members);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .map(|idx| &self.entries[idx as usize])
            .collect()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn catch_all_len(&self) -> usize {
        self.catch_all.len()
    }
}

/// A list that is configured but has no live data
#[derive(Debug, Clone, PartialEq)]
pub struct UnavailableList {
    pub descriptor: ListDescriptor,
    pub reason: String,
}

/// Immutable snapshot of all lists
#[derive(Debug, Clone)]
pub struct WatchlistIndex {
    /// Monotonic version, assigned when published
    pub version: u64,
    /// SHA-256 over the canonical entry data
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
    lists: BTreeMap<String, ListPartition>,
    unavailable: BTreeMap<String, UnavailableList>,
}

impl WatchlistIndex {
    /// A snapshot with no lists at all
    pub fn empty() -> Self {
        SnapshotBuilder::new().build()
    }

    pub fn list(&self, code: &str) -> Option<&ListPartition> {
        self.lists.get(code)
    }

    /// Live lists in code order
    pub fn lists(&self) -> impl Iterator<Item = &ListPartition> {
        self.lists.values()
    }

    /// Configured-but-unavailable lists in code order
    pub fn unavailable(&self) -> impl Iterator<Item = &UnavailableList> {
        self.unavailable.values()
    }

    pub fn unavailable_reason(&self, code: &str) -> Option<&str> {
        self.unavailable.get(code).map(|u| u.reason.as_str())
    }

    pub fn entry_count(&self) -> usize {
        self.lists.values().map(ListPartition::len).sum()
    }

    /// Statistics for debugging
    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            version: self.version,
            fingerprint: self.fingerprint.clone(),
            built_at: self.built_at,
            lists: self
                .lists
                .values()
                .map(|p| ListStats {
                    code: p.code().to_string(),
                    entries: p.len(),
                    blocks: p.block_count(),
                    catch_all: p.catch_all_len(),
                })
                .collect(),
            unavailable: self
                .unavailable
                .values()
                .map(|u| (u.descriptor.code.clone(), u.reason.clone()))
                .collect(),
        }
    }
}

/// Assembles a `WatchlistIndex` from loaded lists
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    lists: Vec<(ListDescriptor, Vec<WatchlistEntry>)>,
    unavailable: Vec<UnavailableList>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_list(mut self, descriptor: ListDescriptor, entries: Vec<WatchlistEntry>) -> Self {
        self.lists.push((descriptor, entries));
        self
    }

    pub fn mark_unavailable(
        mut self,
        descriptor: ListDescriptor,
        reason: impl Into<String>,
    ) -> Self {
        self.unavailable.push(UnavailableList {
            descriptor,
            reason: reason.into(),
        });
        self
    }

    /// Build the snapshot. Version is 0 until published.
    pub fn build(self) -> WatchlistIndex {
        let mut hasher = Sha256::new();
        let mut lists = BTreeMap::new();

        let mut sources = self.lists;
        sources.sort_by(|a, b| a.0.code.cmp(&b.0.code));

        for (descriptor, mut entries) in sources {
            entries.sort_by(|a, b| a.id.cmp(&b.id));
            hasher.update(descriptor.code.as_bytes());
            hasher.update(b"\n");
            for entry in &entries {
                hash_entry(&mut hasher, entry);
            }
            let partition = ListPartition::build(descriptor, entries);
            lists.insert(partition.code().to_string(), partition);
        }

        let unavailable = self
            .unavailable
            .into_iter()
            .filter(|u| !lists.contains_key(&u.descriptor.code))
            .map(|u| (u.descriptor.code.clone(), u))
            .collect();

        WatchlistIndex {
            version: 0,
            fingerprint: hex::encode(hasher.finalize()),
            built_at: Utc::now(),
            lists,
            unavailable,
        }
    }
}

fn hash_entry(hasher: &mut Sha256, entry: &WatchlistEntry) {
    let subject = match entry.subject_type {
        SubjectType::Individual => "i",
        SubjectType::Company => "c",
    };
    let fields: [&str; 7] = [
        entry.id.as_str(),
        entry.primary_name.as_str(),
        &entry.aliases.join("\u{1f}"),
        subject,
        &entry.dob.map(|d| d.to_string()).unwrap_or_default(),
        entry.country.as_deref().unwrap_or_default(),
        &entry.identifiers.join("\u{1f}"),
    ];
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update(b"\x1e");
    }
    hasher.update(b"\n");
}

/// Holder of the current snapshot.
///
/// `publish` swaps the `Arc`; readers that already cloned the previous one
/// keep a consistent view until they drop it.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<WatchlistIndex>>,
}

impl SnapshotStore {
    pub fn new(mut index: WatchlistIndex) -> Self {
        index.version = index.version.max(1);
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// The snapshot to use for one whole batch
    pub fn current(&self) -> Arc<WatchlistIndex> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish a freshly built snapshot; returns its assigned version
    pub fn publish(&self, mut index: WatchlistIndex) -> u64 {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        index.version = current.version + 1;
        let version = index.version;
        info!(
            version,
            entries = index.entry_count(),
            fingerprint = %short_fingerprint(&index.fingerprint, 12),
            "Published watchlist snapshot"
        );
        *current = Arc::new(index);
        version
    }
}

/// Leading `len` characters of a hex fingerprint, or all of it when shorter
fn short_fingerprint(fingerprint: &str, len: usize) -> &str {
    fingerprint.get(..len).unwrap_or(fingerprint)
}

/// Per-list statistics
#[derive(Debug, Clone)]
pub struct ListStats {
    pub code: String,
    pub entries: usize,
    pub blocks: usize,
    pub catch_all: usize,
}

/// Snapshot statistics
#[derive(Debug, Clone)]
pub struct SnapshotStats {
    pub version: u64,
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
    pub lists: Vec<ListStats>,
    pub unavailable: Vec<(String, String)>,
}

impl std::fmt::Display for SnapshotStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Watchlist Snapshot Statistics:")?;
        writeln!(f, "  Version: {}", self.version)?;
        writeln!(
            f,
            "  Fingerprint: {}",
            short_fingerprint(&self.fingerprint, 16)
        )?;
        writeln!(f, "  Built at: {}", self.built_at.to_rfc3339())?;
        for list in &self.lists {
            writeln!(
                f,
                "  {}: {} entries, {} blocks, {} catch-all",
                list.code, list.entries, list.blocks, list.catch_all
            )?;
        }
        for (code, reason) in &self.unavailable {
            writeln!(f, "  {}: unavailable ({})", code, reason)?;
        }
        Ok(())
    }
}
