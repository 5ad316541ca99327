//! Immutable, partition-indexed view of source data.

use std::sync::Arc;

use fnv::FnvHashMap;
use xds_core::InstanceRecord;

use crate::WILDCARD_PARTITION;

/// An immutable set of instance records, indexed by partition.
///
/// A record lists its partitions under the match key. Records without the
/// key, or listing [`WILDCARD_PARTITION`], are visible to every partition.
/// Per-partition lists are computed once when the snapshot is built, so a
/// lookup is one map access and an `Arc` clone.
///
/// Snapshots are never modified after construction; a refresh builds a new
/// one and swaps it in.
#[derive(Debug, Default)]
pub struct SourceSnapshot {
    /// Records per named partition, including wildcard records.
    partitions: FnvHashMap<String, Arc<Vec<InstanceRecord>>>,
    /// Records visible to partitions no record names explicitly.
    wildcard: Arc<Vec<InstanceRecord>>,
    /// Total number of records.
    total: usize,
    /// Refresh cycle that produced this snapshot; 0 means never populated.
    generation: u64,
}

impl SourceSnapshot {
    /// The unpopulated snapshot a manager starts with.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index `records` by the partitions listed under `match_key`.
    ///
    /// Source order is preserved within every partition. A record listing
    /// the same partition twice appears there once.
    pub fn build(records: Vec<InstanceRecord>, match_key: &str, generation: u64) -> Self {
        let mut explicit: FnvHashMap<String, Vec<usize>> = FnvHashMap::default();
        let mut shared: Vec<usize> = Vec::new();

        for (index, record) in records.iter().enumerate() {
            match record.partitions(match_key) {
                Some(list) if !list.contains(&WILDCARD_PARTITION) => {
                    for partition in list {
                        let indices = explicit.entry(partition.to_string()).or_default();
                        if indices.last() != Some(&index) {
                            indices.push(index);
                        }
                    }
                }
                _ => shared.push(index),
            }
        }

        let collect = |indices: &[usize]| -> Arc<Vec<InstanceRecord>> {
            Arc::new(indices.iter().map(|&i| records[i].clone()).collect())
        };

        let partitions = explicit
            .into_iter()
            .map(|(partition, indices)| {
                let visible = merge_ordered(&indices, &shared);
                (partition, collect(&visible))
            })
            .collect();

        Self {
            partitions,
            wildcard: collect(&shared),
            total: records.len(),
            generation,
        }
    }

    /// Records visible to `partition`.
    #[must_use]
    pub fn instances(&self, partition: &str) -> Arc<Vec<InstanceRecord>> {
        self.partitions
            .get(partition)
            .unwrap_or(&self.wildcard)
            .clone()
    }

    /// Total number of records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.total
    }

    /// Check if the snapshot holds no records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Refresh cycle that produced this snapshot.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether any refresh has populated this snapshot.
    #[inline]
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.generation > 0
    }

    /// Partitions named by at least one record.
    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }
}

/// Merge two ascending, disjoint index lists.
fn merge_ordered(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            merged.push(a[i]);
            i += 1;
        } else {
            merged.push(b[j]);
            j += 1;
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}
