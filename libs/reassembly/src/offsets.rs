use std::collections::HashMap;

/// Last chunk-header offset seen per `(topic, partition)`.
///
/// Used only to decide whether an interrupted chain means lost data.
/// Writes are last-write-wins: a lower offset arriving later replaces a
/// higher one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    last_seen: HashMap<String, HashMap<i32, i64>>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, topic: &str, partition: i32) -> Option<i64> {
        self.last_seen.get(topic)?.get(&partition).copied()
    }

    /// Store `offset` for the key, returning the previous value.
    pub fn record(&mut self, topic: &str, partition: i32, offset: i64) -> Option<i64> {
        match self.last_seen.get_mut(topic) {
            Some(partitions) => partitions.insert(partition, offset),
            None => {
                self.last_seen
                    .entry(topic.to_string())
                    .or_default()
                    .insert(partition, offset);
                None
            }
        }
    }

    /// True only if a prior offset exists for the key and `offset` is
    /// strictly greater than it.
    pub fn is_later(&self, topic: &str, partition: i32, offset: i64) -> bool {
        self.get(topic, partition).is_some_and(|prev| prev < offset)
    }

    pub fn len(&self) -> usize {
        self.last_seen.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
