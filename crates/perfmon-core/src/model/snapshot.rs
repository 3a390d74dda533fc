//! Point-in-time result of one collection cycle.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Decoded value of one counter.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterValue {
    pub alias: String,
    pub value: f64,
}

/// Top-level entry of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEntry {
    /// Counter from an implicit (unnamed) group.
    Counter(CounterValue),
    /// Named group with its counters in declaration order.
    Group {
        name: String,
        counters: Vec<CounterValue>,
    },
}

/// Structured values of one successful cycle.
///
/// Serializes to `{alias: value}` for flat configurations and to
/// `{group: {alias: value}}` for grouped ones, keeping declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of a top-level counter.
    pub fn get(&self, alias: &str) -> Option<f64> {
        self.entries.iter().find_map(|entry| match entry {
            SnapshotEntry::Counter(c) if c.alias == alias => Some(c.value),
            _ => None,
        })
    }

    /// Counters of a named group.
    pub fn group(&self, name: &str) -> Option<&[CounterValue]> {
        self.entries.iter().find_map(|entry| match entry {
            SnapshotEntry::Group { name: n, counters } if n == name => Some(counters.as_slice()),
            _ => None,
        })
    }

    /// Value of a counter inside a named group.
    pub fn get_in(&self, group: &str, alias: &str) -> Option<f64> {
        self.group(group)?
            .iter()
            .find(|c| c.alias == alias)
            .map(|c| c.value)
    }

    /// Total number of counter values.
    pub fn counter_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| match entry {
                SnapshotEntry::Counter(_) => 1,
                SnapshotEntry::Group { counters, .. } => counters.len(),
            })
            .sum()
    }
}

/// Assembles a [`Snapshot`] group by group.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    entries: Vec<SnapshotEntry>,
}

impl SnapshotBuilder {
    /// Appends the values of one group.
    ///
    /// Values of an unnamed group are placed at the top level.
    pub fn push_group<'a>(
        &mut self,
        name: Option<&str>,
        values: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> &mut Self {
        let counters = values.into_iter().map(|(alias, value)| CounterValue {
            alias: alias.to_string(),
            value,
        });

        match name {
            Some(name) => self.entries.push(SnapshotEntry::Group {
                name: name.to_string(),
                counters: counters.collect(),
            }),
            None => self.entries.extend(counters.map(SnapshotEntry::Counter)),
        }
        self
    }

    pub fn build(&mut self) -> Snapshot {
        Snapshot {
            entries: std::mem::take(&mut self.entries),
        }
    }
}

struct GroupValues<'a>(&'a [CounterValue]);

impl Serialize for GroupValues<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for counter in self.0 {
            map.serialize_entry(&counter.alias, &counter.value)?;
        }
        map.end()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            match entry {
                SnapshotEntry::Counter(c) => map.serialize_entry(&c.alias, &c.value)?,
                SnapshotEntry::Group { name, counters } => {
                    map.serialize_entry(name, &GroupValues(counters))?
                }
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_snapshot_serializes_to_flat_map() {
        let snapshot = Snapshot::builder()
            .push_group(None, [("cpu", 42.5), ("mem", 1024.0)])
            .build();
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({"cpu": 42.5, "mem": 1024.0})
        );
        assert_eq!(snapshot.get("cpu"), Some(42.5));
        assert_eq!(snapshot.counter_count(), 2);
    }

    #[test]
    fn test_grouped_snapshot_nests_values() {
        let snapshot = Snapshot::builder()
            .push_group(Some("disk"), [("reads", 10.0), ("writes", 20.0)])
            .build();
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({"disk": {"reads": 10.0, "writes": 20.0}})
        );
        assert_eq!(snapshot.get_in("disk", "writes"), Some(20.0));
        assert_eq!(snapshot.get("reads"), None);
    }

    #[test]
    fn test_serialization_keeps_insertion_order() {
        let snapshot = Snapshot::builder()
            .push_group(None, [("zeta", 1.0)])
            .push_group(Some("net"), [("sent", 2.0), ("recv", 3.0)])
            .push_group(None, [("alpha", 4.0)])
            .build();
        assert_eq!(
            serde_json::to_string(&snapshot).unwrap(),
            r#"{"zeta":1.0,"net":{"sent":2.0,"recv":3.0},"alpha":4.0}"#
        );
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(serde_json::to_string(&snapshot).unwrap(), "{}");
    }
}
