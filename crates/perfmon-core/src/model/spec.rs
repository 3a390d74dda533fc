//! Counter definitions as supplied by configuration.

use serde::{Deserialize, Deserializer, Serialize};

/// A single named counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CounterConfig {
    /// Output key for the counter's value.
    pub alias: String,
    /// Full PDH counter path, e.g. `\Processor(_Total)\% Processor Time`.
    pub query: String,
}

impl CounterConfig {
    pub fn new(alias: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            query: query.into(),
        }
    }
}

/// A named group of counters, reported as one nested mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    #[serde(rename = "group")]
    pub members: Vec<CounterConfig>,
}

/// Either a flat counter or a named group of counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CounterSpec {
    Flat(CounterConfig),
    Group(GroupConfig),
}

/// Configuration entry before it is classified as a counter or a group.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpec {
    alias: Option<String>,
    query: Option<String>,
    name: Option<String>,
    group: Option<Vec<CounterConfig>>,
}

impl TryFrom<RawSpec> for CounterSpec {
    type Error = String;

    fn try_from(raw: RawSpec) -> Result<Self, Self::Error> {
        let counter = raw.alias.is_some() || raw.query.is_some();
        let grouped = raw.name.is_some() || raw.group.is_some();

        match (counter, grouped) {
            (true, true) => Err(
                "entry mixes counter fields (`alias`, `query`) with group fields (`name`, `group`)"
                    .to_string(),
            ),
            (true, false) => match (raw.alias, raw.query) {
                (Some(alias), Some(query)) => Ok(CounterSpec::flat(alias, query)),
                (Some(alias), None) => Err(format!("counter '{}' is missing field `query`", alias)),
                (None, _) => Err("counter is missing field `alias`".to_string()),
            },
            (false, true) => match (raw.name, raw.group) {
                (Some(name), Some(members)) => Ok(CounterSpec::group(name, members)),
                (Some(name), None) => Err(format!("group '{}' is missing field `group`", name)),
                (None, _) => Err("group is missing field `name`".to_string()),
            },
            (false, false) => {
                Err("entry needs either `alias` and `query` or `name` and `group`".to_string())
            }
        }
    }
}

impl<'de> Deserialize<'de> for CounterSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawSpec::deserialize(deserializer)?;
        CounterSpec::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl CounterSpec {
    pub fn flat(alias: impl Into<String>, query: impl Into<String>) -> Self {
        CounterSpec::Flat(CounterConfig::new(alias, query))
    }

    pub fn group(name: impl Into<String>, members: Vec<CounterConfig>) -> Self {
        CounterSpec::Group(GroupConfig {
            name: name.into(),
            members,
        })
    }
}

/// One group of the normalized registry tree.
///
/// `name` is `None` for the implicit group formed by top-level flat counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan<'a> {
    pub name: Option<&'a str>,
    pub members: Vec<&'a CounterConfig>,
}

/// Normalizes a spec list into groups, preserving declaration order.
///
/// Each run of consecutive flat counters becomes one anonymous group, so a
/// purely flat list yields exactly one group and walking the result visits
/// counters in the order they were declared.
pub fn normalize(specs: &[CounterSpec]) -> Vec<GroupPlan<'_>> {
    let mut plans: Vec<GroupPlan<'_>> = Vec::new();

    for spec in specs {
        match spec {
            CounterSpec::Flat(counter) => match plans.last_mut() {
                Some(last) if last.name.is_none() => last.members.push(counter),
                _ => plans.push(GroupPlan {
                    name: None,
                    members: vec![counter],
                }),
            },
            CounterSpec::Group(group) => plans.push(GroupPlan {
                name: Some(&group.name),
                members: group.members.iter().collect(),
            }),
        }
    }

    plans
}

/// Iterates every counter in registration order.
pub fn leaves(specs: &[CounterSpec]) -> impl Iterator<Item = &CounterConfig> {
    specs.iter().flat_map(|spec| match spec {
        CounterSpec::Flat(counter) => std::slice::from_ref(counter).iter(),
        CounterSpec::Group(group) => group.members.iter(),
    })
}
