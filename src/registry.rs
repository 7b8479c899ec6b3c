use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Label set of one series, kept sorted by key so that the same labels
/// given in any order address the same series.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        Labels(map.into_iter().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, PartialOrd, Ord, Eq, Hash)]
struct SeriesKey {
    name: String,
    labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub name: String,
    pub labels: Labels,
    pub value: f64,
    pub help: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    series: BTreeMap<SeriesKey, f64>,
    help: BTreeMap<String, String>,
}

/// Latest value per (metric name, labels). Last write wins, nothing expires.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe(&self, name: &str, help: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.help.insert(name.to_string(), help.to_string());
    }

    pub fn set(&self, name: &str, labels: Labels, value: f64) {
        let key = SeriesKey {
            name: name.to_string(),
            labels,
        };
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.series.insert(key, value);
    }

    /// Copy of every series, ordered by name then labels.
    pub fn snapshot(&self) -> Vec<Sample> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .series
            .iter()
            .map(|(key, value)| Sample {
                name: key.name.clone(),
                labels: key.labels.clone(),
                value: *value,
                help: inner.help.get(&key.name).cloned(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .series
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
