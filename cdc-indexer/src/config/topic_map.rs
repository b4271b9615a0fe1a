//! Static topic to handler-key routing table.

use std::collections::{BTreeMap, BTreeSet};

use crate::IndexingError;

/// Maps subscribed topics to handler keys.
///
/// Never empty. Several topics may share one handler key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicHandlerMap {
    entries: BTreeMap<String, String>,
}

impl TopicHandlerMap {
    /// Build a map from `(topic, handler_key)` pairs.
    ///
    /// Fails on an empty input, a blank topic or key, or a topic listed twice.
    pub fn new<I, T, K>(entries: I) -> Result<Self, IndexingError>
    where
        I: IntoIterator<Item = (T, K)>,
        T: Into<String>,
        K: Into<String>,
    {
        let mut map = BTreeMap::new();

        for (topic, key) in entries {
            let topic = topic.into().trim().to_string();
            let key = key.into().trim().to_string();

            if topic.is_empty() || key.is_empty() {
                return Err(IndexingError::config(format!(
                    "Topic handler entry has a blank side: '{}={}'",
                    topic, key
                )));
            }
            if map.insert(topic.clone(), key).is_some() {
                return Err(IndexingError::config(format!(
                    "Topic '{}' is mapped more than once",
                    topic
                )));
            }
        }

        if map.is_empty() {
            return Err(IndexingError::config(
                "At least one topic handler mapping is required",
            ));
        }

        Ok(Self { entries: map })
    }

    /// Parse `topic=key` pairs separated by commas.
    ///
    /// ```
    /// use cdc_indexer::config::TopicHandlerMap;
    ///
    /// let map = TopicHandlerMap::parse("posts.posts.posts=post-document").unwrap();
    /// assert_eq!(map.handler_key("posts.posts.posts"), Some("post-document"));
    /// ```
    pub fn parse(raw: &str) -> Result<Self, IndexingError> {
        let pairs = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.split_once('=').ok_or_else(|| {
                    IndexingError::config(format!(
                        "Topic handler entry '{}' is not of the form topic=handler-key",
                        entry
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(pairs)
    }

    /// The handler key a topic is mapped to, if any.
    pub fn handler_key(&self, topic: &str) -> Option<&str> {
        self.entries.get(topic).map(String::as_str)
    }

    /// Every configured topic, in sorted order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The distinct handler keys referenced by the map.
    pub fn handler_keys(&self) -> BTreeSet<&str> {
        self.entries.values().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true for a map built by `new` or `parse`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
