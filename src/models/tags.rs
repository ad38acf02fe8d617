use serde::{Deserialize, Serialize};

/// An ordered set of tags, as edited by the event and reward forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagList(Vec<String>);

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trimmed tag to the end of the list. Blank tags and tags already
    /// present are ignored; returns whether the list changed.
    pub fn add(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.contains(tag) {
            return false;
        }

        self.0.push(tag.to_owned());
        true
    }

    /// Removes the tag matching `tag` exactly, keeping the rest in order.
    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|existing| existing != tag);

        self.0.len() != before
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|existing| existing == tag)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Self::new();
        for tag in iter {
            tags.add(tag.as_ref());
        }

        tags
    }
}
