//! Emote locations and the id → name catalog used to render them.

use std::collections::HashMap;

const CDN: &str = "https://static-cdn.jtvnw.net/emoticons/v1";

/// A single occurrence of an emote inside a message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Emote {
  id: String,
  start: usize,
  end: usize,
}

generate_getters! {
  for Emote as self {
    /// ID of the emote.
    id -> &str = &self.id,

    /// Index of the first character of the emote in the message.
    start -> usize,

    /// Index of the last character of the emote in the message (inclusive).
    end -> usize,
  }
}

impl Emote {
  pub fn new(id: impl Into<String>, start: usize, end: usize) -> Self {
    Self {
      id: id.into(),
      start,
      end,
    }
  }

  /// `(start, end)`, both inclusive character indices.
  pub fn location(&self) -> (usize, usize) {
    (self.start, self.end)
  }

  /// Image URL for the largest size of this emote.
  pub fn url(&self) -> String {
    format!("{CDN}/{}/3.0", self.id)
  }

  /// Look up the emote's name in `catalog`.
  ///
  /// Returns `None` if the catalog hasn't been loaded or doesn't know the id.
  pub fn name<'a>(&self, catalog: &'a EmoteCatalog) -> Option<&'a str> {
    catalog.name(&self.id)
  }
}

/// Parse the `emotes` tag.
///
/// ```text,ignore
/// id:start-end,start-end/id:start-end
/// ```
///
/// Every range becomes its own [`Emote`]. Malformed entries are skipped.
pub(crate) fn parse_emotes(src: &str) -> Vec<Emote> {
  if src.is_empty() {
    return Vec::new();
  }

  let mut out = Vec::new();
  for entry in src.split('/') {
    let Some((id, ranges)) = entry.split_once(':') else {
      trace!(entry, "malformed emote entry");
      continue;
    };
    for range in ranges.split(',') {
      let parsed = range
        .split_once('-')
        .and_then(|(start, end)| Some((start.parse().ok()?, end.parse().ok()?)));
      match parsed {
        Some((start, end)) => out.push(Emote::new(id, start, end)),
        None => trace!(range, "malformed emote range"),
      }
    }
  }
  out
}

/// A catalog mapping emote ids to emote names.
///
/// Empty until [`EmoteCatalog::load`] is called.
/// Loading again replaces the whole catalog, which is how it is refreshed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
  feature = "serde",
  derive(serde::Serialize, serde::Deserialize),
  serde(transparent)
)]
pub struct EmoteCatalog {
  names: HashMap<String, String>,
}

impl EmoteCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Replace the catalog contents with `(id, name)` pairs.
  pub fn load<I, K, V>(&mut self, entries: I)
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    self.names = entries
      .into_iter()
      .map(|(id, name)| (id.into(), name.into()))
      .collect();
    debug!(emotes = self.names.len(), "loaded emote catalog");
  }

  pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
    self.names.insert(id.into(), name.into());
  }

  pub fn name(&self, id: &str) -> Option<&str> {
    self.names.get(id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn is_loaded(&self) -> bool {
    !self.is_empty()
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EmoteCatalog {
  fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
    let mut catalog = EmoteCatalog::new();
    catalog.load(iter);
    catalog
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_emote_ranges() {
    let emotes = parse_emotes("25:0-4,12-16/1902:6-10");
    assert_eq!(
      emotes,
      vec![
        Emote::new("25", 0, 4),
        Emote::new("25", 12, 16),
        Emote::new("1902", 6, 10),
      ]
    );
  }

  #[test]
  fn parse_emote_non_numeric_id() {
    let emotes = parse_emotes("300196486_TK:0-7");
    assert_eq!(emotes, vec![Emote::new("300196486_TK", 0, 7)]);
  }

  #[test]
  fn malformed_emotes_are_skipped() {
    assert!(parse_emotes("").is_empty());
    assert!(parse_emotes("25").is_empty());
    assert_eq!(parse_emotes("25:a-b/1:0-1"), vec![Emote::new("1", 0, 1)]);
  }

  #[test]
  fn url() {
    assert_eq!(
      Emote::new("25", 0, 4).url(),
      "https://static-cdn.jtvnw.net/emoticons/v1/25/3.0"
    );
  }

  #[test]
  fn catalog_lookup_and_reload() {
    let emote = Emote::new("25", 0, 4);

    let mut catalog = EmoteCatalog::new();
    assert!(!catalog.is_loaded());
    assert_eq!(emote.name(&catalog), None);

    catalog.load([("25", "Kappa"), ("1902", "Keepo")]);
    assert_eq!(emote.name(&catalog), Some("Kappa"));
    assert_eq!(catalog.len(), 2);

    catalog.load([("88", "PogChamp")]);
    assert_eq!(emote.name(&catalog), None);
    assert_eq!(catalog.len(), 1);
  }
}
