//! Per-channel state for every channel the bot has joined.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// The bot's own status in a joined channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStatus {
  /// Whether the bot is a moderator in this channel.
  pub moderator: bool,
}

/// Shared map of joined channels.
///
/// Entries are created when the bot sends `JOIN` and removed when it sends `PART`.
/// Names are stored normalized, without the `#`.
#[derive(Clone, Debug, Default)]
pub struct Channels(Arc<Mutex<HashMap<String, ChannelStatus>>>);

impl Channels {
  pub fn new() -> Self {
    Self::default()
  }

  /// Track `channel`, keeping its status if it is already tracked.
  pub fn insert(&self, channel: &str) {
    self.0.lock().entry(channel.to_owned()).or_default();
  }

  pub fn remove(&self, channel: &str) -> Option<ChannelStatus> {
    self.0.lock().remove(channel)
  }

  pub fn get(&self, channel: &str) -> Option<ChannelStatus> {
    self.0.lock().get(channel).copied()
  }

  pub fn contains(&self, channel: &str) -> bool {
    self.0.lock().contains_key(channel)
  }

  /// Update the moderator flag of `channel`.
  ///
  /// Returns `false` if the channel isn't tracked.
  pub fn set_moderator(&self, channel: &str, moderator: bool) -> bool {
    match self.0.lock().get_mut(channel) {
      Some(status) => {
        status.moderator = moderator;
        true
      }
      None => false,
    }
  }

  /// Whether the bot is a moderator in every joined channel.
  ///
  /// Vacuously `true` when no channels are joined.
  pub fn all_moderated(&self) -> bool {
    self.0.lock().values().all(|status| status.moderator)
  }

  /// Names of all joined channels, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<_> = self.0.lock().keys().cloned().collect();
    names.sort_unstable();
    names
  }

  pub fn len(&self) -> usize {
    self.0.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.lock().is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn moderator_tracking() {
    let channels = Channels::new();
    assert!(channels.all_moderated());

    channels.insert("forsen");
    channels.insert("pajlada");
    assert!(!channels.all_moderated());

    assert!(channels.set_moderator("forsen", true));
    assert!(!channels.all_moderated());
    assert!(channels.set_moderator("pajlada", true));
    assert!(channels.all_moderated());

    // re-joining keeps the status
    channels.insert("forsen");
    assert_eq!(channels.get("forsen"), Some(ChannelStatus { moderator: true }));

    assert!(!channels.set_moderator("xqc", true));
    assert_eq!(channels.names(), vec!["forsen", "pajlada"]);
  }

  #[test]
  fn part_removes_status() {
    let channels = Channels::new();
    channels.insert("forsen");
    assert!(channels.remove("forsen").is_some());
    assert!(!channels.contains("forsen"));
    assert!(channels.is_empty());
  }
}
