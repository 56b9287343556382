use crate::msg::Message;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

/// The last `capacity` chat messages, oldest first.
///
/// Cloning the cache yields another handle to the same messages.
#[derive(Clone)]
pub struct MessageCache(Arc<Mutex<Inner>>);

struct Inner {
  capacity: usize,
  messages: VecDeque<Message>,
}

impl MessageCache {
  pub fn new(capacity: usize) -> Self {
    Self(Arc::new(Mutex::new(Inner {
      capacity,
      messages: VecDeque::with_capacity(capacity),
    })))
  }

  /// Add `message`, evicting the oldest one if the cache is full.
  pub fn push(&self, message: Message) {
    let mut inner = self.0.lock();
    if inner.capacity == 0 {
      return;
    }
    while inner.messages.len() >= inner.capacity {
      inner.messages.pop_front();
    }
    inner.messages.push_back(message);
  }

  /// A snapshot of the cached messages, oldest first.
  pub fn recent(&self) -> Vec<Message> {
    self.0.lock().messages.iter().cloned().collect()
  }

  /// Find a cached message by its id.
  pub fn find(&self, id: Uuid) -> Option<Message> {
    self
      .0
      .lock()
      .messages
      .iter()
      .rev()
      .find(|m| m.id() == Some(id))
      .cloned()
  }

  pub fn capacity(&self) -> usize {
    self.0.lock().capacity
  }

  pub fn len(&self) -> usize {
    self.0.lock().messages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.lock().messages.is_empty()
  }
}

impl std::fmt::Debug for MessageCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let inner = self.0.lock();
    f.debug_struct("MessageCache")
      .field("capacity", &inner.capacity)
      .field("len", &inner.messages.len())
      .finish()
  }
}

static_assert_send!(MessageCache);
static_assert_sync!(MessageCache);

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::Event;

  fn msg(content: &str) -> Message {
    Message::new(content, "forsen", "pajlada", None)
  }

  #[test]
  fn keeps_the_newest_messages() {
    let cache = MessageCache::new(2);
    cache.push(msg("a"));
    cache.push(msg("b"));
    cache.push(msg("c"));
    assert_eq!(cache.len(), 2);
    let contents: Vec<_> = cache.recent().iter().map(|m| m.content().to_owned()).collect();
    assert_eq!(contents, ["b", "c"]);
  }

  #[test]
  fn zero_capacity_keeps_nothing() {
    let cache = MessageCache::new(0);
    cache.push(msg("a"));
    assert!(cache.is_empty());
  }

  #[test]
  fn find_by_id() {
    let cache = MessageCache::new(10);
    let Event::PrivMsg(privmsg) = Event::parse(
      "@id=bbe4c0c6-a6cd-4bb2-b0ac-e8dd7dcb1e74 :randers!randers@randers.tmi.twitch.tv PRIVMSG #pajlada :hello",
    ) else {
      panic!("expected PRIVMSG");
    };
    cache.push(msg("other"));
    cache.push(privmsg.into());

    let id = Uuid::parse_str("bbe4c0c6-a6cd-4bb2-b0ac-e8dd7dcb1e74").unwrap();
    assert_eq!(cache.find(id).unwrap().content(), "hello");
    assert!(cache.find(Uuid::nil()).is_none());
  }
}
