use super::cache::MessageCache;
use crate::client::write::Sender;
use crate::msg::{EmoteCatalog, Message};
use std::ops::Deref;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Handed to every hook and command handler.
///
/// Dereferences to the [`Sender`], so `ctx.say(..)`, `ctx.ban(..)` and the
/// rest of the sending methods are available directly.
#[derive(Clone)]
pub struct Context {
  sender: Sender,
  cache: MessageCache,
  emotes: Arc<EmoteCatalog>,
  stop: CancellationToken,
}

impl Context {
  pub(crate) fn new(
    sender: Sender,
    cache: MessageCache,
    emotes: Arc<EmoteCatalog>,
    stop: CancellationToken,
  ) -> Self {
    Self {
      sender,
      cache,
      emotes,
      stop,
    }
  }

  pub fn sender(&self) -> &Sender {
    &self.sender
  }

  /// The most recent chat messages, oldest first.
  pub fn recent_messages(&self) -> Vec<Message> {
    self.cache.recent()
  }

  pub fn cache(&self) -> &MessageCache {
    &self.cache
  }

  /// Names for emote ids, used with [`Emote::name`][crate::Emote::name].
  pub fn emotes(&self) -> &EmoteCatalog {
    &self.emotes
  }

  /// Ask the bot to shut down.
  ///
  /// The read loop exits before the next event, the connection is closed,
  /// and timers are cancelled. Use [`BotHandle::stop`][crate::BotHandle::stop]
  /// from outside the bot to also wait for that to finish.
  pub fn stop(&self) {
    debug!("stop requested by handler");
    self.stop.cancel();
  }

  pub fn is_stopping(&self) -> bool {
    self.stop.is_cancelled()
  }
}

impl Deref for Context {
  type Target = Sender;

  fn deref(&self) -> &Sender {
    &self.sender
  }
}

impl std::fmt::Debug for Context {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Context")
      .field("sender", &self.sender)
      .field("cache", &self.cache)
      .field("stopping", &self.is_stopping())
      .finish_non_exhaustive()
  }
}

static_assert_send!(Context);
static_assert_sync!(Context);
