//! Event hooks.
//!
//! Every hook has a no-op default, so a handler only implements what it needs.
//! Hooks are awaited one at a time, in the order events arrive on the wire,
//! and a slow hook stalls the whole connection.

use super::Context;
use crate::event::{Notice, UserNotice};
use crate::irc::Tags;
use crate::msg::{Message, User};
use std::any::Any;
use std::future::Future;

/// Error returned from a hook or a command handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A hook panicked. Passed to [`Handler::on_error`] like any other error.
#[derive(Debug, thiserror::Error)]
#[error("handler panicked: {0}")]
pub struct Panicked(pub String);

impl Panicked {
  pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
    let message = match payload.downcast::<String>() {
      Ok(message) => *message,
      Err(payload) => match payload.downcast::<&'static str>() {
        Ok(message) => (*message).to_owned(),
        Err(_) => "unknown panic payload".to_owned(),
      },
    };
    Self(message)
  }
}

/// Receives events from a running [`Bot`][crate::Bot].
///
/// ```rust
/// use tmi_bot::{Context, Handler, HandlerError, Message};
/// use std::future::Future;
///
/// struct ChatLog;
///
/// impl Handler for ChatLog {
///   fn on_message(
///     &self,
///     _ctx: &Context,
///     msg: &Message,
///   ) -> impl Future<Output = Result<(), HandlerError>> + Send {
///     println!("#{} {}: {}", msg.channel(), msg.author().name(), msg.text());
///     async { Ok(()) }
///   }
/// }
/// ```
///
/// Any `Fn(Context, Message) -> impl Future` is a handler which only
/// implements [`Handler::on_message`], and `()` is a handler which does nothing.
#[allow(unused_variables)]
pub trait Handler: Send + Sync + 'static {
  /// Called once, after the handshake and before any line is read.
  fn on_ready(&self, ctx: &Context) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  /// Called with every line, before the event-specific hook.
  fn on_raw_line(
    &self,
    ctx: &Context,
    line: &str,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  /// A chat message. Commands are dispatched after this returns.
  fn on_message(
    &self,
    ctx: &Context,
    msg: &Message,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  /// A whisper sent to the bot.
  fn on_private_message(
    &self,
    ctx: &Context,
    msg: &Message,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  fn on_user_join(
    &self,
    ctx: &Context,
    user: &User,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  fn on_user_leave(
    &self,
    ctx: &Context,
    user: &User,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  fn on_user_op(
    &self,
    ctx: &Context,
    user: &User,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  fn on_user_deop(
    &self,
    ctx: &Context,
    user: &User,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  /// The bot's own state in a channel. `user` is the bot.
  fn on_user_state(
    &self,
    ctx: &Context,
    user: &User,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  /// A channel's chat settings changed.
  fn on_room_state(
    &self,
    ctx: &Context,
    channel: &str,
    tags: Option<&Tags>,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  fn on_notice(
    &self,
    ctx: &Context,
    notice: &Notice,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  /// The whole chat was cleared.
  fn on_clear(
    &self,
    ctx: &Context,
    channel: &str,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  /// `tags` carry the `ban-duration`.
  fn on_timeout(
    &self,
    ctx: &Context,
    user: &User,
    tags: Option<&Tags>,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  fn on_ban(
    &self,
    ctx: &Context,
    user: &User,
    tags: Option<&Tags>,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  /// A single message was deleted.
  fn on_delete_message(
    &self,
    ctx: &Context,
    msg: &Message,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  fn on_host_start(
    &self,
    ctx: &Context,
    channel: &str,
    target: &str,
    viewers: Option<u64>,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  fn on_host_stop(
    &self,
    ctx: &Context,
    channel: &str,
    viewers: Option<u64>,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  /// Subscriptions, gifts, raids, and the rest of `USERNOTICE`.
  ///
  /// The author of `msg` is the subject of the notice,
  /// and `notice.tags` has the `msg-id` which tells them apart.
  fn on_subscribe(
    &self,
    ctx: &Context,
    msg: &Message,
    notice: &UserNotice,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    async { Ok(()) }
  }

  /// A hook returned an error or panicked.
  fn on_error(&self, ctx: &Context, error: HandlerError) -> impl Future<Output = ()> + Send {
    error!(%error, "unhandled error in handler");
    async {}
  }
}

impl Handler for () {}

impl<F, Fut> Handler for F
where
  F: Fn(Context, Message) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<(), HandlerError>> + Send,
{
  fn on_message(
    &self,
    ctx: &Context,
    msg: &Message,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    self(ctx.clone(), msg.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn panic_payloads() {
    let payload: Box<dyn Any + Send> = Box::new("boom");
    assert_eq!(Panicked::from_payload(payload).0, "boom");

    let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
    assert_eq!(
      Panicked::from_payload(payload).to_string(),
      "handler panicked: bang"
    );

    let payload: Box<dyn Any + Send> = Box::new(42u8);
    assert_eq!(Panicked::from_payload(payload).0, "unknown panic payload");
  }
}
