//! The write half of the connection.
//!
//! [`Sender`] is cheap to clone and may be used from any task.
//! Writes are serialized, one line at a time.

use super::channel::Channels;
use super::conn;
use super::ratelimit::{RateLimitError, RateLimiter};
use crate::common::normalize_channel;
use crate::msg::User;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::Mutex;

pub type WriteStream = WriteHalf<conn::Stream>;

/// Twitch rejects chat messages longer than this many characters.
pub const MAX_MESSAGE_LENGTH: usize = 500;

/// Failed to send a message.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
  /// The underlying I/O operation failed.
  #[error("failed to write message: {0}")]
  Io(#[from] io::Error),

  /// The connection was closed.
  #[error("failed to write message: stream closed")]
  StreamClosed,

  /// The message is longer than [`MAX_MESSAGE_LENGTH`] characters.
  #[error("the maximum amount of characters in one message is {MAX_MESSAGE_LENGTH}, tried to send {len}")]
  MessageTooLong { len: usize },

  #[error("failed to write message: {0}")]
  RateLimit(#[from] RateLimitError),
}

/// Handle for writing to Twitch.
///
/// `privmsg`, `say`, and every dot command go through the rate limiter.
/// `JOIN`, `PART`, `PONG`, and raw lines do not.
#[derive(Clone)]
pub struct Sender(Arc<Inner>);

struct Inner {
  writer: Mutex<WriteStream>,
  closed: AtomicBool,
  limiter: RateLimiter,
  channels: Channels,
  nick: String,
}

impl Sender {
  pub(super) fn new(
    writer: WriteStream,
    limiter: RateLimiter,
    channels: Channels,
    nick: impl Into<String>,
  ) -> Self {
    Self(Arc::new(Inner {
      writer: Mutex::new(writer),
      closed: AtomicBool::new(false),
      limiter,
      channels,
      nick: nick.into(),
    }))
  }

  /// The bot's login.
  pub fn nick(&self) -> &str {
    &self.0.nick
  }

  pub fn channels(&self) -> &Channels {
    &self.0.channels
  }

  pub fn limiter(&self) -> &RateLimiter {
    &self.0.limiter
  }

  pub fn is_closed(&self) -> bool {
    self.0.closed.load(Ordering::Acquire)
  }

  /// Write a single line as-is. The line ending is appended.
  ///
  /// This bypasses the rate limiter.
  pub async fn send_raw(&self, line: &str) -> Result<(), SendError> {
    if self.is_closed() {
      return Err(SendError::StreamClosed);
    }

    if line.starts_with("PASS ") {
      trace!("> PASS ***");
    } else {
      trace!("> {line}");
    }

    let mut writer = self.0.writer.lock().await;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(())
  }

  /// Reply to a `PING`.
  pub async fn pong(&self, content: &str) -> Result<(), SendError> {
    if content.is_empty() || content.contains(' ') {
      self.send_raw(&format!("PONG :{content}")).await
    } else {
      self.send_raw(&format!("PONG {content}")).await
    }
  }

  /// Join `channel` and start tracking the bot's status in it.
  pub async fn join(&self, channel: &str) -> Result<(), SendError> {
    let channel = normalize_channel(channel);
    self.0.channels.insert(&channel);
    self.send_raw(&format!("JOIN #{channel}")).await
  }

  /// Leave `channel` and forget the bot's status in it.
  pub async fn part(&self, channel: &str) -> Result<(), SendError> {
    let channel = normalize_channel(channel);
    self.0.channels.remove(&channel);
    // the ceiling may only have been held down by this channel
    self.0.limiter.ceiling_changed();
    self.send_raw(&format!("PART #{channel}")).await
  }

  /// Send `text` to `channel` as-is, after waiting for the rate limiter.
  ///
  /// Newlines are replaced with spaces. Unlike [`Sender::say`],
  /// a leading `.` is kept and will be interpreted by Twitch as a command.
  pub async fn privmsg(&self, channel: &str, text: &str) -> Result<(), SendError> {
    let channel = normalize_channel(channel);
    self.0.limiter.acquire().await?;
    let text = text.replace(['\r', '\n'], " ");
    self.send_raw(&format!("PRIVMSG #{channel} :{text}")).await
  }

  /// Send a chat message to `channel`.
  ///
  /// Fails with [`SendError::MessageTooLong`] if `message` is longer than
  /// [`MAX_MESSAGE_LENGTH`] characters. Leading `.`s are stripped,
  /// use the dedicated methods (e.g. [`Sender::ban`]) for Twitch commands.
  pub async fn say(&self, channel: &str, message: &str) -> Result<(), SendError> {
    let len = message.chars().count();
    if len > MAX_MESSAGE_LENGTH {
      return Err(SendError::MessageTooLong { len });
    }
    self
      .privmsg(channel, message.trim_start_matches('.'))
      .await
  }

  async fn command(&self, channel: &str, command: &str, args: &[&str]) -> Result<(), SendError> {
    let mut text = String::with_capacity(64);
    text.push('.');
    text.push_str(command);
    for arg in args.iter().filter(|arg| !arg.is_empty()) {
      text.push(' ');
      text.push_str(arg);
    }
    self.privmsg(channel, &text).await
  }

  /// Ban `user` from the channel they were seen in.
  pub async fn ban(&self, user: &User, reason: Option<&str>) -> Result<(), SendError> {
    let args = [user.name(), reason.unwrap_or_default()];
    self.command(user.channel(), "ban", &args).await
  }

  pub async fn unban(&self, user: &User) -> Result<(), SendError> {
    self.command(user.channel(), "unban", &[user.name()]).await
  }

  /// Time out `user` for `seconds` in the channel they were seen in.
  pub async fn timeout(
    &self,
    user: &User,
    seconds: u64,
    reason: Option<&str>,
  ) -> Result<(), SendError> {
    let seconds = seconds.to_string();
    let args = [user.name(), seconds.as_str(), reason.unwrap_or_default()];
    self.command(user.channel(), "timeout", &args).await
  }

  /// `/me`
  pub async fn me(&self, channel: &str, text: &str) -> Result<(), SendError> {
    self.command(channel, "me", &[text]).await
  }

  /// Send a private message to `user`.
  pub async fn whisper(&self, user: &User, message: &str) -> Result<(), SendError> {
    self
      .command(user.channel(), "w", &[user.name(), message])
      .await
  }

  /// Change the bot's name color. Sent in the bot's own channel.
  pub async fn color(&self, color: &str) -> Result<(), SendError> {
    let channel = self.0.nick.to_lowercase();
    self.command(&channel, "color", &[color]).await
  }

  pub async fn mod_user(&self, user: &User) -> Result<(), SendError> {
    self.command(user.channel(), "mod", &[user.name()]).await
  }

  pub async fn unmod_user(&self, user: &User) -> Result<(), SendError> {
    self.command(user.channel(), "unmod", &[user.name()]).await
  }

  pub async fn clear(&self, channel: &str) -> Result<(), SendError> {
    self.command(channel, "clear", &[]).await
  }

  pub async fn subscribers_on(&self, channel: &str) -> Result<(), SendError> {
    self.command(channel, "subscribers", &[]).await
  }

  pub async fn subscribers_off(&self, channel: &str) -> Result<(), SendError> {
    self.command(channel, "subscribersoff", &[]).await
  }

  pub async fn slow_on(&self, channel: &str) -> Result<(), SendError> {
    self.command(channel, "slow", &[]).await
  }

  pub async fn slow_off(&self, channel: &str) -> Result<(), SendError> {
    self.command(channel, "slowoff", &[]).await
  }

  pub async fn r9k_on(&self, channel: &str) -> Result<(), SendError> {
    self.command(channel, "r9k", &[]).await
  }

  pub async fn r9k_off(&self, channel: &str) -> Result<(), SendError> {
    self.command(channel, "r9koff", &[]).await
  }

  pub async fn emote_only_on(&self, channel: &str) -> Result<(), SendError> {
    self.command(channel, "emoteonly", &[]).await
  }

  pub async fn emote_only_off(&self, channel: &str) -> Result<(), SendError> {
    self.command(channel, "emoteonlyoff", &[]).await
  }

  /// Start hosting `target` in `channel`.
  pub async fn host(&self, channel: &str, target: &str) -> Result<(), SendError> {
    self.command(channel, "host", &[target]).await
  }

  pub async fn unhost(&self, channel: &str) -> Result<(), SendError> {
    self.command(channel, "unhost", &[]).await
  }

  /// Shut down the write half of the connection.
  ///
  /// Every send after this fails with [`SendError::StreamClosed`].
  /// Calling this more than once is a no-op.
  pub async fn close(&self) -> Result<(), SendError> {
    if self.0.closed.swap(true, Ordering::AcqRel) {
      return Ok(());
    }
    trace!("closing connection");
    self.0.writer.lock().await.shutdown().await?;
    Ok(())
  }
}

impl std::fmt::Debug for Sender {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Sender")
      .field("nick", &self.0.nick)
      .field("closed", &self.is_closed())
      .finish_non_exhaustive()
  }
}

static_assert_send!(Sender);
static_assert_sync!(Sender);

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::client::ratelimit::RateLimit;
  use tokio::io::{AsyncReadExt, DuplexStream};
  use tokio_util::sync::CancellationToken;
  use tokio_util::task::TaskTracker;

  pub(crate) fn sender(nick: &str) -> (Sender, DuplexStream) {
    let (client, server) = tokio::io::duplex(1 << 16);
    let stream: conn::Stream = Box::new(client);
    let (_, writer) = tokio::io::split(stream);
    let channels = Channels::new();
    let limiter = RateLimiter::new(
      RateLimit::default(),
      channels.clone(),
      TaskTracker::new(),
      CancellationToken::new(),
    );
    (Sender::new(writer, limiter, channels, nick), server)
  }

  async fn wire(sender: Sender, mut server: DuplexStream) -> String {
    sender.close().await.unwrap();
    let mut out = String::new();
    server.read_to_string(&mut out).await.unwrap();
    out.replace("\r\n", "\n").trim_end().to_owned()
  }

  #[tokio::test]
  async fn say_strips_dots_and_newlines() {
    let (sender, server) = sender("my_bot");
    sender.say("#Forsen", "..hello\nworld").await.unwrap();
    insta::assert_snapshot!(wire(sender, server).await, @"PRIVMSG #forsen :hello world");
  }

  #[tokio::test]
  async fn say_rejects_long_messages() {
    let (sender, _server) = sender("my_bot");
    let message = "a".repeat(MAX_MESSAGE_LENGTH + 1);
    assert!(matches!(
      sender.say("forsen", &message).await,
      Err(SendError::MessageTooLong { len: 501 })
    ));
    assert_eq!(sender.limiter().count(), 0);

    let message = "ä".repeat(MAX_MESSAGE_LENGTH);
    sender.say("forsen", &message).await.unwrap();
  }

  #[tokio::test]
  async fn dot_commands() {
    let (sender, server) = sender("my_bot");
    let user = User::new("weeb123", "pajlada");
    sender.ban(&user, Some("spam")).await.unwrap();
    sender.ban(&user, None).await.unwrap();
    sender.unban(&user).await.unwrap();
    sender.timeout(&user, 600, None).await.unwrap();
    sender.whisper(&user, "hi there").await.unwrap();
    sender.me("pajlada", "waves").await.unwrap();
    sender.color("#FF0000").await.unwrap();
    sender.mod_user(&user).await.unwrap();
    sender.unmod_user(&user).await.unwrap();
    sender.clear("pajlada").await.unwrap();
    sender.slow_on("pajlada").await.unwrap();
    sender.emote_only_off("pajlada").await.unwrap();
    sender.host("pajlada", "forsen").await.unwrap();
    sender.unhost("pajlada").await.unwrap();
    assert_eq!(sender.limiter().count(), 14);

    insta::assert_snapshot!(wire(sender, server).await, @r###"
    PRIVMSG #pajlada :.ban weeb123 spam
    PRIVMSG #pajlada :.ban weeb123
    PRIVMSG #pajlada :.unban weeb123
    PRIVMSG #pajlada :.timeout weeb123 600
    PRIVMSG #pajlada :.w weeb123 hi there
    PRIVMSG #pajlada :.me waves
    PRIVMSG #my_bot :.color #FF0000
    PRIVMSG #pajlada :.mod weeb123
    PRIVMSG #pajlada :.unmod weeb123
    PRIVMSG #pajlada :.clear
    PRIVMSG #pajlada :.slow
    PRIVMSG #pajlada :.emoteonlyoff
    PRIVMSG #pajlada :.host forsen
    PRIVMSG #pajlada :.unhost
    "###);
  }

  #[tokio::test]
  async fn join_part_and_pong_track_channels_without_rate_limit() {
    let (sender, server) = sender("my_bot");
    sender.join("#Pajlada").await.unwrap();
    assert!(sender.channels().contains("pajlada"));
    sender.part("pajlada").await.unwrap();
    assert!(!sender.channels().contains("pajlada"));
    sender.pong("tmi.twitch.tv").await.unwrap();
    sender.pong("a b").await.unwrap();
    assert_eq!(sender.limiter().count(), 0);

    insta::assert_snapshot!(wire(sender, server).await, @r###"
    JOIN #pajlada
    PART #pajlada
    PONG tmi.twitch.tv
    PONG :a b
    "###);
  }

  #[tokio::test]
  async fn closed_sender_rejects_writes() {
    let (sender, _server) = sender("my_bot");
    sender.close().await.unwrap();
    sender.close().await.unwrap();
    assert!(matches!(
      sender.send_raw("PING").await,
      Err(SendError::StreamClosed)
    ));
  }
}
