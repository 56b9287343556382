//! ## Twitch IRC Client
//!
//! This is the connection layer underneath [`Bot`][crate::Bot].
//! The entrypoint to this module is the [`Client`].
//!
//! [`Client::connect`] opens the socket, authenticates, requests capabilities,
//! and joins the configured channels. After that, lines are read with
//! [`Client::recv`] and written through the cloneable [`Sender`].
//!
//! If you wish to be able to send messages, you have to generate an oauth2 token,
//! and then supply it through [`Credentials`].
//! Generating an oauth2 token is out of scope for this library.
//! Head over to the [official documentation](https://dev.twitch.tv/docs/irc/authenticate-bot/#getting-an-access-token)
//! to see how you can generate one.
//!
//! ⚠ Note: [`Client`] does not reconnect. If the connection drops,
//! [`Client::recv`] returns an error and it is up to the embedder to start over.

pub mod channel;
pub mod conn;
pub mod ratelimit;
pub mod read;
pub mod write;

use self::channel::Channels;
use self::conn::OpenStreamError;
use self::ratelimit::{RateLimit, RateLimiter};
use self::read::ReadStream;
use self::write::{SendError, Sender};
use crate::common::normalize_channel;
use rand::{thread_rng, Rng};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Logins starting with this can read chat without a token.
pub const ANON_PREFIX: &str = "justinfan";

/// Capabilities requested during the handshake, in order.
pub const CAPABILITIES: [&str; 3] = ["commands", "tags", "membership"];

/// The default timeout used when connecting to Twitch IRC.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials used to authenticate to Twitch IRC.
///
/// The [`Default`] impl uses [`Credentials::anon`].
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Credentials {
  /// The _login_ of the user.
  pub nick: String,

  /// The oauth2 token, e.g. `oauth:abcd...`.
  pub pass: String,
}

impl Credentials {
  const ANON_RANGE: std::ops::Range<u32> = 10000..99999;

  /// Instantiate credentials from a `nick` and `pass`.
  pub fn new(nick: impl ToString, pass: impl ToString) -> Self {
    Self {
      nick: nick.to_string(),
      pass: pass.to_string(),
    }
  }

  /// An anonymous login.
  ///
  /// Twitch allows logging in using any username in the form `justinfan?????`
  /// where `?` is any digit. For example, `justinfan11824` is a valid username.
  ///
  /// If you login anonymously, you won't be able to send messages, but you
  /// will still be able to read them, including all the usual tags,
  /// membership commands, etc.
  pub fn anon() -> Self {
    Self {
      pass: String::new(),
      nick: format!("{ANON_PREFIX}{}", thread_rng().gen_range(Self::ANON_RANGE)),
    }
  }

  /// Anonymous logins skip `PASS`.
  pub fn is_anon(&self) -> bool {
    self.nick.to_lowercase().starts_with(ANON_PREFIX)
  }
}

impl Default for Credentials {
  fn default() -> Self {
    Self::anon()
  }
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("nick", &self.nick)
      .finish_non_exhaustive()
  }
}

/// Bot configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Config {
  /// Credentials to use when logging in to Twitch IRC.
  pub credentials: Credentials,

  /// Channels to join after the bot's own channel.
  pub channels: Vec<String>,

  /// Command prefix.
  pub prefix: String,

  /// Logins allowed to run `admin` commands.
  pub admins: Vec<String>,

  pub rate_limit: RateLimit,

  /// Number of chat messages to keep around.
  pub message_cache: usize,

  /// Connect with TLS.
  pub secure: bool,

  /// Bound on connecting and on the handshake.
  #[cfg_attr(feature = "serde", serde(with = "secs"))]
  pub timeout: Duration,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      credentials: Credentials::default(),
      channels: Vec::new(),
      prefix: "!".into(),
      admins: Vec::new(),
      rate_limit: RateLimit::default(),
      message_cache: 100,
      secure: true,
      timeout: DEFAULT_TIMEOUT,
    }
  }
}

impl Config {
  /// Instantiate a default config with some `credentials`.
  pub fn new(credentials: Credentials) -> Self {
    Self {
      credentials,
      ..Default::default()
    }
  }

  pub fn builder() -> ConfigBuilder {
    ConfigBuilder {
      config: Config::default(),
    }
  }

  /// The bot's own channel, which is its login.
  pub fn own_channel(&self) -> String {
    normalize_channel(&self.credentials.nick)
  }
}

#[cfg(feature = "serde")]
pub(crate) mod secs {
  use serde::{Deserialize, Deserializer};
  use std::time::Duration;

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    Ok(Duration::from_secs(u64::deserialize(deserializer)?))
  }
}

/// Builder for a [`Config`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
  config: Config,
}

impl ConfigBuilder {
  pub fn credentials(mut self, credentials: Credentials) -> Self {
    self.config.credentials = credentials;
    self
  }

  pub fn channels<I, S>(mut self, channels: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self.config.channels = channels
      .into_iter()
      .map(|c| normalize_channel(c.as_ref()))
      .collect();
    self
  }

  pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
    self.config.prefix = prefix.into();
    self
  }

  pub fn admins<I, S>(mut self, admins: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self.config.admins = admins
      .into_iter()
      .map(|a| a.as_ref().to_lowercase())
      .collect();
    self
  }

  pub fn rate_limit(mut self, rate_limit: RateLimit) -> Self {
    self.config.rate_limit = rate_limit;
    self
  }

  pub fn message_cache(mut self, size: usize) -> Self {
    self.config.message_cache = size;
    self
  }

  pub fn secure(mut self, secure: bool) -> Self {
    self.config.secure = secure;
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.config.timeout = timeout;
    self
  }

  pub fn build(self) -> Config {
    self.config
  }
}

/// Twitch IRC client.
///
/// Owns the read half of the connection. The write half lives in the [`Sender`].
pub struct Client {
  reader: ReadStream,
  sender: Sender,
  config: Config,
}

impl Client {
  /// Open a connection to Twitch and perform the full handshake.
  ///
  /// `tasks` and `stop` own the rate limiter's deferred releases.
  pub async fn connect(
    config: Config,
    tasks: TaskTracker,
    stop: CancellationToken,
  ) -> Result<Client, ConnectError> {
    trace!(secure = config.secure, "connecting");
    let stream = tokio::time::timeout(config.timeout, conn::open(config.secure)).await??;
    let client = Client::from_stream(stream, config, tasks, stop);
    client.handshake().await?;
    Ok(client)
  }

  /// Wrap an already open stream. No handshake is performed.
  pub fn from_stream(
    stream: conn::Stream,
    config: Config,
    tasks: TaskTracker,
    stop: CancellationToken,
  ) -> Client {
    let (reader, writer) = tokio::io::split(stream);
    let channels = Channels::new();
    let limiter = RateLimiter::new(config.rate_limit, channels.clone(), tasks, stop);
    let sender = Sender::new(writer, limiter, channels, config.own_channel());
    Client {
      reader: read::reader(reader),
      sender,
      config,
    }
  }

  /// `PASS`, `NICK`, `CAP REQ`, then `JOIN`s.
  ///
  /// Each [`Phase`] is bounded by [`Config::timeout`].
  pub async fn handshake(&self) -> Result<(), ConnectError> {
    self.handshake_with(|_| {}).await
  }

  /// Same as [`Client::handshake`], but calls `on_phase` before each phase starts.
  pub async fn handshake_with<F>(&self, mut on_phase: F) -> Result<(), ConnectError>
  where
    F: FnMut(Phase) + Send,
  {
    let timeout = self.config.timeout;

    on_phase(Phase::Authenticating);
    tokio::time::timeout(timeout, self.authenticate()).await??;

    on_phase(Phase::Joining);
    tokio::time::timeout(timeout, async {
      self.request_capabilities().await?;
      self.join_channels().await
    })
    .await??;

    trace!("handshake done");
    Ok(())
  }

  /// Send `PASS` unless the login is anonymous, then `NICK`.
  pub async fn authenticate(&self) -> Result<(), SendError> {
    let credentials = &self.config.credentials;
    if credentials.is_anon() {
      debug!(nick = credentials.nick, "logging in anonymously, sending is disabled");
    } else {
      self
        .sender
        .send_raw(&format!("PASS {}", credentials.pass))
        .await?;
    }
    self
      .sender
      .send_raw(&format!("NICK {}", credentials.nick.to_lowercase()))
      .await
  }

  /// `CAP REQ :twitch.tv/<name>` for every entry in [`CAPABILITIES`].
  pub async fn request_capabilities(&self) -> Result<(), SendError> {
    for cap in CAPABILITIES {
      self
        .sender
        .send_raw(&format!("CAP REQ :twitch.tv/{cap}"))
        .await?;
    }
    Ok(())
  }

  /// Join the bot's own channel, then every configured channel.
  pub async fn join_channels(&self) -> Result<(), SendError> {
    let own = self.config.own_channel();
    self.sender.join(&own).await?;
    for channel in &self.config.channels {
      if normalize_channel(channel) != own {
        self.sender.join(channel).await?;
      }
    }
    Ok(())
  }

  #[inline]
  pub fn sender(&self) -> &Sender {
    &self.sender
  }

  #[inline]
  pub fn config(&self) -> &Config {
    &self.config
  }

  #[inline]
  pub fn credentials(&self) -> &Credentials {
    &self.config.credentials
  }
}

/// A step of [`Client::handshake`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
  /// `PASS` and `NICK`.
  Authenticating,
  /// `CAP REQ` and the `JOIN`s.
  Joining,
}

/// An error which occurred while attempting to connect to Twitch IRC.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
  /// Failed to open a connection.
  #[error("failed to connect: {0}")]
  Open(#[from] OpenStreamError),

  /// Failed to write the handshake.
  #[error("failed to connect: {0}")]
  Send(#[from] SendError),

  /// Connection timed out.
  #[error("failed to connect: connection timed out")]
  Timeout,
}

impl From<tokio::time::error::Elapsed> for ConnectError {
  fn from(_: tokio::time::error::Elapsed) -> Self {
    Self::Timeout
  }
}

static_assert_send!(Client);
static_assert_sync!(Client);
