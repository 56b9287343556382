//! ## Bot
//!
//! [`Bot`] drives a single connection: it performs the handshake, reads lines
//! one at a time, answers `PING`s, and calls a [`Handler`] for every event.
//! Chat messages are then passed to the command [`Router`].
//!
//! ```rust,no_run
//! use tmi_bot::{Bot, Config, Context, HandlerError, Message};
//!
//! # async fn run() -> Result<(), tmi_bot::BotError> {
//! let handle = Bot::new(Config::default()).spawn(|_ctx: Context, msg: Message| async move {
//!   println!("#{} {}: {}", msg.channel(), msg.author().name(), msg.text());
//!   Ok::<_, HandlerError>(())
//! });
//!
//! // ...
//!
//! handle.stop().await;
//! handle.join().await
//! # }
//! ```
//!
//! Events are handled strictly in the order they arrive.
//! Errors and panics from hooks go to [`Handler::on_error`] and
//! do not stop the bot. Connection errors do.

pub mod cache;
pub mod context;
pub mod handler;
pub mod timer;

pub use cache::MessageCache;
pub use context::Context;
pub use handler::{Handler, HandlerError, Panicked};
pub use timer::Timer;

use crate::client::conn::{self, Stream};
use crate::client::read::RecvError;
use crate::client::write::SendError;
use crate::client::{Client, Config, ConnectError, Phase};
use crate::command::{Command, Router};
use crate::event::{Event, HostTarget, UnknownReason};
use crate::irc::Tag;
use crate::msg::{EmoteCatalog, Message, User};
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Lifecycle of a running bot, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
  /// Opening the socket.
  Connecting,
  /// Sending `PASS` and `NICK`.
  Authenticating,
  /// Requesting capabilities and joining channels.
  Joining,
  /// Running [`Handler::on_ready`].
  Ready,
  /// Dispatching events.
  Reading,
  /// Closing the connection and waiting for background tasks.
  Closing,
  Closed,
}

/// A bot which hasn't been started yet.
pub struct Bot {
  config: Config,
  router: Router,
  timers: Vec<Timer>,
  emotes: EmoteCatalog,
}

impl Bot {
  pub fn new(config: Config) -> Self {
    let router = Router::new(
      config.prefix.clone(),
      &config.admins,
      &config.credentials.nick,
    );
    Self {
      config,
      router,
      timers: Vec::new(),
      emotes: EmoteCatalog::new(),
    }
  }

  /// Register a chat command. Registering the same name twice replaces the first one.
  pub fn command(mut self, command: impl Into<Command>) -> Self {
    self.router.register(command);
    self
  }

  /// Repeat a message on an interval, starting once the bot is ready.
  pub fn timer(mut self, timer: Timer) -> Self {
    self.timers.push(timer);
    self
  }

  /// Emote names, available to handlers through [`Context::emotes`].
  pub fn emotes(mut self, catalog: EmoteCatalog) -> Self {
    self.emotes = catalog;
    self
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn router(&self) -> &Router {
    &self.router
  }

  /// Connect to Twitch and run in a background task.
  pub fn spawn<H: Handler>(self, handler: H) -> BotHandle {
    self.start(None, handler)
  }

  /// Run on an already open `stream` in a background task.
  ///
  /// The handshake is still performed.
  pub fn spawn_on<H: Handler>(self, stream: Stream, handler: H) -> BotHandle {
    self.start(Some(stream), handler)
  }

  /// Connect to Twitch and run until the connection fails or Ctrl-C is pressed.
  pub async fn run<H: Handler>(self, handler: H) -> Result<(), BotError> {
    let handle = self.spawn(handler);
    tokio::select! {
      Ok(()) = tokio::signal::ctrl_c() => {
        debug!("received ctrl-c");
        handle.stop().await;
      }
      _ = handle.closed() => {}
    }
    handle.join().await
  }

  fn start<H: Handler>(self, stream: Option<Stream>, handler: H) -> BotHandle {
    let (state, receiver) = watch::channel(State::Connecting);
    let stop = CancellationToken::new();
    let task = tokio::spawn(self.drive(stream, handler, state, stop.clone()));
    BotHandle {
      state: receiver,
      stop,
      task,
    }
  }

  async fn drive<H: Handler>(
    self,
    stream: Option<Stream>,
    handler: H,
    state: watch::Sender<State>,
    stop: CancellationToken,
  ) -> Result<(), BotError> {
    let tasks = TaskTracker::new();

    let connected = tokio::select! {
      biased;
      _ = stop.cancelled() => None,
      client = self.connect(stream, &state, &tasks, &stop) => Some(client),
    };

    let result = match connected {
      None => Ok(()),
      Some(Err(e)) => {
        error!(error = %e, "failed to connect");
        Err(e.into())
      }
      Some(Ok(client)) => {
        let sender = client.sender().clone();
        let ctx = Context::new(
          sender.clone(),
          MessageCache::new(self.config.message_cache),
          Arc::new(self.emotes),
          stop.clone(),
        );
        let dispatcher = Dispatcher {
          handler,
          router: self.router,
          ctx,
          state: &state,
          stop: &stop,
        };
        let result = dispatcher.run(client, self.timers, &tasks).await;

        state.send_replace(State::Closing);
        if let Err(e) = sender.close().await {
          debug!(error = %e, "failed to close connection");
        }
        result
      }
    };

    state.send_replace(State::Closing);
    stop.cancel();
    tasks.close();
    tasks.wait().await;
    state.send_replace(State::Closed);
    debug!("bot closed");
    result
  }

  async fn connect(
    &self,
    stream: Option<Stream>,
    state: &watch::Sender<State>,
    tasks: &TaskTracker,
    stop: &CancellationToken,
  ) -> Result<Client, ConnectError> {
    let config = &self.config;

    state.send_replace(State::Connecting);
    let stream = match stream {
      Some(stream) => stream,
      None => timeout(config.timeout, conn::open(config.secure)).await??,
    };
    let client = Client::from_stream(stream, config.clone(), tasks.clone(), stop.clone());
    client
      .handshake_with(|phase| {
        state.send_replace(match phase {
          Phase::Authenticating => State::Authenticating,
          Phase::Joining => State::Joining,
        });
      })
      .await?;

    Ok(client)
  }
}

impl std::fmt::Debug for Bot {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Bot")
      .field("config", &self.config)
      .field("router", &self.router)
      .field("timers", &self.timers)
      .finish_non_exhaustive()
  }
}

/// Handle to a running bot.
#[derive(Debug)]
pub struct BotHandle {
  state: watch::Receiver<State>,
  stop: CancellationToken,
  task: JoinHandle<Result<(), BotError>>,
}

impl BotHandle {
  pub fn state(&self) -> State {
    *self.state.borrow()
  }

  /// Subscribe to state changes.
  pub fn watch(&self) -> watch::Receiver<State> {
    self.state.clone()
  }

  /// Stop the bot and wait until it is [`State::Closed`].
  ///
  /// Any in-flight handler is cancelled, the connection is closed,
  /// and timers and pending rate limit releases are awaited.
  pub async fn stop(&self) {
    self.stop.cancel();
    self.closed().await;
  }

  /// Wait until the bot is [`State::Closed`], for whatever reason.
  pub async fn closed(&self) {
    let mut state = self.state.clone();
    // an error means the task is gone, which is just as closed
    let _ = state.wait_for(|state| *state == State::Closed).await;
  }

  /// Wait for the bot task and return its result.
  pub async fn join(self) -> Result<(), BotError> {
    self.task.await?
  }
}

/// The bot stopped because of a connection error.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
  #[error(transparent)]
  Connect(#[from] ConnectError),

  #[error(transparent)]
  Recv(#[from] RecvError),

  #[error(transparent)]
  Send(#[from] SendError),

  /// The bot task panicked or was aborted.
  #[error("bot task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

struct Dispatcher<'a, H> {
  handler: H,
  router: Router,
  ctx: Context,
  state: &'a watch::Sender<State>,
  stop: &'a CancellationToken,
}

impl<H: Handler> Dispatcher<'_, H> {
  async fn run(
    &self,
    mut client: Client,
    timers: Vec<Timer>,
    tasks: &TaskTracker,
  ) -> Result<(), BotError> {
    self.state.send_replace(State::Ready);
    debug!(
      nick = self.ctx.nick(),
      channels = ?self.ctx.channels().names(),
      "ready"
    );
    self
      .guard("on_ready", self.handler.on_ready(&self.ctx))
      .await;

    for timer in timers {
      tasks.spawn(timer.run(self.ctx.sender().clone(), self.stop.clone()));
    }

    self.state.send_replace(State::Reading);
    loop {
      let line = tokio::select! {
        biased;
        _ = self.stop.cancelled() => break,
        line = client.recv() => line,
      };

      let line = match line {
        Ok(line) => line,
        Err(e) => {
          if e.is_disconnect() {
            debug!(error = %e, "disconnected");
          } else {
            error!(error = %e, "failed to read");
          }
          return Err(e.into());
        }
      };

      tokio::select! {
        biased;
        _ = self.stop.cancelled() => break,
        result = self.handle(&line) => result?,
      }
    }

    Ok(())
  }

  async fn handle(&self, line: &str) -> Result<(), SendError> {
    trace!("< {line}");
    let event = Event::parse(line);
    if let Event::Ping(ping) = &event {
      self.ctx.pong(&ping.content).await?;
    }

    self
      .guard("on_raw_line", self.handler.on_raw_line(&self.ctx, line))
      .await;
    self.dispatch(event).await;
    Ok(())
  }

  async fn dispatch(&self, event: Event) {
    let ctx = &self.ctx;
    let handler = &self.handler;

    match event {
      Event::Ping(_) | Event::Cap(_) => {}
      Event::PrivMsg(msg) => {
        let msg = Message::from(msg);
        ctx.cache().push(msg.clone());
        self.guard("on_message", handler.on_message(ctx, &msg)).await;
        if !self.router.is_empty() {
          let dispatch = async { self.router.dispatch(ctx, &msg).await.map(|_| ()) };
          self.guard("command", dispatch).await;
        }
      }
      Event::Whisper(whisper) => {
        let msg = Message::from(whisper);
        self
          .guard("on_private_message", handler.on_private_message(ctx, &msg))
          .await;
      }
      Event::Join(join) => {
        let user = User::new(join.user, join.channel);
        self
          .guard("on_user_join", handler.on_user_join(ctx, &user))
          .await;
      }
      Event::Part(part) => {
        let user = User::new(part.user, part.channel);
        self
          .guard("on_user_leave", handler.on_user_leave(ctx, &user))
          .await;
      }
      Event::Mode(mode) => {
        let user = User::new(mode.user, mode.channel);
        if mode.op {
          self.guard("on_user_op", handler.on_user_op(ctx, &user)).await;
        } else {
          self
            .guard("on_user_deop", handler.on_user_deop(ctx, &user))
            .await;
        }
      }
      Event::UserState(state) => {
        let moderator = state.tags.as_ref().and_then(|tags| tags.int(Tag::Mod)) == Some(1);
        if ctx.channels().set_moderator(&state.channel, moderator) {
          trace!(channel = state.channel, moderator, "updated channel status");
          ctx.limiter().ceiling_changed();
        }
        let user = User::from_tags(ctx.nick(), state.channel, state.tags.as_ref());
        self
          .guard("on_user_state", handler.on_user_state(ctx, &user))
          .await;
      }
      Event::RoomState(room) => {
        self
          .guard(
            "on_room_state",
            handler.on_room_state(ctx, &room.channel, room.tags.as_ref()),
          )
          .await;
      }
      Event::Notice(notice) => {
        self.guard("on_notice", handler.on_notice(ctx, &notice)).await;
      }
      Event::ClearChat(clear) => match &clear.target {
        None => {
          self
            .guard("on_clear", handler.on_clear(ctx, &clear.channel))
            .await;
        }
        Some(target) => {
          let user = User::new(target.as_str(), clear.channel.as_str());
          let tags = clear.tags.as_ref();
          if clear.is_timeout() {
            self
              .guard("on_timeout", handler.on_timeout(ctx, &user, tags))
              .await;
          } else {
            self.guard("on_ban", handler.on_ban(ctx, &user, tags)).await;
          }
        }
      },
      Event::ClearMsg(clear) => {
        let msg = Message::from(clear);
        self
          .guard("on_delete_message", handler.on_delete_message(ctx, &msg))
          .await;
      }
      Event::HostTarget(HostTarget::Start {
        channel,
        target,
        viewers,
      }) => {
        self
          .guard(
            "on_host_start",
            handler.on_host_start(ctx, &channel, &target, viewers),
          )
          .await;
      }
      Event::HostTarget(HostTarget::Stop { channel, viewers }) => {
        self
          .guard("on_host_stop", handler.on_host_stop(ctx, &channel, viewers))
          .await;
      }
      Event::UserNotice(notice) => {
        let msg = Message::from(notice.clone());
        self
          .guard("on_subscribe", handler.on_subscribe(ctx, &msg, &notice))
          .await;
      }
      Event::Unknown(unknown) => match unknown.reason {
        UnknownReason::Unsupported => trace!(raw = unknown.raw, "ignoring line"),
        reason => debug!(raw = unknown.raw, ?reason, "failed to parse line"),
      },
    }
  }

  /// Await a hook, sending any error or panic to [`Handler::on_error`].
  async fn guard<F>(&self, hook: &'static str, fut: F)
  where
    F: Future<Output = Result<(), HandlerError>>,
  {
    let error = match AssertUnwindSafe(fut).catch_unwind().await {
      Ok(Ok(())) => return,
      Ok(Err(error)) => error,
      Err(payload) => Box::new(Panicked::from_payload(payload)) as HandlerError,
    };

    debug!(hook, %error, "handler failed");
    let report = self.handler.on_error(&self.ctx, error);
    if AssertUnwindSafe(report).catch_unwind().await.is_err() {
      error!(hook, "on_error panicked");
    }
  }
}

static_assert_send!(Bot);
static_assert_send!(BotHandle);
static_assert_sync!(BotHandle);
