//! ## tmi-bot
//!
//! A persistent Twitch chat bot framework.
//!
//! - [`irc`] and [`event`] turn raw lines into typed [`Event`]s.
//! - [`client`] owns the socket, the handshake and the rate-limited [`Sender`].
//! - [`bot`] drives the read loop and calls your [`Handler`] for every event.
//! - [`command`] routes `!prefixed` chat commands to typed handlers.
//!
//! ```rust,no_run
//! use tmi_bot::{Bot, Command, Config, ParamKind};
//!
//! # async fn run() -> Result<(), tmi_bot::BotError> {
//! let config = Config::builder()
//!   .credentials(tmi_bot::Credentials::new("my_bot", "oauth:token"))
//!   .channels(["forsen"])
//!   .build();
//!
//! Bot::new(config)
//!   .command(
//!     Command::builder("echo")
//!       .param("text", ParamKind::Str)
//!       .handler(|ctx, msg, args| async move {
//!         let text = args.str("text").unwrap_or_default().to_owned();
//!         ctx.say(msg.channel(), &text).await?;
//!         Ok::<_, tmi_bot::HandlerError>(())
//!       }),
//!   )
//!   .run(())
//!   .await
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub(crate) const fn assert_sync<T: ?Sized + Sync>() {}
macro_rules! static_assert_sync {
  ($T:ty) => {
    const _: () = {
      let _ = $crate::assert_sync::<$T>;
    };
  };
}

pub(crate) const fn assert_send<T: ?Sized + Send>() {}
macro_rules! static_assert_send {
  ($T:ty) => {
    const _: () = {
      let _ = $crate::assert_send::<$T>;
    };
  };
}

#[cfg(feature = "bot")]
pub mod bot;
#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "bot")]
pub mod command;
pub mod common;
pub mod event;
pub mod irc;
#[cfg(feature = "message-types")]
pub mod msg;

#[cfg(feature = "bot")]
pub use bot::{Bot, BotError, BotHandle, Context, Handler, HandlerError, State, Timer};
#[cfg(feature = "client")]
pub use client::write::{SendError, Sender};
#[cfg(feature = "client")]
pub use client::{Client, Config, Credentials, Phase};
#[cfg(feature = "bot")]
pub use command::{Args, Command, CommandError, ParamKind, Router, Value};
pub use event::Event;
pub use irc::{Tag, TagValue, Tags};
#[cfg(feature = "message-types")]
pub use msg::{Badge, Emote, EmoteCatalog, Message, User};
