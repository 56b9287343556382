//! ## Typed chat events
//!
//! The entrypoint to this module is [`Event::parse`], which never fails:
//! anything that can't be understood becomes [`Event::Unknown`].
//!
//! ```rust
//! use tmi_bot::Event;
//!
//! match Event::parse("PING :tmi.twitch.tv") {
//!   Event::Ping(ping) => assert_eq!(ping.content, "tmi.twitch.tv"),
//!   _ => unreachable!(),
//! }
//! ```

use crate::irc::{author, Command, IrcLine, Tag, Tags};

/// A fully parsed Twitch chat event.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
  Ping(Ping),
  PrivMsg(PrivMsg),
  Whisper(Whisper),
  Join(Membership),
  Part(Membership),
  Mode(Mode),
  UserState(UserState),
  RoomState(RoomState),
  Notice(Notice),
  ClearChat(ClearChat),
  ClearMsg(ClearMsg),
  HostTarget(HostTarget),
  UserNotice(UserNotice),
  Cap(Cap),
  Unknown(Unknown),
}

/// Sent regularly by TMI to ensure clients are still live.
/// Must be answered with a `PONG` echoing [`Ping::content`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ping {
  pub content: String,
}

/// A chat message sent by some user to a specific channel.
#[derive(Clone, Debug, PartialEq)]
pub struct PrivMsg {
  pub channel: String,
  pub sender: String,
  pub content: String,
  pub tags: Option<Tags>,
}

/// A private message sent directly to the bot.
#[derive(Clone, Debug, PartialEq)]
pub struct Whisper {
  /// Login of the recipient, which is the bot itself.
  pub target: String,
  pub sender: String,
  pub content: String,
  pub tags: Option<Tags>,
}

/// A user joined or left a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Membership {
  pub channel: String,
  pub user: String,
}

/// A user gained (`op = true`) or lost operator status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mode {
  pub channel: String,
  pub user: String,
  pub op: bool,
}

/// The bot's own state in a channel, sent after joining and after every message.
#[derive(Clone, Debug, PartialEq)]
pub struct UserState {
  pub channel: String,
  pub tags: Option<Tags>,
}

/// The channel's chat settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RoomState {
  pub channel: String,
  pub tags: Option<Tags>,
}

/// A general notice, e.g. the result of a dot command.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
  /// `None` for server-wide notices (`NOTICE *`).
  pub channel: Option<String>,
  pub content: String,
  pub tags: Option<Tags>,
}

/// The chat or a single user's messages were cleared.
#[derive(Clone, Debug, PartialEq)]
pub struct ClearChat {
  pub channel: String,
  /// The banned or timed out user. `None` if the whole chat was cleared.
  pub target: Option<String>,
  pub tags: Option<Tags>,
}

impl ClearChat {
  /// Timeouts carry a `ban-duration`, permanent bans don't.
  pub fn is_timeout(&self) -> bool {
    self
      .tags
      .as_ref()
      .is_some_and(|tags| tags.contains(Tag::BanDuration))
  }
}

/// A single message was deleted.
#[derive(Clone, Debug, PartialEq)]
pub struct ClearMsg {
  pub channel: String,
  /// Login of the user whose message was deleted.
  pub login: String,
  pub content: String,
  pub tags: Tags,
}

/// The channel started or stopped hosting another channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostTarget {
  Start {
    channel: String,
    target: String,
    viewers: Option<u64>,
  },
  Stop {
    channel: String,
    viewers: Option<u64>,
  },
}

/// Subscriptions, resubscriptions, gifts, raids, and other channel events.
#[derive(Clone, Debug, PartialEq)]
pub struct UserNotice {
  pub channel: String,
  /// Login of the user the notice is about.
  pub login: String,
  pub content: Option<String>,
  pub tags: Tags,
}

/// Capability negotiation reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cap {
  pub content: String,
}

/// A line that could not be turned into a typed event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unknown {
  pub raw: String,
  pub reason: UnknownReason,
}

/// Why a line ended up as [`Event::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnknownReason {
  /// The line does not match the grammar.
  Grammar,
  /// The `nick!nick@nick.tmi.twitch.tv` prefix did not agree with itself.
  Author,
  /// A known command was missing a mandatory part.
  Malformed,
  /// A well-formed command this library does not handle.
  Unsupported,
}

impl Event {
  /// Parse a single line, with its trailing CRLF already stripped.
  pub fn parse(src: &str) -> Event {
    if let Some(content) = src.strip_prefix("PING ") {
      return Event::Ping(Ping {
        content: content.strip_prefix(':').unwrap_or(content).to_owned(),
      });
    }

    let Some(line) = IrcLine::parse(src) else {
      return unknown(src, UnknownReason::Grammar);
    };

    match Self::from_line(&line) {
      Ok(event) => event,
      Err(reason) => unknown(src, reason),
    }
  }

  fn from_line(line: &IrcLine<'_>) -> Result<Event, UnknownReason> {
    use UnknownReason as R;

    let tags = line.tags();
    let channel = || line.channel().map(str::to_owned).ok_or(R::Malformed);
    let sender = || {
      let prefix = line.prefix().ok_or(R::Malformed)?;
      author(prefix).map(str::to_owned).ok_or(R::Author)
    };
    let content = || line.content().unwrap_or_default().to_owned();

    Ok(match line.command() {
      Command::Ping => Event::Ping(Ping { content: content() }),
      Command::PrivMsg => Event::PrivMsg(PrivMsg {
        channel: channel()?,
        sender: sender()?,
        content: content(),
        tags,
      }),
      Command::Whisper => Event::Whisper(Whisper {
        target: line.middle().ok_or(R::Malformed)?.to_owned(),
        sender: sender()?,
        content: content(),
        tags,
      }),
      Command::Join => Event::Join(Membership {
        channel: channel()?,
        user: sender()?,
      }),
      Command::Part => Event::Part(Membership {
        channel: channel()?,
        user: sender()?,
      }),
      Command::Mode => {
        // ([+-])o (user)
        let content = line.content().ok_or(R::Malformed)?;
        let (op, user) = if let Some(rest) = content.strip_prefix('+') {
          (true, rest)
        } else if let Some(rest) = content.strip_prefix('-') {
          (false, rest)
        } else {
          return Err(R::Malformed);
        };
        let user = user.strip_prefix("o ").ok_or(R::Malformed)?;
        if user.is_empty() {
          return Err(R::Malformed);
        }
        Event::Mode(Mode {
          channel: channel()?,
          user: user.to_owned(),
          op,
        })
      }
      Command::UserState => Event::UserState(UserState {
        channel: channel()?,
        tags,
      }),
      Command::RoomState => Event::RoomState(RoomState {
        channel: channel()?,
        tags,
      }),
      Command::Notice => Event::Notice(Notice {
        channel: line.channel().map(str::to_owned),
        content: content(),
        tags,
      }),
      Command::ClearChat => Event::ClearChat(ClearChat {
        channel: channel()?,
        target: line.content().filter(|c| !c.is_empty()).map(str::to_owned),
        tags,
      }),
      Command::ClearMsg => {
        let mut tags = tags.ok_or(R::Malformed)?;
        let login = tags.remove(Tag::Login).ok_or(R::Malformed)?;
        Event::ClearMsg(ClearMsg {
          channel: channel()?,
          login: login.to_string(),
          content: content(),
          tags,
        })
      }
      Command::HostTarget => {
        // (channel) (count)
        let content = line.content().ok_or(R::Malformed)?;
        let (target, count) = content.split_once(' ').unwrap_or((content, "-"));
        if target.is_empty() || count.is_empty() {
          return Err(R::Malformed);
        }
        let viewers = match count {
          "-" => None,
          count => Some(count.parse().map_err(|_| R::Malformed)?),
        };
        let channel = channel()?;
        Event::HostTarget(match target {
          "-" => HostTarget::Stop { channel, viewers },
          target => HostTarget::Start {
            channel,
            target: target.to_owned(),
            viewers,
          },
        })
      }
      Command::UserNotice => {
        let tags = tags.ok_or(R::Malformed)?;
        let login = tags.str(Tag::Login).ok_or(R::Malformed)?.into_owned();
        Event::UserNotice(UserNotice {
          channel: channel()?,
          login,
          content: line.content().map(str::to_owned),
          tags,
        })
      }
      Command::Cap => Event::Cap(Cap { content: content() }),
      Command::Other(_) => return Err(R::Unsupported),
    })
  }

  /// The command word this event was parsed from.
  pub fn kind(&self) -> &'static str {
    match self {
      Event::Ping(_) => "PING",
      Event::PrivMsg(_) => "PRIVMSG",
      Event::Whisper(_) => "WHISPER",
      Event::Join(_) => "JOIN",
      Event::Part(_) => "PART",
      Event::Mode(_) => "MODE",
      Event::UserState(_) => "USERSTATE",
      Event::RoomState(_) => "ROOMSTATE",
      Event::Notice(_) => "NOTICE",
      Event::ClearChat(_) => "CLEARCHAT",
      Event::ClearMsg(_) => "CLEARMSG",
      Event::HostTarget(_) => "HOSTTARGET",
      Event::UserNotice(_) => "USERNOTICE",
      Event::Cap(_) => "CAP",
      Event::Unknown(_) => "UNKNOWN",
    }
  }
}

fn unknown(src: &str, reason: UnknownReason) -> Event {
  Event::Unknown(Unknown {
    raw: src.to_owned(),
    reason,
  })
}

static_assert_send!(Event);
static_assert_sync!(Event);
