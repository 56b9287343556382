//! ## Chat entities
//!
//! [`Message`] and [`User`] are what handlers and commands work with.
//! They are built from [`Event`][crate::Event]s and own all of their data,
//! so they can be cached, cloned, and moved into spawned tasks.

#[macro_use]
mod macros;
pub mod emote;

pub use emote::{Emote, EmoteCatalog};

use crate::event::{ClearMsg, PrivMsg, UserNotice, Whisper};
use crate::irc::{Tag, Tags};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use uuid::Uuid;

/// A chat badge, e.g. `moderator/1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Badge {
  name: String,
  value: String,
}

generate_getters! {
  for Badge as self {
    /// Name of the badge, e.g. `subscriber`.
    name -> &str = &self.name,

    /// Variant of the badge, e.g. `12` for a 12 month subscriber badge.
    value -> &str = &self.value,
  }
}

impl Badge {
  pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      value: value.into(),
    }
  }
}

impl std::fmt::Display for Badge {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}", self.name, self.value)
  }
}

fn parse_badges(badges: &str) -> Vec<Badge> {
  if badges.is_empty() {
    return Vec::new();
  }

  badges
    .split(',')
    .flat_map(|badge| badge.split_once('/'))
    .map(|(name, value)| Badge::new(name, value))
    .collect()
}

/// A chat user, as seen in a specific channel.
///
/// Everything except [`User::name`] and [`User::channel`] comes from tags,
/// and stays empty when the line carried none.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
  name: String,
  channel: String,
  badges: Vec<Badge>,
  color: Option<String>,
  moderator: bool,
  subscriber: bool,
  kind: Option<String>,
  turbo: Option<bool>,
  id: Option<String>,
}

generate_getters! {
  for User as self {
    /// Login of the user.
    name -> &str = &self.name,

    /// Channel in which the user was seen.
    channel -> &str = &self.channel,

    /// Iterator over the badges the user has enabled in [`User::channel`].
    badges -> impl Iterator<Item = &Badge> = self.badges.iter(),

    /// The user's selected name color.
    ///
    /// [`None`] means the user has not selected a color.
    color -> Option<&str> = self.color.as_deref(),

    /// Whether the user is a moderator in [`User::channel`].
    moderator -> bool,

    /// Whether the user is subscribed to [`User::channel`].
    subscriber -> bool,

    /// The `user-type` tag, e.g. `mod`, `global_mod`, `admin`, `staff`.
    ///
    /// [`None`] for regular users.
    kind -> Option<&str> = self.kind.as_deref(),

    turbo -> Option<bool>,

    /// Twitch user id.
    id -> Option<&str> = self.id.as_deref(),
  }
}

impl User {
  /// A user with only a name and a channel.
  pub fn new(name: impl Into<String>, channel: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      channel: channel.into(),
      ..Default::default()
    }
  }

  /// Fill in the remaining fields from `tags`, if there are any.
  pub fn from_tags(name: impl Into<String>, channel: impl Into<String>, tags: Option<&Tags>) -> Self {
    let mut user = User::new(name, channel);
    let Some(tags) = tags else {
      return user;
    };

    user.badges = tags
      .str(Tag::Badges)
      .map(|badges| parse_badges(&badges))
      .unwrap_or_default();
    user.color = non_empty(tags, Tag::Color);
    user.moderator = tags.get(Tag::Mod).is_some_and(|v| v.as_bool());
    user.subscriber = tags.get(Tag::Subscriber).is_some_and(|v| v.as_bool());
    user.kind = non_empty(tags, Tag::UserType);
    user.turbo = tags.get(Tag::Turbo).map(|v| v.as_bool());
    user.id = non_empty(tags, Tag::UserId);
    user
  }

  /// Whether the user has a badge called `name`.
  pub fn has_badge(&self, name: &str) -> bool {
    self.badges.iter().any(|badge| badge.name == name)
  }

  /// The channel owner.
  pub fn is_broadcaster(&self) -> bool {
    self.name == self.channel || self.has_badge("broadcaster")
  }
}

fn non_empty(tags: &Tags, tag: Tag<'_>) -> Option<String> {
  tags
    .str(tag)
    .filter(|v| !v.is_empty())
    .map(Cow::into_owned)
}

/// A chat message along with its author and metadata.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
  content: String,
  author: User,
  channel: String,
  raw_timestamp: Option<i64>,
  timestamp: Option<DateTime<Utc>>,
  id: Option<Uuid>,
  emotes: Vec<Emote>,
  room_id: Option<String>,
  tags: Option<Tags>,
}

generate_getters! {
  for Message as self {
    /// Text content of the message.
    content -> &str = &self.content,

    /// The user who sent this message.
    author -> &User = &self.author,

    /// Channel in which this message was sent, without the `#`.
    ///
    /// For whispers this is the recipient, i.e. the bot's own channel.
    channel -> &str = &self.channel,

    /// The `tmi-sent-ts` tag, milliseconds since the unix epoch.
    raw_timestamp -> Option<i64>,

    /// The time at which the message was sent.
    timestamp -> Option<DateTime<Utc>>,

    /// Unique ID of the message.
    ///
    /// This is `target-msg-id` for deleted messages.
    id -> Option<Uuid>,

    /// Emotes used in the message, one entry per occurrence.
    emotes -> &[Emote] = &self.emotes,

    /// ID of the channel in which this message was sent.
    room_id -> Option<&str> = self.room_id.as_deref(),

    /// All tags the message was sent with.
    tags -> Option<&Tags> = self.tags.as_ref(),
  }
}

impl Message {
  /// Build a message from its parts. `author` is a login.
  pub fn new(
    content: impl Into<String>,
    author: impl Into<String>,
    channel: impl Into<String>,
    tags: Option<Tags>,
  ) -> Self {
    let channel = channel.into();
    let author = User::from_tags(author, channel.clone(), tags.as_ref());
    let mut message = Message {
      content: content.into(),
      author,
      channel,
      raw_timestamp: None,
      timestamp: None,
      id: None,
      emotes: Vec::new(),
      room_id: None,
      tags: None,
    };

    if let Some(tags) = &tags {
      message.raw_timestamp = tags.int(Tag::TmiSentTs);
      message.timestamp = message.raw_timestamp.and_then(parse_timestamp);
      message.emotes = tags
        .str(Tag::Emotes)
        .map(|emotes| emote::parse_emotes(&emotes))
        .unwrap_or_default();
      message.id = tags
        .str(Tag::Id)
        .or_else(|| tags.str(Tag::TargetMsgId))
        .and_then(|id| Uuid::parse_str(&id).ok());
      message.room_id = non_empty(tags, Tag::RoomId);
    }
    message.tags = tags;
    message
  }

  /// Whether the message was sent with `/me`.
  pub fn is_action(&self) -> bool {
    parse_message_text(&self.content).1
  }

  /// The content with the `/me` framing bytes removed.
  pub fn text(&self) -> &str {
    parse_message_text(&self.content).0
  }
}

impl std::fmt::Display for Message {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.content)
  }
}

impl From<PrivMsg> for Message {
  fn from(msg: PrivMsg) -> Self {
    Message::new(msg.content, msg.sender, msg.channel, msg.tags)
  }
}

impl From<Whisper> for Message {
  fn from(msg: Whisper) -> Self {
    Message::new(msg.content, msg.sender, msg.target, msg.tags)
  }
}

impl From<ClearMsg> for Message {
  fn from(msg: ClearMsg) -> Self {
    Message::new(msg.content, msg.login, msg.channel, Some(msg.tags))
  }
}

impl From<UserNotice> for Message {
  fn from(notice: UserNotice) -> Self {
    Message::new(
      notice.content.unwrap_or_default(),
      notice.login,
      notice.channel,
      Some(notice.tags),
    )
  }
}

fn parse_timestamp(millis: i64) -> Option<DateTime<Utc>> {
  use chrono::TimeZone;
  Utc.timestamp_millis_opt(millis).single()
}

fn parse_message_text(input: &str) -> (&str, bool) {
  let Some(s) = input.strip_prefix("\u{0001}ACTION ") else {
    return (input, false);
  };
  let Some(s) = s.strip_suffix('\u{0001}') else {
    return (input, false);
  };
  (s, true)
}

static_assert_send!(Message);
static_assert_sync!(Message);

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::Event;

  fn privmsg(src: &str) -> Message {
    match Event::parse(src) {
      Event::PrivMsg(msg) => msg.into(),
      other => panic!("expected PRIVMSG, got {other:?}"),
    }
  }

  #[test]
  fn message_from_tagged_privmsg() {
    let msg = privmsg("@badge-info=subscriber/22;badges=moderator/1,subscriber/12;color=#19E6E6;display-name=randers;emotes=25:0-4;flags=;id=bbe4c0c6-a6cd-4bb2-b0ac-e8dd7dcb1e74;mod=1;room-id=11148817;subscriber=1;tmi-sent-ts=1594555275886;turbo=0;user-id=40286300;user-type=mod :randers!randers@randers.tmi.twitch.tv PRIVMSG #pajlada :Kappa hello");

    assert_eq!(msg.content(), "Kappa hello");
    assert_eq!(msg.channel(), "pajlada");
    assert_eq!(msg.raw_timestamp(), Some(1594555275886));
    assert_eq!(
      msg.timestamp().map(|ts| ts.timestamp_millis()),
      Some(1594555275886)
    );
    assert_eq!(
      msg.id(),
      Some(Uuid::parse_str("bbe4c0c6-a6cd-4bb2-b0ac-e8dd7dcb1e74").unwrap())
    );
    assert_eq!(msg.room_id(), Some("11148817"));
    assert_eq!(msg.emotes(), &[Emote::new("25", 0, 4)]);

    let author = msg.author();
    assert_eq!(author.name(), "randers");
    assert_eq!(author.channel(), "pajlada");
    assert_eq!(
      author.badges().cloned().collect::<Vec<_>>(),
      vec![Badge::new("moderator", "1"), Badge::new("subscriber", "12")]
    );
    assert_eq!(author.color(), Some("#19E6E6"));
    assert!(author.moderator());
    assert!(author.subscriber());
    assert_eq!(author.kind(), Some("mod"));
    assert_eq!(author.turbo(), Some(false));
    assert_eq!(author.id(), Some("40286300"));
  }

  #[test]
  fn untagged_message_only_has_name_and_channel() {
    let msg = privmsg(":randers!randers@randers.tmi.twitch.tv PRIVMSG #pajlada :hi");
    assert_eq!(msg.author(), &User::new("randers", "pajlada"));
    assert_eq!(msg.timestamp(), None);
    assert_eq!(msg.id(), None);
    assert!(msg.emotes().is_empty());
    assert_eq!(msg.tags(), None);
  }

  #[test]
  fn deleted_message_uses_target_msg_id() {
    let Event::ClearMsg(clear) = Event::parse("@login=alazymeme;room-id=;target-msg-id=3c92014f-340a-4dc3-a9c9-e5cf182f4a84;tmi-sent-ts=1594561955611 :tmi.twitch.tv CLEARMSG #lint00 :bye") else {
      unreachable!()
    };
    let msg = Message::from(clear);
    assert_eq!(msg.author().name(), "alazymeme");
    assert_eq!(
      msg.id(),
      Some(Uuid::parse_str("3c92014f-340a-4dc3-a9c9-e5cf182f4a84").unwrap())
    );
    assert_eq!(msg.room_id(), None);
  }

  #[test]
  fn whisper_is_addressed_to_the_recipient() {
    let Event::Whisper(whisper) =
      Event::parse(":randers!randers@randers.tmi.twitch.tv WHISPER my_bot :join")
    else {
      unreachable!()
    };
    let msg = Message::from(whisper);
    assert_eq!(msg.channel(), "my_bot");
    assert_eq!(msg.author().name(), "randers");
  }

  #[test]
  fn action_messages() {
    let msg = Message::new("\u{0001}ACTION waves\u{0001}", "a", "b", None);
    assert!(msg.is_action());
    assert_eq!(msg.text(), "waves");

    let msg = Message::new("waves", "a", "b", None);
    assert!(!msg.is_action());
    assert_eq!(msg.text(), "waves");
  }

  #[test]
  fn broadcaster() {
    assert!(User::new("forsen", "forsen").is_broadcaster());
    assert!(!User::new("randers", "forsen").is_broadcaster());
  }
}
