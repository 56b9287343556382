//! Tag decoding.
//!
//! ```text,ignore
//! @key=value;key=value;key=value
//! ```

use crate::common::maybe_unescape;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Display;

macro_rules! tags_def {
  (
    $tag:ident;
    $($(#[$meta:meta])* $key:literal = $name:ident),* $(,)?
  ) => {
    /// A tag key.
    #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
    #[non_exhaustive]
    pub enum $tag<'src> {
      $(
        $(#[$meta])*
        $name,
      )*
      Unknown(&'src str),
    }

    impl<'src> $tag<'src> {
      #[doc = concat!("Get the string value of the [`", stringify!($tag), "`].")]
      #[inline]
      pub fn as_str(&self) -> &'src str {
        match self {
          $(Self::$name => $key,)*
          Self::Unknown(key) => key,
        }
      }

      #[doc = concat!("Parse a [`", stringify!($tag), "`] from a string.")]
      #[inline]
      pub fn parse(src: &'src str) -> Self {
        match src {
          $($key => Self::$name,)*
          _ => Self::Unknown(src),
        }
      }
    }
  }
}

tags_def! {
  Tag;
  "badges" = Badges,
  "badge-info" = BadgeInfo,
  "ban-duration" = BanDuration,
  "color" = Color,
  "display-name" = DisplayName,
  "emotes" = Emotes,
  "id" = Id,
  "login" = Login,
  "mod" = Mod,
  "msg-id" = MsgId,
  "room-id" = RoomId,
  "subscriber" = Subscriber,
  "system-msg" = SystemMsg,
  "target-msg-id" = TargetMsgId,
  "target-user-id" = TargetUserId,
  "tmi-sent-ts" = TmiSentTs,
  "turbo" = Turbo,
  "user-id" = UserId,
  /// `user-type`, e.g. `mod`, `global_mod`, `admin`, `staff`, or empty.
  "user-type" = UserType,
}

impl<'src> From<&'src str> for Tag<'src> {
  fn from(value: &'src str) -> Self {
    Tag::parse(value)
  }
}

impl<'src> Display for Tag<'src> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A decoded tag value.
///
/// Values made up only of ASCII digits are decoded as integers,
/// everything else is kept as the raw (still escaped) string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
  feature = "serde",
  derive(serde::Serialize, serde::Deserialize),
  serde(untagged)
)]
pub enum TagValue {
  Int(i64),
  Str(String),
}

impl TagValue {
  fn decode(value: &str) -> Self {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
      if let Ok(n) = value.parse() {
        return TagValue::Int(n);
      }
    }
    TagValue::Str(value.to_owned())
  }

  /// Returns the integer value, if this is [`TagValue::Int`].
  pub fn as_int(&self) -> Option<i64> {
    match self {
      TagValue::Int(n) => Some(*n),
      TagValue::Str(_) => None,
    }
  }

  /// Returns the string value, if this is [`TagValue::Str`].
  pub fn as_str(&self) -> Option<&str> {
    match self {
      TagValue::Int(_) => None,
      TagValue::Str(s) => Some(s),
    }
  }

  /// The value as text, whichever variant it is.
  pub fn to_text(&self) -> Cow<'_, str> {
    match self {
      TagValue::Int(n) => Cow::Owned(n.to_string()),
      TagValue::Str(s) => Cow::Borrowed(s),
    }
  }

  /// The value as text with Twitch escape sequences (`\s`, `\:`, ...) resolved.
  ///
  /// ⚠ This call will allocate and return a String if it needs to be unescaped.
  pub fn unescaped(&self) -> Cow<'_, str> {
    maybe_unescape(self.to_text())
  }

  /// `1` and any other positive integer is `true`.
  pub fn as_bool(&self) -> bool {
    self.as_int().map(|n| n > 0).unwrap_or(false)
  }
}

impl Display for TagValue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TagValue::Int(n) => write!(f, "{n}"),
      TagValue::Str(s) => f.write_str(s),
    }
  }
}

/// Decoded message tags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
  feature = "serde",
  derive(serde::Serialize, serde::Deserialize),
  serde(transparent)
)]
pub struct Tags(HashMap<String, TagValue>);

impl Tags {
  /// Retrieve the value of `tag`.
  ///
  /// `tag` can provided as a variant of the [`Tag`] enum
  /// or as the stringified kebab-case tag name.
  ///
  /// ```rust
  /// # use tmi_bot::irc::{tags, Tag};
  /// let tags = tags::decode("mod=1;color=#FF0000").unwrap();
  /// assert_eq!(tags.get(Tag::Mod), tags.get("mod"));
  /// ```
  pub fn get<'a>(&self, tag: impl Into<Tag<'a>>) -> Option<&TagValue> {
    self.0.get(tag.into().as_str())
  }

  /// Retrieve the value of `tag` as text.
  pub fn str<'a>(&self, tag: impl Into<Tag<'a>>) -> Option<Cow<'_, str>> {
    self.get(tag).map(TagValue::to_text)
  }

  /// Retrieve the value of `tag` as an integer.
  pub fn int<'a>(&self, tag: impl Into<Tag<'a>>) -> Option<i64> {
    self.get(tag).and_then(TagValue::as_int)
  }

  /// Whether `tag` is present, regardless of its value.
  pub fn contains<'a>(&self, tag: impl Into<Tag<'a>>) -> bool {
    self.0.contains_key(tag.into().as_str())
  }

  pub fn insert(&mut self, key: impl Into<String>, value: TagValue) -> Option<TagValue> {
    self.0.insert(key.into(), value)
  }

  pub fn remove<'a>(&mut self, tag: impl Into<Tag<'a>>) -> Option<TagValue> {
    self.0.remove(tag.into().as_str())
  }

  /// Get an iterator over the tag pairs, in no particular order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> + '_ {
    self.0.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl FromIterator<(String, TagValue)> for Tags {
  fn from_iter<T: IntoIterator<Item = (String, TagValue)>>(iter: T) -> Self {
    Tags(iter.into_iter().collect())
  }
}

/// Decode a raw tag string (without the leading `@`).
///
/// Entries are split on `;`, then on the first `=`. If any entry lacks a `=`,
/// the whole string is rejected and `None` is returned, there are no partial maps.
pub fn decode(src: &str) -> Option<Tags> {
  let mut tags = HashMap::new();
  for entry in src.split(';') {
    let Some((key, value)) = entry.split_once('=') else {
      trace!(entry, "malformed tag entry");
      return None;
    };
    tags.insert(key.to_owned(), TagValue::decode(value));
  }
  Some(Tags(tags))
}
