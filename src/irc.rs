//! ## Twitch IRC line parser
//!
//! The entrypoint to this module is [`IrcLine`].
//!
//! ```rust
//! let line = tmi_bot::irc::IrcLine::parse(":a!a@a.tmi.twitch.tv PRIVMSG #forsen :hello").unwrap();
//! assert_eq!(line.channel(), Some("forsen"));
//! assert_eq!(line.content(), Some("hello"));
//! ```
//!
//! ⚠ This parser is _not_ compliant with the IRCv3 spec!
//! It assumes that it will only ever parse messages sent by Twitch:
//!
//! ```text
//! [@tags ][:prefix ]COMMAND[ #channel | middle][ [:]content]
//! ```

mod command;
mod prefix;
pub mod tags;

pub use command::Command;
pub use prefix::{author, Prefix};
pub use tags::{Tag, TagValue, Tags};

use std::fmt::Debug;

/// A single line split into its grammar parts.
///
/// This borrows from the original line; nothing is decoded yet.
/// Tags are decoded with [`IrcLine::tags`].
#[derive(Clone, Copy)]
pub struct IrcLine<'src> {
  src: &'src str,
  tags: Option<&'src str>,
  prefix: Option<&'src str>,
  command: Command<'src>,
  channel: Option<&'src str>,
  middle: Option<&'src str>,
  content: Option<&'src str>,
}

impl<'src> IrcLine<'src> {
  /// Parse a single Twitch IRC line.
  ///
  /// The line must already have its trailing CRLF stripped.
  /// Returns `None` if the line does not match the grammar.
  pub fn parse(src: &'src str) -> Option<Self> {
    let mut rest = src;

    // @key=value;key=value <rest>
    let tags = match rest.strip_prefix('@') {
      Some(after) => {
        let (tags, after) = after.split_once(' ')?;
        if tags.is_empty() {
          return None;
        }
        rest = after;
        Some(tags)
      }
      None => None,
    };

    // :nick!user@host <rest>
    let prefix = match rest.strip_prefix(':') {
      Some(after) => {
        let (prefix, after) = after.split_once(' ')?;
        if prefix.is_empty() {
          return None;
        }
        rest = after;
        Some(prefix)
      }
      None => None,
    };

    let (word, after) = split_word(rest);
    let command = command::parse(word)?;
    rest = after;

    // #channel <rest>
    // middle <rest>
    let mut channel = None;
    let mut middle = None;
    if let Some(after) = rest.strip_prefix('#') {
      let (name, after) = split_word(after);
      if name.is_empty() {
        return None;
      }
      channel = Some(name);
      rest = after;
    } else if !rest.is_empty() && !rest.starts_with(':') {
      let (word, after) = split_word(rest);
      middle = Some(word);
      rest = after;
    }

    let content = match rest.strip_prefix(':') {
      Some(content) => Some(content),
      None if rest.is_empty() => None,
      None => Some(rest),
    };

    Some(IrcLine {
      src,
      tags,
      prefix,
      command,
      channel,
      middle,
      content,
    })
  }

  /// Get the string from which this line was parsed.
  pub fn raw(&self) -> &'src str {
    self.src
  }

  /// Get the raw tag string, without the leading `@`.
  pub fn raw_tags(&self) -> Option<&'src str> {
    self.tags
  }

  /// Decode the tags.
  ///
  /// Yields `None` both if the line has no tags and if they are malformed.
  pub fn tags(&self) -> Option<Tags> {
    self.tags.and_then(tags::decode)
  }

  /// Get the raw prefix, without the leading `:`.
  pub fn prefix(&self) -> Option<&'src str> {
    self.prefix
  }

  /// Get the line [`Command`].
  pub fn command(&self) -> Command<'src> {
    self.command
  }

  /// Get the channel name this line was sent to, without the `#`.
  pub fn channel(&self) -> Option<&'src str> {
    self.channel
  }

  /// The first parameter if it is not a channel, e.g. the target of a `WHISPER`.
  pub fn middle(&self) -> Option<&'src str> {
    self.middle
  }

  /// Trailing content, with at most one leading `:` removed.
  pub fn content(&self) -> Option<&'src str> {
    self.content
  }
}

fn split_word(s: &str) -> (&str, &str) {
  match s.split_once(' ') {
    Some((word, rest)) => (word, rest),
    None => (s, ""),
  }
}

impl<'src> Debug for IrcLine<'src> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("IrcLine")
      .field("tags", &self.tags)
      .field("prefix", &self.prefix)
      .field("command", &self.command)
      .field("channel", &self.channel)
      .field("middle", &self.middle)
      .field("content", &self.content)
      .finish()
  }
}

static_assert_send!(IrcLine);
static_assert_sync!(IrcLine);

#[cfg(test)]
mod tests {
  use super::*;

  mod parse {
    use super::*;

    #[test]
    fn privmsg_with_tags() {
      let data = "@badge-info=;badges=;color=#0000FF;display-name=JuN1oRRRR;emotes=;flags=;id=e9d998c3-36f1-430f-89ec-6b887c28af36;mod=0;room-id=11148817;subscriber=0;tmi-sent-ts=1594545155039;turbo=0;user-id=29803735;user-type= :jun1orrrr!jun1orrrr@jun1orrrr.tmi.twitch.tv PRIVMSG #pajlada :dank cam";

      let line = IrcLine::parse(data).unwrap();
      assert_eq!(line.command(), Command::PrivMsg);
      assert_eq!(
        line.prefix(),
        Some("jun1orrrr!jun1orrrr@jun1orrrr.tmi.twitch.tv")
      );
      assert_eq!(line.channel(), Some("pajlada"));
      assert_eq!(line.content(), Some("dank cam"));
      assert!(line.raw_tags().unwrap().starts_with("badge-info="));
    }

    #[test]
    fn join_without_content() {
      let data = ":justinfan57624!justinfan57624@justinfan57624.tmi.twitch.tv JOIN #riotgames";

      let line = IrcLine::parse(data).unwrap();
      assert_eq!(line.command(), Command::Join);
      assert_eq!(line.channel(), Some("riotgames"));
      assert_eq!(line.content(), None);
    }

    #[test]
    fn mode_content_without_colon() {
      let line = IrcLine::parse(":jtv MODE #pajlada +o randers").unwrap();
      assert_eq!(line.command(), Command::Mode);
      assert_eq!(line.content(), Some("+o randers"));
    }

    #[test]
    fn whisper_target_is_middle() {
      let line =
        IrcLine::parse(":randers!randers@randers.tmi.twitch.tv WHISPER my_bot :hello there").unwrap();
      assert_eq!(line.command(), Command::Whisper);
      assert_eq!(line.channel(), None);
      assert_eq!(line.middle(), Some("my_bot"));
      assert_eq!(line.content(), Some("hello there"));
    }

    #[test]
    fn notice_without_channel() {
      let line = IrcLine::parse(":tmi.twitch.tv NOTICE * :Improperly formatted auth").unwrap();
      assert_eq!(line.command(), Command::Notice);
      assert_eq!(line.middle(), Some("*"));
      assert_eq!(line.content(), Some("Improperly formatted auth"));
    }

    #[test]
    fn only_first_colon_of_content_is_stripped() {
      let line = IrcLine::parse(":a!a@a.tmi.twitch.tv PRIVMSG #a ::)").unwrap();
      assert_eq!(line.content(), Some(":)"));
    }

    #[test]
    fn equals_in_tag_value() {
      let data = "@reply-parent-msg-body=https://youtu.be/-ek4MFjz_eM?list=PL91C6439FD45DE2F3;room-id=1 :a!a@a.tmi.twitch.tv PRIVMSG #anny :@minosura @anny";
      let tags = IrcLine::parse(data).unwrap().tags().unwrap();
      assert_eq!(
        tags.str("reply-parent-msg-body").as_deref(),
        Some("https://youtu.be/-ek4MFjz_eM?list=PL91C6439FD45DE2F3")
      );
    }

    #[test]
    fn rejects_garbage() {
      assert!(IrcLine::parse("").is_none());
      assert!(IrcLine::parse("@tagsbutnothingelse").is_none());
      assert!(IrcLine::parse(":prefixonly").is_none());
      assert!(IrcLine::parse(":a!a@a PRIVMSG # :x").is_none());
    }
  }
}
