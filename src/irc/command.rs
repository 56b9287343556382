use std::fmt::Display;

/// A Twitch IRC command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Command<'src> {
  /// Ping the peer
  Ping,
  /// Send a message to a channel
  PrivMsg,
  /// Send a private message to a user
  Whisper,
  /// Join a channel
  Join,
  /// Leave a channel
  Part,
  /// Gain or lose operator status
  Mode,
  /// Identifies a user's chat settings or properties
  UserState,
  /// Identifies the channel's chat settings
  RoomState,
  /// General notices from the server
  Notice,
  /// Purge a user's messages in a channel
  ClearChat,
  /// Remove a single message
  ClearMsg,
  /// Channel started or stopped hosting another channel
  HostTarget,
  /// Announces Twitch-specific events to the channel
  UserNotice,
  /// Capability negotiation
  Cap,
  /// Unknown command
  Other(&'src str),
}

impl<'src> Display for Command<'src> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl<'src> Command<'src> {
  /// Get the string value of the [`Command`].
  pub fn as_str(&self) -> &'src str {
    use Command::*;
    match self {
      Ping => "PING",
      PrivMsg => "PRIVMSG",
      Whisper => "WHISPER",
      Join => "JOIN",
      Part => "PART",
      Mode => "MODE",
      UserState => "USERSTATE",
      RoomState => "ROOMSTATE",
      Notice => "NOTICE",
      ClearChat => "CLEARCHAT",
      ClearMsg => "CLEARMSG",
      HostTarget => "HOSTTARGET",
      UserNotice => "USERNOTICE",
      Cap => "CAP",
      Other(cmd) => cmd,
    }
  }
}

/// `COMMAND`
///
/// Returns `None` if the word is empty or is not made of
/// uppercase letters and digits.
#[inline(always)]
pub(super) fn parse(word: &str) -> Option<Command<'_>> {
  if word.is_empty()
    || !word
      .bytes()
      .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
  {
    return None;
  }

  use Command as C;
  Some(match word {
    "PING" => C::Ping,
    "PRIVMSG" => C::PrivMsg,
    "WHISPER" => C::Whisper,
    "JOIN" => C::Join,
    "PART" => C::Part,
    "MODE" => C::Mode,
    "USERSTATE" => C::UserState,
    "ROOMSTATE" => C::RoomState,
    "NOTICE" => C::Notice,
    "CLEARCHAT" => C::ClearChat,
    "CLEARMSG" => C::ClearMsg,
    "HOSTTARGET" => C::HostTarget,
    "USERNOTICE" => C::UserNotice,
    "CAP" => C::Cap,
    other => C::Other(other),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn command() {
    assert_eq!(parse("PING"), Some(Command::Ping));
    assert_eq!(parse("001"), Some(Command::Other("001")));
    assert_eq!(parse("GLOBALUSERSTATE").unwrap().as_str(), "GLOBALUSERSTATE");
  }

  #[test]
  fn rejects_non_command_words() {
    assert_eq!(parse(""), None);
    assert_eq!(parse("privmsg"), None);
    assert_eq!(parse("#channel"), None);
  }
}
