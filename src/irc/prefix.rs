/// The host suffix Twitch puts on every user prefix.
const HOST_SUFFIX: &str = ".tmi.twitch.tv";

/// A message prefix.
///
/// ```text,ignore
/// :nick!user@host
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prefix<'src> {
  /// The `nick` part of the prefix.
  pub nick: Option<&'src str>,
  /// The `user` part of the prefix.
  pub user: Option<&'src str>,
  /// The `host` part of the prefix.
  pub host: &'src str,
}

impl<'src> Prefix<'src> {
  /// Split a raw prefix (without the leading `:`).
  ///
  /// ```text,ignore
  /// host
  /// nick@host
  /// nick!user@host
  /// ```
  pub fn parse(src: &'src str) -> Self {
    match src.split_once('@') {
      Some((name, host)) => match name.split_once('!') {
        Some((nick, user)) => Prefix {
          nick: Some(nick),
          user: Some(user),
          host,
        },
        None => Prefix {
          nick: Some(name),
          user: None,
          host,
        },
      },
      None => Prefix {
        nick: None,
        user: None,
        host: src,
      },
    }
  }
}

impl<'src> std::fmt::Display for Prefix<'src> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match (self.nick, self.user, self.host) {
      (Some(nick), Some(user), host) => write!(f, "{nick}!{user}@{host}"),
      (Some(nick), None, host) => write!(f, "{nick}@{host}"),
      (None, None, host) => write!(f, "{host}"),
      _ => Ok(()),
    }
  }
}

/// Extract the author from a `nick!nick@nick.tmi.twitch.tv` prefix.
///
/// All three occurrences of the nick must be identical, anything else
/// is treated as a corrupt prefix and yields `None`.
pub fn author(prefix: &str) -> Option<&str> {
  let Prefix {
    nick: Some(nick),
    user: Some(user),
    host,
  } = Prefix::parse(prefix)
  else {
    return None;
  };

  let host_nick = host.strip_suffix(HOST_SUFFIX)?;
  if nick.is_empty() || nick != user || nick != host_nick {
    return None;
  }

  Some(nick)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn regression_parse_prefix() {
    assert_eq!(
      Prefix::parse("justinfan57624!justinfan57624@justinfan57624.tmi.twitch.tv"),
      Prefix {
        nick: Some("justinfan57624"),
        user: Some("justinfan57624"),
        host: "justinfan57624.tmi.twitch.tv"
      }
    );
    assert_eq!(
      Prefix::parse("tmi.twitch.tv"),
      Prefix {
        nick: None,
        user: None,
        host: "tmi.twitch.tv"
      }
    );
  }

  #[test]
  fn author_requires_matching_nicks() {
    assert_eq!(
      author("randers!randers@randers.tmi.twitch.tv"),
      Some("randers")
    );
    assert_eq!(author("randers!forsen@randers.tmi.twitch.tv"), None);
    assert_eq!(author("randers!randers@forsen.tmi.twitch.tv"), None);
    assert_eq!(author("randers!randers@randers.example.com"), None);
    assert_eq!(author("tmi.twitch.tv"), None);
  }
}
