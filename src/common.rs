//! Helpers shared by the parser and the client.

use std::borrow::Cow;

/// Strip a leading `#` and lowercase the channel name.
///
/// Channels are stored without the `#` and re-prefixed on the wire.
pub fn normalize_channel(channel: &str) -> String {
  channel.trim().trim_start_matches('#').to_lowercase()
}

/// Checks if `value` needs to be unescaped by looking for escaped characters.
///
/// If it must be unescaped, then it must reallocate and will return an owned string.
/// Otherwise, it returns a borrow of the original `value`.
pub fn maybe_unescape<'a>(value: impl Into<Cow<'a, str>>) -> Cow<'a, str> {
  let value: Cow<'_, str> = value.into();
  match value.find('\\') {
    Some(start) => Cow::Owned(actually_unescape(&value, start)),
    None => value,
  }
}

/// Unescape a `value` according to the escaped characters that Twitch IRC supports.
///
/// Note that this is _not_ the same as IRCv3! Twitch doesn't follow the spec here.
#[inline]
fn actually_unescape(input: &str, start: usize) -> String {
  let mut out = String::with_capacity(input.len());
  out.push_str(&input[..start]);

  let mut escape = false;
  for char in input[start..].chars() {
    match char {
      '\\' if escape => {
        out.push('\\');
        escape = false;
      }
      '\\' => escape = true,
      ':' if escape => {
        out.push(';');
        escape = false;
      }
      's' if escape => {
        out.push(' ');
        escape = false;
      }
      'r' if escape => {
        out.push('\r');
        escape = false;
      }
      'n' if escape => {
        out.push('\n');
        escape = false;
      }
      c => {
        escape = false;
        out.push(c)
      }
    }
  }

  out
}
