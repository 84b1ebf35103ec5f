//! Command-line construction for the helper process.
//!
//! Two independent quoting layers exist:
//! - [`quote_if_needed`] wraps any token containing a space in double
//!   quotes. Embedded double quotes are not escaped, so callers must not pass
//!   untrusted strings through it unsanitized.
//! - [`quote_for_shell`] wraps a token in single quotes, doubling embedded
//!   single quotes, for interpreters that only honor that convention. It is
//!   applied to selected arguments before they reach the builder.

use cn_common::{Error, Result};
use std::borrow::Cow;

/// Longest command line the platform accepts, in UTF-16 code units.
pub const MAX_COMMAND_LINE: usize = 32_768;

/// Double-quote `token` if it contains a space character.
///
/// Tabs and newlines do not trigger quoting.
pub fn quote_if_needed(token: &str) -> Cow<'_, str> {
    if token.contains(' ') {
        Cow::Owned(format!("\"{}\"", token))
    } else {
        Cow::Borrowed(token)
    }
}

/// Single-quote `token`, doubling any embedded single quotes.
pub fn quote_for_shell(token: &str) -> String {
    format!("'{}'", token.replace('\'', "''"))
}

/// Join the executable and arguments into one command line.
///
/// Fails with [`Error::CommandLineTooLong`] past [`MAX_COMMAND_LINE`].
pub fn format_command_line<S: AsRef<str>>(executable: &str, args: &[S]) -> Result<String> {
    let mut line = String::from(quote_if_needed(executable));
    for arg in args {
        line.push(' ');
        line.push_str(&quote_if_needed(arg.as_ref()));
    }

    let length = line.encode_utf16().count();
    if length > MAX_COMMAND_LINE {
        return Err(Error::CommandLineTooLong {
            length,
            max: MAX_COMMAND_LINE,
        });
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_tokens_are_joined_with_spaces() {
        let line = format_command_line(
            "notify.exe",
            &["certissued", "-subjectkeyidentifier", "ABCD1234"],
        )
        .unwrap();
        assert_eq!(line, "notify.exe certissued -subjectkeyidentifier ABCD1234");
    }

    #[test]
    fn executable_with_space_is_quoted() {
        let line = format_command_line("C:\\Program Files\\notify.exe", &["x"]).unwrap();
        assert_eq!(line, "\"C:\\Program Files\\notify.exe\" x");
    }

    #[test]
    fn only_spaces_trigger_quoting() {
        assert_eq!(quote_if_needed("a b"), "\"a b\"");
        assert_eq!(quote_if_needed("a\tb"), "a\tb");
        assert_eq!(quote_if_needed("a\nb"), "a\nb");
    }

    #[test]
    fn embedded_quotes_pass_through() {
        assert_eq!(quote_if_needed("say\"hi\""), "say\"hi\"");
        assert_eq!(quote_if_needed("say \"hi\""), "\"say \"hi\"\"");
    }

    #[test]
    fn no_arguments_is_just_the_executable() {
        let line = format_command_line::<&str>("notify.exe", &[]).unwrap();
        assert_eq!(line, "notify.exe");
    }

    #[test]
    fn shell_quoting_wraps_and_doubles() {
        assert_eq!(quote_for_shell("AB CD"), "'AB CD'");
        assert_eq!(quote_for_shell("it's"), "'it''s'");
        assert_eq!(quote_for_shell(""), "''");
    }

    #[test]
    fn shell_quoted_token_with_space_gets_both_layers() {
        let line = format_command_line("notify.exe", &[quote_for_shell("AB CD")]).unwrap();
        assert_eq!(line, "notify.exe \"'AB CD'\"");
    }

    #[test]
    fn ceiling_is_inclusive() {
        let arg = "a".repeat(MAX_COMMAND_LINE - "x ".len());
        assert!(format_command_line("x", &[arg.as_str()]).is_ok());

        let arg = "a".repeat(MAX_COMMAND_LINE);
        let err = format_command_line("x", &[arg.as_str()]).unwrap_err();
        assert!(matches!(
            err,
            Error::CommandLineTooLong {
                length,
                max: MAX_COMMAND_LINE
            } if length == MAX_COMMAND_LINE + 2
        ));
    }

    #[test]
    fn length_counts_utf16_units() {
        // Each of these is two UTF-16 code units.
        let arg = "\u{1F512}".repeat(MAX_COMMAND_LINE / 2);
        assert!(format_command_line("x", &[arg.as_str()]).is_err());
    }

    proptest! {
        #[test]
        fn tokens_without_whitespace_are_unquoted(token in "[^\\s]{0,40}") {
            prop_assert_eq!(quote_if_needed(&token), token.as_str());
        }

        #[test]
        fn tokens_with_space_get_one_quote_pair(a in "[a-z]{0,10}", b in "[a-z]{0,10}") {
            let token = format!("{} {}", a, b);
            let quoted = quote_if_needed(&token);
            prop_assert_eq!(quoted.as_ref(), format!("\"{}\"", token));
            prop_assert_eq!(quoted.matches('"').count(), 2);
        }
    }
}
