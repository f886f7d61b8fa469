//! Parsing of interactive input lines.
//!
//! Pure functions, no side effects.

use crate::codec::RecipientId;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Send { recipient_id: RecipientId, text: String },
    Quit,
}

/// Parse one input line.
///
/// * `/quit` closes the connection
/// * `@<id> <text>` sends `text` to peer `<id>`
/// * anything else is broadcast (route id = own user id)
///
/// Returns `None` for blank lines.
pub fn parse_input(line: &str, own_user_id: i32) -> Option<InputCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "/quit" {
        return Some(InputCommand::Quit);
    }

    if let Some(addressed) = line.strip_prefix('@')
        && let Some((id, text)) = addressed.split_once(char::is_whitespace)
        && let Ok(id) = id.parse::<i32>()
    {
        return Some(InputCommand::Send {
            recipient_id: RecipientId::new(id),
            text: text.trim_start().to_string(),
        });
    }

    Some(InputCommand::Send {
        recipient_id: RecipientId::broadcast_from(own_user_id),
        text: line.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addressed_message() {
        // テスト項目: @<id> で宛先を指定したメッセージが解析される
        // given (前提条件):
        let line = "@7 hello there";

        // when (操作):
        let command = parse_input(line, 1);

        // then (期待する結果):
        assert_eq!(
            command,
            Some(InputCommand::Send {
                recipient_id: RecipientId::new(7),
                text: "hello there".to_string()
            })
        );
    }

    #[test]
    fn test_parse_plain_line_is_broadcast() {
        // テスト項目: 宛先なしの行は自分の user_id 宛て（ブロードキャスト）になる
        // given (前提条件):
        let line = "  hi all  ";

        // when (操作):
        let command = parse_input(line, 12);

        // then (期待する結果):
        assert_eq!(
            command,
            Some(InputCommand::Send {
                recipient_id: RecipientId::new(12),
                text: "hi all".to_string()
            })
        );
    }

    #[test]
    fn test_parse_invalid_address_is_broadcast_verbatim() {
        // テスト項目: 数値でない宛先指定は行全体をブロードキャストする
        // given (前提条件):
        let line = "@bob hello";

        // when (操作):
        let command = parse_input(line, 3);

        // then (期待する結果):
        assert_eq!(
            command,
            Some(InputCommand::Send {
                recipient_id: RecipientId::new(3),
                text: "@bob hello".to_string()
            })
        );
    }

    #[test]
    fn test_parse_quit_and_blank() {
        // テスト項目: /quit は終了、空行は無視される
        // given (前提条件):

        // when (操作):
        let quit = parse_input("/quit", 1);
        let blank = parse_input("   ", 1);

        // then (期待する結果):
        assert_eq!(quit, Some(InputCommand::Quit));
        assert_eq!(blank, None);
    }
}
