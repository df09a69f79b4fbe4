//! Board identity extraction (`esp32:` / `esp8266:` / ... and `psram:` blocks).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::parser::lines::{block_body, clean_scalar, strip_inline_comment, Line};

/// Top-level blocks that name the silicon family, in lookup order.
pub const SILICON_BLOCKS: &[&str] = &[
    "esp32", "esp8266", "rp2040", "bk72xx", "rtl87xx", "ln882x", "nrf52",
];

/// Board id, silicon variant, and PSRAM mode as written in the config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardIdentity {
    pub board: Option<String>,
    pub variant: Option<String>,
    pub psram_mode: Option<String>,
    /// Name of the silicon block the board and variant came from.
    pub platform: Option<String>,
}

fn sub_key_re(key: &str) -> Regex {
    Regex::new(&format!(r"^\s*{}:\s*([^\s#]+)\s*$", regex::escape(key))).expect("valid regex")
}

fn board_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| sub_key_re("board"))
}

fn variant_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| sub_key_re("variant"))
}

fn mode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| sub_key_re("mode"))
}

/// Last single-token value of `re` inside `body`.
fn last_token(body: &[&Line<'_>], re: &Regex) -> Option<String> {
    body.iter()
        .filter_map(|line| {
            let text = strip_inline_comment(line.raw);
            re.captures(text).map(|c| clean_scalar(&c[1]).to_string())
        })
        .last()
}

pub fn extract_board_identity(lines: &[Line<'_>]) -> BoardIdentity {
    let mut identity = BoardIdentity::default();

    for &block in SILICON_BLOCKS {
        if let Some(body) = block_body(lines, block) {
            identity.platform = Some(block.to_string());
            identity.board = last_token(&body, board_re());
            identity.variant = last_token(&body, variant_re());
            break;
        }
    }

    if let Some(body) = block_body(lines, "psram") {
        identity.psram_mode = last_token(&body, mode_re());
    }

    tracing::debug!(
        board = ?identity.board,
        variant = ?identity.variant,
        psram = ?identity.psram_mode,
        platform = ?identity.platform,
        "extracted board identity"
    );
    identity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lines::tokenize;

    #[test]
    fn test_esp32_block() {
        let text = "esp32:\n  board: esp32-s3-devkitc-1\n  variant: esp32s3\n  framework:\n    type: esp-idf\npsram:\n  mode: octal\n  speed: 80MHz\n";
        let id = extract_board_identity(&tokenize(text));
        assert_eq!(id.board.as_deref(), Some("esp32-s3-devkitc-1"));
        assert_eq!(id.variant.as_deref(), Some("esp32s3"));
        assert_eq!(id.psram_mode.as_deref(), Some("octal"));
        assert_eq!(id.platform.as_deref(), Some("esp32"));
    }

    #[test]
    fn test_esp8266_block() {
        let text = "esphome:\n  name: x\nesp8266:\n  board: \"d1_mini\"  # wemos\n";
        let id = extract_board_identity(&tokenize(text));
        assert_eq!(id.board.as_deref(), Some("d1_mini"));
        assert_eq!(id.variant, None);
        assert_eq!(id.platform.as_deref(), Some("esp8266"));
    }

    #[test]
    fn test_missing_blocks_are_none() {
        let id = extract_board_identity(&tokenize("esphome:\n  name: x\n"));
        assert_eq!(id, BoardIdentity::default());
    }

    #[test]
    fn test_multi_token_value_is_ignored() {
        let id = extract_board_identity(&tokenize("esp32:\n  board: two words\n"));
        assert_eq!(id.board, None);
        assert_eq!(id.platform.as_deref(), Some("esp32"));
    }
}
