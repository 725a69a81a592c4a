//! Field updater and command cleaner
//!
//! Edits one field of a raw launch command in place. Tokens that belong to
//! other fields, including flags this crate does not know, keep their text
//! and their relative order.

use crate::command::decoder::flash_attn_state;
use crate::command::fields::{quote, ConfigField, FieldValue};
use crate::command::tokenizer::{join_tokens, tokenize, Token};
use crate::command::CommandError;

/// Set `field` to `value` in the raw command `raw`
///
/// Valued fields replace the token after every occurrence of the flag, or
/// append `flag value` when the flag is missing. Switch fields take a
/// boolean: `false` removes the flag, `true` appends it unless present.
pub fn update_field(
    raw: &str,
    field: ConfigField,
    value: impl Into<FieldValue>,
) -> Result<String, CommandError> {
    let value = value.into();
    let mut tokens = tokenize(raw);

    if field.is_switch() {
        let FieldValue::Bool(enabled) = value else {
            return Err(CommandError::ExpectedSwitch { field });
        };
        set_switch(&mut tokens, field, enabled);
    } else {
        let rendered = field.render_value(&value)?;
        set_value(&mut tokens, field, &rendered);
    }

    tracing::debug!("Updated {} in launch command", field);
    Ok(join_tokens(&tokens))
}

fn set_value(tokens: &mut Vec<Token>, field: ConfigField, rendered: &str) {
    let mut found = false;
    let mut i = 0;

    while i < tokens.len() {
        if !field.matches(tokens[i].as_str()) {
            i += 1;
            continue;
        }
        found = true;
        if tokens.get(i + 1).is_some_and(|next| !next.is_flag()) {
            tokens[i + 1] = Token::new(rendered);
        } else {
            tokens.insert(i + 1, Token::new(rendered));
        }
        i += 2;
    }

    if !found {
        tokens.push(Token::new(field.flag()));
        tokens.push(Token::new(rendered));
    }
}

fn set_switch(tokens: &mut Vec<Token>, field: ConfigField, enabled: bool) {
    let takes_state = field == ConfigField::FlashAttention;

    if enabled {
        let mut present = false;
        for i in 0..tokens.len() {
            if !field.matches(tokens[i].as_str()) {
                continue;
            }
            present = true;
            let disabled = takes_state
                && tokens
                    .get(i + 1)
                    .and_then(|next| flash_attn_state(next.unquoted()))
                    == Some(false);
            if disabled {
                tokens[i + 1] = Token::new("on");
            }
        }
        if !present {
            tokens.push(Token::new(field.flag()));
        }
        return;
    }

    let mut kept = Vec::with_capacity(tokens.len());
    let mut iter = std::mem::take(tokens).into_iter().peekable();
    while let Some(token) = iter.next() {
        if !field.matches(token.as_str()) {
            kept.push(token);
            continue;
        }
        if takes_state {
            let _ = iter.next_if(|next| flash_attn_state(next.unquoted()).is_some());
        }
    }
    *tokens = kept;
}

/// Unquoted token with no quote characters anywhere
fn is_bare(token: &Token) -> bool {
    !token.as_str().contains(|c: char| c == '"' || c == '\'')
}

fn has_path_separator(text: &str) -> bool {
    text.contains(|c: char| c == '/' || c == '\\')
}

/// Piece that can finish a path split on spaces: `models\llama`, `7b.gguf`
fn ends_path(token: &Token) -> bool {
    let text = token.as_str();
    has_path_separator(text)
        || text.rsplit_once('.').is_some_and(|(stem, ext)| {
            !stem.is_empty()
                && ext.starts_with(|c: char| c.is_ascii_alphabetic())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
}

/// Normalize spacing and quote unquoted paths that contain spaces
///
/// A path that was saved without quotes tokenizes as several bare tokens.
/// When such a run follows the binary position or a path flag, its longest
/// prefix that contains a path separator and ends in a path-like piece is
/// joined back and double quoted. Token order and field values are not
/// changed.
pub fn clean_command(raw: &str) -> String {
    let tokens = tokenize(raw);
    let mut cleaned: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut expects_path = tokens.first().is_some_and(|t| !t.is_flag());
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        if expects_path && is_bare(&token) {
            let mut run = vec![token];
            while let Some(next) = iter.next_if(|next| !next.is_flag() && is_bare(next)) {
                run.push(next);
            }

            let path_len = (2..=run.len())
                .rev()
                .find(|&len| {
                    ends_path(&run[len - 1]) && has_path_separator(&join_tokens(&run[..len]))
                })
                .unwrap_or(1);
            let rest = run.split_off(path_len);
            if path_len > 1 {
                cleaned.push(Token::new(quote(&join_tokens(&run))));
            } else {
                cleaned.extend(run);
            }
            cleaned.extend(rest);
            expects_path = false;
            continue;
        }

        expects_path = ConfigField::from_flag(token.as_str()).is_some_and(ConfigField::is_path);
        cleaned.push(token);
    }

    join_tokens(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::decoder::decode;
    use crate::types::config::{CacheType, Parsed};

    const BASE: &str = "llama-server -m \"/models/a b.gguf\" --port 8080 --rope-scaling linear --mlock";

    #[test]
    fn test_append_missing_flag() {
        let updated = update_field(BASE, ConfigField::ContextSize, 16384u32).unwrap();
        assert_eq!(updated, format!("{} --ctx-size 16384", BASE));
    }

    #[test]
    fn test_replace_existing_value() {
        let updated = update_field(BASE, ConfigField::Port, 9090u16).unwrap();
        assert_eq!(
            updated,
            "llama-server -m \"/models/a b.gguf\" --port 9090 --rope-scaling linear --mlock"
        );
    }

    #[test]
    fn test_replace_through_alias() {
        let updated = update_field("srv -c 4096 -ngl 10", ConfigField::ContextSize, 8192u32).unwrap();
        assert_eq!(updated, "srv -c 8192 -ngl 10");
    }

    #[test]
    fn test_value_inserted_when_flag_has_none() {
        let updated = update_field("srv --ctx-size --port 1", ConfigField::ContextSize, 2048u32).unwrap();
        assert_eq!(updated, "srv --ctx-size 2048 --port 1");

        let updated = update_field("srv --ctx-size", ConfigField::ContextSize, 2048u32).unwrap();
        assert_eq!(updated, "srv --ctx-size 2048");
    }

    #[test]
    fn test_model_path_is_quoted() {
        let updated = update_field(BASE, ConfigField::ModelPath, "/models/c d.gguf").unwrap();
        assert_eq!(
            updated,
            "llama-server -m \"/models/c d.gguf\" --port 8080 --rope-scaling linear --mlock"
        );
    }

    #[test]
    fn test_enum_value() {
        let updated = update_field("srv", ConfigField::CacheTypeK, CacheType::Q4_0).unwrap();
        assert_eq!(updated, "srv --cache-type-k q4_0");
    }

    #[test]
    fn test_switch_on_and_off() {
        let off = update_field(BASE, ConfigField::Mlock, false).unwrap();
        assert_eq!(
            off,
            "llama-server -m \"/models/a b.gguf\" --port 8080 --rope-scaling linear"
        );

        let on = update_field(&off, ConfigField::NoMmap, true).unwrap();
        assert!(on.ends_with("--rope-scaling linear --no-mmap"));

        let again = update_field(BASE, ConfigField::Mlock, true).unwrap();
        assert_eq!(again, BASE);
    }

    #[test]
    fn test_flash_attn_state_token() {
        let off = update_field("srv -fa on --port 1", ConfigField::FlashAttention, false).unwrap();
        assert_eq!(off, "srv --port 1");

        let on = update_field("srv --flash-attn off --port 1", ConfigField::FlashAttention, true).unwrap();
        assert_eq!(on, "srv --flash-attn on --port 1");
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        assert!(matches!(
            update_field(BASE, ConfigField::Mlock, 1u32),
            Err(CommandError::ExpectedSwitch { .. })
        ));
        assert!(matches!(
            update_field(BASE, ConfigField::Port, true),
            Err(CommandError::ExpectedValue { .. })
        ));
    }

    #[test]
    fn test_update_is_idempotent() {
        let cases: Vec<(ConfigField, FieldValue)> = vec![
            (ConfigField::ContextSize, 32768u32.into()),
            (ConfigField::Port, 8081u16.into()),
            (ConfigField::Mlock, false.into()),
            (ConfigField::FlashAttention, true.into()),
            (ConfigField::ModelPath, "/x/y z.gguf".into()),
            (ConfigField::DefragThreshold, 0.2.into()),
            (ConfigField::TensorSplit, "a\"b".into()),
            (ConfigField::ContextSize, "-abc".into()),
        ];
        let commands = [
            BASE,
            "srv -c 1024 -c 2048",
            "srv\n-m\n/models/q.gguf\n--port\n1",
            "",
        ];
        for raw in commands {
            for (field, value) in &cases {
                let once = update_field(raw, *field, value.clone()).unwrap();
                let twice = update_field(&once, *field, value.clone()).unwrap();
                assert_eq!(once, twice, "{} on {:?}", field, raw);
            }
        }
    }

    #[test]
    fn test_update_only_touches_target_tokens() {
        let raw = "srv --foo bar -m /a.gguf --baz --threads 4 qux";
        let updated = update_field(raw, ConfigField::Threads, 12u32).unwrap();
        assert_eq!(updated, "srv --foo bar -m /a.gguf --baz --threads 12 qux");
    }

    #[test]
    fn test_newline_command_is_updated() {
        let updated = update_field("srv\n--port\n1", ConfigField::Port, 2u16).unwrap();
        assert_eq!(updated, "srv --port 2");
    }

    #[test]
    fn test_clean_requotes_spaced_path() {
        let cleaned = clean_command("-m C:\\path with spaces\\model.gguf --port 8080");
        assert_eq!(cleaned, "-m \"C:\\path with spaces\\model.gguf\" --port 8080");
    }

    #[test]
    fn test_clean_requotes_binary_path() {
        let cleaned = clean_command("C:\\Program Files\\llama\\llama-server.exe   --port 8080");
        assert_eq!(cleaned, "\"C:\\Program Files\\llama\\llama-server.exe\" --port 8080");
    }

    #[test]
    fn test_clean_leaves_other_tokens() {
        let raw = "srv --alias my model --port 8080 -m /models/x.gguf";
        assert_eq!(clean_command(raw), raw);
        assert_eq!(clean_command("srv   --port\t8080"), "srv --port 8080");
    }

    #[test]
    fn test_clean_keeps_positional_after_binary() {
        assert_eq!(clean_command("/usr/bin/srv extra --port 1"), "/usr/bin/srv extra --port 1");
        assert_eq!(clean_command("/usr/bin/srv 1.5"), "/usr/bin/srv 1.5");
        assert_eq!(
            clean_command("/opt/my tools/llama-server serve --port 1"),
            "\"/opt/my tools/llama-server\" serve --port 1"
        );
    }

    #[test]
    fn test_stray_quote_in_value_keeps_other_flags() {
        let raw = "srv --tensor-split 1 --port 8080";
        let once = update_field(raw, ConfigField::TensorSplit, "a\"b").unwrap();
        assert_eq!(once, "srv --tensor-split 'a\"b' --port 8080");
        let twice = update_field(&once, ConfigField::TensorSplit, "a\"b").unwrap();
        assert_eq!(once, twice);

        let config = decode("m", &tokenize(&twice));
        assert_eq!(config.tensor_split.as_deref(), Some("a\"b"));
        assert_eq!(config.port, Some(Parsed::Valid(8080)));

        assert!(matches!(
            update_field(raw, ConfigField::TensorSplit, "a\"b'c d"),
            Err(CommandError::InvalidValue { .. })
        ));
        assert_eq!(
            update_field(raw, ConfigField::ContextSize, "-abc").unwrap(),
            "srv --tensor-split 1 --port 8080 --ctx-size \"-abc\""
        );
    }

    #[test]
    fn test_clean_is_idempotent() {
        let commands = [
            "-m C:\\path with spaces\\model.gguf --port 8080",
            "C:\\Program Files\\llama\\llama-server.exe -m /a b/c.gguf --mmproj /p q/r.gguf",
            "srv -m \"/quoted path/x.gguf\"   --ctx-size 4096",
            "srv\n-m\n/models/q.gguf",
            "srv -m \"unterminated path --port 1",
            "",
        ];
        for raw in commands {
            let once = clean_command(raw);
            assert_eq!(clean_command(&once), once, "{:?}", raw);
        }
    }
}
