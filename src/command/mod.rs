//! Launch command codec
//!
//! Tokenizes, decodes, encodes and edits the shell-style command strings used
//! to start an inference server.

pub mod decoder;
pub mod encoder;
pub mod fields;
pub mod tokenizer;
pub mod updater;

use thiserror::Error;

pub use decoder::decode;
pub use encoder::encode;
pub use fields::{ConfigField, FieldValue};
pub use tokenizer::{tokenize, Token};
pub use updater::{clean_command, update_field};

use crate::types::config::ModelConfig;

/// Errors raised when editing a command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Field {field} is a switch and only accepts true or false")]
    ExpectedSwitch { field: ConfigField },
    #[error("Field {field} takes a value, not a boolean")]
    ExpectedValue { field: ConfigField },
    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: ConfigField, value: String },
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

/// Decode a raw command for the model called `name`
///
/// The command is normalized with [`clean_command`] first so unquoted paths
/// containing spaces decode as a single value.
pub fn parse_command(name: &str, raw: &str) -> ModelConfig {
    let cleaned = clean_command(raw);
    decode(name, &tokenize(&cleaned))
}
