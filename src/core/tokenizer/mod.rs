pub mod sentencepiece;

pub use sentencepiece::SentencePieceTokenizer;

use crate::core::{PortError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TokenId = u32;

pub const PAD_TOKEN: &str = "<pad>";
pub const BOS_TOKEN: &str = "<s>";
pub const EOS_TOKEN: &str = "</s>";
pub const UNK_TOKEN: &str = "<unk>";

/// Word boundary marker used by SentencePiece vocabularies.
pub const WORD_BOUNDARY: char = '▁';

#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub tokens: Vec<String>,
    pub types: Vec<TokenType>,
    pub bos_token: TokenId,
    pub eos_token: TokenId,
    pub pad_token: Option<TokenId>,
    pub unk_token: Option<TokenId>,
    index: HashMap<String, TokenId>,
}

impl Vocabulary {
    /// Builds a vocabulary from raw pieces. Pieces matching the conventional
    /// `<s>`, `</s>`, `<pad>`, `<unk>` spellings become the special tokens.
    pub fn new(tokens: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(tokens.len());
        let mut types = Vec::with_capacity(tokens.len());

        for (i, token) in tokens.iter().enumerate() {
            if index.insert(token.clone(), i as TokenId).is_some() {
                return Err(PortError::load(format!("duplicate vocabulary entry `{}`", token)));
            }
            types.push(match token.as_str() {
                PAD_TOKEN | BOS_TOKEN | EOS_TOKEN => TokenType::Control,
                UNK_TOKEN => TokenType::Unknown,
                _ => TokenType::Normal,
            });
        }

        let bos_token = *index
            .get(BOS_TOKEN)
            .ok_or_else(|| PortError::load("vocabulary has no BOS token"))?;
        let eos_token = *index
            .get(EOS_TOKEN)
            .ok_or_else(|| PortError::load("vocabulary has no EOS token"))?;

        Ok(Self {
            pad_token: index.get(PAD_TOKEN).copied(),
            unk_token: index.get(UNK_TOKEN).copied(),
            tokens,
            types,
            bos_token,
            eos_token,
            index,
        })
    }

    /// Special tokens followed by one `▁word` piece per distinct word.
    pub fn from_words<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens: Vec<String> = [PAD_TOKEN, BOS_TOKEN, EOS_TOKEN, UNK_TOKEN]
            .iter()
            .map(|t| t.to_string())
            .collect();
        for word in words {
            let piece = format!("{}{}", WORD_BOUNDARY, word.as_ref());
            if !tokens.contains(&piece) {
                tokens.push(piece);
            }
        }
        Self::new(tokens)
    }

    pub fn size(&self) -> usize {
        self.tokens.len()
    }

    pub fn token(&self, id: TokenId) -> Option<&str> {
        self.tokens.get(id as usize).map(|s| s.as_str())
    }

    pub fn id(&self, token: &str) -> Option<TokenId> {
        self.index.get(token).copied()
    }

    pub fn token_type(&self, id: TokenId) -> Option<TokenType> {
        self.types.get(id as usize).copied()
    }

    pub fn is_special(&self, id: TokenId) -> bool {
        matches!(self.token_type(id), Some(TokenType::Control | TokenType::Unknown))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Normal,
    Unknown,
    Control,
}

/// What `tokenize` does when the text encodes to more ids than allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Truncation {
    /// Keep the leading ids.
    #[default]
    Truncate,
    Error,
}

impl Truncation {
    pub fn apply(&self, mut ids: Vec<TokenId>, max_length: usize) -> Result<Vec<TokenId>> {
        if ids.len() <= max_length {
            return Ok(ids);
        }
        match self {
            Truncation::Truncate => {
                tracing::debug!(from = ids.len(), to = max_length, "truncating token sequence");
                ids.truncate(max_length);
                Ok(ids)
            }
            Truncation::Error => Err(PortError::invalid(format!(
                "text encodes to {} tokens, max_length is {}",
                ids.len(),
                max_length
            ))),
        }
    }
}

impl std::str::FromStr for Truncation {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "truncate" => Ok(Truncation::Truncate),
            "error" => Ok(Truncation::Error),
            other => Err(PortError::Config(format!("unknown truncation policy `{}`", other))),
        }
    }
}

/// Checks shared by every `tokenize` implementation. Returns the effective
/// length limit.
pub fn check_tokenize_args(text: &str, max_length: usize, context_length: usize) -> Result<usize> {
    if max_length == 0 {
        return Err(PortError::invalid("max_length must be a positive integer"));
    }
    if text.contains('\0') {
        return Err(PortError::invalid("text contains NUL characters"));
    }
    Ok(max_length.min(context_length))
}

#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    pub add_bos: bool,
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bos(mut self) -> Self {
        self.add_bos = true;
        self
    }
}
