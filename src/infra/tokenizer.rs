use crate::core::{PortError, Result, TokenId};
use std::path::Path;

/// Hugging Face `tokenizer.json` behind the port's error type.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| PortError::load(format!("tokenizer {}: {}", path.display(), e)))?;

        // Length limits are the port's job, not the file's.
        inner
            .with_truncation(None)
            .map_err(|e| PortError::load(format!("tokenizer {}: {}", path.display(), e)))?;
        inner.with_padding(None);

        Ok(Self { inner })
    }

    pub fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<TokenId>> {
        let encoding = self
            .inner
            .encode(text, add_special_tokens)
            .map_err(|e| PortError::invalid(format!("tokenization failed: {}", e)))?;
        Ok(encoding.get_ids().to_vec())
    }

    pub fn decode(&self, ids: &[TokenId]) -> Result<String> {
        self.check_ids(ids)?;
        self.inner
            .decode(ids, true)
            .map_err(|e| PortError::invalid(format!("decoding failed: {}", e)))
    }

    pub fn id_to_token(&self, id: TokenId) -> Result<String> {
        self.inner
            .id_to_token(id)
            .ok_or_else(|| PortError::invalid(format!("token id {} is outside the vocabulary", id)))
    }

    pub fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.inner.token_to_id(token)
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    fn check_ids(&self, ids: &[TokenId]) -> Result<()> {
        let vocab_size = self.vocab_size();
        match ids.iter().find(|&&id| id as usize >= vocab_size) {
            Some(id) => Err(PortError::invalid(format!("token id {} is outside the vocabulary", id))),
            None => Ok(()),
        }
    }
}
