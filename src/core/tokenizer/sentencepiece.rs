use super::{EncodeOptions, TokenId, Vocabulary, WORD_BOUNDARY};
use crate::core::{PortError, Result};

/// Greedy longest-match tokenizer over a SentencePiece-style vocabulary.
/// Characters no piece covers map to `<unk>`.
pub struct SentencePieceTokenizer {
    vocab: Vocabulary,
    max_piece_chars: usize,
}

impl SentencePieceTokenizer {
    pub fn new(vocab: Vocabulary) -> Self {
        let max_piece_chars = vocab.tokens.iter().map(|t| t.chars().count()).max().unwrap_or(1);
        Self {
            vocab,
            max_piece_chars,
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    fn normalize(text: &str) -> String {
        let mut normalized = String::with_capacity(text.len() + 4);
        for word in text.split_whitespace() {
            normalized.push(WORD_BOUNDARY);
            normalized.push_str(word);
        }
        normalized
    }

    pub fn encode(&self, text: &str, options: &EncodeOptions) -> Result<Vec<TokenId>> {
        let mut tokens = Vec::new();

        if options.add_bos {
            tokens.push(self.vocab.bos_token);
        }

        let chars: Vec<char> = Self::normalize(text).chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let longest = (chars.len() - i).min(self.max_piece_chars);
            let found = (1..=longest).rev().find_map(|len| {
                let piece: String = chars[i..i + len].iter().collect();
                self.vocab.id(&piece).map(|id| (id, len))
            });

            match found {
                Some((id, len)) => {
                    tokens.push(id);
                    i += len;
                }
                None => {
                    let unk = self
                        .vocab
                        .unk_token
                        .ok_or_else(|| PortError::invalid(format!("no piece covers `{}`", chars[i])))?;
                    // Consecutive unknown characters collapse into one <unk>.
                    if tokens.last() != Some(&unk) {
                        tokens.push(unk);
                    }
                    i += 1;
                }
            }
        }

        Ok(tokens)
    }

    /// Special tokens are dropped from the output.
    pub fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        let mut text = String::new();

        for &id in tokens {
            let piece = self
                .vocab
                .token(id)
                .ok_or_else(|| PortError::invalid(format!("token id {} is outside the vocabulary", id)))?;
            if self.vocab.is_special(id) {
                continue;
            }
            text.push_str(piece);
        }

        let text = text.replace(WORD_BOUNDARY, " ");
        Ok(text.trim_start().to_string())
    }

    pub fn id_to_token(&self, id: TokenId) -> Option<&str> {
        self.vocab.token(id)
    }
}
