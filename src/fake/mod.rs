//! In-memory port for tests of code that consumes [`ModelPort`].
//!
//! Tokenization is word level over a fixed vocabulary and logits are a pure
//! function of the input ids, so every call is reproducible.

use crate::core::tokenizer::{check_tokenize_args, EncodeOptions, SentencePieceTokenizer};
use crate::core::{
    Device, ModelInfo, ModelOutputs, ModelPort, PortError, Result, TokenId, TokenizedInput, Truncation,
    Vocabulary,
};
use candle_core::Tensor;

pub const DEFAULT_WORDS: &[&str] = &[
    "hello", "world", "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "a", "model",
];

#[derive(Debug, Clone)]
pub struct FakeConfig {
    pub name: String,
    pub words: Vec<String>,
    pub context_length: usize,
    pub add_bos: bool,
    pub truncation: Truncation,
    pub fail_on_load: bool,
}

impl Default for FakeConfig {
    fn default() -> Self {
        Self {
            name: "fake-model".to_string(),
            words: DEFAULT_WORDS.iter().map(|w| w.to_string()).collect(),
            context_length: 32,
            add_bos: false,
            truncation: Truncation::Truncate,
            fail_on_load: false,
        }
    }
}

pub struct FakeModelPort {
    config: FakeConfig,
    tokenizer: Option<SentencePieceTokenizer>,
    forward_calls: usize,
}

impl FakeModelPort {
    pub fn new(config: FakeConfig) -> Self {
        Self {
            config,
            tokenizer: None,
            forward_calls: 0,
        }
    }

    /// Already past `load_model`.
    pub fn loaded(config: FakeConfig) -> Result<Self> {
        let mut port = Self::new(config);
        port.load_model()?;
        Ok(port)
    }

    pub fn forward_calls(&self) -> usize {
        self.forward_calls
    }

    fn tokenizer(&self, operation: &'static str) -> Result<&SentencePieceTokenizer> {
        self.tokenizer.as_ref().ok_or(PortError::not_loaded(operation))
    }

    fn vocab(&self, operation: &'static str) -> Result<&Vocabulary> {
        Ok(self.tokenizer(operation)?.vocab())
    }

    /// Row `i` scores 1.0 on the id following `ids[i]`, 0.0 elsewhere.
    fn logits_for(ids: &[TokenId], vocab_size: usize) -> Vec<f32> {
        let mut data = vec![0.0f32; ids.len() * vocab_size];
        for (row, &id) in ids.iter().enumerate() {
            let next = (id as usize + 1) % vocab_size;
            data[row * vocab_size + next] = 1.0;
        }
        data
    }
}

impl Default for FakeModelPort {
    fn default() -> Self {
        Self::new(FakeConfig::default())
    }
}

impl ModelPort for FakeModelPort {
    fn load_model(&mut self) -> Result<()> {
        if self.tokenizer.is_some() {
            return Ok(());
        }
        if self.config.fail_on_load {
            return Err(PortError::load(format!("{} is configured to fail", self.config.name)));
        }
        if self.config.context_length == 0 {
            return Err(PortError::load("context_length must be positive"));
        }

        let vocab = Vocabulary::from_words(&self.config.words)?;
        tracing::debug!(name = %self.config.name, vocab_size = vocab.size(), "fake model loaded");
        self.tokenizer = Some(SentencePieceTokenizer::new(vocab));
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.tokenizer.is_some()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let vocab = self.vocab("get_model_info")?;
        let mut info = ModelInfo::new();
        info.insert("name", self.config.name.as_str())
            .insert("backend", "fake")
            .insert("device", Device::Cpu.to_string())
            .insert("context_length", self.config.context_length)
            .insert("vocab_size", vocab.size())
            .insert("eos_token_id", vocab.eos_token);
        Ok(info)
    }

    fn tokenize(&self, text: &str, max_length: usize) -> Result<TokenizedInput> {
        let tokenizer = self.tokenizer("tokenize")?;
        let limit = check_tokenize_args(text, max_length, self.config.context_length)?;

        let options = if self.config.add_bos {
            EncodeOptions::new().with_bos()
        } else {
            EncodeOptions::new()
        };
        let ids = tokenizer.encode(text, &options)?;
        if ids.is_empty() {
            return Err(PortError::invalid("text produced no tokens"));
        }
        let ids = self.config.truncation.apply(ids, limit)?;

        TokenizedInput::from_ids(&ids, &candle_core::Device::Cpu)
    }

    fn forward(&mut self, inputs: &TokenizedInput) -> Result<ModelOutputs> {
        let vocab_size = self.vocab("forward")?.size();
        let ids = inputs.validate(&candle_core::Device::Cpu, self.config.context_length)?;

        if let Some(&bad) = ids.iter().find(|&&id| id as usize >= vocab_size) {
            return Err(PortError::inference(format!("token id {} is outside the vocabulary", bad)));
        }

        let data = Self::logits_for(&ids, vocab_size);
        let logits = Tensor::from_vec(data, (ids.len(), vocab_size), &candle_core::Device::Cpu)
            .map_err(PortError::inference)?;

        self.forward_calls += 1;
        ModelOutputs::new(logits)
    }

    fn convert_ids_to_tokens(&self, ids: &[TokenId]) -> Result<Vec<String>> {
        let tokenizer = self.tokenizer("convert_ids_to_tokens")?;
        ids.iter()
            .map(|&id| {
                tokenizer
                    .id_to_token(id)
                    .map(str::to_string)
                    .ok_or_else(|| PortError::invalid(format!("token id {} is outside the vocabulary", id)))
            })
            .collect()
    }

    fn decode_token(&self, id: TokenId) -> Result<String> {
        self.tokenizer("decode_token")?
            .decode(&[id])
    }

    fn decode_sequence(&self, ids: &[TokenId]) -> Result<String> {
        self.tokenizer("decode_sequence")?
            .decode(ids)
    }

    fn eos_token_id(&self) -> Result<TokenId> {
        Ok(self.vocab("eos_token_id")?.eos_token)
    }

    fn context_length(&self) -> Result<usize> {
        self.tokenizer("context_length")?;
        Ok(self.config.context_length)
    }

    fn device(&self) -> Result<Device> {
        self.tokenizer("device")?;
        Ok(Device::Cpu)
    }
}
