use crate::core::tokenizer::TokenId;
use crate::core::{Device, ModelInfo, ModelOutputs, Result, TokenizedInput};

/// The single boundary between application code and a language model plus
/// its tokenizer.
///
/// A port starts Unloaded. `load_model` moves it to Loaded; there is no way
/// back. Every other method fails with [`PortError::NotLoaded`] until then.
///
/// [`PortError::NotLoaded`]: crate::core::PortError::NotLoaded
pub trait ModelPort: Send {
    /// Acquires weights and tokenizer from the configuration the port was
    /// built with. Calling it again after success is a no-op.
    fn load_model(&mut self) -> Result<()>;

    fn is_loaded(&self) -> bool;

    fn get_model_info(&self) -> Result<ModelInfo>;

    /// Encodes `text` into model inputs holding at most `max_length` ids.
    fn tokenize(&self, text: &str, max_length: usize) -> Result<TokenizedInput>;

    /// Runs the model over `inputs`. The returned logits have one row per
    /// input token.
    fn forward(&mut self, inputs: &TokenizedInput) -> Result<ModelOutputs>;

    fn convert_ids_to_tokens(&self, ids: &[TokenId]) -> Result<Vec<String>>;

    /// Text for a single id with special tokens stripped.
    fn decode_token(&self, id: TokenId) -> Result<String>;

    /// Text for a sequence of ids with special tokens stripped.
    fn decode_sequence(&self, ids: &[TokenId]) -> Result<String>;

    fn eos_token_id(&self) -> Result<TokenId>;

    /// Maximum number of tokens a single forward pass accepts.
    fn context_length(&self) -> Result<usize>;

    fn device(&self) -> Result<Device>;
}

impl<P: ModelPort + ?Sized> ModelPort for Box<P> {
    fn load_model(&mut self) -> Result<()> {
        (**self).load_model()
    }

    fn is_loaded(&self) -> bool {
        (**self).is_loaded()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        (**self).get_model_info()
    }

    fn tokenize(&self, text: &str, max_length: usize) -> Result<TokenizedInput> {
        (**self).tokenize(text, max_length)
    }

    fn forward(&mut self, inputs: &TokenizedInput) -> Result<ModelOutputs> {
        (**self).forward(inputs)
    }

    fn convert_ids_to_tokens(&self, ids: &[TokenId]) -> Result<Vec<String>> {
        (**self).convert_ids_to_tokens(ids)
    }

    fn decode_token(&self, id: TokenId) -> Result<String> {
        (**self).decode_token(id)
    }

    fn decode_sequence(&self, ids: &[TokenId]) -> Result<String> {
        (**self).decode_sequence(ids)
    }

    fn eos_token_id(&self) -> Result<TokenId> {
        (**self).eos_token_id()
    }

    fn context_length(&self) -> Result<usize> {
        (**self).context_length()
    }

    fn device(&self) -> Result<Device> {
        (**self).device()
    }
}
