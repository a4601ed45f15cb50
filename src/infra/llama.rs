use crate::core::tokenizer::check_tokenize_args;
use crate::core::{
    Device, ModelInfo, ModelOutputs, ModelPort, PortError, Result, TokenId, TokenizedInput,
};
use crate::envconfig::PortConfig;
use crate::infra::gguf::{self, GgufSummary};
use crate::infra::tokenizer::HfTokenizer;
use candle_core::{DType, Tensor};
use candle_transformers::models::quantized_llama::{ModelWeights, MAX_SEQ_LEN};
use std::time::Instant;

struct LoadedModel {
    weights: ModelWeights,
    tokenizer: HfTokenizer,
    device: candle_core::Device,
    summary: GgufSummary,
    eos_token_id: TokenId,
    context_length: usize,
}

/// Port backed by candle's quantized llama weights (GGUF) and a Hugging Face
/// tokenizer.
pub struct LlamaPort {
    config: PortConfig,
    loaded: Option<LoadedModel>,
}

impl LlamaPort {
    /// Fails with a configuration error when the weights or tokenizer path is
    /// missing. Nothing is read from disk until `load_model`.
    pub fn new(config: PortConfig) -> Result<Self> {
        config.validate()?;
        config.require_paths()?;
        Ok(Self {
            config,
            loaded: None,
        })
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    fn loaded(&self, operation: &'static str) -> Result<&LoadedModel> {
        self.loaded.as_ref().ok_or(PortError::not_loaded(operation))
    }

    fn resolve_eos(&self, tokenizer: &HfTokenizer, summary: &GgufSummary) -> Result<TokenId> {
        if let Some(token) = &self.config.eos_token {
            return tokenizer
                .token_to_id(token)
                .ok_or_else(|| PortError::load(format!("EOS token `{}` is not in the tokenizer", token)));
        }
        summary
            .eos_token_id
            .ok_or_else(|| PortError::load("model file does not declare an EOS token; set eos_token"))
    }

    /// The configured context, capped by the model's native context and by
    /// the rotary table the quantized weights precompute.
    fn effective_context_length(&self, summary: &GgufSummary) -> usize {
        let supported = summary
            .native_context_length
            .map_or(MAX_SEQ_LEN, |native| (native as usize).min(MAX_SEQ_LEN));
        let configured = self.config.context_length;
        if configured > supported {
            tracing::warn!(
                configured,
                supported,
                native = ?summary.native_context_length,
                "configured context length exceeds what the model supports; clamping"
            );
        }
        configured.min(supported)
    }
}

impl ModelPort for LlamaPort {
    fn load_model(&mut self) -> Result<()> {
        if self.loaded.is_some() {
            tracing::debug!("model already loaded");
            return Ok(());
        }

        let start = Instant::now();
        let (model_path, tokenizer_path) = self.config.require_paths()?;

        let requested = self.config.device.resolve();
        let device = requested.to_candle()?;
        tracing::info!(model = %model_path.display(), device = %requested, "loading model");

        let (content, mut reader) = gguf::read_content(model_path)?;
        let summary = GgufSummary::from_content(&content);
        let weights = ModelWeights::from_gguf(content, &mut reader, &device).map_err(PortError::load)?;

        let tokenizer = HfTokenizer::from_file(tokenizer_path)?;
        let eos_token_id = self.resolve_eos(&tokenizer, &summary)?;

        let context_length = self.effective_context_length(&summary);

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            vocab_size = tokenizer.vocab_size(),
            eos_token_id,
            context_length,
            "model loaded"
        );

        self.loaded = Some(LoadedModel {
            weights,
            tokenizer,
            device,
            summary,
            eos_token_id,
            context_length,
        });
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let loaded = self.loaded("get_model_info")?;
        let mut info = ModelInfo::new();

        let name = self
            .config
            .display_name()
            .or_else(|| loaded.summary.name.clone())
            .unwrap_or_default();
        info.insert("name", name)
            .insert("backend", "candle-quantized-llama")
            .insert("device", Device::from_candle(&loaded.device).to_string())
            .insert("context_length", loaded.context_length)
            .insert("configured_context_length", self.config.context_length)
            .insert("vocab_size", loaded.tokenizer.vocab_size())
            .insert("eos_token_id", loaded.eos_token_id);
        if let Some(path) = &self.config.model_path {
            info.insert("model_path", path.display().to_string());
        }
        if let Some(path) = &self.config.tokenizer_path {
            info.insert("tokenizer_path", path.display().to_string());
        }
        loaded.summary.fill_info(&mut info);

        Ok(info)
    }

    fn tokenize(&self, text: &str, max_length: usize) -> Result<TokenizedInput> {
        let loaded = self.loaded("tokenize")?;
        let limit = check_tokenize_args(text, max_length, loaded.context_length)?;

        let ids = loaded.tokenizer.encode(text, self.config.add_special_tokens)?;
        if ids.is_empty() {
            return Err(PortError::invalid("text produced no tokens"));
        }
        let ids = self.config.truncation.apply(ids, limit)?;

        tracing::debug!(tokens = ids.len(), max_length, "tokenized");
        TokenizedInput::from_ids(&ids, &loaded.device)
    }

    fn forward(&mut self, inputs: &TokenizedInput) -> Result<ModelOutputs> {
        let loaded = self.loaded.as_mut().ok_or(PortError::not_loaded("forward"))?;
        let ids = inputs.validate(&loaded.device, loaded.context_length)?;

        let start = Instant::now();
        // The quantized weights only return logits for the last position, so
        // the sequence is fed one position at a time. Position 0 resets the
        // KV cache.
        let mut rows = Vec::with_capacity(ids.len());
        for (pos, &id) in ids.iter().enumerate() {
            let input = Tensor::new(&[id], &loaded.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(PortError::inference)?;
            let logits = loaded
                .weights
                .forward(&input, pos)
                .and_then(|l| l.squeeze(0))
                .and_then(|l| l.to_dtype(DType::F32))
                .map_err(PortError::inference)?;
            rows.push(logits);
        }
        let logits = Tensor::stack(&rows, 0).map_err(PortError::inference)?;

        tracing::debug!(
            tokens = ids.len(),
            shape = ?logits.dims(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "forward pass"
        );
        ModelOutputs::new(logits)
    }

    fn convert_ids_to_tokens(&self, ids: &[TokenId]) -> Result<Vec<String>> {
        let loaded = self.loaded("convert_ids_to_tokens")?;
        ids.iter().map(|&id| loaded.tokenizer.id_to_token(id)).collect()
    }

    fn decode_token(&self, id: TokenId) -> Result<String> {
        self.loaded("decode_token")?.tokenizer.decode(&[id])
    }

    fn decode_sequence(&self, ids: &[TokenId]) -> Result<String> {
        self.loaded("decode_sequence")?.tokenizer.decode(ids)
    }

    fn eos_token_id(&self) -> Result<TokenId> {
        Ok(self.loaded("eos_token_id")?.eos_token_id)
    }

    fn context_length(&self) -> Result<usize> {
        Ok(self.loaded("context_length")?.context_length)
    }

    fn device(&self) -> Result<Device> {
        Ok(Device::from_candle(&self.loaded("device")?.device))
    }
}
