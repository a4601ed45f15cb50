use crate::core::tokenizer::TokenId;
use crate::core::{PortError, Result};
use candle_core::{DType, Tensor};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

pub const INPUT_IDS: &str = "input_ids";
pub const ATTENTION_MASK: &str = "attention_mask";

/// Backend-defined description of the loaded model and its environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ModelInfo {
    entries: HashMap<String, Value>,
}

impl ModelInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.as_u64())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

/// Model-ready tensors keyed by name, as produced by `ModelPort::tokenize`.
#[derive(Debug, Clone, Default)]
pub struct TokenizedInput {
    tensors: HashMap<String, Tensor>,
}

impl TokenizedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// `input_ids` plus an all-ones `attention_mask`, both rank 1 `u32`.
    pub fn from_ids(ids: &[TokenId], device: &candle_core::Device) -> Result<Self> {
        let input_ids = Tensor::new(ids, device).map_err(PortError::inference)?;
        let mask = Tensor::ones(ids.len(), DType::U32, device).map_err(PortError::inference)?;

        let mut input = Self::new();
        input.insert(INPUT_IDS, input_ids);
        input.insert(ATTENTION_MASK, mask);
        Ok(input)
    }

    pub fn insert(&mut self, key: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        self.tensors.insert(key.into(), tensor)
    }

    pub fn get(&self, key: &str) -> Option<&Tensor> {
        self.tensors.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(|k| k.as_str())
    }

    pub fn input_ids(&self) -> Result<&Tensor> {
        self.get(INPUT_IDS)
            .ok_or_else(|| PortError::inference(format!("inputs are missing `{}`", INPUT_IDS)))
    }

    pub fn attention_mask(&self) -> Option<&Tensor> {
        self.get(ATTENTION_MASK)
    }

    pub fn num_tokens(&self) -> Result<usize> {
        let input_ids = self.input_ids()?;
        if input_ids.rank() != 1 {
            return Err(PortError::inference(format!(
                "`input_ids` must be rank 1, got shape {:?}",
                input_ids.dims()
            )));
        }
        input_ids.dim(0).map_err(PortError::inference)
    }

    /// Copies `input_ids` back to the host.
    pub fn ids(&self) -> Result<Vec<TokenId>> {
        self.input_ids()?.to_vec1::<u32>().map_err(PortError::inference)
    }

    /// Shape, dtype and device checks every `forward` performs before touching
    /// the backend. Returns the validated ids.
    pub fn validate(&self, device: &candle_core::Device, context_length: usize) -> Result<Vec<TokenId>> {
        let input_ids = self.input_ids()?;

        if input_ids.rank() != 1 {
            return Err(PortError::inference(format!(
                "`input_ids` must be rank 1, got shape {:?}",
                input_ids.dims()
            )));
        }
        if input_ids.dtype() != DType::U32 {
            return Err(PortError::inference(format!(
                "`input_ids` must be u32, got {:?}",
                input_ids.dtype()
            )));
        }
        if !input_ids.device().same_device(device) {
            return Err(PortError::inference(format!(
                "`input_ids` live on {:?}, model runs on {:?}",
                input_ids.device().location(),
                device.location()
            )));
        }

        let len = input_ids.dim(0).map_err(PortError::inference)?;
        if len == 0 {
            return Err(PortError::inference("`input_ids` is empty"));
        }
        if len > context_length {
            return Err(PortError::inference(format!(
                "{} tokens exceed the context length of {}",
                len, context_length
            )));
        }

        if let Some(mask) = self.attention_mask() {
            if mask.dims() != [len] {
                return Err(PortError::inference(format!(
                    "`attention_mask` shape {:?} does not match {} input ids",
                    mask.dims(),
                    len
                )));
            }
            // Neither backend can skip positions, so only all-ones masks run.
            if mask.dtype() != DType::U32 {
                return Err(PortError::inference(format!(
                    "`attention_mask` must be u32, got {:?}",
                    mask.dtype()
                )));
            }
            let values = mask.to_vec1::<u32>().map_err(PortError::inference)?;
            if let Some(pos) = values.iter().position(|&v| v != 1) {
                return Err(PortError::inference(format!(
                    "`attention_mask` masks position {}; padded inputs are not supported",
                    pos
                )));
            }
        }

        self.ids()
    }
}

/// Result of a forward pass. `logits` has shape `(num_tokens, vocab_size)`;
/// anything in `extra` is backend-specific.
#[derive(Debug, Clone)]
pub struct ModelOutputs {
    logits: Tensor,
    extra: HashMap<String, Tensor>,
}

impl ModelOutputs {
    pub fn new(logits: Tensor) -> Result<Self> {
        if logits.rank() != 2 {
            return Err(PortError::inference(format!(
                "logits must be (tokens, vocab), got shape {:?}",
                logits.dims()
            )));
        }
        Ok(Self {
            logits,
            extra: HashMap::new(),
        })
    }

    pub fn with_extra(mut self, key: impl Into<String>, tensor: Tensor) -> Self {
        self.extra.insert(key.into(), tensor);
        self
    }

    pub fn logits(&self) -> &Tensor {
        &self.logits
    }

    pub fn into_logits(self) -> Tensor {
        self.logits
    }

    pub fn num_tokens(&self) -> usize {
        self.logits.dims()[0]
    }

    pub fn vocab_size(&self) -> usize {
        self.logits.dims()[1]
    }

    pub fn extra(&self, key: &str) -> Option<&Tensor> {
        self.extra.get(key)
    }
}
