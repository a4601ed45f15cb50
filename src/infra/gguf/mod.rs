use crate::core::{ModelInfo, PortError, Result, TokenId};
use candle_core::quantized::gguf_file::{Content, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Quantization scheme named by `general.file_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    F32,
    F16,
    Q4_0,
    Q4_1,
    Q8_0,
    Q5_0,
    Q5_1,
    Q2K,
    Q3KS,
    Q3KM,
    Q3KL,
    Q4KS,
    Q4KM,
    Q5KS,
    Q5KM,
    Q6K,
    BF16,
}

impl FileType {
    pub fn from_u32(value: u32) -> Option<Self> {
        let file_type = match value {
            0 => FileType::F32,
            1 => FileType::F16,
            2 => FileType::Q4_0,
            3 => FileType::Q4_1,
            7 => FileType::Q8_0,
            8 => FileType::Q5_0,
            9 => FileType::Q5_1,
            10 => FileType::Q2K,
            11 => FileType::Q3KS,
            12 => FileType::Q3KM,
            13 => FileType::Q3KL,
            14 => FileType::Q4KS,
            15 => FileType::Q4KM,
            16 => FileType::Q5KS,
            17 => FileType::Q5KM,
            18 => FileType::Q6K,
            32 => FileType::BF16,
            _ => return None,
        };
        Some(file_type)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileType::F32 => "F32",
            FileType::F16 => "F16",
            FileType::Q4_0 => "Q4_0",
            FileType::Q4_1 => "Q4_1",
            FileType::Q8_0 => "Q8_0",
            FileType::Q5_0 => "Q5_0",
            FileType::Q5_1 => "Q5_1",
            FileType::Q2K => "Q2_K",
            FileType::Q3KS => "Q3_K_S",
            FileType::Q3KM => "Q3_K_M",
            FileType::Q3KL => "Q3_K_L",
            FileType::Q4KS => "Q4_K_S",
            FileType::Q4KM => "Q4_K_M",
            FileType::Q5KS => "Q5_K_S",
            FileType::Q5KM => "Q5_K_M",
            FileType::Q6K => "Q6_K",
            FileType::BF16 => "BF16",
        }
    }
}

/// Header values the port reports or depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GgufSummary {
    pub architecture: Option<String>,
    pub name: Option<String>,
    pub native_context_length: Option<u64>,
    pub vocab_size: Option<usize>,
    pub eos_token_id: Option<TokenId>,
    pub bos_token_id: Option<TokenId>,
    pub file_type: Option<FileType>,
    pub tensor_count: usize,
}

impl GgufSummary {
    pub fn from_content(content: &Content) -> Self {
        let mut summary = Self::from_metadata(&content.metadata);
        summary.tensor_count = content.tensor_infos.len();
        summary
    }

    pub fn from_metadata(metadata: &HashMap<String, Value>) -> Self {
        let string = |key: &str| metadata.get(key).and_then(|v| v.to_string().ok()).cloned();
        let uint = |key: &str| metadata.get(key).and_then(as_u64);

        let architecture = string("general.architecture");
        let native_context_length = architecture
            .as_ref()
            .and_then(|arch| uint(&format!("{}.context_length", arch)));

        Self {
            name: string("general.name"),
            native_context_length,
            vocab_size: metadata
                .get("tokenizer.ggml.tokens")
                .and_then(|v| v.to_vec().ok())
                .map(|tokens| tokens.len()),
            eos_token_id: uint("tokenizer.ggml.eos_token_id").map(|id| id as TokenId),
            bos_token_id: uint("tokenizer.ggml.bos_token_id").map(|id| id as TokenId),
            file_type: uint("general.file_type").and_then(|t| FileType::from_u32(t as u32)),
            tensor_count: 0,
            architecture,
        }
    }

    pub fn fill_info(&self, info: &mut ModelInfo) {
        if let Some(arch) = &self.architecture {
            info.insert("architecture", arch.as_str());
        }
        if let Some(ctx) = self.native_context_length {
            info.insert("native_context_length", ctx);
        }
        if let Some(file_type) = self.file_type {
            info.insert("quantization", file_type.name());
        }
        info.insert("tensor_count", self.tensor_count);
    }
}

/// Integer metadata is stored with whatever width the converter chose.
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::U8(v) => Some(*v as u64),
        Value::U16(v) => Some(*v as u64),
        Value::U32(v) => Some(*v as u64),
        Value::U64(v) => Some(*v),
        Value::I8(v) if *v >= 0 => Some(*v as u64),
        Value::I16(v) if *v >= 0 => Some(*v as u64),
        Value::I32(v) if *v >= 0 => Some(*v as u64),
        Value::I64(v) if *v >= 0 => Some(*v as u64),
        _ => None,
    }
}

/// Opens `path` and parses the GGUF header. The returned reader is positioned
/// for tensor loading.
pub fn read_content(path: &Path) -> Result<(Content, BufReader<File>)> {
    let file = File::open(path).map_err(|e| PortError::load(format!("{}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);
    let content = Content::read(&mut reader)
        .map_err(|e| PortError::load(format!("{} is not a readable GGUF file: {}", path.display(), e)))?;
    Ok((content, reader))
}
