//! A one-layer llama GGUF and a matching word-level tokenizer, small enough
//! to load and run in tests.

use candle_core::quantized::{gguf_file, GgmlDType, QTensor};
use candle_core::{DType, Device, Tensor};
use std::path::PathBuf;
use tempfile::TempDir;

pub const VOCAB_SIZE: usize = 5;
const EMBEDDING: usize = 8;
const FEED_FORWARD: usize = 16;

/// `<s>` = 0, `</s>` = 1, `<unk>` = 2, `hello` = 3, `world` = 4.
const TOKENIZER_JSON: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [
        {"id": 0, "content": "<s>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
        {"id": 1, "content": "</s>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
    ],
    "normalizer": null,
    "pre_tokenizer": {"type": "Whitespace"},
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": {"<s>": 0, "</s>": 1, "<unk>": 2, "hello": 3, "world": 4},
        "unk_token": "<unk>"
    }
}"#;

pub struct TinyLlama {
    _dir: TempDir,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

/// Metadata knobs the loader reacts to.
#[derive(Default)]
pub struct TinyLlamaOptions {
    pub native_context_length: Option<u32>,
    pub eos_token_id: Option<u32>,
}

fn weight(shape: &[usize], phase: f64) -> QTensor {
    let count: usize = shape.iter().product();
    let tensor = Tensor::arange(0f32, count as f32, &Device::Cpu)
        .and_then(|t| t.affine(0.37, phase))
        .and_then(|t| t.sin())
        .and_then(|t| t.reshape(shape))
        .unwrap();
    QTensor::quantize(&tensor, GgmlDType::F32).unwrap()
}

fn norm() -> QTensor {
    let ones = Tensor::ones(EMBEDDING, DType::F32, &Device::Cpu).unwrap();
    QTensor::quantize(&ones, GgmlDType::F32).unwrap()
}

pub fn tiny_llama(options: TinyLlamaOptions) -> TinyLlama {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("tiny-llama.gguf");
    let tokenizer_path = dir.path().join("tokenizer.json");

    let architecture = gguf_file::Value::String("llama".into());
    let name = gguf_file::Value::String("tiny-llama".into());
    let heads = gguf_file::Value::U32(2);
    let blocks = gguf_file::Value::U32(1);
    let embedding = gguf_file::Value::U32(EMBEDDING as u32);
    let rope_dim = gguf_file::Value::U32(4);
    let eps = gguf_file::Value::F32(1e-5);
    let context = options.native_context_length.map(gguf_file::Value::U32);
    let eos = options.eos_token_id.map(gguf_file::Value::U32);

    let mut metadata = vec![
        ("general.architecture", &architecture),
        ("general.name", &name),
        ("llama.attention.head_count", &heads),
        ("llama.attention.head_count_kv", &heads),
        ("llama.block_count", &blocks),
        ("llama.embedding_length", &embedding),
        ("llama.rope.dimension_count", &rope_dim),
        ("llama.attention.layer_norm_rms_epsilon", &eps),
    ];
    if let Some(context) = &context {
        metadata.push(("llama.context_length", context));
    }
    if let Some(eos) = &eos {
        metadata.push(("tokenizer.ggml.eos_token_id", eos));
    }

    let tensors = vec![
        ("token_embd.weight", weight(&[VOCAB_SIZE, EMBEDDING], 0.1)),
        ("output_norm.weight", norm()),
        ("output.weight", weight(&[VOCAB_SIZE, EMBEDDING], 0.2)),
        ("blk.0.attn_q.weight", weight(&[EMBEDDING, EMBEDDING], 0.3)),
        ("blk.0.attn_k.weight", weight(&[EMBEDDING, EMBEDDING], 0.4)),
        ("blk.0.attn_v.weight", weight(&[EMBEDDING, EMBEDDING], 0.5)),
        ("blk.0.attn_output.weight", weight(&[EMBEDDING, EMBEDDING], 0.6)),
        ("blk.0.ffn_gate.weight", weight(&[FEED_FORWARD, EMBEDDING], 0.7)),
        ("blk.0.ffn_down.weight", weight(&[EMBEDDING, FEED_FORWARD], 0.8)),
        ("blk.0.ffn_up.weight", weight(&[FEED_FORWARD, EMBEDDING], 0.9)),
        ("blk.0.attn_norm.weight", norm()),
        ("blk.0.ffn_norm.weight", norm()),
    ];
    let tensors: Vec<(&str, &QTensor)> = tensors.iter().map(|(n, t)| (*n, t)).collect();

    let mut file = std::fs::File::create(&model_path).unwrap();
    gguf_file::write(&mut file, &metadata, &tensors).unwrap();
    std::fs::write(&tokenizer_path, TOKENIZER_JSON).unwrap();

    TinyLlama {
        _dir: dir,
        model_path,
        tokenizer_path,
    }
}
