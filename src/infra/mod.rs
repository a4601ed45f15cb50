pub mod gguf;
pub mod llama;
pub mod tokenizer;

pub use gguf::GgufSummary;
pub use llama::LlamaPort;
pub use tokenizer::HfTokenizer;
