pub mod error;
pub mod port;
pub mod tensor;
pub mod tokenizer;
pub mod types;

pub use error::{PortError, Result};
pub use port::ModelPort;
pub use tensor::Device;
pub use tokenizer::{TokenId, Truncation, Vocabulary};
pub use types::{ModelInfo, ModelOutputs, TokenizedInput};
