pub mod core;
pub mod envconfig;
pub mod fake;
pub mod infra;
pub mod utils;

pub use crate::core::{
    Device, ModelInfo, ModelOutputs, ModelPort, PortError, Result, TokenId, TokenizedInput, Truncation,
    Vocabulary,
};

pub use crate::envconfig::{DeviceRequest, PortConfig};
pub use crate::fake::{FakeConfig, FakeModelPort};
pub use crate::infra::LlamaPort;
