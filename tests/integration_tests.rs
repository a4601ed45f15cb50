mod common;

use model_port::{FakeConfig, FakeModelPort, ModelPort, PortError};

/// Behaviour every loaded port must show, whatever backs it.
fn check_loaded_contract(port: &mut dyn ModelPort) {
    let device = port.device().unwrap();
    let eos = port.eos_token_id().unwrap();
    let ctx = port.context_length().unwrap();
    assert!(ctx > 0);

    for _ in 0..3 {
        assert_eq!(port.device().unwrap(), device);
        assert_eq!(port.eos_token_id().unwrap(), eos);
        assert_eq!(port.context_length().unwrap(), ctx);
    }

    let inputs = port.tokenize("hello", 5).unwrap();
    let n = inputs.num_tokens().unwrap();
    assert!(n <= 5);

    let outputs = port.forward(&inputs).unwrap();
    assert_eq!(outputs.logits().dims()[0], n);

    let ids = inputs.ids().unwrap();
    assert_eq!(port.convert_ids_to_tokens(&ids).unwrap().len(), ids.len());

    let text = port.decode_sequence(&ids).unwrap();
    assert_eq!(text, port.decode_sequence(&ids).unwrap());
    let again = port.tokenize(&text, ctx).unwrap().ids().unwrap();
    assert!(port.convert_ids_to_tokens(&again).is_ok());
}

mod test_fake_port {
    use super::*;

    #[test]
    fn test_contract_holds() {
        let mut port = FakeModelPort::loaded(FakeConfig::default()).unwrap();
        check_loaded_contract(&mut port);
    }

    #[test]
    fn test_contract_holds_with_bos_and_tight_context() {
        let mut port = FakeModelPort::loaded(FakeConfig {
            add_bos: true,
            context_length: 4,
            ..FakeConfig::default()
        })
        .unwrap();
        check_loaded_contract(&mut port);
    }

    #[test]
    fn test_boxed_port_is_interchangeable() {
        let mut port: Box<dyn ModelPort> = Box::new(FakeModelPort::default());
        assert!(matches!(port.tokenize("hello", 5), Err(PortError::NotLoaded { .. })));
        port.load_model().unwrap();
        check_loaded_contract(port.as_mut());

        let info = port.get_model_info().unwrap();
        assert_eq!(info.get_str("name"), Some("fake-model"));
        assert_eq!(info.get_str("device"), Some("cpu"));
    }
}

mod test_llama_port {
    use super::check_loaded_contract;
    use crate::common::{tiny_llama, TinyLlama, TinyLlamaOptions, VOCAB_SIZE};
    use candle_transformers::models::quantized_llama::MAX_SEQ_LEN;
    use model_port::{Device, LlamaPort, ModelPort, PortConfig, PortError, Truncation};

    fn config(model: &TinyLlama) -> model_port::envconfig::PortConfigBuilder {
        PortConfig::builder()
            .model_path(model.model_path.clone())
            .tokenizer_path(model.tokenizer_path.clone())
            .device(Device::Cpu)
            .context_length(64)
    }

    fn loaded(model: &TinyLlama) -> LlamaPort {
        let mut port = LlamaPort::new(config(model).build().unwrap()).unwrap();
        port.load_model().unwrap();
        port
    }

    fn with_eos() -> TinyLlamaOptions {
        TinyLlamaOptions {
            eos_token_id: Some(1),
            ..TinyLlamaOptions::default()
        }
    }

    #[test]
    fn test_unloaded_operations_fail() {
        let config = PortConfig::builder()
            .model_path("/nonexistent/model.gguf")
            .tokenizer_path("/nonexistent/tokenizer.json")
            .device(Device::Cpu)
            .build()
            .unwrap();
        let mut port = LlamaPort::new(config).unwrap();

        assert!(matches!(port.context_length(), Err(PortError::NotLoaded { .. })));
        assert!(matches!(port.load_model(), Err(PortError::ModelLoad(_))));
        assert!(matches!(port.device(), Err(PortError::NotLoaded { .. })));
    }

    #[test]
    fn test_contract_holds() {
        let model = tiny_llama(with_eos());
        let mut port = loaded(&model);
        check_loaded_contract(&mut port);
    }

    #[test]
    fn test_forward_returns_a_row_per_token() {
        let model = tiny_llama(with_eos());
        let mut port = loaded(&model);

        let inputs = port.tokenize("hello world hello", 64).unwrap();
        assert_eq!(inputs.ids().unwrap(), vec![3, 4, 3]);
        let outputs = port.forward(&inputs).unwrap();
        assert_eq!(outputs.logits().dims(), &[3, VOCAB_SIZE]);
    }

    #[test]
    fn test_forward_restarts_from_an_empty_cache() {
        let model = tiny_llama(with_eos());
        let mut port = loaded(&model);

        let long = port.tokenize("hello world", 64).unwrap();
        let short = port.tokenize("hello", 64).unwrap();

        let first = port.forward(&long).unwrap().logits().to_vec2::<f32>().unwrap();
        let again = port.forward(&long).unwrap().logits().to_vec2::<f32>().unwrap();
        assert_eq!(first, again);

        // Causal attention: the first row only sees the first token.
        let prefix = port.forward(&short).unwrap().logits().to_vec2::<f32>().unwrap();
        for (a, b) in prefix[0].iter().zip(&first[0]) {
            assert!((a - b).abs() < 1e-5, "{} != {}", a, b);
        }
    }

    #[test]
    fn test_model_info_describes_the_loaded_model() {
        let model = tiny_llama(TinyLlamaOptions {
            native_context_length: Some(128),
            eos_token_id: Some(1),
        });
        let port = loaded(&model);
        let info = port.get_model_info().unwrap();

        assert_eq!(info.get_str("name"), Some("tiny-llama"));
        assert_eq!(info.get_str("backend"), Some("candle-quantized-llama"));
        assert_eq!(info.get_str("device"), Some("cpu"));
        assert_eq!(info.get_str("architecture"), Some("llama"));
        assert_eq!(info.get_u64("context_length"), Some(64));
        assert_eq!(info.get_u64("native_context_length"), Some(128));
        assert_eq!(info.get_u64("vocab_size"), Some(VOCAB_SIZE as u64));
        assert_eq!(info.get_u64("eos_token_id"), Some(1));
        assert!(info.contains_key("model_path"));
        assert!(info.contains_key("tokenizer_path"));
    }

    #[test]
    fn test_tokenize_truncation_policies() {
        let model = tiny_llama(with_eos());
        let port = loaded(&model);
        let ids = port.tokenize("hello world hello world", 2).unwrap().ids().unwrap();
        assert_eq!(ids, vec![3, 4]);

        let mut strict = LlamaPort::new(config(&model).truncation(Truncation::Error).build().unwrap()).unwrap();
        strict.load_model().unwrap();
        assert!(matches!(
            strict.tokenize("hello world hello world", 2),
            Err(PortError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decoding_skips_special_tokens() {
        let model = tiny_llama(with_eos());
        let port = loaded(&model);

        assert_eq!(port.decode_sequence(&[0, 3, 4, 1]).unwrap(), "hello world");
        assert_eq!(port.decode_token(4).unwrap(), "world");
        assert_eq!(port.decode_token(1).unwrap(), "");
        assert_eq!(port.convert_ids_to_tokens(&[0, 3]).unwrap(), vec!["<s>", "hello"]);
        assert!(matches!(port.decode_token(99), Err(PortError::InvalidInput(_))));
    }

    #[test]
    fn test_configured_eos_token_wins() {
        let model = tiny_llama(TinyLlamaOptions {
            eos_token_id: Some(0),
            ..TinyLlamaOptions::default()
        });
        let mut port = LlamaPort::new(config(&model).eos_token("</s>").build().unwrap()).unwrap();
        port.load_model().unwrap();
        assert_eq!(port.eos_token_id().unwrap(), 1);
    }

    #[test]
    fn test_eos_falls_back_to_model_metadata() {
        let model = tiny_llama(with_eos());
        assert_eq!(loaded(&model).eos_token_id().unwrap(), 1);
    }

    #[test]
    fn test_missing_eos_is_a_load_error() {
        let model = tiny_llama(TinyLlamaOptions::default());
        let mut port = LlamaPort::new(config(&model).build().unwrap()).unwrap();
        assert!(matches!(port.load_model(), Err(PortError::ModelLoad(_))));
        assert!(!port.is_loaded());

        let mut unknown = LlamaPort::new(config(&model).eos_token("<eot>").build().unwrap()).unwrap();
        assert!(matches!(unknown.load_model(), Err(PortError::ModelLoad(_))));
    }

    #[test]
    fn test_context_length_is_capped_by_the_model() {
        let model = tiny_llama(TinyLlamaOptions {
            native_context_length: Some(16),
            eos_token_id: Some(1),
        });
        let mut port = LlamaPort::new(config(&model).context_length(8192).build().unwrap()).unwrap();
        port.load_model().unwrap();

        assert_eq!(port.context_length().unwrap(), 16);
        let info = port.get_model_info().unwrap();
        assert_eq!(info.get_u64("context_length"), Some(16));
        assert_eq!(info.get_u64("configured_context_length"), Some(8192));

        let text = vec!["hello"; 40].join(" ");
        let inputs = port.tokenize(&text, 8192).unwrap();
        assert_eq!(inputs.num_tokens().unwrap(), 16);
        assert_eq!(port.forward(&inputs).unwrap().num_tokens(), 16);
    }

    #[test]
    fn test_context_length_is_capped_by_the_rotary_table() {
        let model = tiny_llama(TinyLlamaOptions {
            native_context_length: Some(8192),
            eos_token_id: Some(1),
        });
        let mut port = LlamaPort::new(config(&model).context_length(8192).build().unwrap()).unwrap();
        port.load_model().unwrap();
        assert_eq!(port.context_length().unwrap(), MAX_SEQ_LEN);

        let without_native = tiny_llama(with_eos());
        let mut port = LlamaPort::new(config(&without_native).context_length(8192).build().unwrap()).unwrap();
        port.load_model().unwrap();
        assert_eq!(port.context_length().unwrap(), MAX_SEQ_LEN);
    }
}
