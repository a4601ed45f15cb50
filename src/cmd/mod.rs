use anyhow::{Context, Result};
use model_port::{ModelPort, TokenId};
use serde_json::{json, Value};

fn max_length_or_context(port: &dyn ModelPort, max_length: Option<usize>) -> Result<usize> {
    match max_length {
        Some(n) => Ok(n),
        None => Ok(port.context_length()?),
    }
}

pub fn info(port: &dyn ModelPort) -> Result<Value> {
    let info = port.get_model_info()?;
    Ok(serde_json::to_value(&info)?)
}

pub fn tokenize(port: &dyn ModelPort, text: &str, max_length: Option<usize>) -> Result<Value> {
    let max_length = max_length_or_context(port, max_length)?;
    let inputs = port.tokenize(text, max_length)?;
    let ids = inputs.ids()?;
    let tokens = port.convert_ids_to_tokens(&ids)?;

    Ok(json!({
        "max_length": max_length,
        "ids": ids,
        "tokens": tokens,
    }))
}

pub fn forward(port: &mut dyn ModelPort, text: &str, max_length: Option<usize>) -> Result<Value> {
    let max_length = max_length_or_context(port, max_length)?;
    let inputs = port.tokenize(text, max_length)?;
    let ids = inputs.ids()?;
    let outputs = port.forward(&inputs)?;

    let argmax: Vec<TokenId> = outputs
        .logits()
        .argmax(1)
        .and_then(|t| t.to_vec1())
        .context("reading logits")?;
    let positions = ids
        .iter()
        .zip(&argmax)
        .map(|(&id, &top)| -> Result<Value> {
            Ok(json!({
                "id": id,
                "text": port.decode_token(id)?,
                "argmax_id": top,
                "argmax_text": port.decode_token(top)?,
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(json!({
        "logits_shape": outputs.logits().dims(),
        "eos_token_id": port.eos_token_id()?,
        "positions": positions,
    }))
}

pub fn decode(port: &dyn ModelPort, ids: &[TokenId], each: bool) -> Result<Value> {
    if each {
        let pieces = ids
            .iter()
            .map(|&id| port.decode_token(id))
            .collect::<model_port::Result<Vec<_>>>()?;
        return Ok(json!({ "pieces": pieces }));
    }
    Ok(json!({ "text": port.decode_sequence(ids)? }))
}

pub fn tokens(port: &dyn ModelPort, ids: &[TokenId]) -> Result<Value> {
    Ok(json!({ "tokens": port.convert_ids_to_tokens(ids)? }))
}
