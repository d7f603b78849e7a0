//! Contract bindings and the token creation artifact.

use std::path::Path;

use alloy::primitives::{Address, Bytes};
use alloy::sol;
use alloy::sol_types::SolValue;
use serde_json::Value;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IModelRegistry {
        function registerModel(string modelId, address tokenAddress, string metricName, string mlflowRunId) external;
        function isModelRegistered(string modelId) external view returns (bool);
        function getToken(string modelId) external view returns (address);
    }
}

/// ABI-encode the token constructor `(string name, string symbol, address controller)`.
pub fn encode_token_constructor(name: &str, symbol: &str, controller: Address) -> Bytes {
    Bytes::from((name.to_string(), symbol.to_string(), controller).abi_encode_params())
}

/// Load token creation bytecode from `path`.
///
/// Accepts a plain hex file or a compiler artifact with a `bytecode` field
/// (either a string or `{ "object": "..." }`).
pub fn load_bytecode(path: &Path) -> BlockchainResult<Bytes> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BlockchainError::InvalidContract(format!("cannot read bytecode {}: {}", path.display(), e))
    })?;
    parse_bytecode(&content)
        .map_err(|e| BlockchainError::InvalidContract(format!("{}: {}", path.display(), e)))
}

fn parse_bytecode(content: &str) -> Result<Bytes, String> {
    let content = content.trim();

    let hex_str = if content.starts_with('{') {
        let artifact: Value = serde_json::from_str(content).map_err(|e| format!("invalid artifact: {}", e))?;
        let bytecode = &artifact["bytecode"];
        bytecode
            .as_str()
            .or_else(|| bytecode["object"].as_str())
            .ok_or("artifact has no bytecode field")?
            .to_string()
    } else {
        content.to_string()
    };

    let bytes = alloy::hex::decode(hex_str.trim()).map_err(|e| format!("invalid hex: {}", e))?;
    if bytes.is_empty() {
        return Err("bytecode is empty".to_string());
    }
    Ok(Bytes::from(bytes))
}

/// Parse a configured contract address.
pub fn parse_address(field: &str, value: &str) -> BlockchainResult<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| BlockchainError::InvalidContract(format!("{} '{}': {}", field, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_constructor_encoding_layout() {
        let controller = Address::repeat_byte(0x22);
        let encoded = encode_token_constructor("Hokusai Sentiment", "HK1", controller);

        // Two dynamic offsets plus the static address, then two length-prefixed strings.
        assert_eq!(encoded.len(), 32 * 3 + 64 + 64);
        assert_eq!(&encoded[64 + 12..96], controller.as_slice());

        let decoded = <(String, String, Address)>::abi_decode_params(&encoded).unwrap();
        assert_eq!(decoded.0, "Hokusai Sentiment");
        assert_eq!(decoded.1, "HK1");
        assert_eq!(decoded.2, controller);
    }

    #[test]
    fn test_parse_plain_hex() {
        assert_eq!(parse_bytecode("0x6080\n").unwrap(), Bytes::from_static(&[0x60, 0x80]));
        assert_eq!(parse_bytecode("6080").unwrap(), Bytes::from_static(&[0x60, 0x80]));
    }

    #[test]
    fn test_parse_artifacts() {
        let hardhat = r#"{"contractName":"HokusaiToken","bytecode":"0x6080"}"#;
        assert_eq!(parse_bytecode(hardhat).unwrap().len(), 2);

        let foundry = r#"{"bytecode":{"object":"0x608060"}}"#;
        assert_eq!(parse_bytecode(foundry).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_bytecode("0xzz").is_err());
        assert!(parse_bytecode("0x").is_err());
        assert!(parse_bytecode(r#"{"abi":[]}"#).is_err());
    }

    #[test]
    fn test_load_bytecode_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "0x60806040").unwrap();
        assert_eq!(load_bytecode(file.path()).unwrap().len(), 4);

        let err = load_bytecode(Path::new("/nonexistent/token.bin")).unwrap_err();
        assert!(err.to_string().contains("cannot read bytecode"));
    }

    #[test]
    fn test_parse_address() {
        let address = parse_address("registry", "0x742d35Cc6634C0532925a3b844Bc9e7595f2bD3e").unwrap();
        assert_ne!(address, Address::ZERO);
        assert!(parse_address("registry", "0x1234").is_err());
    }
}
