use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bech32::{Bech32, Hrp};
use sha2::{Digest, Sha256};

use crate::client::BoxError;
use crate::types::ConsensusPubkey;

/// Check that an inbound address parameter is well-formed bech32 with the
/// expected prefix. Nothing upstream is queried for a malformed address.
pub fn validate(address: &str, prefix: &str) -> Result<(), BoxError> {
    let (hrp, data) = bech32::decode(address)?;
    if hrp.as_str() != prefix {
        return Err(format!("expected bech32 prefix {prefix}, got {}", hrp.as_str()).into());
    }
    if data.len() != 20 {
        return Err(format!("expected 20-byte payload, got {}", data.len()).into());
    }
    Ok(())
}

/// Re-encode a validator operator address under the account prefix. Both
/// addressing domains carry the same 20-byte payload, so this yields the
/// validator's self-delegator wallet address.
pub fn account_address(operator: &str, account_prefix: &str) -> Result<String, BoxError> {
    let (_, data) = bech32::decode(operator)?;
    let hrp = Hrp::parse(account_prefix)?;
    Ok(bech32::encode::<Bech32>(hrp, &data)?)
}

/// Derive the bech32 consensus address from a validator's ed25519 consensus
/// pubkey: first 20 bytes of sha256(key). This is the join key against
/// signing infos, which live in a different addressing domain than the
/// operator address.
pub fn consensus_address(pubkey: &ConsensusPubkey, prefix: &str) -> Result<String, BoxError> {
    if !pubkey.type_url.ends_with("ed25519.PubKey") {
        return Err(format!("unsupported consensus key type {}", pubkey.type_url).into());
    }

    let key = BASE64.decode(&pubkey.key)?;
    let digest = Sha256::digest(&key);

    let hrp = Hrp::parse(prefix)?;
    Ok(bech32::encode::<Bech32>(hrp, &digest[..20])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(prefix: &str, payload: &[u8]) -> String {
        bech32::encode::<Bech32>(Hrp::parse(prefix).unwrap(), payload).unwrap()
    }

    #[test]
    fn accepts_well_formed_operator_address() {
        let addr = encode("cosmosvaloper", &[7u8; 20]);
        assert!(validate(&addr, "cosmosvaloper").is_ok());
    }

    #[test]
    fn rejects_wrong_prefix() {
        let addr = encode("osmovaloper", &[7u8; 20]);
        let err = validate(&addr, "cosmosvaloper").unwrap_err();
        assert!(err.to_string().contains("prefix"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(validate("not-an-address", "cosmos").is_err());
        assert!(validate("", "cosmos").is_err());
    }

    #[test]
    fn rejects_truncated_payload() {
        let addr = encode("cosmos", &[7u8; 10]);
        assert!(validate(&addr, "cosmos").is_err());
    }

    #[test]
    fn operator_address_reencodes_to_account_prefix() {
        let operator = encode("cosmosvaloper", &[7u8; 20]);
        let account = account_address(&operator, "cosmos").unwrap();
        assert_eq!(account, encode("cosmos", &[7u8; 20]));
        assert!(validate(&account, "cosmos").is_ok());
    }

    #[test]
    fn consensus_address_is_deterministic_and_valid() {
        let pubkey = ConsensusPubkey {
            type_url: "/cosmos.crypto.ed25519.PubKey".to_string(),
            key: BASE64.encode([42u8; 32]),
        };

        let first = consensus_address(&pubkey, "cosmosvalcons").unwrap();
        let second = consensus_address(&pubkey, "cosmosvalcons").unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("cosmosvalcons1"));
        assert!(validate(&first, "cosmosvalcons").is_ok());
    }

    #[test]
    fn consensus_address_rejects_non_ed25519_keys() {
        let pubkey = ConsensusPubkey {
            type_url: "/cosmos.crypto.secp256k1.PubKey".to_string(),
            key: BASE64.encode([42u8; 33]),
        };
        assert!(consensus_address(&pubkey, "cosmosvalcons").is_err());
    }
}
