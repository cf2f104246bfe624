//! Transfer parameter validation
//!
//! Checks caller-supplied parameters before any stage that moves funds.
//! Validation is pure: it reads a snapshot of the session's local
//! configuration and never touches the network.

use ethereum_types::U256;
use sha3::{Digest, Keccak256};

use crate::error::{BridgeError, BridgeResult};
use crate::node::NodeConfig;

/// Decimals of the native asset amounts accepted by the pipeline (ether/wei).
pub const NATIVE_DECIMALS: usize = 18;

/// Optional transfer fields, as supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct TransferParams {
    pub value: Option<String>,
    pub from_chain_id: Option<u64>,
    pub from_asset_id: Option<String>,
    pub to_chain_id: Option<u64>,
    pub to_asset_id: Option<String>,
    pub withdrawal_address: Option<String>,
}

/// Result of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidatedParams {
    /// Local public identifier on the channel network
    pub identity: String,
    /// Amount normalised to base units, if a value was supplied
    pub amount: Option<U256>,
    /// Withdrawal address, if supplied
    pub withdrawal_address: Option<String>,
}

/// Validates transfer parameters against the local connection state.
///
/// # Arguments
///
/// * `local` - Local configuration cached by the session, `None` if not connected
/// * `params` - Parameters to validate
///
/// # Returns
///
/// * `Ok(ValidatedParams)` - Parameters are valid; amount normalised to base units
/// * `Err(BridgeError)` - `NotConnected`, `InvalidAmount` or `InvalidAddress`
pub fn validate(local: Option<&NodeConfig>, params: &TransferParams) -> BridgeResult<ValidatedParams> {
    let local = local.ok_or_else(|| {
        BridgeError::NotConnected("node connection has not been established".to_string())
    })?;
    if local.public_identifier.trim().is_empty() {
        return Err(BridgeError::NotConnected("local public identifier missing".to_string()));
    }

    let amount = match &params.value {
        Some(value) => {
            let amount = parse_units(value, NATIVE_DECIMALS).map_err(|reason| {
                BridgeError::InvalidAmount { value: value.clone(), reason }
            })?;
            if amount.is_zero() {
                return Err(BridgeError::InvalidAmount {
                    value: value.clone(),
                    reason: "value can't be zero".to_string(),
                });
            }
            Some(amount)
        }
        None => None,
    };

    if let Some(address) = &params.withdrawal_address {
        check_address(address)?;
    }

    Ok(ValidatedParams {
        identity: local.public_identifier.clone(),
        amount,
        withdrawal_address: params.withdrawal_address.clone(),
    })
}

/// Rejects a zero base-unit amount with `InvalidAmount`.
pub fn check_amount(amount: U256) -> BridgeResult<U256> {
    if amount.is_zero() {
        return Err(BridgeError::InvalidAmount {
            value: amount.to_string(),
            reason: "value can't be zero".to_string(),
        });
    }
    Ok(amount)
}

/// Rejects a hashlock route whose sender and receiver channel are on the same chain.
///
/// Both ends would resolve to the same channel, so the transfer's own
/// creation event would be taken for the routed one.
pub fn check_route(sender_chain_id: u64, receiver_chain_id: u64) -> BridgeResult<()> {
    if sender_chain_id == receiver_chain_id {
        return Err(BridgeError::SameChainRoute {
            chain_id: sender_chain_id,
        });
    }
    Ok(())
}

/// Validates an on-chain address, returning `InvalidAddress` on failure.
pub fn check_address(address: &str) -> BridgeResult<()> {
    address_error(address).map_or(Ok(()), |reason| {
        Err(BridgeError::InvalidAddress { address: address.to_string(), reason })
    })
}

/// Whether `address` is a well-formed 20-byte hex address.
///
/// All-lowercase and all-uppercase hex is accepted as is; mixed case must
/// carry a valid EIP-55 checksum.
pub fn is_valid_address(address: &str) -> bool {
    address_error(address).is_none()
}

fn address_error(address: &str) -> Option<String> {
    let Some(stripped) = address.strip_prefix("0x") else {
        return Some("address must be 0x-prefixed".to_string());
    };
    if stripped.len() != 40 {
        return Some(format!("expected 40 hex characters, got {}", stripped.len()));
    }
    if !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some("address contains non-hex characters".to_string());
    }
    let has_lower = stripped.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = stripped.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum_address(address) != address {
        return Some("bad address checksum".to_string());
    }
    None
}

/// EIP-55 checksummed form of a 20-byte hex address.
///
/// The input is assumed to be `0x` + 40 hex characters.
pub fn to_checksum_address(address: &str) -> String {
    let lower = address.strip_prefix("0x").unwrap_or(address).to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 { hash[i / 2] >> 4 } else { hash[i / 2] & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Parses a decimal string into base units with `decimals` fractional digits.
///
/// Accepts `"1"`, `"1.5"`, `".5"` and trailing fractional zeros beyond
/// `decimals`. Rejects signs, exponents, empty input and overflow.
pub fn parse_units(value: &str, decimals: usize) -> Result<U256, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("value is empty".to_string());
    }
    if value.starts_with('-') {
        return Err("value must be positive".to_string());
    }

    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err("value has no digits".to_string());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err("value is not a decimal number".to_string());
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals {
        return Err(format!("fractional component exceeds {} decimals", decimals));
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let padded = format!("{}{}", fraction, "0".repeat(decimals - fraction.len()));

    let whole = U256::from_dec_str(whole).map_err(|_| "value overflows 256 bits".to_string())?;
    let fraction = U256::from_dec_str(&padded).map_err(|_| "value overflows 256 bits".to_string())?;
    let scale = U256::exp10(decimals);

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(|| "value overflows 256 bits".to_string())
}

/// Formats base units as a decimal string with `decimals` fractional digits.
pub fn format_units(amount: U256, decimals: usize) -> String {
    let scale = U256::exp10(decimals);
    let whole = amount / scale;
    let fraction = amount % scale;
    if fraction.is_zero() {
        return format!("{}.0", whole);
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}
