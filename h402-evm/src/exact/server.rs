//! Server-side price parsing and requirement enhancement for the EVM
//! `exact` scheme.

use serde_json::{Map, Value, json};

use h402::scheme::{AssetAmount, SchemeError, SchemeServer};
use h402_proto::{PaymentRequirements, SupportedKind};

use crate::networks::{
    AssetInfo, DEFAULT_USDC_NAME, DEFAULT_USDC_VERSION, USDC_DECIMALS, network_config,
};

use super::types::SCHEME_EXACT;

/// A custom money parser.
///
/// Receives the normalized decimal amount (currency symbol stripped,
/// e.g. `"1.50"` for `"$1.50"`) and the network; returns `Some` to claim
/// the price or `None` to pass to the next parser.
pub type MoneyParser = Box<dyn Fn(&str, &str) -> Option<AssetAmount> + Send + Sync>;

/// Server side of the EVM `exact` scheme.
///
/// Parses money prices into USDC smallest units (money parsers may
/// override, chain-of-responsibility style) and enriches requirements
/// with the EIP-712 domain of the asset.
#[derive(Default)]
pub struct ExactEvmServer {
    money_parsers: Vec<MoneyParser>,
}

impl std::fmt::Debug for ExactEvmServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmServer")
            .field("money_parsers", &self.money_parsers.len())
            .finish()
    }
}

impl ExactEvmServer {
    /// Creates a server with only the default USDC parsing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a money parser. Parsers run in registration order; the
    /// first to return `Some` wins, and the default USDC logic applies
    /// when all decline.
    pub fn register_money_parser(&mut self, parser: MoneyParser) -> &mut Self {
        self.money_parsers.push(parser);
        self
    }
}

/// Normalizes a price value to a plain decimal string.
fn normalize_money(price: &Value) -> Result<String, SchemeError> {
    if let Some(text) = price.as_str() {
        let clean = text.trim().trim_start_matches('$').trim();
        if clean.is_empty()
            || !clean.chars().all(|c| c.is_ascii_digit() || c == '.')
            || clean.chars().filter(|&c| c == '.').count() > 1
        {
            return Err(format!("invalid money format: {text}").into());
        }
        return Ok(clean.to_owned());
    }
    if let Some(int) = price.as_u64() {
        return Ok(int.to_string());
    }
    if let Some(float) = price.as_f64() {
        if float < 0.0 {
            return Err(format!("invalid money amount: {float}").into());
        }
        return Ok(float.to_string());
    }
    Err(format!("invalid money format: {price}").into())
}

/// Scales a decimal string into an integer count of smallest units.
///
/// `scale_decimal("1.50", 6)` is `"1500000"`. Fractions beyond the
/// asset's precision are rejected rather than rounded.
fn scale_decimal(decimal: &str, decimals: u8) -> Result<String, SchemeError> {
    let (int_part, frac_part) = match decimal.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (decimal, ""),
    };
    if frac_part.len() > usize::from(decimals) {
        return Err(format!(
            "amount {decimal} has more than {decimals} decimal places"
        )
        .into());
    }

    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| format!("invalid amount: {decimal}"))?
    };
    let mut frac = frac_part.to_owned();
    while frac.len() < usize::from(decimals) {
        frac.push('0');
    }
    let frac_value: u128 = if frac.is_empty() {
        0
    } else {
        frac.parse().map_err(|_| format!("invalid amount: {decimal}"))?
    };

    let scale = 10u128.pow(u32::from(decimals));
    let total = int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| format!("amount {decimal} overflows"))?;
    Ok(total.to_string())
}

fn find_asset(config: &crate::networks::NetworkConfig, address: &str) -> Option<AssetInfo> {
    config
        .supported_assets
        .iter()
        .find(|a| a.address.to_string().eq_ignore_ascii_case(address))
        .cloned()
}

impl SchemeServer for ExactEvmServer {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount, SchemeError> {
        // Pre-parsed AssetAmount objects pass through untouched; money
        // parsers never see them.
        if let Some(object) = price.as_object() {
            let amount = object
                .get("amount")
                .and_then(Value::as_str)
                .ok_or("pre-parsed price requires an amount")?;
            let asset = object
                .get("asset")
                .and_then(Value::as_str)
                .ok_or("Asset address required for pre-parsed prices")?;
            return Ok(AssetAmount {
                amount: amount.to_owned(),
                asset: asset.to_owned(),
                extra: object.get("extra").cloned(),
            });
        }

        let money = normalize_money(price)?;

        for parser in &self.money_parsers {
            if let Some(parsed) = parser(&money, network) {
                return Ok(parsed);
            }
        }

        let config = network_config(network)
            .ok_or_else(|| format!("unsupported EVM network: {network}"))?;
        let asset = &config.default_asset;
        Ok(AssetAmount {
            amount: scale_decimal(&money, asset.decimals)?,
            asset: asset.address.to_string(),
            extra: Some(json!({"name": asset.name, "version": asset.version})),
        })
    }

    fn enhance_payment_requirements(
        &self,
        requirements: PaymentRequirements,
        _supported_kind: &SupportedKind,
        _extensions: &[String],
    ) -> PaymentRequirements {
        let mut requirements = requirements;
        let config = network_config(&requirements.network);

        if requirements.asset.is_empty() {
            if let Some(config) = &config {
                requirements.asset = config.default_asset.address.to_string();
            }
        }

        let asset_info = config
            .as_ref()
            .and_then(|c| find_asset(c, &requirements.asset));

        // A human-readable amount that slipped through still needs
        // converting to smallest units.
        if requirements.amount.contains('.') {
            let decimals = asset_info.as_ref().map_or(USDC_DECIMALS, |a| a.decimals);
            if let Ok(scaled) = scale_decimal(&requirements.amount, decimals) {
                requirements.amount = scaled;
            }
        }

        let mut extra = match requirements.extra.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if !extra.contains_key("name") || !extra.contains_key("version") {
            let (name, version) = asset_info.map_or_else(
                || (DEFAULT_USDC_NAME.to_owned(), DEFAULT_USDC_VERSION.to_owned()),
                |a| (a.name, a.version),
            );
            extra.entry("name".to_owned()).or_insert(Value::String(name));
            extra
                .entry("version".to_owned())
                .or_insert(Value::String(version));
        }
        requirements.extra = Some(Value::Object(extra));

        requirements
    }
}
