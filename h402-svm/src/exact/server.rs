//! Server-side price parsing and requirement enhancement for the Solana
//! `exact` scheme.

use serde_json::{Map, Value};

use h402::scheme::{AssetAmount, SchemeError, SchemeServer};
use h402_proto::{PaymentRequirements, SupportedKind};

use crate::networks::{USDC_DECIMALS, cluster_config};

use super::types::SCHEME_EXACT;

/// Server side of the Solana `exact` scheme.
///
/// Prices parse against the cluster's USDC mint; enhancement copies the
/// facilitator's advertised `feePayer` into requirements `extra` so the
/// buyer knows which account to name in the transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactSvmServer;

impl ExactSvmServer {
    /// Creates the server side.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

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

fn scale_decimal(decimal: &str, decimals: u8) -> Result<String, SchemeError> {
    let (int_part, frac_part) = decimal.split_once('.').unwrap_or((decimal, ""));
    if frac_part.len() > usize::from(decimals) {
        return Err(format!("amount {decimal} has more than {decimals} decimal places").into());
    }
    let int_value: u64 = if int_part.is_empty() {
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
    let frac_value: u64 = if frac.is_empty() {
        0
    } else {
        frac.parse().map_err(|_| format!("invalid amount: {decimal}"))?
    };
    let scale = 10u64.pow(u32::from(decimals));
    let total = int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| format!("amount {decimal} overflows"))?;
    Ok(total.to_string())
}

impl SchemeServer for ExactSvmServer {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount, SchemeError> {
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
        let cluster = cluster_config(network)
            .ok_or_else(|| format!("unsupported Solana cluster: {network}"))?;
        Ok(AssetAmount {
            amount: scale_decimal(&money, cluster.default_asset.decimals)?,
            asset: cluster.default_asset.address.to_owned(),
            extra: None,
        })
    }

    fn enhance_payment_requirements(
        &self,
        requirements: PaymentRequirements,
        supported_kind: &SupportedKind,
        _extensions: &[String],
    ) -> PaymentRequirements {
        let mut requirements = requirements;

        if requirements.asset.is_empty() {
            if let Some(cluster) = cluster_config(&requirements.network) {
                requirements.asset = cluster.default_asset.address.to_owned();
            }
        }

        if requirements.amount.contains('.') {
            if let Ok(scaled) = scale_decimal(&requirements.amount, USDC_DECIMALS) {
                requirements.amount = scaled;
            }
        }

        // The facilitator advertises its fee payer in the supported
        // kind; without it a buyer cannot construct the transaction.
        let fee_payer = supported_kind
            .extra
            .as_ref()
            .and_then(|extra| extra.get("feePayer"))
            .and_then(Value::as_str);
        if let Some(fee_payer) = fee_payer {
            let mut extra = match requirements.extra.take() {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            extra
                .entry("feePayer".to_owned())
                .or_insert_with(|| Value::String(fee_payer.to_owned()));
            requirements.extra = Some(Value::Object(extra));
        }

        requirements
    }
}
