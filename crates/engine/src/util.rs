//! Internal helpers for input validation and model conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Currency, EngineError, ResultEngine};

/// Largest amount a single row or budget may carry (10^13 major units at
/// two decimals). Keeps balance sums far from `i64` overflow.
pub(crate) const MAX_AMOUNT_MINOR: i64 = 1_000_000_000_000_000;

/// Accept `0 < amount <= MAX_AMOUNT_MINOR`.
pub(crate) fn require_amount(amount_minor: i64, label: &str) -> ResultEngine<i64> {
    if amount_minor <= 0 {
        return Err(EngineError::InvalidInput(format!("{label} must be > 0")));
    }
    if amount_minor > MAX_AMOUNT_MINOR {
        return Err(EngineError::InvalidInput(format!("{label} is too large")));
    }
    Ok(amount_minor)
}

/// Reject the nil UUID, which callers use as a "missing id".
pub(crate) fn require_id(id: Uuid, label: &str) -> ResultEngine<Uuid> {
    if id.is_nil() {
        return Err(EngineError::InvalidInput(format!("{label} id is required")));
    }
    Ok(id)
}

/// Trim and reject a blank user id.
pub(crate) fn require_user_id(user_id: &str) -> ResultEngine<&str> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput("user id is required".to_string()));
    }
    Ok(trimmed)
}

pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidInput(format!("invalid {label} id")))
}

/// Parse a currency code stored in the DB into a strongly typed `Currency`.
pub(crate) fn model_currency(value: &str) -> ResultEngine<Currency> {
    Currency::try_from(value)
        .map_err(|_| EngineError::InvalidInput(format!("invalid currency: {value}")))
}

pub(crate) fn parse_rate(value: &str) -> ResultEngine<Decimal> {
    value
        .parse::<Decimal>()
        .map_err(|_| EngineError::InvalidInput(format!("invalid rate: {value}")))
}

/// Calendar month window `[first day, first day of next month)`.
pub(crate) fn month_bounds(year: i32, month: u32) -> ResultEngine<(NaiveDate, NaiveDate)> {
    let invalid = || EngineError::InvalidInput(format!("invalid period: {year}-{month}"));
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let end = if start.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    Ok((start, end))
}
