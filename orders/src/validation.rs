//! Request-shape checks shared by the service and the repositories.
//!
//! Every check runs before any store access.

use crate::error::{OrderError, Result};
use crate::model::{ModelId, NewOrder, NewOrderItem};
use rust_decimal::Decimal;
use std::collections::HashSet;

pub const MAX_ADDRESS_LEN: usize = 512;

/// Amounts are stored as `NUMERIC(10, 2)`.
pub const MONEY_SCALE: u32 = 2;
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(
    (9_999_999_999u64 & 0xFFFF_FFFF) as u32,
    (9_999_999_999u64 >> 32) as u32,
    0,
    false,
    MONEY_SCALE,
);

fn invalid(message: impl Into<String>) -> OrderError {
    OrderError::Validation(message.into())
}

/// Parses a path parameter into a positive id.
pub fn parse_id(field: &'static str, raw: &str) -> Result<ModelId> {
    let id = raw
        .trim()
        .parse::<ModelId>()
        .map_err(|_| invalid(format!("invalid {}", field)))?;
    validate_id(field, id)?;
    Ok(id)
}

pub fn validate_id(field: &'static str, id: ModelId) -> Result<()> {
    if id <= 0 {
        return Err(invalid(format!("invalid {}", field)));
    }
    Ok(())
}

/// Rejects blank or oversized addresses. Returns the trimmed address.
pub fn validate_address(address: &str) -> Result<&str> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(invalid("delivery address required"));
    }
    if trimmed.len() > MAX_ADDRESS_LEN {
        return Err(invalid(format!(
            "delivery address longer than {} characters",
            MAX_ADDRESS_LEN
        )));
    }
    Ok(trimmed)
}

pub fn validate_quantity(quantity: i32) -> Result<()> {
    if quantity < 1 {
        return Err(invalid(format!("quantity must be at least 1, got {}", quantity)));
    }
    Ok(())
}

/// Accepts amounts the store holds exactly: non-negative, at most two
/// decimal places, not above `MAX_AMOUNT`.
pub fn validate_amount(field: &str, amount: Decimal) -> Result<Decimal> {
    if amount < Decimal::ZERO {
        return Err(invalid(format!("{} must not be negative", field)));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(invalid(format!(
            "{} has more than {} decimal places",
            field, MONEY_SCALE
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(invalid(format!("{} exceeds {}", field, MAX_AMOUNT)));
    }
    Ok(amount)
}

fn validate_item(item: &NewOrderItem) -> Result<()> {
    validate_id("dish id", item.dish_id)?;
    validate_quantity(item.quantity)?;
    validate_amount(&format!("unit price of dish {}", item.dish_id), item.unit_price)?;
    item.subtotal()?;
    Ok(())
}

/// Full check of a create request: ids, address, a non-empty item list with
/// distinct dishes, amounts that fit the store, and a caller-supplied total
/// (if any) equal to the item sum.
pub fn validate_new_order(order: &NewOrder) -> Result<()> {
    validate_id("restaurant id", order.restaurant_id)?;
    validate_address(&order.delivery_address)?;

    if order.items.is_empty() {
        return Err(invalid("order must contain at least one item"));
    }

    let mut seen = HashSet::with_capacity(order.items.len());
    for item in &order.items {
        validate_item(item)?;
        if !seen.insert(item.dish_id) {
            return Err(invalid(format!("dish {} listed more than once", item.dish_id)));
        }
    }

    let computed = order.items_total()?;
    if let Some(claimed) = order.total_amount {
        if claimed != computed {
            return Err(invalid(format!(
                "total amount {} does not match item sum {}",
                claimed, computed
            )));
        }
    }

    Ok(())
}
