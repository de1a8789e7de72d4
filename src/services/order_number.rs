use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::warn;

use crate::{entities::sale, errors::ServiceError};

/// Symbols used for the random suffix. `0`, `1`, `I` and `O` are left out.
pub const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_PREFIX: &str = "ORD";
const SUFFIX_LEN: usize = 6;
const MAX_ATTEMPTS: usize = 5;

/// Builds `ORD-YYYYMMDD-XXXXXX` for the UTC day of `now`.
pub fn generate_order_number<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ORDER_NUMBER_ALPHABET.len());
            ORDER_NUMBER_ALPHABET[idx] as char
        })
        .collect();
    format!(
        "{}-{}-{}",
        ORDER_NUMBER_PREFIX,
        now.format("%Y%m%d"),
        suffix
    )
}

pub fn is_valid_order_number(candidate: &str) -> bool {
    let mut parts = candidate.split('-');
    let (Some(prefix), Some(date), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == ORDER_NUMBER_PREFIX
        && date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.bytes().all(|b| ORDER_NUMBER_ALPHABET.contains(&b))
}

/// Picks a number not yet present in `sales`. Runs on the caller's connection so it
/// sees the same transaction; the unique index on `order_number` stays the final guard.
pub async fn next_order_number<C>(conn: &C, now: DateTime<Utc>) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let candidate = generate_order_number(now, &mut rand::thread_rng());
        let taken = sale::Entity::find()
            .filter(sale::Column::OrderNumber.eq(candidate.clone()))
            .count(conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        warn!(attempt, order_number = %candidate, "Order number collision, retrying");
    }

    Err(ServiceError::InternalError(
        "Could not allocate a unique order number".to_string(),
    ))
}
