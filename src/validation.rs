//! Request parameter validation, applied before any handler logic touches the store.

use crate::services::resource_service::{ResourceError, ResourceResult};
use regex::Regex;
use std::{collections::BTreeSet, sync::LazyLock};

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// True when `value` is made of ASCII digits only and denotes a number > 0.
pub fn is_positive_number(value: &str) -> bool {
    NUMERIC.is_match(value) && value.parse::<i64>().is_ok_and(|n| n > 0)
}

/// Parse a path/query id that must be a positive number.
pub fn parse_positive_id(field: &str, value: &str) -> ResourceResult<i64> {
    if !is_positive_number(value) {
        return Err(ResourceError::invalid_parameter(
            field,
            "value must be a positive number",
        ));
    }
    value
        .parse()
        .map_err(|_| ResourceError::invalid_parameter(field, "value must be a positive number"))
}

/// Parse a comma-separated id list into a set.
///
/// Every token must match `^\d+$`; one bad token rejects the whole list.
/// Duplicates collapse and the set iterates in ascending order.
pub fn parse_id_list(field: &str, csv: &str) -> ResourceResult<BTreeSet<i64>> {
    csv.split(',')
        .map(|token| {
            if !NUMERIC.is_match(token) {
                return Err(ResourceError::invalid_parameter(field, "value must be numeric"));
            }
            token
                .parse::<i64>()
                .map_err(|_| ResourceError::invalid_parameter(field, "value is out of range"))
        })
        .collect()
}
