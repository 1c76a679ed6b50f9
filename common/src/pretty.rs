use std::time::Duration;

use byte_unit::{Byte, UnitType};
use pretty_duration::pretty_duration;

/// Comma-groups a row count for log lines, e.g. `2500000` -> `2,500,000`.
pub fn count_pretty(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.chars().rev().collect()
}

pub fn duration_pretty(d: &Duration) -> String {
    pretty_duration(d, None)
}

pub fn bytes_pretty(len: u64) -> String {
    let byte = Byte::from_u128(len as u128).unwrap_or(Byte::from_u128(0).unwrap());
    let adjusted = byte.get_appropriate_unit(UnitType::Decimal);
    format!("{adjusted:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_large_counts() {
        assert_eq!(count_pretty(2_500_000), "2,500,000");
        assert_eq!(count_pretty(999), "999");
        assert_eq!(count_pretty(1000), "1,000");
        assert_eq!(count_pretty(0), "0");
    }
}
