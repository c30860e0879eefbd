//! Types shared between the database and API representations.

pub mod election;
pub mod password;

/// `part` as a percentage of `whole`, rounded to the nearest integer.
/// Zero when `whole` is zero.
pub fn percentage(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 * 100.0 / whole as f64).round() as u32
}
