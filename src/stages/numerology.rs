//! Numeric reducer: digit-sum reduction of a birth date to a life number.
//!
//! All digits of `DD.MM.YYYY` are summed, then the sum is replaced by its own
//! digit sum until it is a single digit or one of the master numbers
//! (11, 22, 33), which are never reduced.

use serde::{Deserialize, Serialize};

use crate::config::defaults::MASTER_NUMBERS;
use crate::error::InputError;
use crate::types::parse_birth_date;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeNumber {
    pub life_number: u32,
    /// e.g. `1+5+0+6+1+9+9+0 = 31 → 3+1 = 4`
    pub trace: String,
    pub master_number: bool,
}

pub fn is_master_number(n: u32) -> bool {
    MASTER_NUMBERS.contains(&n)
}

fn digits_of(n: u32) -> Vec<u32> {
    n.to_string().chars().filter_map(|c| c.to_digit(10)).collect()
}

fn join_digits(digits: &[u32]) -> String {
    digits.iter().map(u32::to_string).collect::<Vec<_>>().join("+")
}

/// One more reduction pass over an already computed number.
pub fn reduce_number(mut n: u32) -> u32 {
    while n > 9 && !is_master_number(n) {
        n = digits_of(n).iter().sum();
    }
    n
}

/// Compute the life number of a DD.MM.YYYY date.
pub fn life_number(birth_date: &str) -> Result<LifeNumber, InputError> {
    parse_birth_date(birth_date)?;

    let digits: Vec<u32> = birth_date.chars().filter_map(|c| c.to_digit(10)).collect();
    let mut sum: u32 = digits.iter().sum();
    let mut steps = vec![format!("{} = {}", join_digits(&digits), sum)];

    while sum > 9 && !is_master_number(sum) {
        let parts = digits_of(sum);
        let next = parts.iter().sum();
        steps.push(format!("{} = {}", join_digits(&parts), next));
        sum = next;
    }

    Ok(LifeNumber {
        life_number: sum,
        trace: steps.join(" → "),
        master_number: is_master_number(sum),
    })
}
