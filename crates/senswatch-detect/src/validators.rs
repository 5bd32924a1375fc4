//! Checksum and structural validators for rule candidates.
//!
//! Every validator is a pure predicate that fails closed: input of the wrong
//! length or alphabet is reported as invalid, never as an error.

use chrono::NaiveDate;
use std::net::Ipv6Addr;

/// Weights for the 8-character organization code body.
const ORGANIZATION_WEIGHTS: [u32; 8] = [3, 7, 9, 10, 5, 8, 4, 2];

/// Weights for the first 17 characters of a unified social credit code.
const CREDIT_WEIGHTS: [u32; 17] = [1, 3, 9, 27, 19, 26, 16, 17, 20, 29, 25, 13, 8, 24, 10, 30, 28];

/// Credit code alphabet above the digits; `I`, `O`, `S`, `V` and `Z` are not used.
const CREDIT_LETTERS: &[u8; 21] = b"ABCDEFGHJKLMNPQRTUWXY";

/// Registration authority + entity type prefixes accepted for credit codes.
const CREDIT_PREFIXES: [&str; 11] = ["11", "12", "19", "51", "52", "53", "59", "91", "92", "93", "Y1"];

fn all_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Luhn check over a 16-19 digit card number.
#[must_use]
pub fn luhn(candidate: &str) -> bool {
    if !(16..=19).contains(&candidate.len()) || !all_ascii_digits(candidate) {
        return false;
    }

    let total: u32 = candidate
        .bytes()
        .rev()
        .enumerate()
        .map(|(idx, b)| {
            let digit = u32::from(b - b'0');
            if idx % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    total % 10 == 0
}

/// Compute the check character for an 8-character organization code body.
///
/// Returns `None` if the body is not exactly 8 characters of `[0-9A-Z]`.
#[must_use]
pub fn organization_check_char(body: &str) -> Option<char> {
    if body.len() != 8 {
        return None;
    }

    let mut sum = 0u32;
    for (b, weight) in body.bytes().zip(ORGANIZATION_WEIGHTS) {
        let value = match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'A'..=b'Z' => u32::from(b) - 55,
            _ => return None,
        };
        sum += value * weight;
    }

    Some(match 11 - sum % 11 {
        10 => 'X',
        11 => '0',
        n => char::from_digit(n, 10)?,
    })
}

/// Validate a 9-character organization code (8-character body + check char).
#[must_use]
pub fn organization_code(candidate: &str) -> bool {
    if candidate.len() != 9 || !candidate.is_ascii() {
        return false;
    }
    let (body, check) = candidate.split_at(8);
    organization_check_char(body).is_some_and(|expected| check.starts_with(expected))
}

fn credit_value(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some(u32::from(b - b'0')),
        _ => CREDIT_LETTERS
            .iter()
            .position(|&letter| letter == b)
            .and_then(|idx| u32::try_from(idx).ok())
            .map(|idx| idx + 10),
    }
}

/// Compute the check character for the first 17 characters of a unified
/// social credit code.
///
/// Returns `None` if the body has the wrong length, contains characters
/// outside the credit code alphabet, or sums to a multiple of 31. The last
/// case has no check character in the alphabet, so such codes never
/// validate.
#[must_use]
pub fn credit_check_char(body: &str) -> Option<char> {
    if body.len() != 17 {
        return None;
    }

    let mut sum = 0u32;
    for (b, weight) in body.bytes().zip(CREDIT_WEIGHTS) {
        sum += credit_value(b)? * weight;
    }

    match 31 - sum % 31 {
        31 => None,
        n @ 0..=9 => char::from_digit(n, 10),
        n => CREDIT_LETTERS
            .get(usize::try_from(n - 10).ok()?)
            .map(|&b| char::from(b)),
    }
}

/// Validate an 18-character unified social credit code: authority prefix,
/// structural layout and the mod-31 check character.
#[must_use]
pub fn credit_code(candidate: &str) -> bool {
    if candidate.len() != 18 || !candidate.is_ascii() {
        return false;
    }

    let bytes = candidate.as_bytes();
    if !CREDIT_PREFIXES.contains(&&candidate[..2]) {
        return false;
    }
    if !bytes[2..8].iter().all(u8::is_ascii_digit) {
        return false;
    }
    if !(bytes[16].is_ascii_digit() || bytes[16] == b'X') {
        return false;
    }

    let (body, check) = candidate.split_at(17);
    credit_check_char(body).is_some_and(|expected| check.starts_with(expected))
}

/// Compute the check digit for the first 14 digits of a business
/// registration number.
#[must_use]
pub fn business_check_digit(body: &str) -> Option<u8> {
    if body.len() != 14 || !all_ascii_digits(body) {
        return None;
    }

    let mut state = 10u32;
    for b in body.bytes() {
        let digit = u32::from(b - b'0');
        state = ((((state % 11) + digit) % 10) * 2) % 11;
    }

    u8::try_from((11 - state % 10) % 10).ok()
}

/// Validate a 15-digit business registration number.
#[must_use]
pub fn business_registration(candidate: &str) -> bool {
    if candidate.len() != 15 || !all_ascii_digits(candidate) {
        return false;
    }
    let (body, check) = candidate.split_at(14);
    business_check_digit(body).is_some_and(|expected| check.as_bytes()[0] - b'0' == expected)
}

/// Validate the shape and embedded birth date of a national ID number.
///
/// 18-character numbers are 17 digits plus a digit or `X`; the birth date is
/// characters 7-14. 15-digit numbers carry a two-digit year in the 1900s.
/// The trailing check character is not verified.
#[must_use]
pub fn national_id(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    let date = match bytes.len() {
        18 => {
            let last = bytes[17];
            if !bytes[..17].iter().all(u8::is_ascii_digit)
                || !(last.is_ascii_digit() || last == b'X' || last == b'x')
            {
                return false;
            }
            &candidate[6..14]
        }
        15 => {
            if !all_ascii_digits(candidate) {
                return false;
            }
            &candidate[6..12]
        }
        _ => return false,
    };

    let (year, rest) = if date.len() == 8 {
        (date[..4].parse::<i32>().ok(), &date[4..])
    } else {
        (date[..2].parse::<i32>().ok().map(|yy| 1900 + yy), &date[2..])
    };
    let month = rest[..2].parse::<u32>().ok();
    let day = rest[2..].parse::<u32>().ok();

    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d).is_some(),
        _ => false,
    }
}

/// Accept IPv6 literals that are not IPv4-mapped addresses.
#[must_use]
pub fn ipv6(candidate: &str) -> bool {
    candidate
        .parse::<Ipv6Addr>()
        .is_ok_and(|addr| addr.to_ipv4_mapped().is_none())
}

/// Landline numbers including area code and extension are 7-12 characters.
#[must_use]
pub fn telephone_length(candidate: &str) -> bool {
    (7..=12).contains(&candidate.len())
}
