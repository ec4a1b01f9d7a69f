//! Phone number normalization into channel address variants.
//!
//! Registration lookups on the channel are exact-match on the digit string,
//! but numbers arrive with and without the extra mobile `9` after the
//! country + area code. We derive both forms and keep the one as given first.

use serde::Serialize;

use crate::channels::client::contact_address;
use crate::error::ValidationError;

const MIN_DIGITS: usize = 10;
const MAX_DIGITS: usize = 15;

/// Length of country code + area code.
const PREFIX_LEN: usize = 4;

/// One candidate form of a phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressVariant {
    pub digits: String,
    pub address: String,
}

impl AddressVariant {
    fn from_digits(digits: String) -> Self {
        let address = contact_address(&digits);
        Self { digits, address }
    }
}

/// Ordered, deduplicated candidates for a number. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AddressVariants(Vec<AddressVariant>);

impl AddressVariants {
    /// The number as given (after stripping formatting).
    pub fn primary(&self) -> &AddressVariant {
        &self.0[0]
    }

    /// Inferred alternates, in order.
    pub fn alternates(&self) -> &[AddressVariant] {
        &self.0[1..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressVariant> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn digits(&self) -> Vec<&str> {
        self.0.iter().map(|v| v.digits.as_str()).collect()
    }
}

/// Derive candidate digit strings for `raw`.
///
/// - 12 digits: also the 13-digit form with `9` inserted after the prefix.
/// - 13 digits with `9` in 5th position: also the 12-digit form without it.
pub fn candidate_digits(raw: &str) -> Result<Vec<String>, ValidationError> {
    let base: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if !(MIN_DIGITS..=MAX_DIGITS).contains(&base.len()) {
        return Err(ValidationError::InvalidNumber {
            number: raw.to_string(),
            digits: base.len(),
        });
    }

    let alternate = match base.len() {
        12 => Some(format!("{}9{}", &base[..PREFIX_LEN], &base[PREFIX_LEN..])),
        13 if base.as_bytes()[PREFIX_LEN] == b'9' => {
            Some(format!("{}{}", &base[..PREFIX_LEN], &base[PREFIX_LEN + 1..]))
        }
        _ => None,
    };

    let mut candidates = vec![base];
    if let Some(alt) = alternate {
        if !candidates.contains(&alt) {
            candidates.push(alt);
        }
    }
    Ok(candidates)
}

/// Normalize `raw` into channel address variants.
pub fn normalize(raw: &str) -> Result<AddressVariants, ValidationError> {
    let variants = candidate_digits(raw)?
        .into_iter()
        .map(AddressVariant::from_digits)
        .collect();
    Ok(AddressVariants(variants))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twelve_digits_gain_mobile_nine() {
        assert_eq!(
            candidate_digits("558599998888").unwrap(),
            vec!["558599998888", "5585999998888"]
        );
    }

    #[test]
    fn thirteen_digits_with_nine_lose_it() {
        assert_eq!(
            candidate_digits("5585999998888").unwrap(),
            vec!["5585999998888", "558599998888"]
        );
    }

    #[test]
    fn thirteen_digits_without_nine_stay_single() {
        assert_eq!(candidate_digits("5585899998888").unwrap(), vec!["5585899998888"]);
    }

    #[test]
    fn eleven_digits_stay_single() {
        assert_eq!(candidate_digits("85999998888").unwrap(), vec!["85999998888"]);
    }

    #[test]
    fn formatting_is_stripped() {
        assert_eq!(
            candidate_digits("+55 (85) 9999-8888").unwrap(),
            vec!["558599998888", "5585999998888"]
        );
    }

    #[test]
    fn every_twelve_digit_number_yields_exactly_two() {
        for n in ["100000000000", "999999999999", "551112345678", "123456789012"] {
            let c = candidate_digits(n).unwrap();
            assert_eq!(c.len(), 2, "{n}");
            assert_eq!(c[0], n);
            assert_eq!(c[1], format!("{}9{}", &n[..4], &n[4..]));
        }
    }

    #[test]
    fn out_of_range_lengths_are_rejected() {
        for n in ["", "abc", "123456789", "1234567890123456", "+1 (23) 456-78"] {
            assert!(
                matches!(candidate_digits(n), Err(ValidationError::InvalidNumber { .. })),
                "{n:?} should be rejected"
            );
        }
    }

    #[test]
    fn boundary_lengths_are_accepted() {
        assert!(candidate_digits("1234567890").is_ok());
        assert!(candidate_digits("123456789012345").is_ok());
    }

    #[test]
    fn invalid_number_reports_digit_count() {
        let err = candidate_digits("12-34").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidNumber {
                number: "12-34".into(),
                digits: 4
            }
        );
    }

    #[test]
    fn variants_carry_contact_addresses() {
        let variants = normalize("558599998888").unwrap();
        assert_eq!(variants.primary().address, "558599998888@c.us");
        assert_eq!(variants.alternates().len(), 1);
        assert_eq!(variants.alternates()[0].address, "5585999998888@c.us");
        assert_eq!(variants.digits(), vec!["558599998888", "5585999998888"]);
    }
}
