//! # Identity Newtypes
//!
//! [`Rut`] is the Chilean national tax identifier (Rol Único Tributario)
//! used for suppliers and staff. [`Email`] is a normalized address.
//! Both validate at construction and serialize as plain strings.
//!
//! ## RUT check digit
//!
//! Digits of the body are weighted right-to-left with the repeating
//! sequence 2, 3, 4, 5, 6, 7. The check digit is `11 - (sum mod 11)`,
//! with 11 written as `0` and 10 written as `K`.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A Chilean RUT with a verified check digit.
///
/// Accepts `"12.345.678-5"`, `"12345678-5"`, `"123456785"` and lowercase `k`.
/// Displays and serializes in the dotted form `12.345.678-5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rut {
    body: u32,
    check_digit: char,
}

impl Rut {
    /// Parse and validate a RUT.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRut`] when fewer than two significant
    /// characters remain after cleaning, the body is not numeric, or the
    /// check digit does not match.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ValidationError> {
        let raw = value.as_ref();
        let clean = clean(raw);
        if clean.len() < 2 {
            return Err(ValidationError::InvalidRut(raw.to_string()));
        }

        let (body_str, dv_str) = clean.split_at(clean.len() - 1);
        if body_str.is_empty() || !body_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidRut(raw.to_string()));
        }
        let body: u32 = body_str
            .parse()
            .map_err(|_| ValidationError::InvalidRut(raw.to_string()))?;

        let provided = dv_str
            .chars()
            .next()
            .ok_or_else(|| ValidationError::InvalidRut(raw.to_string()))?;
        if provided != check_digit(body) {
            return Err(ValidationError::InvalidRut(raw.to_string()));
        }

        Ok(Self {
            body,
            check_digit: provided,
        })
    }

    /// Whether `value` is a valid RUT.
    pub fn is_valid(value: &str) -> bool {
        Self::new(value).is_ok()
    }

    /// Numeric body without the check digit.
    pub fn body(&self) -> u32 {
        self.body
    }

    /// The check digit (`0`-`9` or `K`).
    pub fn check_digit(&self) -> char {
        self.check_digit
    }

    /// Dotted form: `12.345.678-5`.
    pub fn formatted(&self) -> String {
        format!("{}-{}", group_thousands(self.body), self.check_digit)
    }

    /// Compact form without dots: `12345678-5`.
    pub fn compact(&self) -> String {
        format!("{}-{}", self.body, self.check_digit)
    }
}

impl std::fmt::Display for Rut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl TryFrom<String> for Rut {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rut> for String {
    fn from(rut: Rut) -> Self {
        rut.formatted()
    }
}

impl std::str::FromStr for Rut {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Strip dots, dashes and whitespace, and uppercase the rest.
fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '.' | '-') && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Compute the modulo-11 check digit for a RUT body.
pub fn check_digit(body: u32) -> char {
    let mut sum = 0u32;
    let mut factor = 2u32;
    let mut n = body;
    loop {
        sum += (n % 10) * factor;
        n /= 10;
        factor = if factor == 7 { 2 } else { factor + 1 };
        if n == 0 {
            break;
        }
    }
    match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        d => char::from_digit(d, 10).unwrap_or('0'),
    }
}

fn group_thousands(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

/// A syntactically valid, lowercased email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Normalize (trim, lowercase) and validate an email address.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Required`] for blank input and
    /// [`ValidationError::InvalidEmail`] when the shape is not
    /// `local@domain.tld` with a TLD of at least two letters.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ValidationError> {
        let normalized = value.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::Required("email"));
        }
        if !is_valid_email(&normalized) {
            return Err(ValidationError::InvalidEmail(value.as_ref().to_string()));
        }
        Ok(Self(normalized))
    }

    /// The normalized address.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part after the `@`.
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or_default()
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

fn is_valid_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-'))
    {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rut_accepts_common_spellings() {
        for input in ["12.345.678-5", "12345678-5", "123456785", " 12 345 678 5 "] {
            let rut = Rut::new(input).unwrap();
            assert_eq!(rut.body(), 12_345_678);
            assert_eq!(rut.check_digit(), '5');
            assert_eq!(rut.formatted(), "12.345.678-5");
        }
    }

    #[test]
    fn rut_k_and_zero_check_digits() {
        let k = Rut::new("1.000.005-k").unwrap();
        assert_eq!(k.check_digit(), 'K');
        assert_eq!(k.formatted(), "1.000.005-K");

        let zero = Rut::new("76000000-0").unwrap();
        assert_eq!(zero.check_digit(), '0');
        assert_eq!(zero.compact(), "76000000-0");
    }

    #[test]
    fn rut_rejects_wrong_check_digit() {
        assert!(matches!(
            Rut::new("12.345.678-9"),
            Err(ValidationError::InvalidRut(_))
        ));
    }

    #[test]
    fn rut_rejects_short_and_non_numeric() {
        assert!(!Rut::is_valid(""));
        assert!(!Rut::is_valid("5"));
        assert!(!Rut::is_valid("-"));
        assert!(!Rut::is_valid("12A45678-5"));
    }

    #[test]
    fn rut_small_body_formats_without_dots() {
        // 1 → weights 2 → 11 - 2 = 9
        let rut = Rut::new("1-9").unwrap();
        assert_eq!(rut.formatted(), "1-9");
    }

    #[test]
    fn rut_serde_uses_dotted_form() {
        let rut = Rut::new("11111111-1").unwrap();
        let json = serde_json::to_string(&rut).unwrap();
        assert_eq!(json, "\"11.111.111-1\"");
        let back: Rut = serde_json::from_str("\"11111111-1\"").unwrap();
        assert_eq!(back, rut);
        assert!(serde_json::from_str::<Rut>("\"11111111-2\"").is_err());
    }

    #[test]
    fn email_normalizes_case_and_whitespace() {
        let email = Email::new("  Ana.Perez@Colegio.CL ").unwrap();
        assert_eq!(email.as_str(), "ana.perez@colegio.cl");
        assert_eq!(email.domain(), "colegio.cl");
    }

    #[test]
    fn email_rejects_malformed() {
        assert!(matches!(Email::new(""), Err(ValidationError::Required("email"))));
        for bad in ["no-at-sign", "@colegio.cl", "ana@", "ana@colegio", "ana@colegio.c", "an a@x.cl"] {
            assert!(Email::new(bad).is_err(), "{bad} should be rejected");
        }
    }

    proptest! {
        #[test]
        fn computed_check_digit_always_validates(body in 1u32..100_000_000) {
            let dv = check_digit(body);
            let rut = Rut::new(format!("{body}-{dv}")).unwrap();
            prop_assert_eq!(rut.body(), body);
            prop_assert_eq!(Rut::new(rut.formatted()).unwrap(), rut);
        }

        #[test]
        fn any_other_check_digit_is_rejected(body in 1u32..100_000_000, alt in 0u32..11) {
            let dv = check_digit(body);
            let candidate = if alt == 10 { 'K' } else { char::from_digit(alt, 10).unwrap() };
            prop_assume!(candidate != dv);
            let input = format!("{body}-{candidate}");
            prop_assert!(Rut::new(input).is_err());
        }
    }
}
