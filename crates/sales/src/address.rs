use core::fmt;

use serde::{Deserialize, Serialize};

use kudimall_core::{DomainError, DomainResult, ValueObject};

/// Greeting used when the customer has no display name on file.
pub const DEFAULT_CUSTOMER_NAME: &str = "Valued Customer";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country: String,
}

impl ValueObject for ShippingAddress {}

impl ShippingAddress {
    pub fn validate(&self) -> DomainResult<()> {
        for (field, value) in [
            ("street", &self.street),
            ("city", &self.city),
            ("region", &self.region),
            ("country", &self.country),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "shipping address {field} is required"
                )));
            }
        }
        Ok(())
    }
}

/// Phone number normalised to E.164.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl ValueObject for PhoneNumber {}

impl PhoneNumber {
    /// Accepts Ghanaian local numbers (`0` + network digit 2/3/5 + 8 digits)
    /// or numbers already in E.164 form.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();

        if let Some(national) = compact.strip_prefix('0') {
            let bytes = national.as_bytes();
            let network_ok = matches!(bytes.first(), Some(b'2' | b'3' | b'5'));
            if network_ok && bytes.len() == 9 && bytes.iter().all(u8::is_ascii_digit) {
                return Ok(Self(format!("+233{national}")));
            }
        } else if let Some(digits) = compact.strip_prefix('+') {
            let bytes = digits.as_bytes();
            let leading_ok = matches!(bytes.first(), Some(b'1'..=b'9'));
            if leading_ok && (8..=15).contains(&bytes.len()) && bytes.iter().all(u8::is_ascii_digit)
            {
                return Ok(Self(compact));
            }
        }

        Err(DomainError::validation(format!(
            "'{raw}' is not a valid Ghanaian or E.164 phone number"
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who the order confirmation goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub phone: PhoneNumber,
}

impl Recipient {
    pub fn new(name: Option<&str>, phone: &str) -> DomainResult<Self> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_CUSTOMER_NAME)
            .to_string();
        Ok(Self {
            name,
            phone: PhoneNumber::parse(phone)?,
        })
    }
}
