use serde::{Deserialize, Serialize};

/// Checkout payment channel. Outcomes are reported by the caller, never verified here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "MTN MoMo")]
    MtnMomo,
    #[serde(rename = "Vodafone Cash")]
    VodafoneCash,
    #[serde(rename = "Telecel Cash")]
    TelecelCash,
    #[serde(rename = "Cash on Delivery")]
    CashOnDelivery,
    Paystack,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MtnMomo => "MTN MoMo",
            PaymentMethod::VodafoneCash => "Vodafone Cash",
            PaymentMethod::TelecelCash => "Telecel Cash",
            PaymentMethod::CashOnDelivery => "Cash on Delivery",
            PaymentMethod::Paystack => "Paystack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            PaymentMethod::MtnMomo,
            PaymentMethod::VodafoneCash,
            PaymentMethod::TelecelCash,
            PaymentMethod::CashOnDelivery,
            PaymentMethod::Paystack,
        ]
        .into_iter()
        .find(|m| m.as_str() == s)
    }

    pub fn is_mobile_money(&self) -> bool {
        matches!(
            self,
            PaymentMethod::MtnMomo | PaymentMethod::VodafoneCash | PaymentMethod::TelecelCash
        )
    }
}
