use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Pre-validated payment form data, as handed over by the checkout layer.
/// `card_no` and `cvc` are raw digit strings; `expiry` is the first day of the
/// expiry month. `extras` carries adapter-specific context.
#[derive(Clone, Serialize, Deserialize)]
pub struct FormData {
    pub name: String,
    pub address: String,
    pub city: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub email: String,
    pub card_no: String,
    pub card_type: String,
    pub expiry: NaiveDate,
    pub cvc: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub issue_num: Option<String>,
    #[serde(default)]
    pub extras: serde_json::Value,
}

// Card number and security code must never reach a log line.
impl std::fmt::Debug for FormData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last4 = self
            .card_no
            .get(self.card_no.len().saturating_sub(4)..)
            .unwrap_or("");
        f.debug_struct("FormData")
            .field("name", &self.name)
            .field("country", &self.country)
            .field("email", &self.email)
            .field("card_no", &format_args!("****{last4}"))
            .field("card_type", &self.card_type)
            .field("expiry", &self.expiry)
            .field("cvc", &"***")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub street_address1: String,
    #[serde(default)]
    pub street_address2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}
