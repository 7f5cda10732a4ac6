use std::collections::HashMap;
use std::sync::Mutex;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::card::{self, CardType};
use crate::domain::form::FormData;

const KEY_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("ciphertext missing nonce")]
    MissingNonce,
    #[error("encryption failure")]
    EncryptFailure,
    #[error("decryption failure")]
    DecryptFailure,
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("stored card data is not valid utf-8")]
    NotUtf8,
    #[error("no card detail stored for payment {0}")]
    UnknownPayment(Uuid),
}

/// Card-instrument record tied to one payment. Holds only display-safe data
/// in clear; the full number is present only in encrypted form, and only when
/// the store policy allows it.
#[derive(Debug, Clone, Serialize)]
pub struct CreditCardDetail {
    pub payment_id: Uuid,
    pub card_type: Option<CardType>,
    pub display_cc: String,
    pub encrypted_cc: Option<String>,
    pub expiry: NaiveDate,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub issue_num: Option<String>,
}

impl CreditCardDetail {
    pub fn masked_number(&self) -> String {
        format!("{}{}", "*".repeat(12), self.display_cc)
    }

    pub fn expiration(&self) -> String {
        self.expiry.format("%m/%y").to_string()
    }
}

/// What a number lookup can yield: the clear number while it is recoverable,
/// or the display-safe mask once it no longer is.
#[derive(Debug)]
pub enum CardNumber {
    Clear(Zeroizing<String>),
    Masked(String),
}

struct CachedSecret {
    value: Zeroizing<String>,
    expires_at: DateTime<Utc>,
}

/// Encrypted card storage plus the short-lived side cache for CVVs (and for
/// full numbers when persistence is disabled by policy). CVVs never leave
/// the cache and are gone once the TTL passes.
pub struct CardVault {
    key: Zeroizing<[u8; KEY_LENGTH]>,
    store_card_numbers: bool,
    cache_ttl: Duration,
    details: Mutex<HashMap<Uuid, CreditCardDetail>>,
    cvv_cache: Mutex<HashMap<Uuid, CachedSecret>>,
    number_cache: Mutex<HashMap<Uuid, CachedSecret>>,
}

impl CardVault {
    pub fn new(
        key: impl AsRef<[u8]>,
        store_card_numbers: bool,
        cache_ttl_secs: i64,
    ) -> Result<Self, VaultError> {
        let slice = key.as_ref();
        if slice.len() != KEY_LENGTH {
            return Err(VaultError::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual: slice.len(),
            });
        }
        let mut array = [0u8; KEY_LENGTH];
        array.copy_from_slice(slice);
        Ok(Self {
            key: Zeroizing::new(array),
            store_card_numbers,
            cache_ttl: Duration::seconds(cache_ttl_secs),
            details: Mutex::new(HashMap::new()),
            cvv_cache: Mutex::new(HashMap::new()),
            number_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self, payment_id: Uuid, form: &FormData) -> Result<(), VaultError> {
        let digits = card::normalize_digits(&form.card_no);
        let display_cc = if digits.len() >= 4 {
            digits[digits.len() - 4..].to_string()
        } else {
            digits.clone()
        };

        let detail = CreditCardDetail {
            payment_id,
            card_type: card::detect_card_type(&digits),
            display_cc,
            encrypted_cc: if self.store_card_numbers {
                Some(self.encrypt(&digits)?)
            } else {
                None
            },
            expiry: form.expiry,
            name: form.name.clone(),
            start_date: form.start_date,
            issue_num: form.issue_num.clone(),
        };

        let expires_at = Utc::now() + self.cache_ttl;
        if !form.cvc.is_empty() {
            self.cvv_cache.lock().expect("vault lock poisoned").insert(
                payment_id,
                CachedSecret {
                    value: Zeroizing::new(card::normalize_digits(&form.cvc)),
                    expires_at,
                },
            );
        }
        if !self.store_card_numbers {
            self.number_cache
                .lock()
                .expect("vault lock poisoned")
                .insert(
                    payment_id,
                    CachedSecret {
                        value: Zeroizing::new(digits),
                        expires_at,
                    },
                );
        }

        self.details
            .lock()
            .expect("vault lock poisoned")
            .insert(payment_id, detail);
        Ok(())
    }

    pub fn detail(&self, payment_id: Uuid) -> Option<CreditCardDetail> {
        self.details
            .lock()
            .expect("vault lock poisoned")
            .get(&payment_id)
            .cloned()
    }

    /// Recover the full number if it is still recoverable: decrypted from the
    /// record, or read from the short-lived cache. Falls back to the mask.
    pub fn decrypted_number(&self, payment_id: Uuid) -> Result<CardNumber, VaultError> {
        let detail = self
            .detail(payment_id)
            .ok_or(VaultError::UnknownPayment(payment_id))?;

        if let Some(encrypted) = &detail.encrypted_cc {
            return Ok(CardNumber::Clear(self.decrypt(encrypted)?));
        }
        if let Some(number) = take_fresh(&self.number_cache, payment_id) {
            return Ok(CardNumber::Clear(number));
        }
        Ok(CardNumber::Masked(detail.masked_number()))
    }

    /// The CVV, while its TTL lasts. Never persisted.
    pub fn cached_cvv(&self, payment_id: Uuid) -> Option<Zeroizing<String>> {
        take_fresh(&self.cvv_cache, payment_id)
    }

    fn encrypt(&self, clear: &str) -> Result<String, VaultError> {
        let cipher =
            Aes256Gcm::new_from_slice(self.key.as_slice()).map_err(|_| VaultError::EncryptFailure)?;
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), clear.as_bytes())
            .map_err(|_| VaultError::EncryptFailure)?;

        let mut blob = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64_STANDARD.encode(blob))
    }

    fn decrypt(&self, armored: &str) -> Result<Zeroizing<String>, VaultError> {
        let blob = BASE64_STANDARD.decode(armored)?;
        if blob.len() < NONCE_LENGTH {
            return Err(VaultError::MissingNonce);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LENGTH);
        let cipher =
            Aes256Gcm::new_from_slice(self.key.as_slice()).map_err(|_| VaultError::DecryptFailure)?;
        let clear = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| VaultError::DecryptFailure)?;
        String::from_utf8(clear)
            .map(Zeroizing::new)
            .map_err(|_| VaultError::NotUtf8)
    }
}

fn take_fresh(
    cache: &Mutex<HashMap<Uuid, CachedSecret>>,
    payment_id: Uuid,
) -> Option<Zeroizing<String>> {
    let mut cache = cache.lock().expect("vault lock poisoned");
    match cache.get(&payment_id) {
        Some(secret) if secret.expires_at > Utc::now() => Some(secret.value.clone()),
        Some(_) => {
            cache.remove(&payment_id);
            None
        }
        None => None,
    }
}
