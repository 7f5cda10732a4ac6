use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    #[serde(rename = "VISA ELECTRON")]
    VisaElectron,
    #[serde(rename = "VISA")]
    Visa,
    #[serde(rename = "SWITCH")]
    Switch,
    #[serde(rename = "AMEX")]
    Amex,
    #[serde(rename = "MASTERCARD")]
    Mastercard,
    #[serde(rename = "UNIONPAY")]
    UnionPay,
    #[serde(rename = "DISCOVER")]
    Discover,
    #[serde(rename = "JCB")]
    Jcb,
    #[serde(rename = "MAESTRO")]
    Maestro,
    #[serde(rename = "DC")]
    DinersClub,
}

impl CardType {
    pub fn token(&self) -> &'static str {
        match self {
            CardType::VisaElectron => "VISA ELECTRON",
            CardType::Visa => "VISA",
            CardType::Switch => "SWITCH",
            CardType::Amex => "AMEX",
            CardType::Mastercard => "MASTERCARD",
            CardType::UnionPay => "UNIONPAY",
            CardType::Discover => "DISCOVER",
            CardType::Jcb => "JCB",
            CardType::Maestro => "MAESTRO",
            CardType::DinersClub => "DC",
        }
    }

    pub fn from_token(token: &str) -> Option<CardType> {
        CARD_RULES
            .iter()
            .map(|rule| rule.card_type)
            .find(|ty| ty.token() == token)
    }
}

struct CardRule {
    card_type: CardType,
    lengths: &'static [usize],
    // inclusive BIN ranges over the leading digits; both bounds share a width
    prefixes: &'static [(&'static str, &'static str)],
}

// Order encodes priority: schemes whose leading digits are a subset of a later
// entry's must come first (Visa Electron before Visa, Switch before Maestro,
// UnionPay 622126-622925 before Discover's identical range).
const CARD_RULES: &[CardRule] = &[
    CardRule {
        card_type: CardType::VisaElectron,
        lengths: &[16],
        prefixes: &[
            ("4026", "4026"),
            ("417500", "417500"),
            ("4508", "4508"),
            ("4844", "4844"),
            ("4913", "4913"),
            ("4917", "4917"),
        ],
    },
    CardRule {
        card_type: CardType::Visa,
        lengths: &[16],
        prefixes: &[("4", "4")],
    },
    CardRule {
        card_type: CardType::Switch,
        lengths: &[16, 17, 18, 19],
        prefixes: &[
            ("4903", "4903"),
            ("4905", "4905"),
            ("4911", "4911"),
            ("4936", "4936"),
            ("564182", "564182"),
            ("633110", "633110"),
            ("6333", "6333"),
            ("6759", "6759"),
        ],
    },
    CardRule {
        card_type: CardType::Amex,
        lengths: &[15],
        prefixes: &[("34", "37")],
    },
    CardRule {
        card_type: CardType::Mastercard,
        lengths: &[16],
        prefixes: &[("51", "55")],
    },
    CardRule {
        card_type: CardType::UnionPay,
        lengths: &[16, 17, 18, 19],
        prefixes: &[("622126", "622925"), ("624", "626"), ("6282", "6288")],
    },
    CardRule {
        card_type: CardType::Discover,
        lengths: &[16],
        prefixes: &[
            ("6011", "6011"),
            ("622126", "622925"),
            ("644", "649"),
            ("65", "65"),
        ],
    },
    CardRule {
        card_type: CardType::Jcb,
        lengths: &[16],
        prefixes: &[("3528", "3589")],
    },
    CardRule {
        card_type: CardType::Maestro,
        lengths: &[12, 13, 14, 15, 16, 17, 18, 19],
        prefixes: &[
            ("5018", "5018"),
            ("5020", "5020"),
            ("5038", "5038"),
            ("6304", "6304"),
            ("6759", "6759"),
            ("6761", "6761"),
            ("6763", "6763"),
        ],
    },
    CardRule {
        card_type: CardType::DinersClub,
        lengths: &[14],
        prefixes: &[("300", "305"), ("36", "36"), ("38", "38")],
    },
];

pub fn normalize_digits(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn prefix_in_range(digits: &str, low: &str, high: &str) -> bool {
    let width = low.len();
    if digits.len() < width {
        return false;
    }
    let prefix = &digits[..width];
    prefix >= low && prefix <= high
}

pub fn detect_card_type(number: &str) -> Option<CardType> {
    let digits = normalize_digits(number);
    let length = digits.len();

    CARD_RULES
        .iter()
        .find(|rule| {
            rule.lengths.contains(&length)
                && rule
                    .prefixes
                    .iter()
                    .any(|&(low, high)| prefix_in_range(&digits, low, high))
        })
        .map(|rule| rule.card_type)
}

pub fn luhn_checksum_valid(number: &str) -> bool {
    let digits = normalize_digits(number);
    if digits.is_empty() {
        return false;
    }

    let total: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 0 {
                d
            } else if d <= 4 {
                2 * d
            } else {
                2 * d - 9
            }
        })
        .sum();

    total % 10 == 0
}

pub fn required_cvc_length(card_type: CardType) -> Option<u8> {
    match card_type {
        CardType::Amex => Some(4),
        CardType::Visa
        | CardType::VisaElectron
        | CardType::Mastercard
        | CardType::Discover
        | CardType::Jcb => Some(3),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CvcError {
    #[error("security code is required")]
    Required,
    #[error("security code has an invalid length")]
    InvalidLength,
}

pub fn check_cvc(card_no: &str, cvc: &str) -> Result<(), CvcError> {
    let expected = match detect_card_type(card_no).and_then(required_cvc_length) {
        Some(len) => usize::from(len),
        None => return Ok(()),
    };

    let cvc = normalize_digits(cvc);
    if cvc.is_empty() {
        Err(CvcError::Required)
    } else if cvc.len() != expected {
        Err(CvcError::InvalidLength)
    } else {
        Ok(())
    }
}
