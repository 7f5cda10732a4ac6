#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub live: bool,
    pub default_gateway: String,
    pub store_card_numbers: bool,
    pub card_cache_ttl_secs: i64,
    pub vault_key: String,
    pub worldpay_enabled: bool,
    pub worldpay: WorldpaySettings,
    pub worldpay_callback_allow: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WorldpaySettings {
    pub merchant_id: String,
    pub xml_password: String,
    pub currency: String,
    pub service_url: String,
    pub test_service_url: String,
    pub prefix: String,
    pub timeout_ms: u64,
}

impl Default for WorldpaySettings {
    fn default() -> Self {
        Self {
            merchant_id: String::new(),
            xml_password: String::new(),
            currency: "GBP".to_string(),
            service_url: "https://secure.wp3.rbsworldpay.com/jsp/merchant/xml/paymentService.jsp"
                .to_string(),
            test_service_url:
                "https://secure-test.wp3.rbsworldpay.com/jsp/merchant/xml/paymentService.jsp"
                    .to_string(),
            prefix: String::new(),
            timeout_ms: 10_000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let worldpay_defaults = WorldpaySettings::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            live: env_flag("PAYMENTS_LIVE"),
            default_gateway: std::env::var("DEFAULT_GATEWAY")
                .unwrap_or_else(|_| "AUTOSUCCESS".to_string()),
            store_card_numbers: env_flag("STORE_CARD_NUMBERS"),
            card_cache_ttl_secs: std::env::var("CARD_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(3_000_000),
            vault_key: std::env::var("VAULT_KEY")
                .unwrap_or_else(|_| "dev-vault-key-32-bytes-long!!!!!".to_string()),
            worldpay_enabled: env_flag("WORLDPAY_ENABLED"),
            worldpay: WorldpaySettings {
                merchant_id: std::env::var("WORLDPAY_MERCHANT_ID").unwrap_or_default(),
                xml_password: std::env::var("WORLDPAY_XML_PASSWORD").unwrap_or_default(),
                currency: std::env::var("WORLDPAY_CURRENCY")
                    .unwrap_or(worldpay_defaults.currency),
                service_url: std::env::var("WORLDPAY_SERVICE_URL")
                    .unwrap_or(worldpay_defaults.service_url),
                test_service_url: std::env::var("WORLDPAY_TEST_SERVICE_URL")
                    .unwrap_or(worldpay_defaults.test_service_url),
                prefix: std::env::var("WORLDPAY_PREFIX").unwrap_or_default(),
                timeout_ms: std::env::var("WORLDPAY_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(worldpay_defaults.timeout_ms),
            },
            worldpay_callback_allow: std::env::var("WORLDPAY_CALLBACK_ALLOW")
                .map(|s| {
                    s.split(',')
                        .map(|ip| ip.trim().to_string())
                        .filter(|ip| !ip.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}
