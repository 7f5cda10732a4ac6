use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Utc};

use crate::config::WorldpaySettings;
use crate::domain::form::FormData;
use crate::domain::payment::PaymentStatus;
use crate::error::{GatewayError, PaymentError};
use crate::gateways::{AdapterResult, GatewayAdapter, PaymentContext};
use crate::vault::CardVault;

const WIRE_LOG_CAP: usize = 256;

pub const PAYMENT_METHOD_CODES: &[(&str, &str)] = &[
    ("AMEX", "AMEX-SSL"),
    ("VISA", "VISA-SSL"),
    ("MASTERCARD", "ECMC-SSL"),
    ("DC", "DINERS-SSL"),
    ("DISCOVER", "DISCOVER-SSL"),
    ("JCB", "JCB-SSL"),
    ("MAESTRO", "MAESTRO-SSL"),
    ("SOLO", "SOLO_GB-SSL"),
    ("LASER", "LASER-SSL"),
    ("DANKORT", "DANKORT-SSL"),
    ("CARTEBLEUE", "CARTEBLEUE-SSL"),
];

// In-process variants and reversal map onto the nearest settled-side status.
pub const STATUS_CODES: &[(&str, PaymentStatus)] = &[
    ("AUTHORISED", PaymentStatus::Authorized),
    ("IN_PROCESS_AUTHORISED", PaymentStatus::Authorized),
    ("REFUSED", PaymentStatus::Refused),
    ("CANCELLED", PaymentStatus::Cancelled),
    ("EXPIRED", PaymentStatus::Expired),
    ("CAPTURED", PaymentStatus::Captured),
    ("IN_PROCESS_CAPTURED", PaymentStatus::Captured),
    ("SETTLED", PaymentStatus::Settled),
    ("REFUNDED", PaymentStatus::Refunded),
    ("SENT_FOR_REFUND", PaymentStatus::Refunded),
    ("CHARGED_BACK", PaymentStatus::ChargedBack),
    ("CHARGEBACK_REVERSED", PaymentStatus::Settled),
];

pub fn method_code(card_type: &str) -> Option<&'static str> {
    PAYMENT_METHOD_CODES
        .iter()
        .find(|(ty, _)| *ty == card_type)
        .map(|(_, code)| *code)
}

pub fn map_status_code(code: &str) -> Option<PaymentStatus> {
    STATUS_CODES
        .iter()
        .find(|(wire, _)| *wire == code)
        .map(|(_, status)| *status)
}

/// One request/response exchange, kept for postmortem when not live.
/// Card number and CVC are masked before recording.
#[derive(Debug, Clone)]
pub struct WireRecord {
    pub at: DateTime<Utc>,
    pub request: String,
    pub response: String,
}

pub struct WorldpayAdapter {
    merchant_id: String,
    xml_password: String,
    currency: String,
    service_url: String,
    prefix: String,
    timeout_ms: u64,
    client: reqwest::Client,
    vault: Arc<CardVault>,
    wire_log: Option<Mutex<Vec<WireRecord>>>,
}

impl WorldpayAdapter {
    pub fn from_settings(
        settings: &WorldpaySettings,
        live: bool,
        vault: Arc<CardVault>,
        client: reqwest::Client,
    ) -> Result<Self, PaymentError> {
        for (name, value) in [
            ("WORLDPAY_MERCHANT_ID", &settings.merchant_id),
            ("WORLDPAY_XML_PASSWORD", &settings.xml_password),
        ] {
            if value.is_empty() {
                return Err(PaymentError::Configuration(format!(
                    "{name} must be set for the worldpay gateway"
                )));
            }
        }

        Ok(Self {
            merchant_id: settings.merchant_id.clone(),
            xml_password: settings.xml_password.clone(),
            currency: settings.currency.clone(),
            service_url: if live {
                settings.service_url.clone()
            } else {
                settings.test_service_url.clone()
            },
            prefix: settings.prefix.clone(),
            timeout_ms: settings.timeout_ms,
            client,
            vault,
            wire_log: (!live).then(|| Mutex::new(Vec::new())),
        })
    }

    pub fn wire_log(&self) -> Vec<WireRecord> {
        self.wire_log
            .as_ref()
            .map(|log| log.lock().expect("wire log lock poisoned").clone())
            .unwrap_or_default()
    }

    fn record(&self, request: &str, response: &str) {
        let Some(log) = &self.wire_log else { return };
        let mut log = log.lock().expect("wire log lock poisoned");
        if log.len() >= WIRE_LOG_CAP {
            log.remove(0);
        }
        log.push(WireRecord {
            at: Utc::now(),
            request: request.to_string(),
            response: response.to_string(),
        });
    }

    fn order_code(&self, ctx: &PaymentContext) -> Result<String, GatewayError> {
        ctx.transaction_id
            .clone()
            .ok_or_else(|| GatewayError::new("payment has no gateway transaction id"))
    }

    fn envelope(&self, body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE paymentService PUBLIC "-//WorldPay//DTD WorldPay PaymentService v1//EN" "http://dtd.worldpay.com/paymentService_v1.dtd">
<paymentService version="1.4" merchantCode="{merchant}">
{body}
</paymentService>"#,
            merchant = xml_escape(&self.merchant_id),
        )
    }

    fn authorize_request(
        &self,
        ctx: &PaymentContext,
        form: &FormData,
        code: &str,
        order_code: &str,
    ) -> String {
        let mut details = format!(
            "<cardNumber>{}</cardNumber>\
             <expiryDate><date month=\"{:02}\" year=\"{}\"/></expiryDate>\
             <cardHolderName>{}</cardHolderName>",
            xml_escape(&form.card_no),
            form.expiry.month(),
            form.expiry.year(),
            xml_escape(&form.name),
        );
        if let Some(start) = form.start_date {
            details.push_str(&format!(
                "<startDate><date month=\"{:02}\" year=\"{}\"/></startDate>",
                start.month(),
                start.year(),
            ));
        }
        if let Some(issue) = &form.issue_num {
            details.push_str(&format!("<issueNumber>{}</issueNumber>", xml_escape(issue)));
        }
        if !form.cvc.is_empty() {
            details.push_str(&format!("<cvc>{}</cvc>", xml_escape(&form.cvc)));
        }
        details.push_str(&format!(
            "<cardAddress><address><street>{}</street><postalCode>{}</postalCode>\
             <city>{}</city><countryCode>{}</countryCode></address></cardAddress>",
            xml_escape(&form.address),
            xml_escape(&form.zip),
            xml_escape(&form.city),
            xml_escape(&form.country),
        ));

        let shipping = ctx
            .shipping_address
            .as_ref()
            .map(|addr| {
                format!(
                    "<shippingAddress><address><street>{}</street><postalCode>{}</postalCode>\
                     <city>{}</city><countryCode>{}</countryCode></address></shippingAddress>",
                    xml_escape(&addr.street_address1),
                    xml_escape(&addr.postal_code),
                    xml_escape(&addr.city),
                    xml_escape(&addr.country),
                )
            })
            .unwrap_or_default();

        self.envelope(&format!(
            "<submit><order orderCode=\"{order}\">\
             <description>Payment {payment}</description>\
             <amount value=\"{value}\" currencyCode=\"{currency}\" exponent=\"2\"/>\
             <paymentDetails><{code}>{details}</{code}></paymentDetails>\
             <shopper><shopperEmailAddress>{email}</shopperEmailAddress></shopper>\
             {shipping}\
             </order></submit>",
            order = xml_escape(order_code),
            payment = ctx.payment_id,
            value = ctx.amount_minor,
            currency = xml_escape(&self.currency),
            email = xml_escape(&form.email),
        ))
    }

    fn modification_request(&self, order_code: &str, body: &str) -> String {
        self.envelope(&format!(
            "<modify><orderModification orderCode=\"{}\">{body}</orderModification></modify>",
            xml_escape(order_code),
        ))
    }

    fn inquiry_request(&self, order_code: &str) -> String {
        self.envelope(&format!(
            "<inquiry><orderInquiry orderCode=\"{}\"/></inquiry>",
            xml_escape(order_code),
        ))
    }

    fn amount_fragment(&self, amount_minor: i64) -> String {
        format!(
            "<amount value=\"{amount_minor}\" currencyCode=\"{}\" exponent=\"2\"/>",
            xml_escape(&self.currency),
        )
    }

    async fn send_post(&self, request_text: String) -> Result<String, GatewayError> {
        let sanitized = sanitize(&request_text);
        tracing::debug!(url = %self.service_url, request = %sanitized, "sending request");

        let response = self
            .client
            .post(&self.service_url)
            .basic_auth(&self.merchant_id, Some(&self.xml_password))
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(request_text)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .map_err(|e| {
                self.record(&sanitized, &format!("transport error: {e}"));
                GatewayError::new(format!("transport failure: {e}"))
            })?;

        let body = response.text().await.map_err(|e| {
            self.record(&sanitized, &format!("unreadable response body: {e}"));
            GatewayError::new(format!("unreadable response body: {e}"))
        })?;

        // a malformed body must land in the wire log before any parse error
        self.record(&sanitized, &body);
        tracing::debug!(response = %body, "response received");
        Ok(body)
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for WorldpayAdapter {
    fn key(&self) -> &'static str {
        "WORLDPAY"
    }

    async fn authorize(
        &self,
        ctx: &PaymentContext,
        form: &FormData,
    ) -> Result<AdapterResult, GatewayError> {
        tracing::debug!(payment_id = %ctx.payment_id, form = ?form, "authorize request");

        let order_code = ctx
            .transaction_id
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.prefix, ctx.payment_id));

        let code = method_code(&form.card_type)
            .ok_or_else(|| GatewayError::new("invalid payment method"))?;

        let request = self.authorize_request(ctx, form, code, &order_code);
        let body = self.send_post(request).await?;
        let mut result = parse_payment_reply(&body)?;

        self.vault
            .store(ctx.payment_id, form)
            .map_err(|e| GatewayError::new(format!("card vault rejected detail: {e}")))?;

        result.transaction_id = Some(order_code);
        tracing::debug!(payment_id = %ctx.payment_id, result = ?result, "authorize result");
        Ok(result)
    }

    async fn capture(
        &self,
        _ctx: &PaymentContext,
        _form: &FormData,
    ) -> Result<AdapterResult, GatewayError> {
        Err(GatewayError::new(
            "direct capture is not supported, authorize first",
        ))
    }

    async fn capture_authorized(
        &self,
        ctx: &PaymentContext,
        amount_minor: i64,
    ) -> Result<AdapterResult, GatewayError> {
        tracing::debug!(payment_id = %ctx.payment_id, amount_minor, "capture authorized request");

        let order_code = self.order_code(ctx)?;
        let request = self.modification_request(
            &order_code,
            &format!("<capture>{}</capture>", self.amount_fragment(amount_minor)),
        );
        let body = self.send_post(request).await?;
        let captured = parse_receipt_amount(&body, "captureReceived")?;

        Ok(AdapterResult {
            status: Some(PaymentStatus::Captured),
            amount_minor: Some(captured),
            ..Default::default()
        })
    }

    async fn release_authorized(
        &self,
        ctx: &PaymentContext,
    ) -> Result<AdapterResult, GatewayError> {
        tracing::debug!(payment_id = %ctx.payment_id, "release authorized request");

        let order_code = self.order_code(ctx)?;
        let request = self.modification_request(&order_code, "<cancel/>");
        let body = self.send_post(request).await?;
        parse_receipt_ack(&body, "cancelReceived")?;

        Ok(AdapterResult {
            status: Some(PaymentStatus::Cancelled),
            ..Default::default()
        })
    }

    async fn refund(
        &self,
        ctx: &PaymentContext,
        amount_minor: i64,
    ) -> Result<AdapterResult, GatewayError> {
        debug_assert!(amount_minor <= ctx.amount_minor);
        tracing::debug!(payment_id = %ctx.payment_id, amount_minor, "refund request");

        let order_code = self.order_code(ctx)?;
        let request = self.modification_request(
            &order_code,
            &format!("<refund>{}</refund>", self.amount_fragment(amount_minor)),
        );
        let body = self.send_post(request).await?;
        let refunded = parse_receipt_amount(&body, "refundReceived")?;
        if refunded == 0 {
            return Err(GatewayError::new(
                "missing refund amount node in modification response",
            ));
        }

        let remaining = ctx.amount_minor - refunded;
        Ok(AdapterResult {
            amount_minor: Some(remaining),
            status: (remaining <= 0).then_some(PaymentStatus::Refunded),
            ..Default::default()
        })
    }

    async fn get_payment_status(
        &self,
        ctx: &PaymentContext,
    ) -> Result<AdapterResult, GatewayError> {
        tracing::debug!(payment_id = %ctx.payment_id, "status inquiry request");

        let order_code = self.order_code(ctx)?;
        let request = self.inquiry_request(&order_code);
        let body = self.send_post(request).await?;
        parse_payment_reply(&body)
    }
}

/// Parses an order-status style reply down to `orderStatus/payment`.
pub fn parse_payment_reply(body: &str) -> Result<AdapterResult, GatewayError> {
    let doc = parse_document(body)?;
    let reply = parse_reply(&doc)?;
    let payment = find_path(reply, &["orderStatus", "payment"])
        .ok_or_else(|| GatewayError::new("missing orderStatus/payment node in response"))?;
    parse_payment_node(payment)
}

/// Parses a modification reply and extracts the receipt's amount in minor
/// units (`captureReceived`, `refundReceived`).
pub fn parse_receipt_amount(body: &str, receipt: &str) -> Result<i64, GatewayError> {
    let doc = parse_document(body)?;
    let reply = parse_reply(&doc)?;
    let amount_node = find_path(reply, &["ok", receipt, "amount"]).ok_or_else(|| {
        GatewayError::new(format!("missing ok/{receipt}/amount node in modification response"))
    })?;
    parse_amount_minor(amount_node)
        .ok_or_else(|| GatewayError::new("invalid amount node in response"))
}

/// Parses a modification reply that only acknowledges (`cancelReceived`).
pub fn parse_receipt_ack(body: &str, receipt: &str) -> Result<(), GatewayError> {
    let doc = parse_document(body)?;
    let reply = parse_reply(&doc)?;
    find_path(reply, &["ok", receipt])
        .map(|_| ())
        .ok_or_else(|| {
            GatewayError::new(format!("missing ok/{receipt} node in modification response"))
        })
}

fn parse_document(body: &str) -> Result<roxmltree::Document<'_>, GatewayError> {
    roxmltree::Document::parse(body)
        .map_err(|e| GatewayError::new(format!("unparseable response: {e}")))
}

fn parse_reply<'a, 'i>(
    doc: &'a roxmltree::Document<'i>,
) -> Result<roxmltree::Node<'a, 'i>, GatewayError> {
    let reply = doc
        .descendants()
        .find(|n| n.has_tag_name("reply"))
        .ok_or_else(|| GatewayError::new("invalid request: no reply node"))?;

    let sub_errors: BTreeMap<i32, String> = reply
        .children()
        .filter(|n| n.has_tag_name("error"))
        .filter_map(|n| {
            let code = n.attribute("code")?.parse().ok()?;
            Some((code, n.text().unwrap_or_default().trim().to_string()))
        })
        .collect();
    if !sub_errors.is_empty() {
        return Err(GatewayError::with_sub_errors("errors in response", sub_errors));
    }

    Ok(reply)
}

fn find_path<'a, 'i>(
    node: roxmltree::Node<'a, 'i>,
    path: &[&str],
) -> Option<roxmltree::Node<'a, 'i>> {
    let mut current = node;
    for tag in path {
        current = current.children().find(|c| c.has_tag_name(*tag))?;
    }
    Some(current)
}

fn parse_payment_node(payment: roxmltree::Node) -> Result<AdapterResult, GatewayError> {
    let balance = payment.children().find(|n| n.has_tag_name("balance"));
    let (amount_node, status_code) = match balance {
        Some(balance) => (
            balance.children().find(|n| n.has_tag_name("amount")),
            balance.attribute("accountType").map(str::to_string),
        ),
        None => (
            payment.children().find(|n| n.has_tag_name("amount")),
            payment
                .children()
                .find(|n| n.has_tag_name("lastEvent"))
                .and_then(|n| n.text())
                .map(|s| s.trim().to_string()),
        ),
    };

    let amount_minor = amount_node
        .and_then(parse_amount_minor)
        .ok_or_else(|| GatewayError::new("invalid amount node in response"))?;
    let status = status_code
        .as_deref()
        .and_then(map_status_code)
        .ok_or_else(|| GatewayError::new("invalid payment status received"))?;

    let mut result = AdapterResult {
        status: Some(status),
        amount_minor: Some(amount_minor),
        ..Default::default()
    };
    if let Some(desc) = payment
        .children()
        .find(|n| n.has_tag_name("ISO8583ReturnCode"))
        .and_then(|n| n.attribute("description"))
    {
        result.reason = Some(desc.to_string());
    }
    Ok(result)
}

// Normalizes value/exponent attribute pairs to two-decimal minor units.
fn parse_amount_minor(node: roxmltree::Node) -> Option<i64> {
    let value: i64 = node.attribute("value")?.parse().ok()?;
    let exponent: u32 = node.attribute("exponent")?.parse().ok()?;
    match exponent {
        2 => Some(value),
        e if e < 2 => value.checked_mul(10i64.pow(2 - e)),
        e => {
            let divisor = 10i64.checked_pow(e - 2)?;
            (value % divisor == 0).then(|| value / divisor)
        }
    }
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn sanitize(request: &str) -> String {
    let masked = mask_element(request, "cardNumber");
    mask_element(&masked, "cvc")
}

fn mask_element(text: &str, tag: &str) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    match (text.find(&open), text.find(&close)) {
        (Some(start), Some(end)) if end > start => {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..start + open.len()]);
            out.push_str("***");
            out.push_str(&text[end..]);
            out
        }
        _ => text.to_string(),
    }
}
