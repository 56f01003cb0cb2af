//! Challenge representation negotiation and the HTML paywall page.

use axum::http::HeaderMap;
use axum::http::header::{ACCEPT, USER_AGENT};
use paydrop_store::Product;
use paydrop_x402::requirements::PaymentRequired;

/// How a 402 challenge should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeMode {
    Json,
    Html,
}

impl ChallengeMode {
    /// One capability check decides the representation: browsers
    /// (`Accept: text/html` and a Mozilla-family `User-Agent`) get the
    /// paywall page, everything else gets the machine-readable JSON.
    pub fn negotiate(headers: &HeaderMap) -> Self {
        let accepts_html = headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/html"));
        let is_browser = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("Mozilla"));

        if accepts_html && is_browser {
            ChallengeMode::Html
        } else {
            ChallengeMode::Json
        }
    }
}

/// Render the paywall page for a product.
///
/// The challenge JSON is embedded verbatim so wallet extensions can pick
/// it up without a second request.
pub fn paywall_html(product: &Product, challenge: &PaymentRequired) -> String {
    let requirements_json =
        serde_json::to_string(challenge).unwrap_or_else(|_| "{}".to_string());
    let title = escape(&product.title);
    let description = escape(&product.description);
    let price = format_usd(product.price_cents);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} — Payment Required</title>
</head>
<body>
<main>
<h1>{title}</h1>
<p>{description}</p>
<p class="price">{price}</p>
<p>Pay with your x402-compatible wallet to unlock this download.</p>
<script type="application/x402+json" id="x402-requirements">{requirements_json}</script>
</main>
</body>
</html>
"#
    )
}

fn format_usd(price_cents: i64) -> String {
    format!("${}.{:02} USD", price_cents / 100, price_cents % 100)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
