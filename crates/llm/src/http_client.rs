//! Shared reqwest client configuration for every upstream Vertex AI call.
//! Grounded on the teacher's `default_http_client_builder` — same pooling and
//! keep-alive tuning, just pointed at a single upstream host family instead
//! of many provider base URLs.

use std::time::Duration;

pub fn build() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(5))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("static client configuration is always valid")
}
