use hyper::Method;
use tracing::{debug, warn};

use super::{Checker, Verdict};
use crate::client::{self, HttpRequest, HttpResponse};
use crate::endpoint::{EndpointState, Target};
use crate::monitoring::dns;
use crate::monitoring::types::Latency;

/// HTTP/HTTPS checker
pub(crate) struct HttpChecker;

impl HttpChecker {
    fn request(target: &Target) -> HttpRequest {
        let config = &target.config;
        let mut request = HttpRequest::new(target.method.clone(), config.address.as_str())
            .headers(config.http.headers.clone())
            .resolve_to(target.resolve_to)
            .timeout(config.timeout)
            .verify_tls(config.http.verify_ssl);

        if target.method == Method::POST {
            request = request.body(config.http.post_data.clone(), "application/json");
        }
        request
    }

    /// Compare a response against the expectations of `target`
    fn evaluate(target: &Target, response: &HttpResponse, state: &mut EndpointState) -> Verdict {
        state.network_latency = response.metrics.network_latency();
        state.request_latency = response.metrics.request_latency();
        state.last_status_code = Some(response.status);
        state.last_response = response.text();

        if let Some(expected) = &target.expected {
            if !expected.is_match(&state.last_response) {
                warn!(pattern = %expected, "Response body did not match");
                return Verdict::failure(format!(
                    "HTTP Response Body did not match '{}'",
                    expected.as_str()
                ));
            }
        }

        let expected_status = target.config.http.expected_status;
        if response.status != expected_status {
            warn!(status = response.status, expected = expected_status, "Unexpected status code");
            return Verdict::failure(format!(
                "HTTP Status Code {} did not match {}",
                response.status, expected_status
            ));
        }

        Verdict::Success
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &Target, state: &mut EndpointState) -> Verdict {
        if target.resolve_to.is_none() {
            match dns::timed_lookup(&target.host).await {
                Ok((_ips, elapsed)) => state.dns_resolve = Latency::from_duration(elapsed),
                Err(e) => {
                    state.dns_resolve = Latency::UNMEASURED;
                    state.network_latency = Latency::UNMEASURED;
                    return Verdict::failure(format!(
                        "Could not get IP address for domain {}, {e}",
                        target.host
                    ));
                }
            }
        } else {
            state.dns_resolve = Latency::UNMEASURED;
        }

        let request = Self::request(target);
        let response = match client::send(&request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %request.url, "HTTP request failed: {}", e);
                state.network_latency = Latency::UNMEASURED;
                state.request_latency = Latency::UNMEASURED;
                return Verdict::failure(format!("HTTP Error: {e}"));
            }
        };

        Self::evaluate(target, &response, state)
    }
}
