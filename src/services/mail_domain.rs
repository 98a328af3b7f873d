// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mail exchange (MX) checks for email domains.
//!
//! Uses a DNS-over-HTTPS resolver with the JSON API
//! (`GET {resolver}?name=<domain>&type=MX`).

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// DNS record type number for MX.
const MX_RECORD_TYPE: u16 = 15;
const RESOLVER_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum MailDomainError {
    #[error("DNS resolver error: {0}")]
    Resolver(String),
}

#[async_trait]
pub trait MailDomainChecker: Send + Sync {
    /// True if `domain` publishes at least one usable MX record.
    async fn has_mail_exchange(&self, domain: &str) -> Result<bool, MailDomainError>;
}

/// Resolver JSON response (only the fields we use).
#[derive(Debug, Deserialize)]
struct DnsResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DnsAnswer>,
}

#[derive(Debug, Deserialize)]
struct DnsAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// `has_mail_exchange` over DNS-over-HTTPS.
#[derive(Clone)]
pub struct DnsOverHttpsChecker {
    http: reqwest::Client,
    resolver_url: String,
}

impl DnsOverHttpsChecker {
    pub fn new(resolver_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(RESOLVER_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            resolver_url: resolver_url.to_string(),
        }
    }
}

#[async_trait]
impl MailDomainChecker for DnsOverHttpsChecker {
    async fn has_mail_exchange(&self, domain: &str) -> Result<bool, MailDomainError> {
        let response = self
            .http
            .get(&self.resolver_url)
            .header("accept", "application/dns-json")
            .query(&[("name", domain), ("type", "MX")])
            .send()
            .await
            .map_err(|e| MailDomainError::Resolver(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MailDomainError::Resolver(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body: DnsResponse = response
            .json()
            .await
            .map_err(|e| MailDomainError::Resolver(format!("JSON parse error: {}", e)))?;

        Ok(has_usable_mx(&body))
    }
}

/// NOERROR with at least one MX answer that is not a null MX (RFC 7505).
fn has_usable_mx(response: &DnsResponse) -> bool {
    response.status == 0
        && response
            .answer
            .iter()
            .filter(|a| a.record_type == MX_RECORD_TYPE)
            .any(|a| !is_null_mx(&a.data))
}

fn is_null_mx(data: &str) -> bool {
    let mut parts = data.split_whitespace();
    matches!((parts.next(), parts.next()), (Some("0"), Some(".")))
}

/// Fixed set of domains that have MX records.
#[derive(Debug, Default, Clone)]
pub struct StaticMailDomains {
    domains: HashSet<String>,
}

impl StaticMailDomains {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.into().to_ascii_lowercase())
                .collect(),
        }
    }
}

#[async_trait]
impl MailDomainChecker for StaticMailDomains {
    async fn has_mail_exchange(&self, domain: &str) -> Result<bool, MailDomainError> {
        Ok(self.domains.contains(&domain.to_ascii_lowercase()))
    }
}
