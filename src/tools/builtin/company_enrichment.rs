//! Company enrichment for Tier 2 profile context.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::context::ToolContext;
use crate::profile::CompanySize;
use crate::tools::tool::{Tool, ToolError, ToolOutcome, parse_input, to_output};

/// Fields the enrichment provider can verify.
const MAX_VERIFIED_FIELDS: f64 = 6.0;

static EMPLOYEE_RANGE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)-(\d+)").ok());

/// Verified data returned by an enrichment provider.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedCompany {
    /// Headcount range such as `"51-200"`.
    #[serde(default)]
    pub employee_count: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub verified: VerifiedCompany,
    #[serde(default)]
    pub verified_field_count: u32,
}

/// Looks up company facts by name.
#[async_trait]
pub trait CompanyEnricher: Send + Sync {
    async fn enrich(&self, company_name: &str) -> Result<EnrichmentResult, ToolError>;
}

/// Enrichment over an HTTP endpoint.
///
/// Posts `{companyName, website}` and expects `{verified, verifiedFieldCount}`.
/// Without a configured URL every lookup fails.
pub struct HttpEnricher {
    client: reqwest::Client,
    url: Option<String>,
}

impl HttpEnricher {
    pub fn new(url: Option<String>) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ToolError::ExecutionFailed(format!("http client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl CompanyEnricher for HttpEnricher {
    async fn enrich(&self, company_name: &str) -> Result<EnrichmentResult, ToolError> {
        let Some(url) = &self.url else {
            return Err(ToolError::ExecutionFailed(
                "Company enrichment is not configured".to_string(),
            ));
        };
        let response = self
            .client
            .post(url)
            .json(&json!({ "companyName": company_name, "website": "" }))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("enrichment request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "enrichment service returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("invalid enrichment response: {e}")))
    }
}

/// Midpoint of a `"min-max"` headcount range, rounded down.
pub fn employee_count_from_range(range: &str) -> Option<u64> {
    let caps = EMPLOYEE_RANGE.as_ref()?.captures(range)?;
    let min: u64 = caps.get(1)?.as_str().parse().ok()?;
    let max: u64 = caps.get(2)?.as_str().parse().ok()?;
    Some(min / 2 + max / 2 + (min % 2 + max % 2) / 2)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Input {
    company_name: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrichedData {
    employee_count: Option<u64>,
    industry: Option<String>,
    funding_stage: Option<String>,
    known_leveling: Option<String>,
    description: Option<String>,
    linkedin_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    success: bool,
    company_name: String,
    enriched_data: EnrichedData,
    enrichment_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggested_company_size: Option<CompanySize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub struct CompanyEnrichmentTool {
    enricher: Arc<dyn CompanyEnricher>,
}

impl CompanyEnrichmentTool {
    pub fn new(enricher: Arc<dyn CompanyEnricher>) -> Self {
        Self { enricher }
    }
}

#[async_trait]
impl Tool for CompanyEnrichmentTool {
    fn name(&self) -> &str {
        "companyEnrichmentTool"
    }

    fn description(&self) -> &str {
        "Enriches company data with employee count, industry, funding stage, and known \
         leveling framework. Use this as soon as a company name is mentioned."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "companyName": {
                    "type": "string",
                    "description": "The name of the company to enrich"
                }
            },
            "required": ["companyName"],
            "additionalProperties": false
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "success": { "type": "boolean" },
                "companyName": { "type": "string" },
                "enrichedData": {
                    "type": "object",
                    "properties": {
                        "employeeCount": { "type": ["number", "null"] },
                        "industry": { "type": ["string", "null"] },
                        "fundingStage": { "type": ["string", "null"] },
                        "knownLeveling": { "type": ["string", "null"] },
                        "description": { "type": ["string", "null"] },
                        "linkedinUrl": { "type": ["string", "null"] }
                    }
                },
                "enrichmentConfidence": { "type": "number", "minimum": 0, "maximum": 1 },
                "error": { "type": "string" }
            },
            "required": ["success", "companyName", "enrichedData", "enrichmentConfidence"]
        })
    }

    fn validate_input(&self, input: &Value) -> Result<(), ToolError> {
        let input: Input = parse_input(input)?;
        if input.company_name.trim().is_empty() {
            return Err(ToolError::InvalidParameters(
                "companyName must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let Input { company_name } = parse_input(&input)?;

        let output = match self.enricher.enrich(&company_name).await {
            Ok(result) => {
                let employee_count = result
                    .verified
                    .employee_count
                    .as_deref()
                    .and_then(employee_count_from_range);
                Output {
                    success: true,
                    enrichment_confidence: (f64::from(result.verified_field_count)
                        / MAX_VERIFIED_FIELDS)
                        .min(1.0),
                    suggested_company_size: employee_count.map(CompanySize::from_employee_count),
                    enriched_data: EnrichedData {
                        employee_count,
                        industry: result.verified.industry,
                        funding_stage: None,
                        known_leveling: None,
                        description: result.verified.description,
                        linkedin_url: result.verified.linkedin_url,
                    },
                    company_name,
                    error: None,
                }
            }
            Err(e) => {
                warn!(company = %company_name, error = %e, "Company enrichment failed");
                Output {
                    success: false,
                    company_name,
                    enriched_data: EnrichedData::default(),
                    enrichment_confidence: 0.0,
                    suggested_company_size: None,
                    error: Some(match e {
                        ToolError::ExecutionFailed(msg) => msg,
                        other => other.to_string(),
                    }),
                }
            }
        };
        to_output(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEnricher(Option<EnrichmentResult>);

    #[async_trait]
    impl CompanyEnricher for FixedEnricher {
        async fn enrich(&self, _company_name: &str) -> Result<EnrichmentResult, ToolError> {
            self.0
                .clone()
                .ok_or_else(|| ToolError::ExecutionFailed("provider down".into()))
        }
    }

    async fn run(enricher: FixedEnricher) -> Value {
        let tool = CompanyEnrichmentTool::new(Arc::new(enricher));
        match tool
            .execute(json!({"companyName": "Acme"}), &ToolContext::default())
            .await
            .unwrap()
        {
            ToolOutcome::Output(v) => v,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn range_midpoint_rounds_down() {
        assert_eq!(employee_count_from_range("51-200"), Some(125));
        assert_eq!(employee_count_from_range("1-10"), Some(5));
        assert_eq!(employee_count_from_range("about 10k"), None);
        assert_eq!(
            employee_count_from_range("18446744073709551614-18446744073709551615"),
            Some(18_446_744_073_709_551_614)
        );
    }

    #[tokio::test]
    async fn successful_enrichment() {
        let out = run(FixedEnricher(Some(EnrichmentResult {
            verified: VerifiedCompany {
                employee_count: Some("51-200".into()),
                industry: Some("FINTECH".into()),
                description: Some("Payments".into()),
                linkedin_url: None,
            },
            verified_field_count: 3,
        })))
        .await;

        assert_eq!(out["success"], true);
        assert_eq!(out["companyName"], "Acme");
        assert_eq!(out["enrichedData"]["employeeCount"], 125);
        assert_eq!(out["enrichedData"]["fundingStage"], Value::Null);
        assert_eq!(out["enrichmentConfidence"], 0.5);
        assert_eq!(out["suggestedCompanySize"], "SMALL_51_200");
        assert!(out.get("error").is_none());
    }

    #[tokio::test]
    async fn confidence_is_capped() {
        let out = run(FixedEnricher(Some(EnrichmentResult {
            verified: VerifiedCompany::default(),
            verified_field_count: 9,
        })))
        .await;
        assert_eq!(out["enrichmentConfidence"], 1.0);
    }

    #[tokio::test]
    async fn failure_is_structured_output() {
        let out = run(FixedEnricher(None)).await;
        assert_eq!(out["success"], false);
        assert_eq!(out["enrichmentConfidence"], 0.0);
        assert_eq!(out["enrichedData"]["employeeCount"], Value::Null);
        assert_eq!(out["enrichedData"]["linkedinUrl"], Value::Null);
        assert_eq!(out["error"], "provider down");
    }

    #[tokio::test]
    async fn unconfigured_http_enricher_fails() {
        let enricher = HttpEnricher::new(None).unwrap();
        assert!(enricher.enrich("Acme").await.is_err());
    }
}
