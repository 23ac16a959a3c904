//! Deployment dispatch to Railway.
//!
//! The service topology lives in a versioned JSON template resource rather
//! than inline code; this module only fills the template's placeholder
//! strings and sends the one GraphQL mutation. Upstream rejection is
//! surfaced verbatim and never retried.

use crate::chains;
use crate::config::AppConfig;
use crate::errors::WizardError;
use log::{error, info};
use serde_json::{json, Value};
use std::collections::HashMap;

const TOPOLOGY_TEMPLATE: &str = include_str!("../../templates/railway-topology.json");
const RAILWAY_GRAPHQL_URL: &str = "https://backboard.railway.app/graphql/v2";

#[derive(Debug, Clone)]
pub struct DeploymentReceipt {
    pub project_id: Option<String>,
    pub workflow_id: Option<String>,
    pub project_url: Option<String>,
}

pub struct RailwayDispatcher {
    http: reqwest::Client,
    config: AppConfig,
    graphql_url: String,
}

impl RailwayDispatcher {
    pub fn new(http: reqwest::Client, config: AppConfig) -> Self {
        Self {
            http,
            config,
            graphql_url: RAILWAY_GRAPHQL_URL.to_string(),
        }
    }

    /// Builds the service topology for one adapter deployment by filling the
    /// template's placeholders.
    pub fn topology(&self, config_base64: &str, chain_id: u64) -> Result<Value, WizardError> {
        let rpc_url = chains::rpc_url_for(chain_id, &self.config.rpc_api_key)
            .ok_or(WizardError::UnsupportedChain(chain_id))?;

        let mut substitutions = HashMap::new();
        substitutions.insert("{{RPC_URL}}", rpc_url);
        substitutions.insert("{{INDEXER_CONFIG}}", config_base64.to_string());
        substitutions.insert(
            "{{ABSINTHE_API_KEY}}",
            self.config.absinthe_api_key.clone(),
        );
        substitutions.insert(
            "{{ABSINTHE_API_URL}}",
            self.config.absinthe_api_url.clone(),
        );
        substitutions.insert(
            "{{COINGECKO_API_KEY}}",
            self.config.coingecko_api_key.clone(),
        );

        let mut topology: Value = serde_json::from_str(TOPOLOGY_TEMPLATE)?;
        fill_placeholders(&mut topology, &substitutions);
        Ok(topology)
    }

    /// Sends the deployment mutation. `template_id` overrides the configured
    /// default when present.
    pub async fn deploy(
        &self,
        config_base64: &str,
        chain_id: u64,
        template_id: Option<String>,
    ) -> Result<DeploymentReceipt, WizardError> {
        let railway = self
            .config
            .railway
            .as_ref()
            .ok_or(WizardError::DeploymentDisabled)?;
        let template_id = template_id.unwrap_or_else(|| railway.template_id.clone());

        let serialized_config = self.topology(config_base64, chain_id)?;
        let body = json!({
            "query": "mutation templateDeployV2($input: TemplateDeployV2Input!) { templateDeployV2(input: $input) { projectId workflowId } }",
            "variables": {
                "input": {
                    "serializedConfig": serialized_config,
                    "workspaceId": railway.workspace_id,
                    "templateId": template_id,
                }
            }
        });

        let response = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(&railway.api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("railway API error: {status} - {text}");
            return Err(WizardError::DeployRejected(format!(
                "Railway API error: {status} - {text}"
            )));
        }

        let data: Value = response.json().await?;
        if let Some(errors) = data.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                let message = errors[0]["message"]
                    .as_str()
                    .unwrap_or("Failed to create deployment")
                    .to_string();
                error!("railway GraphQL errors: {errors:?}");
                return Err(WizardError::DeployRejected(message));
            }
        }

        let deployment = &data["data"]["templateDeployV2"];
        let project_id = deployment["projectId"].as_str().map(str::to_string);
        let workflow_id = deployment["workflowId"].as_str().map(str::to_string);
        let project_url = project_id
            .as_ref()
            .map(|id| format!("https://railway.app/project/{id}"));

        info!(
            "railway deployment created, project {}",
            project_id.as_deref().unwrap_or("<unknown>")
        );
        Ok(DeploymentReceipt {
            project_id,
            workflow_id,
            project_url,
        })
    }
}

/// Replaces string values that exactly match a placeholder key. Template
/// internals (Railway's own `${{...}}` references) pass through untouched.
fn fill_placeholders(value: &mut Value, substitutions: &HashMap<&str, String>) {
    match value {
        Value::String(s) => {
            if let Some(replacement) = substitutions.get(s.as_str()) {
                *s = replacement.clone();
            }
        }
        Value::Array(items) => {
            for item in items {
                fill_placeholders(item, substitutions);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                fill_placeholders(v, substitutions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RailwayConfig;
    use std::time::Duration;

    fn test_config() -> AppConfig {
        AppConfig {
            port: 3001,
            rpc_api_key: "rpc-key".into(),
            coingecko_api_key: "cg-key".into(),
            etherscan_api_key: None,
            absinthe_api_url: "https://v2.adapters.absinthe.network".into(),
            absinthe_api_key: "absinthe-key".into(),
            railway: Some(RailwayConfig {
                api_token: "token".into(),
                workspace_id: "ws".into(),
                template_id: "tpl".into(),
            }),
            ai: None,
            http_timeout: Duration::from_secs(15),
        }
    }

    #[test]
    fn topology_fills_every_placeholder() {
        let dispatcher = RailwayDispatcher::new(reqwest::Client::new(), test_config());
        let topology = dispatcher.topology("QUJD", 1).unwrap();

        let adapter_vars = &topology["services"]["69ebd0cc-0e70-4f62-92ab-65e74123eaf7"]["variables"];
        assert_eq!(
            adapter_vars["RPC_URL"]["value"],
            "https://mainnet.infura.io/v3/rpc-key"
        );
        assert_eq!(adapter_vars["INDEXER_CONFIG"]["value"], "QUJD");
        assert_eq!(adapter_vars["ABSINTHE_API_KEY"]["value"], "absinthe-key");
        assert_eq!(adapter_vars["COINGECKO_API_KEY"]["value"], "cg-key");

        // Railway's own variable references are not placeholders.
        assert_eq!(
            adapter_vars["REDIS_URL"]["value"],
            "${{Redis.REDIS_PUBLIC_URL}}"
        );
        assert!(!serde_json::to_string(&topology).unwrap().contains("{{RPC_URL}}"));
    }

    #[test]
    fn topology_rejects_unknown_chain() {
        let dispatcher = RailwayDispatcher::new(reqwest::Client::new(), test_config());
        assert!(matches!(
            dispatcher.topology("QUJD", 999_999),
            Err(WizardError::UnsupportedChain(999_999))
        ));
    }
}
