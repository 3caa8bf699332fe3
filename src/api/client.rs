// HTTP client for the sales endpoints a forecast view needs before a job starts
use crate::error::{ForecastError, Result};
use crate::models::{ActualSales, ModelList, PersistedModel, Settings};
use log::debug;
use std::time::Duration;

pub const MONTHLY_SALES_PATH: &str = "/api/sales/monthly";
pub const MODELS_PATH: &str = "/api/forecast/models";

pub struct ApiClient {
    base_url: String,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.server_url, settings.request_timeout())
    }

    fn make_request(&self, endpoint: &str) -> ureq::Request {
        let url = format!("{}{}", self.base_url, endpoint);
        self.agent.get(&url).set("Accept", "application/json")
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        debug!("GET {}{}", self.base_url, endpoint);
        let response = self.make_request(endpoint).call()?;
        handle_response(response)
    }

    /// Historical monthly totals, sorted chronologically
    pub fn list_monthly_sales(&self) -> Result<Vec<ActualSales>> {
        let mut sales: Vec<ActualSales> = self.get_json(MONTHLY_SALES_PATH)?;
        sales.retain(|s| s.key().is_valid());
        sales.sort_by_key(ActualSales::key);
        Ok(sales)
    }

    pub fn list_models(&self) -> Result<Vec<PersistedModel>> {
        let list: ModelList = self.get_json(MODELS_PATH)?;
        Ok(list.models)
    }
}

fn handle_response<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T> {
    let status = response.status();
    if (200..300).contains(&status) {
        response
            .into_json::<T>()
            .map_err(|e| ForecastError::Decode(format!("Failed to parse response: {}", e)))
    } else {
        let body = response
            .into_string()
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ForecastError::Http { status, body })
    }
}
