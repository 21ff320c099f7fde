//! Application configuration loaded from environment variables.
//!
//! Contract address, chain, goal and refresh cadence are all deployment
//! parameters, so one engine build serves every campaign variant.

use rust_decimal::Decimal;

use crate::errors::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the REST API server
    pub api_port: u16,
    /// Path to the SQLite database file
    pub database_url: String,
    /// Campaign contract JSON-RPC gateway (e.g. https://rpc.api.lisk.com)
    pub rpc_url: String,
    /// Transaction-submitter endpoint; donations are disabled when unset
    pub wallet_bridge_url: Option<String>,
    /// The campaign contract address (0x-prefixed)
    pub contract_address: String,
    /// Chain the contract is deployed on (1135 = Lisk)
    pub chain_id: u64,
    /// Campaign/project identifier tracked at startup
    pub project_id: u64,
    /// Address donations are sent from; "your contribution" is unknown when unset
    pub donor_address: Option<String>,
    /// Fundraising goal in USD
    pub goal_usd: Decimal,
    /// Default suggested donation in USD, used to seed the amount fields
    pub reference_usd: Decimal,
    /// Cost of one meal in USD, for the impact figure
    pub meal_cost_usd: Decimal,
    /// Fiat price endpoint returning `{"ethereum":{"usd":N}}`
    pub price_api_url: String,
    /// How often (in seconds) the background task refreshes the ETH price
    pub price_refresh_secs: u64,
    /// Maximum age (in seconds) of a price quote before it counts as stale
    pub price_max_age_secs: u64,
    /// How often (in seconds) to poll the contract for campaign progress
    pub campaign_poll_secs: u64,
    /// Campaign title served to the front end
    pub campaign_title: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid API_PORT".to_string()))?,
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./chetu_engine.db".to_string()),
            rpc_url: env_var("RPC_URL")
                .unwrap_or_else(|_| "https://rpc.api.lisk.com".to_string()),
            wallet_bridge_url: env_var("WALLET_BRIDGE_URL").ok(),
            contract_address: env_var("CONTRACT_ADDRESS").map_err(|_| {
                EngineError::Config("CONTRACT_ADDRESS environment variable is required".to_string())
            })?,
            chain_id: env_var("CHAIN_ID")
                .unwrap_or_else(|_| "1135".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid CHAIN_ID".to_string()))?,
            project_id: env_var("PROJECT_ID")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid PROJECT_ID".to_string()))?,
            donor_address: env_var("DONOR_ADDRESS").ok(),
            goal_usd: env_var("GOAL_USD")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid GOAL_USD".to_string()))?,
            reference_usd: env_var("REFERENCE_USD")
                .unwrap_or_else(|_| "0.50".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid REFERENCE_USD".to_string()))?,
            meal_cost_usd: env_var("MEAL_COST_USD")
                .unwrap_or_else(|_| "0.50".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid MEAL_COST_USD".to_string()))?,
            price_api_url: env_var("PRICE_API_URL").unwrap_or_else(|_| {
                "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd"
                    .to_string()
            }),
            price_refresh_secs: env_var("PRICE_REFRESH_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid PRICE_REFRESH_SECS".to_string()))?,
            price_max_age_secs: env_var("PRICE_MAX_AGE_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid PRICE_MAX_AGE_SECS".to_string()))?,
            campaign_poll_secs: env_var("CAMPAIGN_POLL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid CAMPAIGN_POLL_SECS".to_string()))?,
            campaign_title: env_var("CAMPAIGN_TITLE")
                .unwrap_or_else(|_| "Support STEM Showcases in Kisumu & Nakuru".to_string()),
        };

        if config.goal_usd <= Decimal::ZERO {
            return Err(EngineError::Config("GOAL_USD must be positive".to_string()));
        }
        if config.meal_cost_usd <= Decimal::ZERO {
            return Err(EngineError::Config(
                "MEAL_COST_USD must be positive".to_string(),
            ));
        }

        Ok(config)
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| EngineError::Config(format!("Missing env var: {key}")))
}
