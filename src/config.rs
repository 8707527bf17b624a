use anyhow::Result;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub bank_webhook_secret: String,
    pub admin_api_token: String,
    pub engine: EngineSettings,
}

/// Tunables for the reconciliation and ledger engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// VND per 1 pi; accrual converts with truncating fixed-point division.
    pub pi_rate_vnd: i64,
    /// Escrow window between accrual and scheduled release.
    pub escrow_hold_days: i64,
    /// Orders stuck in pending longer than this are swept for reconciliation.
    pub reconcile_sla_minutes: i64,
    /// Minimum withdrawal amount, in milli-pi.
    pub min_withdrawal_pi: i64,
    /// Rolling window for the single-open-withdrawal rate limit.
    pub withdrawal_cooldown_hours: i64,
    /// Maximum rows one sweep tick takes on.
    pub sweep_batch_size: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            bank_webhook_secret: env::var("BANK_WEBHOOK_SECRET")?,
            admin_api_token: env::var("ADMIN_API_TOKEN")?,
            engine: EngineSettings::from_env()?,
        })
    }
}

impl EngineSettings {
    pub fn from_env() -> Result<Self> {
        Ok(EngineSettings {
            pi_rate_vnd: env_or("PI_RATE_VND", 10_000)?,
            escrow_hold_days: env_or("ESCROW_HOLD_DAYS", 3)?,
            reconcile_sla_minutes: env_or("RECONCILE_SLA_MINUTES", 30)?,
            min_withdrawal_pi: env_or("MIN_WITHDRAWAL_MILLI_PI", 1_000)?,
            withdrawal_cooldown_hours: env_or("WITHDRAWAL_COOLDOWN_HOURS", 24)?,
            sweep_batch_size: env_or("SWEEP_BATCH_SIZE", 200)?,
        })
    }
}

fn env_or(key: &str, default: i64) -> Result<i64> {
    match env::var(key) {
        Ok(value) => Ok(value.parse()?),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults_are_sane() {
        let engine = EngineSettings {
            pi_rate_vnd: 10_000,
            escrow_hold_days: 3,
            reconcile_sla_minutes: 30,
            min_withdrawal_pi: 1_000,
            withdrawal_cooldown_hours: 24,
            sweep_batch_size: 200,
        };

        assert!(engine.pi_rate_vnd > 0);
        assert!(engine.escrow_hold_days > 0);
        assert!(engine.min_withdrawal_pi > 0);
    }
}
