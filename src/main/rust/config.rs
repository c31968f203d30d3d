use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::domain::ports::RetryPolicy;
use crate::domain::value_objects::{ExponentialBackoff, FixedInterval, MonitorSettings};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectionStrategy {
    /// Exponential backoff capped at --max-delay-ms
    Exponential,
    /// Constant --fixed-interval-ms between attempts
    Fixed,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gateway-resilience",
    version = "0.1.0",
    about = "Realtime gateway connection monitor with health checks and automatic reconnection"
)]
pub struct Config {
    /// Gateway relay address (host:port)
    #[arg(long, env = "GATEWAY_ADDR", default_value = "127.0.0.1:7878")]
    pub gateway_addr: String,

    /// Token used to identify with the gateway
    #[arg(long, env = "GATEWAY_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Metrics server port
    #[arg(long, env = "METRICS_PORT", default_value = "9003")]
    pub metrics_port: u16,

    /// Interval between connection health checks in milliseconds
    #[arg(long, env = "HEALTH_CHECK_INTERVAL_MS", default_value = "30000")]
    pub health_check_interval_ms: u64,

    /// Gateway handshake timeout in seconds
    #[arg(long, env = "HANDSHAKE_TIMEOUT_SECS", default_value = "10")]
    pub handshake_timeout_secs: u64,

    /// Reconnection strategy
    #[arg(
        long,
        env = "RECONNECTION_STRATEGY",
        value_enum,
        default_value_t = ReconnectionStrategy::Exponential
    )]
    pub reconnection_strategy: ReconnectionStrategy,

    /// Initial reconnection delay in milliseconds (exponential)
    #[arg(long, default_value = "1000")]
    pub base_delay_ms: u64,

    /// Maximum reconnection delay in milliseconds (exponential)
    #[arg(long, default_value = "60000")]
    pub max_delay_ms: u64,

    /// Maximum reconnection attempts (exponential)
    #[arg(long, default_value = "10")]
    pub max_retries: u32,

    /// Reconnection backoff multiplier (exponential)
    #[arg(long, default_value = "2.0")]
    pub backoff_multiplier: f64,

    /// Delay between reconnection attempts in milliseconds (fixed)
    #[arg(long, default_value = "5000")]
    pub fixed_interval_ms: u64,

    /// Maximum reconnection attempts (fixed)
    #[arg(long, default_value = "20")]
    pub fixed_max_retries: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Minimum allowed port (ports below 1024 are privileged)
const MIN_USER_PORT: u16 = 1024;

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gateway_addr.trim().is_empty() {
            anyhow::bail!("Gateway address cannot be empty");
        }

        if self.token.trim().is_empty() {
            anyhow::bail!("Gateway token cannot be empty");
        }

        Self::validate_port(self.metrics_port, "metrics")?;

        if self.health_check_interval_ms == 0 {
            anyhow::bail!("Health check interval cannot be 0");
        }

        if self.handshake_timeout_secs == 0 {
            anyhow::bail!("Handshake timeout cannot be 0");
        }

        match self.reconnection_strategy {
            ReconnectionStrategy::Exponential => {
                if self.backoff_multiplier <= 1.0 {
                    anyhow::bail!("Backoff multiplier must be > 1.0");
                }

                if self.base_delay_ms == 0 {
                    anyhow::bail!("Base reconnection delay cannot be 0");
                }

                if self.max_delay_ms < self.base_delay_ms {
                    anyhow::bail!(
                        "Maximum reconnection delay ({}) cannot be less than base delay ({})",
                        self.max_delay_ms,
                        self.base_delay_ms
                    );
                }
            }
            ReconnectionStrategy::Fixed => {
                if self.fixed_interval_ms == 0 {
                    anyhow::bail!("Fixed reconnection interval cannot be 0");
                }
            }
        }

        Ok(())
    }

    fn validate_port(port: u16, name: &str) -> anyhow::Result<()> {
        if port == 0 {
            anyhow::bail!("Invalid {} port: port cannot be 0", name);
        }
        if port < MIN_USER_PORT {
            anyhow::bail!(
                "Invalid {} port: {} is a privileged port (< {}). Use a port >= {}",
                name,
                port,
                MIN_USER_PORT,
                MIN_USER_PORT
            );
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn to_retry_policy(&self) -> crate::domain::errors::Result<Box<dyn RetryPolicy>> {
        let policy: Box<dyn RetryPolicy> = match self.reconnection_strategy {
            ReconnectionStrategy::Exponential => Box::new(ExponentialBackoff::new(
                Duration::from_millis(self.base_delay_ms),
                Duration::from_millis(self.max_delay_ms),
                self.max_retries,
                self.backoff_multiplier,
            )?),
            ReconnectionStrategy::Fixed => Box::new(FixedInterval::new(
                Duration::from_millis(self.fixed_interval_ms),
                self.fixed_max_retries,
            )?),
        };
        Ok(policy)
    }

    pub fn to_monitor_settings(&self) -> crate::domain::errors::Result<MonitorSettings> {
        MonitorSettings::new(
            Duration::from_millis(self.health_check_interval_ms),
            self.token.clone(),
        )
    }
}
