//! Prometheus metrics for the trading process.
//!
//! Scoped to what this engine actually does: order lifecycle counters,
//! account/position gauges, and tick timing. No HFT latency histograms, no
//! shared-memory feed counters — those measured a market-data path this
//! engine doesn't have.

use prometheus::{Counter, Gauge, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::info;

/// Central registry for all Prometheus metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    trading: Arc<TradingMetrics>,
    account: Arc<AccountMetrics>,
    system: Arc<SystemMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let trading = Arc::new(TradingMetrics::new(&registry)?);
        let account = Arc::new(AccountMetrics::new(&registry)?);
        let system = Arc::new(SystemMetrics::new(&registry)?);

        info!("metrics registry initialized");

        Ok(Self {
            registry,
            trading,
            account,
            system,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn trading(&self) -> &TradingMetrics {
        &self.trading
    }

    pub fn account(&self) -> &AccountMetrics {
        &self.account
    }

    pub fn system(&self) -> &SystemMetrics {
        &self.system
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("failed to create metrics registry: {}", e);
            panic!("cannot create metrics registry")
        })
    }
}

/// Order and fill lifecycle counters.
pub struct TradingMetrics {
    pub orders_total: IntCounterVec,
    pub fills_total: IntCounterVec,
    pub rejections_total: IntCounterVec,
    pub cancellations_total: IntCounterVec,
    pub volume_total: Counter,
    pub tick_duration_seconds: Histogram,
}

impl TradingMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let orders_total = IntCounterVec::new(
            Opts::new("orders_total", "Total number of orders submitted").namespace("dspy"),
            &["symbol", "side"],
        )?;
        registry.register(Box::new(orders_total.clone()))?;

        let fills_total = IntCounterVec::new(
            Opts::new("fills_total", "Total number of fills received").namespace("dspy"),
            &["symbol", "side"],
        )?;
        registry.register(Box::new(fills_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("rejections_total", "Total number of order rejections").namespace("dspy"),
            &["symbol"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let cancellations_total = IntCounterVec::new(
            Opts::new("cancellations_total", "Total number of order cancellations").namespace("dspy"),
            &["symbol"],
        )?;
        registry.register(Box::new(cancellations_total.clone()))?;

        let volume_total = Counter::new("dspy_volume_usd_total", "Total traded volume in USD")?;
        registry.register(Box::new(volume_total.clone()))?;

        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("dspy_tick_duration_seconds", "Wall time spent processing one engine tick")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;

        Ok(Self {
            orders_total,
            fills_total,
            rejections_total,
            cancellations_total,
            volume_total,
            tick_duration_seconds,
        })
    }
}

/// Account and position gauges, refreshed once per tick from [`crate::core::AccountState`].
pub struct AccountMetrics {
    pub account_value_usd: Gauge,
    pub withdrawable_usd: Gauge,
    pub margin_used_usd: Gauge,
    pub position_size: prometheus::GaugeVec,
    pub unrealized_pnl_usd: prometheus::GaugeVec,
}

impl AccountMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let account_value_usd = Gauge::new("dspy_account_value_usd", "Total account value in USD")?;
        registry.register(Box::new(account_value_usd.clone()))?;

        let withdrawable_usd = Gauge::new("dspy_withdrawable_usd", "Withdrawable balance in USD")?;
        registry.register(Box::new(withdrawable_usd.clone()))?;

        let margin_used_usd = Gauge::new("dspy_margin_used_usd", "Total margin used in USD")?;
        registry.register(Box::new(margin_used_usd.clone()))?;

        let position_size = prometheus::GaugeVec::new(
            Opts::new("position_size", "Signed position size, positive is long").namespace("dspy"),
            &["symbol"],
        )?;
        registry.register(Box::new(position_size.clone()))?;

        let unrealized_pnl_usd = prometheus::GaugeVec::new(
            Opts::new("unrealized_pnl_usd", "Unrealized PnL in USD").namespace("dspy"),
            &["symbol"],
        )?;
        registry.register(Box::new(unrealized_pnl_usd.clone()))?;

        Ok(Self {
            account_value_usd,
            withdrawable_usd,
            margin_used_usd,
            position_size,
            unrealized_pnl_usd,
        })
    }
}

/// Process and connectivity health.
pub struct SystemMetrics {
    pub venue_connected: IntGauge,
    pub errors_total: IntCounterVec,
    pub uptime_seconds: IntGauge,
}

impl SystemMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let venue_connected = IntGauge::new(
            "dspy_venue_connected",
            "Venue connection status (1 = connected, 0 = disconnected)",
        )?;
        registry.register(Box::new(venue_connected.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Total errors by component").namespace("dspy"),
            &["component"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let uptime_seconds = IntGauge::new("dspy_uptime_seconds", "Process uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            venue_connected,
            errors_total,
            uptime_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_registers_every_family() {
        let registry = MetricsRegistry::new().unwrap();
        assert!(!registry.registry().gather().is_empty());
    }

    #[test]
    fn render_produces_text_exposition_format() {
        let registry = MetricsRegistry::new().unwrap();
        registry.trading().orders_total.with_label_values(&["BTC", "buy"]).inc();
        let text = registry.render();
        assert!(text.contains("dspy_orders_total"));
    }

    #[test]
    fn account_gauges_reflect_latest_set_value() {
        let registry = MetricsRegistry::new().unwrap();
        registry.account().account_value_usd.set(10_500.25);
        assert_eq!(registry.account().account_value_usd.get(), 10_500.25);
    }
}
