use std::sync::atomic::{AtomicU64, Ordering};

use crate::{errors::Error, Result};

/// Money is tracked in integer nanodollars so repeated small charges stay
/// exact; conversion to display USD happens only at the edge.
pub const NANOS_PER_USD: u64 = 1_000_000_000;

/// Static gateway pricing, loaded once at startup.
#[derive(Clone, Copy, Debug)]
pub struct CostRate {
    pub input_nanos_per_token: u64,
    pub output_nanos_per_token: u64,
    pub max_context_tokens: u32,
}

impl Default for CostRate {
    /// $0.60 / 1M input tokens, $2.50 / 1M output tokens.
    fn default() -> Self {
        Self {
            input_nanos_per_token: 600,
            output_nanos_per_token: 2_500,
            max_context_tokens: 128_000,
        }
    }
}

/// Cumulative-spend accounting against a fixed process-lifetime limit.
///
/// The spent accumulator only ever grows, and once `spent >= limit` the
/// ledger is exhausted for the rest of the process; there is no reset.
/// Charging happens *after* a model call completes (token counts are not
/// known before the response), so a single call may overshoot the limit.
/// The dispatcher pairs `can_spend` with `charge` to get the intended
/// one-call-overshoot-then-refuse behavior.
pub struct BudgetLedger {
    limit_nanos: u64,
    rate: CostRate,
    spent_nanos: AtomicU64,
}

impl BudgetLedger {
    pub fn new(limit_nanos: u64, rate: CostRate) -> Result<Self> {
        if limit_nanos == 0 {
            return Err(Error::Config(
                "budget limit must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            limit_nanos,
            rate,
            spent_nanos: AtomicU64::new(0),
        })
    }

    pub fn can_spend(&self) -> bool {
        self.spent_nanos.load(Ordering::Acquire) < self.limit_nanos
    }

    pub fn exhausted(&self) -> bool {
        !self.can_spend()
    }

    /// Price the reported token counts and add them to the accumulator.
    /// Returns the increment in nanodollars.
    pub fn charge(&self, input_tokens: u64, output_tokens: u64) -> u64 {
        let delta = input_tokens
            .saturating_mul(self.rate.input_nanos_per_token)
            .saturating_add(output_tokens.saturating_mul(self.rate.output_nanos_per_token));
        self.spent_nanos.fetch_add(delta, Ordering::AcqRel);
        delta
    }

    pub fn spent_nanos(&self) -> u64 {
        self.spent_nanos.load(Ordering::Acquire)
    }

    /// `limit - spent`; negative exactly when the final call overshot.
    pub fn remaining_nanos(&self) -> i128 {
        self.limit_nanos as i128 - self.spent_nanos() as i128
    }

    /// Remaining headroom for display, clamped at zero.
    pub fn remaining_usd(&self) -> f64 {
        self.remaining_nanos().max(0) as f64 / NANOS_PER_USD as f64
    }
}

/// Parse a configured USD amount into nanodollars.
pub fn usd_to_nanos(usd: f64) -> u64 {
    if usd <= 0.0 {
        return 0;
    }
    (usd * NANOS_PER_USD as f64).round() as u64
}
