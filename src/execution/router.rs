//! Order routing with timeouts and retries
//!
//! A timed-out call has an unknown outcome. The router never assumes it
//! failed: it re-places under the same client order id (which the gateway
//! deduplicates) or polls the pending order, backing off exponentially.

use super::{ExecutionError, ExecutionGateway, Fill, OrderId, OrderRequest, OrderResult};
use crate::config::ExecutionConfig;
use crate::telemetry::{increment_counter, record_latency, CounterMetric, LatencyMetric};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Per-call timeout
    pub timeout: Duration,
    /// Attempts after the first
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.order_timeout_ms),
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.min(16)).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}

enum Attempt {
    Filled(Fill),
    Pending,
    TimedOut,
    Transport(String),
}

/// Wraps a gateway with timeout, retry and confirmation handling
pub struct OrderRouter {
    gateway: Arc<dyn ExecutionGateway>,
    policy: RetryPolicy,
}

impl OrderRouter {
    pub fn new(gateway: Arc<dyn ExecutionGateway>, policy: RetryPolicy) -> Self {
        Self { gateway, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Submit and drive an order to a confirmed fill
    pub async fn execute(&self, request: &OrderRequest) -> Result<Fill, ExecutionError> {
        let id = request.client_order_id;
        let started = Instant::now();
        let mut pending = false;
        let mut attempts = 0u32;
        let mut all_timeouts = true;
        let mut last_issue = String::new();

        loop {
            attempts += 1;
            let call = if pending {
                self.gateway.confirm_order(id)
            } else {
                self.gateway.place_order(request.clone())
            };

            let attempt = match tokio::time::timeout(self.policy.timeout, call).await {
                Ok(Ok(OrderResult::Filled(fill))) => Attempt::Filled(fill),
                Ok(Ok(OrderResult::Pending(_))) => Attempt::Pending,
                Ok(Ok(OrderResult::Failed(reason))) => {
                    tracing::warn!(order_id = %id, symbol = %request.symbol, %reason, "Order rejected");
                    return Err(ExecutionError::Rejected(reason));
                }
                Ok(Err(e)) => Attempt::Transport(e.to_string()),
                Err(_) => Attempt::TimedOut,
            };

            match attempt {
                Attempt::Filled(fill) => {
                    record_latency(LatencyMetric::OrderExecution, started.elapsed());
                    return Ok(fill);
                }
                Attempt::Pending => {
                    pending = true;
                    all_timeouts = false;
                    last_issue = "order pending confirmation".to_string();
                }
                Attempt::TimedOut => {
                    last_issue = format!("no answer within {:?}", self.policy.timeout);
                }
                Attempt::Transport(error) => {
                    all_timeouts = false;
                    last_issue = error;
                }
            }

            if attempts > self.policy.max_retries {
                break;
            }

            let delay = self.policy.backoff(attempts - 1);
            increment_counter(CounterMetric::ExecutionRetry, request.purpose.label());
            tracing::warn!(
                order_id = %id,
                symbol = %request.symbol,
                attempt = attempts,
                issue = %last_issue,
                ?delay,
                "Order not confirmed, retrying"
            );
            tokio::time::sleep(delay).await;
        }

        tracing::error!(
            order_id = %id,
            symbol = %request.symbol,
            attempts,
            issue = %last_issue,
            "Order outcome unknown after retries"
        );
        if all_timeouts {
            Err(ExecutionError::Timeout { attempts })
        } else {
            Err(ExecutionError::Failed {
                reason: last_issue,
                attempts,
                outcome_unknown: true,
            })
        }
    }

    /// Best-effort cancel; failures are logged, not returned
    pub async fn cancel(&self, id: OrderId) -> bool {
        match tokio::time::timeout(self.policy.timeout, self.gateway.cancel_order(id)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(order_id = %id, error = %e, "Cancel failed");
                false
            }
            Err(_) => {
                tracing::warn!(order_id = %id, "Cancel timed out");
                false
            }
        }
    }
}
