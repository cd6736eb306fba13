//! Global execution id: one id that follows a message through every
//! operation it causes.
//!
//! The id travels in the `GlobalExecutionId` context entry. Code that handles
//! a message can run follow-up operations inside
//! [`with_global_execution_id`] so publishes made there reuse the id.
//! Routing enrichers make the id (or a wildcard for it) part of the routing
//! key, and are spliced into base chains through stage markers.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use warren_config::DIRECT_REPLY_TO_QUEUE;
use warren_pipe::keys::{
    BASIC_PUBLISH_CONFIGURATION, CLIENT_CONFIGURATION, CONSUME_CONFIGURATION,
    CONSUMER_CONFIGURATION, GLOBAL_EXECUTION_ID, PUBLISHER_CONFIGURATION, REQUEST_CONFIGURATION,
};
use warren_pipe::{Middleware, Next, PipeContext, PipeKey, Result, StageMarker};

use super::{ContextFn, context_fn};
use crate::client::BusClient;

/// Whether consumers subscribe with a `.#` suffix on their routing key.
pub const SUBSCRIBE_WITH_WILDCARD: PipeKey<bool> = PipeKey::new("SubscribeWithWildCard");

tokio::task_local! {
    static GLOBAL_EXECUTION_ID_SCOPE: String;
}

/// Run `future` with `id` as the ambient global execution id.
pub async fn with_global_execution_id<F: Future>(id: impl Into<String>, future: F) -> F::Output {
    GLOBAL_EXECUTION_ID_SCOPE.scope(id.into(), future).await
}

/// The ambient global execution id, if the current task runs inside
/// [`with_global_execution_id`].
pub fn current_global_execution_id() -> Option<String> {
    GLOBAL_EXECUTION_ID_SCOPE.try_with(Clone::clone).ok()
}

/// Toggle the `.#` subscription suffix for one operation.
pub fn use_wildcard_routing_suffix(context: &mut PipeContext, enabled: bool) {
    context.add_or_replace(SUBSCRIBE_WITH_WILDCARD, enabled);
}

/// Register the three enrichers at their stages on `client`.
pub fn register_global_execution_id(client: &BusClient) {
    client.register_staged(
        StageMarker::ProducerInitialized,
        AppendGlobalExecutionIdMiddleware::new(Default::default()),
    );
    client.register_staged(
        StageMarker::PublishConfigured,
        ExecutionIdRoutingMiddleware::new(Default::default()),
    );
    client.register_staged(
        StageMarker::ConsumeConfigured,
        WildcardRoutingKeyMiddleware::new(Default::default()),
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Append
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct AppendGlobalExecutionIdOptions {
    /// Defaults to `GlobalExecutionId`.
    pub execution_id_fn: Option<ContextFn<Option<String>>>,
}

/// Makes sure the operation carries a global execution id.
pub struct AppendGlobalExecutionIdMiddleware {
    execution_id_fn: ContextFn<Option<String>>,
}

impl AppendGlobalExecutionIdMiddleware {
    pub fn new(options: AppendGlobalExecutionIdOptions) -> Self {
        Self {
            execution_id_fn: options
                .execution_id_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get(GLOBAL_EXECUTION_ID))),
        }
    }
}

#[async_trait]
impl Middleware for AppendGlobalExecutionIdMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let id = match (self.execution_id_fn)(context) {
            Some(id) => {
                tracing::debug!(global_execution_id = %id, "Using global execution id from context");
                id
            }
            None => match current_global_execution_id() {
                Some(id) => {
                    tracing::info!(global_execution_id = %id, "Using ambient global execution id");
                    id
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    tracing::info!(global_execution_id = %id, "Created new global execution id");
                    id
                }
            },
        };
        context.try_add(GLOBAL_EXECUTION_ID, id);
        next.run(context, token).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Publish routing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ExecutionIdRoutingOptions {
    /// Defaults to `route_with_global_id` of the `ClientConfiguration`.
    pub enabled_fn: Option<ContextFn<bool>>,
    /// Defaults to `GlobalExecutionId`.
    pub execution_id_fn: Option<ContextFn<Option<String>>>,
}

/// Appends `.<global execution id>` to the publish routing key.
///
/// Every publish entry in the context is rewritten, including the request
/// half of a `RequestConfiguration`, so they keep agreeing.
pub struct ExecutionIdRoutingMiddleware {
    enabled_fn: ContextFn<bool>,
    execution_id_fn: ContextFn<Option<String>>,
}

impl ExecutionIdRoutingMiddleware {
    pub fn new(options: ExecutionIdRoutingOptions) -> Self {
        Self {
            enabled_fn: options.enabled_fn.unwrap_or_else(|| {
                context_fn(|ctx| {
                    ctx.get_ref(CLIENT_CONFIGURATION)
                        .is_some_and(|config| config.route_with_global_id)
                })
            }),
            execution_id_fn: options
                .execution_id_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get(GLOBAL_EXECUTION_ID))),
        }
    }
}

#[async_trait]
impl Middleware for ExecutionIdRoutingMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        if (self.enabled_fn)(context) {
            match (self.execution_id_fn)(context) {
                Some(id) => {
                    if let Some(publish) = context.get_mut(BASIC_PUBLISH_CONFIGURATION) {
                        publish.routing_key = format!("{}.{id}", publish.routing_key);
                        tracing::debug!(routing_key = %publish.routing_key, "Routing with global execution id");
                    }
                    if let Some(publisher) = context.get_mut(PUBLISHER_CONFIGURATION) {
                        publisher.routing_key = format!("{}.{id}", publisher.routing_key);
                    }
                    if let Some(request) = context.get_mut(REQUEST_CONFIGURATION) {
                        request.request.routing_key =
                            format!("{}.{id}", request.request.routing_key);
                    }
                }
                None => tracing::debug!("No global execution id to route with"),
            }
        }
        next.run(context, token).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Consume routing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct WildcardRoutingKeyOptions {
    /// Defaults to `SubscribeWithWildCard`, on when absent.
    pub enabled_fn: Option<ContextFn<bool>>,
}

/// Appends `.#` to the consume routing key so consumers also receive
/// messages routed with a global execution id.
///
/// Direct reply-to consumers are not bound by routing key and are left as is.
pub struct WildcardRoutingKeyMiddleware {
    enabled_fn: ContextFn<bool>,
}

impl WildcardRoutingKeyMiddleware {
    pub fn new(options: WildcardRoutingKeyOptions) -> Self {
        Self {
            enabled_fn: options
                .enabled_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get_or(SUBSCRIBE_WITH_WILDCARD, true))),
        }
    }
}

fn with_wildcard(routing_key: &str) -> String {
    if routing_key.ends_with(".#") || routing_key == "#" {
        routing_key.to_string()
    } else {
        format!("{routing_key}.#")
    }
}

#[async_trait]
impl Middleware for WildcardRoutingKeyMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        if (self.enabled_fn)(context) {
            if let Some(consume) = context.get_mut(CONSUME_CONFIGURATION) {
                if consume.queue_name != DIRECT_REPLY_TO_QUEUE {
                    consume.routing_key = with_wildcard(&consume.routing_key);
                    tracing::debug!(routing_key = %consume.routing_key, "Subscribing with wildcard");
                }
            }
            if let Some(consumer) = context.get_mut(CONSUMER_CONFIGURATION) {
                if consumer.consume.queue_name != DIRECT_REPLY_TO_QUEUE {
                    consumer.consume.routing_key = with_wildcard(&consumer.consume.routing_key);
                }
            }
        }
        next.run(context, token).await
    }
}
