//! Simulate command - run publish and consume operations against an
//! in-memory broker.
//!
//! Useful for checking how a client configuration and the naming
//! conventions shape exchanges, queues and routing keys without a broker.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use warren_channel::Delivery;
use warren_channel::testing::{ChannelCall, InMemoryConnectionFactory, PublishedMessage};
use warren_config::MessageType;
use warren_operations::middleware::global_execution_id::register_global_execution_id;
use warren_operations::{BusClient, OperationServices, pipes};
use warren_pipe::keys::{
    CHANNEL, CONSUME_CONFIGURATION, DELIVERY_EVENT_ARGS, MESSAGE_HANDLER, MESSAGE_TYPE,
    QUEUE_DECLARATION, SERIALIZED_MESSAGE,
};
use warren_pipe::{Acknowledgement, message_handler};

use super::Context;

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Namespace of the simulated message type (becomes the exchange)
    #[arg(long, default_value = "warren.demo")]
    pub namespace: String,

    /// Name of the simulated message type (becomes queue and routing key)
    #[arg(long, default_value = "OrderPlaced")]
    pub name: String,

    /// Number of messages to publish
    #[arg(short = 'n', long, default_value_t = 3)]
    pub messages: u64,

    /// Outcome the handler reports for every message
    #[arg(long, value_enum, default_value_t = Outcome::Ack)]
    pub outcome: Outcome,

    /// Requeue nacked or rejected messages
    #[arg(long)]
    pub requeue: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Outcome {
    Ack,
    Nack,
    Reject,
}

impl Outcome {
    fn acknowledgement(self, requeue: bool) -> Acknowledgement {
        match self {
            Self::Ack => Acknowledgement::Ack,
            Self::Nack => Acknowledgement::nack(requeue),
            Self::Reject => Acknowledgement::reject(requeue),
        }
    }
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    message_type: String,
    queue: String,
    published: Vec<PublishedSummary>,
    consume_routing_key: String,
    acknowledgements: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PublishedSummary {
    exchange: String,
    routing_key: String,
    bytes: usize,
}

impl From<&PublishedMessage> for PublishedSummary {
    fn from(message: &PublishedMessage) -> Self {
        Self {
            exchange: message.exchange.clone(),
            routing_key: message.routing_key.clone(),
            bytes: message.body.len(),
        }
    }
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    let config = ctx.load_client_configuration()?;
    let broker = Arc::new(InMemoryConnectionFactory::new());
    let client = BusClient::new(OperationServices::new(broker.clone(), config));
    register_global_execution_id(&client);

    let token = CancellationToken::new();
    let message_type = MessageType::new(&args.namespace, &args.name);

    let declared = client
        .declare_queue_for(message_type.clone(), &token)
        .await
        .context("declaring queue")?;
    let queue = declared
        .get_ref(QUEUE_DECLARATION)
        .map(|q| q.name.clone())
        .unwrap_or_default();

    for sequence in 0..args.messages {
        let body = serde_json::to_vec(&serde_json::json!({
            "sequence": sequence,
            "id": uuid::Uuid::new_v4(),
        }))?;
        let message_type = message_type.clone();
        client
            .invoke(
                pipes::publish_message,
                |pipe_ctx| {
                    pipe_ctx.try_add(MESSAGE_TYPE, message_type);
                    pipe_ctx.try_add(SERIALIZED_MESSAGE, body);
                },
                &token,
            )
            .await
            .with_context(|| format!("publishing message {sequence}"))?;
    }

    let published: Vec<PublishedMessage> = broker
        .last_connection()
        .map(|connection| {
            connection
                .channels()
                .iter()
                .flat_map(|channel| channel.published())
                .collect()
        })
        .unwrap_or_default();
    tracing::info!(count = published.len(), "Published messages");

    let consume_channel = client.services().channel_factory().create_channel(&token).await?;
    let acknowledgement = args.outcome.acknowledgement(args.requeue);
    let handler = message_handler(move |delivery: Delivery| async move {
        tracing::debug!(delivery_tag = delivery.delivery_tag, bytes = delivery.body.len(), "Handling message");
        acknowledgement
    });

    let mut consume_routing_key = String::new();
    for (index, message) in published.iter().enumerate() {
        let delivery = Delivery {
            delivery_tag: index as u64 + 1,
            exchange: message.exchange.clone(),
            routing_key: message.routing_key.clone(),
            properties: message.properties.clone(),
            body: message.body.clone(),
            ..Default::default()
        };
        let message_type = message_type.clone();
        let handler = handler.clone();
        let channel = consume_channel.clone();
        let context = client
            .invoke(
                |pipe, services| {
                    pipes::consume_configuration(pipe, services);
                    pipes::consume_message(pipe, services);
                },
                |pipe_ctx| {
                    pipe_ctx.try_add(MESSAGE_TYPE, message_type);
                    pipe_ctx.try_add(MESSAGE_HANDLER, handler);
                    pipe_ctx.try_add(CHANNEL, channel);
                    pipe_ctx.try_add(DELIVERY_EVENT_ARGS, delivery);
                },
                &token,
            )
            .await
            .with_context(|| format!("consuming delivery {}", index + 1))?;
        if let Some(consume) = context.get_ref(CONSUME_CONFIGURATION) {
            consume_routing_key = consume.routing_key.clone();
        }
    }

    let acknowledgements = broker
        .last_connection()
        .map(|connection| {
            connection
                .channels()
                .iter()
                .flat_map(|channel| channel.calls())
                .filter_map(|call| describe_acknowledgement(&call))
                .collect()
        })
        .unwrap_or_default();

    client.dispose();

    let report = SimulationReport {
        message_type: message_type.to_string(),
        queue,
        published: published.iter().map(PublishedSummary::from).collect(),
        consume_routing_key,
        acknowledgements,
    };
    print_report(&report, ctx.json_output)
}

fn describe_acknowledgement(call: &ChannelCall) -> Option<String> {
    match call {
        ChannelCall::BasicAck { delivery_tag, .. } => Some(format!("ack {delivery_tag}")),
        ChannelCall::BasicNack {
            delivery_tag,
            requeue,
            ..
        } => Some(format!("nack {delivery_tag} requeue={requeue}")),
        ChannelCall::BasicReject {
            delivery_tag,
            requeue,
        } => Some(format!("reject {delivery_tag} requeue={requeue}")),
        _ => None,
    }
}

fn print_report(report: &SimulationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Message type: {}", report.message_type);
    println!("Queue:        {}", report.queue);
    println!("Published:");
    for message in &report.published {
        println!(
            "  {} -> {} ({} bytes)",
            message.exchange, message.routing_key, message.bytes
        );
    }
    println!("Consumed with routing key: {}", report.consume_routing_key);
    println!("Acknowledgements:");
    for acknowledgement in &report.acknowledgements {
        println!("  {acknowledgement}");
    }
    Ok(())
}
