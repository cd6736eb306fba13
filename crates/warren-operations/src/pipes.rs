//! Preset pipes for each operation.
//!
//! Each preset is a pipe action for [`BusClient::invoke`](crate::BusClient::invoke)
//! and can be composed with further steps:
//!
//! ```text
//! publish_message   Initialized ▸ ProducerInitialized ▸ PublishConfiguration ▸ PublishConfigured
//!                   ▸ ChannelCreation ▸ ExchangeDeclare ▸ BasicPublish ▸ MessagePublished
//! declare_queue     QueueDeclaration ▸ ChannelCreation ▸ QueueDeclare ▸ QueueDeclared
//! consume_message   MessageReceived ▸ HandlerInvocation ▸ HandlerInvoked
//!                   ▸ ExplicitAck ▸ MessageAcknowledged
//! ```

use warren_pipe::{PipeBuilder, StageMarker};

use crate::middleware::{
    BasicPublishMiddleware, ChannelCreationMiddleware, ConsumerConfigurationMiddleware,
    ExchangeDeclareMiddleware, ExplicitAckMiddleware, HandlerInvocationMiddleware,
    PublishConfigurationMiddleware, QueueDeclarationMiddleware, QueueDeclareMiddleware,
    RequestConfigurationMiddleware, RespondConfigurationMiddleware,
    RetrieveStateMachineMiddleware,
};
use crate::services::OperationServices;

/// Configure and publish `SerializedMessage`.
pub fn publish_message(pipe: &mut PipeBuilder, services: &OperationServices) {
    pipe.use_stage(StageMarker::Initialized)
        .use_stage(StageMarker::ProducerInitialized)
        .use_middleware(PublishConfigurationMiddleware::new(
            services.publisher_factory(),
            Default::default(),
        ))
        .use_stage(StageMarker::PublishConfigured)
        .use_middleware(ChannelCreationMiddleware::new(
            services.channel_factory(),
            Default::default(),
        ))
        .use_middleware(ExchangeDeclareMiddleware)
        .use_middleware(BasicPublishMiddleware)
        .use_stage(StageMarker::MessagePublished);
}

/// Resolve and declare a queue.
pub fn declare_queue(pipe: &mut PipeBuilder, services: &OperationServices) {
    pipe.use_middleware(QueueDeclarationMiddleware::new(services.queue_factory()))
        .use_middleware(ChannelCreationMiddleware::new(
            services.channel_factory(),
            Default::default(),
        ))
        .use_middleware(QueueDeclareMiddleware)
        .use_stage(StageMarker::QueueDeclared);
}

/// Resolve the configuration of a subscriber.
pub fn consume_configuration(pipe: &mut PipeBuilder, services: &OperationServices) {
    pipe.use_stage(StageMarker::Initialized)
        .use_middleware(ConsumerConfigurationMiddleware::new(
            services.consumer_factory(),
            Default::default(),
        ))
        .use_stage(StageMarker::ConsumeConfigured);
}

/// Handle the delivery in `DeliveryEventArgs` and acknowledge it.
pub fn consume_message(pipe: &mut PipeBuilder, _services: &OperationServices) {
    pipe.use_stage(StageMarker::MessageReceived)
        .use_middleware(HandlerInvocationMiddleware)
        .use_stage(StageMarker::HandlerInvoked)
        .use_middleware(ExplicitAckMiddleware::new(Default::default()))
        .use_stage(StageMarker::MessageAcknowledged);
}

/// Resolve the configuration of a request and its response consumer.
pub fn request_configuration(pipe: &mut PipeBuilder, services: &OperationServices) {
    pipe.use_stage(StageMarker::Initialized)
        .use_stage(StageMarker::ProducerInitialized)
        .use_middleware(RequestConfigurationMiddleware::new(
            services.request_factory(),
            Default::default(),
        ))
        .use_stage(StageMarker::PublishConfigured)
        .use_stage(StageMarker::ConsumeConfigured);
}

/// Resolve the configuration a responder consumes with.
pub fn respond_configuration(pipe: &mut PipeBuilder, services: &OperationServices) {
    pipe.use_stage(StageMarker::Initialized)
        .use_middleware(RespondConfigurationMiddleware::new(
            services.respond_factory(),
            Default::default(),
        ))
        .use_stage(StageMarker::ConsumeConfigured);
}

/// Resolve the state machine for `ModelId`.
pub fn retrieve_state_machine(pipe: &mut PipeBuilder, services: &OperationServices) {
    pipe.use_middleware(RetrieveStateMachineMiddleware::new(
        services.activator(),
        Default::default(),
    ));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warren_channel::testing::InMemoryConnectionFactory;
    use warren_config::ClientConfiguration;

    use super::*;

    fn services() -> OperationServices {
        OperationServices::new(
            Arc::new(InMemoryConnectionFactory::new()),
            ClientConfiguration::default(),
        )
    }

    #[test]
    fn test_publish_message_steps() {
        let mut pipe = PipeBuilder::new();
        publish_message(&mut pipe, &services());
        assert_eq!(
            pipe.build().names(),
            vec![
                "StageMarkerMiddleware",
                "StageMarkerMiddleware",
                "PublishConfigurationMiddleware",
                "StageMarkerMiddleware",
                "ChannelCreationMiddleware",
                "ExchangeDeclareMiddleware",
                "BasicPublishMiddleware",
                "StageMarkerMiddleware",
            ]
        );
    }

    #[test]
    fn test_consume_message_steps() {
        let mut pipe = PipeBuilder::new();
        consume_message(&mut pipe, &services());
        assert_eq!(pipe.build().len(), 5);
    }
}
