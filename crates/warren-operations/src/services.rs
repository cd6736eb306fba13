//! Collaborators shared by every operation of a client.

use std::sync::Arc;

use warren_channel::{ChannelFactory, ConnectionFactory};
use warren_config::{
    ClientConfiguration, ConsumerConfigurationFactory, ConventionConfigurationFactory,
    NamingConventions, PublisherConfigurationFactory, QueueDeclarationFactory,
    RequestConfigurationFactory, RespondConfigurationFactory,
};

use crate::state_machine::{InMemoryActivator, StateMachineActivator};

/// Everything middleware constructors need: the channel factory, the
/// configuration factories and the state machine activator.
///
/// By default every factory is a [`ConventionConfigurationFactory`] and
/// state machines live in an [`InMemoryActivator`]. Each can be replaced.
#[derive(Clone)]
pub struct OperationServices {
    client_configuration: Arc<ClientConfiguration>,
    conventions: Arc<NamingConventions>,
    channel_factory: Arc<ChannelFactory>,
    publisher_factory: Arc<dyn PublisherConfigurationFactory>,
    consumer_factory: Arc<dyn ConsumerConfigurationFactory>,
    queue_factory: Arc<dyn QueueDeclarationFactory>,
    request_factory: Arc<dyn RequestConfigurationFactory>,
    respond_factory: Arc<dyn RespondConfigurationFactory>,
    activator: Arc<dyn StateMachineActivator>,
}

impl OperationServices {
    /// Services with conventions named after the running executable.
    pub fn new(
        connection_factory: Arc<dyn ConnectionFactory>,
        client_configuration: ClientConfiguration,
    ) -> Self {
        Self::with_conventions(
            connection_factory,
            client_configuration,
            NamingConventions::new(),
        )
    }

    pub fn with_conventions(
        connection_factory: Arc<dyn ConnectionFactory>,
        client_configuration: ClientConfiguration,
        conventions: NamingConventions,
    ) -> Self {
        let client_configuration = Arc::new(client_configuration);
        let conventions = Arc::new(conventions);
        let factory = Arc::new(ConventionConfigurationFactory::new(
            conventions.clone(),
            client_configuration.clone(),
        ));
        let channel_factory = Arc::new(ChannelFactory::new(
            connection_factory,
            client_configuration.clone(),
        ));

        Self {
            client_configuration,
            conventions,
            channel_factory,
            publisher_factory: factory.clone(),
            consumer_factory: factory.clone(),
            queue_factory: factory.clone(),
            request_factory: factory.clone(),
            respond_factory: factory,
            activator: Arc::new(InMemoryActivator::new()),
        }
    }

    pub fn with_publisher_factory(mut self, factory: Arc<dyn PublisherConfigurationFactory>) -> Self {
        self.publisher_factory = factory;
        self
    }

    pub fn with_consumer_factory(mut self, factory: Arc<dyn ConsumerConfigurationFactory>) -> Self {
        self.consumer_factory = factory;
        self
    }

    pub fn with_queue_factory(mut self, factory: Arc<dyn QueueDeclarationFactory>) -> Self {
        self.queue_factory = factory;
        self
    }

    pub fn with_request_factory(mut self, factory: Arc<dyn RequestConfigurationFactory>) -> Self {
        self.request_factory = factory;
        self
    }

    pub fn with_respond_factory(mut self, factory: Arc<dyn RespondConfigurationFactory>) -> Self {
        self.respond_factory = factory;
        self
    }

    pub fn with_activator(mut self, activator: Arc<dyn StateMachineActivator>) -> Self {
        self.activator = activator;
        self
    }

    pub fn client_configuration(&self) -> Arc<ClientConfiguration> {
        self.client_configuration.clone()
    }

    pub fn conventions(&self) -> Arc<NamingConventions> {
        self.conventions.clone()
    }

    pub fn channel_factory(&self) -> Arc<ChannelFactory> {
        self.channel_factory.clone()
    }

    pub fn publisher_factory(&self) -> Arc<dyn PublisherConfigurationFactory> {
        self.publisher_factory.clone()
    }

    pub fn consumer_factory(&self) -> Arc<dyn ConsumerConfigurationFactory> {
        self.consumer_factory.clone()
    }

    pub fn queue_factory(&self) -> Arc<dyn QueueDeclarationFactory> {
        self.queue_factory.clone()
    }

    pub fn request_factory(&self) -> Arc<dyn RequestConfigurationFactory> {
        self.request_factory.clone()
    }

    pub fn respond_factory(&self) -> Arc<dyn RespondConfigurationFactory> {
        self.respond_factory.clone()
    }

    pub fn activator(&self) -> Arc<dyn StateMachineActivator> {
        self.activator.clone()
    }
}

impl std::fmt::Debug for OperationServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationServices")
            .field("client_configuration", &self.client_configuration)
            .field("channel_factory", &self.channel_factory)
            .finish_non_exhaustive()
    }
}
