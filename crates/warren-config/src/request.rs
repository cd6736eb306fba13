//! Request/response configuration.

use std::mem;

use crate::consume::{ConsumerConfiguration, ConsumerConfigurationBuilder};
use crate::publish::{PublisherConfiguration, PublisherConfigurationBuilder};

/// How a request is published and where its response is consumed from.
#[derive(Debug, Clone, Default)]
pub struct RequestConfiguration {
    pub request: PublisherConfiguration,
    pub response: ConsumerConfiguration,
}

#[derive(Default)]
pub struct RequestConfigurationBuilder {
    config: RequestConfiguration,
}

impl RequestConfigurationBuilder {
    pub fn new(config: RequestConfiguration) -> Self {
        Self { config }
    }

    pub fn publish_request(
        &mut self,
        action: impl FnOnce(&mut PublisherConfigurationBuilder),
    ) -> &mut Self {
        let mut builder = PublisherConfigurationBuilder::new(mem::take(&mut self.config.request));
        action(&mut builder);
        self.config.request = builder.build();
        self
    }

    pub fn consume_response(
        &mut self,
        action: impl FnOnce(&mut ConsumerConfigurationBuilder),
    ) -> &mut Self {
        let mut builder = ConsumerConfigurationBuilder::new(mem::take(&mut self.config.response));
        action(&mut builder);
        self.config.response = builder.build();
        self
    }

    pub fn build(self) -> RequestConfiguration {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sides_are_adjusted_independently() {
        let mut config = RequestConfiguration::default();
        config.request.routing_key = "getorder".into();
        config.response.consume.routing_key = "getorder.response".into();

        let mut builder = RequestConfigurationBuilder::new(config);
        builder.publish_request(|p| {
            p.with_routing_key("getorder.v2");
        });
        let config = builder.build();

        assert_eq!(config.request.routing_key, "getorder.v2");
        assert_eq!(config.response.consume.routing_key, "getorder.response");
    }
}
