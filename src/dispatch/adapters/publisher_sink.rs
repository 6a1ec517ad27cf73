//! [`EventSink`] backed by the event publisher.

use crate::delivery::{
    domain::{ChannelType, ResourceId},
    services::{DeliveryError, DeliveryReport, EventPublisher},
};
use crate::dispatch::ports::EventSink;
use mockable::Clock;
use serde_json::Value;

impl<C> EventSink for EventPublisher<C>
where
    C: Clock + Send + Sync + 'static,
{
    fn publish(
        &self,
        channel_type: &str,
        resource_id: &str,
        event_type: &str,
        data: Value,
    ) -> Result<DeliveryReport, DeliveryError> {
        let channel = ChannelType::new(channel_type)?;
        let resource = ResourceId::new(resource_id)?;
        self.send_event(&channel, &resource, event_type, data)
    }
}
