//! Recording broker admin

use crate::broker::BrokerAdmin;
use crate::error::InfraError;
use std::sync::{Arc, Mutex};

/// Mock BrokerAdmin that records created topics
#[derive(Debug, Clone, Default)]
pub struct MockBrokerAdmin {
    topics: Arc<Mutex<Vec<String>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockBrokerAdmin {
    /// Create a broker with no topics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make topic creation fail.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Topics created so far, without duplicates.
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BrokerAdmin for MockBrokerAdmin {
    async fn create_topic(&self, topic: &str) -> Result<(), InfraError> {
        if let Some(message) = self.failure.lock().unwrap().as_ref() {
            return Err(InfraError::Broker(message.clone()));
        }
        let mut topics = self.topics.lock().unwrap();
        if !topics.iter().any(|t| t == topic) {
            topics.push(topic.to_string());
        }
        Ok(())
    }
}
