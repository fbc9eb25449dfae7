use serde::{Deserialize, Serialize};
use super::BrokerId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broker {
    pub id: BrokerId,
    pub is_alive: bool,
}

impl Broker {
    pub fn new(id: BrokerId) -> Self {
        Self { id, is_alive: true }
    }

    /// A broker that is registered but currently offline
    pub fn dead(id: BrokerId) -> Self {
        Self {
            id,
            is_alive: false,
        }
    }
}
