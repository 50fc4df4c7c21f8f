//! The opaque session handle representing one logical connection between a
//! transport and the gateway.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity bound 1:1 to a transport's lifetime. Created by the
/// transport during `init`, handed to the gateway on every incoming request,
/// and dropped during `destroy`. A transport never owns more than one at a
/// time and never recreates one mid-life.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransportSession {
    id: Uuid,
    created_at: DateTime<Utc>,
}

impl TransportSession {
    pub fn new() -> Self {
        TransportSession {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Default for TransportSession {
    fn default() -> Self {
        Self::new()
    }
}
