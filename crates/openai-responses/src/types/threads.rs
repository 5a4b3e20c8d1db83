//! Thread resource.

use serde::{Deserialize, Serialize};

use super::common::{Metadata, ToolResources};

/// A conversation session between an assistant and a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub created_at: i64,
    pub metadata: Option<Metadata>,
    pub object: String,
    pub tool_resources: Option<ToolResources>,
}
