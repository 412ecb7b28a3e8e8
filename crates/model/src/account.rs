use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::HasId;

/// A user account as handed out by the identity provider. Markers only keep
/// the id of their owner.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: Option<String>,
}

impl HasId for Account {
    type IdType = String;
}
