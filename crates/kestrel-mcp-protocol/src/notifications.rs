//! Server-emitted notification payloads.
//!
//! Method names live in [`crate::methods`]; list-changed notifications carry
//! no parameters, so only `resources/updated` needs a payload type here.

use serde::{Deserialize, Serialize};

use crate::methods;
use kestrel_mcp_json_rpc::JsonRpcNotification;

/// `notifications/resources/updated` parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdatedParams {
    pub uri: String,
}

/// Build a `notifications/resources/updated` frame for a URI.
pub fn resource_updated(uri: impl Into<String>) -> JsonRpcNotification {
    let uri: String = uri.into();
    JsonRpcNotification::new(methods::NOTIFICATION_RESOURCES_UPDATED)
        .with_params(serde_json::json!({ "uri": uri }))
}

/// Build a parameterless list-changed frame for the given method name.
pub fn list_changed(method: &str) -> JsonRpcNotification {
    JsonRpcNotification::new(method)
}
