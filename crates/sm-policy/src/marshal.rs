// marshal.rs — Policy export/import capability.
//
// The bus layer owns the wire format. The manager only needs a byte-array
// round trip, so the format sits behind the `PolicyMarshaller` trait and is
// passed in explicitly wherever a policy crosses the boundary.

use crate::error::PolicyError;
use crate::model::Policy;

/// Converts policies to and from their transmitted byte form.
pub trait PolicyMarshaller: Send + Sync {
    fn export(&self, policy: &Policy) -> Result<Vec<u8>, PolicyError>;

    /// Rebuild a policy. An empty `bytes` is a [`PolicyError::EmptyInput`].
    fn import(&self, bytes: &[u8]) -> Result<Policy, PolicyError>;
}

/// Marshaller storing policies as JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPolicyMarshaller;

impl PolicyMarshaller for JsonPolicyMarshaller {
    fn export(&self, policy: &Policy) -> Result<Vec<u8>, PolicyError> {
        serde_json::to_vec(policy).map_err(|e| PolicyError::Serialization(e.to_string()))
    }

    fn import(&self, bytes: &[u8]) -> Result<Policy, PolicyError> {
        if bytes.is_empty() {
            return Err(PolicyError::EmptyInput);
        }
        serde_json::from_slice(bytes).map_err(|e| PolicyError::Serialization(e.to_string()))
    }
}
