use super::{EntityType, MutationAction};
use crate::shared::error::AppError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies what a payload body encodes: the entity kind and the write performed on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadTag {
    pub entity_type: EntityType,
    pub action: MutationAction,
}

impl PayloadTag {
    pub fn new(entity_type: EntityType, action: MutationAction) -> Self {
        Self {
            entity_type,
            action,
        }
    }
}

impl fmt::Display for PayloadTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.action)
    }
}

/// Request body of a queued mutation.
///
/// The processor forwards `body` byte-for-byte; typed access is only offered
/// at the UI boundary through [`MutationPayload::encode_json`] and
/// [`MutationPayload::decode_json`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationPayload {
    tag: PayloadTag,
    body: Bytes,
}

impl MutationPayload {
    pub fn new(tag: PayloadTag, body: impl Into<Bytes>) -> Self {
        Self {
            tag,
            body: body.into(),
        }
    }

    pub fn empty(tag: PayloadTag) -> Self {
        Self::new(tag, Bytes::new())
    }

    pub fn encode_json<T: Serialize>(tag: PayloadTag, value: &T) -> Result<Self, AppError> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(tag, body))
    }

    pub fn decode_json<T: DeserializeOwned>(&self, expected: &PayloadTag) -> Result<T, AppError> {
        if &self.tag != expected {
            return Err(AppError::InvalidInput(format!(
                "Payload tagged {} cannot be decoded as {}",
                self.tag, expected
            )));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn tag(&self) -> &PayloadTag {
        &self.tag
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
