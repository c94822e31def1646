use thiserror::Error;

/// Soft failures of one annotation attempt. All of them are retried on a later pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No message id could be resolved for the element")]
    MissingIdentity,

    #[error("No metadata stored for message {message_id}")]
    MissingMetadata { message_id: String },

    #[error("Session has no character id")]
    NoCharacter,
}
