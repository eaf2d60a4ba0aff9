use thiserror::Error;

/// Failures that are the caller's fault rather than the infrastructure's.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum DomainError {
    #[error("The object already exists")]
    AlreadyExists,
    #[error("A required string was empty")]
    EmptyString,
    #[error("The operation is not allowed in a private conversation")]
    PrivateConversation,
    #[error("Only the creator can add users to this conversation")]
    CannotAddUser,
    #[error("The user cannot be kicked")]
    CannotKick,
    #[error("The operation is forbidden for this user")]
    Forbidden,
    #[error("The user has been kicked from the conversation")]
    UserKicked,
    #[error("The user is blocked")]
    Blocked,
    #[error("The provided data was invalid")]
    WrongData,
    #[error("The requested object was not found")]
    NotFound,
    #[error("The database returned inconsistent data")]
    InconsistentData,
    #[error("The password is too short")]
    InvalidPassword,
    #[error("The password is wrong")]
    WrongPassword,
    #[error("The requested user is deleted")]
    DeletedUser,
    #[error("Comments are disabled for this post")]
    CommentsDisabled,
}
