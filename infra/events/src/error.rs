use std::borrow::Cow;

/// Errors that can occur during event bus operations.
#[pinrig_derive::pinrig_error]
pub enum EventBusError {
    /// The pending queue reached its bound; usually a handler loop re-posting forever.
    #[error("Event queue full{}: {message}", format_context(.context))]
    QueueFull { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Capacity must be greater than zero.
    #[error("Invalid capacity{}: {message}", format_context(.context))]
    InvalidCapacity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
