use std::borrow::Cow;

/// Errors raised while building or running a [`Machine`](crate::Machine).
#[pinrig_derive::pinrig_error]
pub enum MachineError {
    #[error("Machine config error{}: {source}", format_context(.context))]
    Config { source: pinrig_kernel::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Event bus error{}: {source}", format_context(.context))]
    Events { source: pinrig_events::EventBusError, context: Option<Cow<'static, str>> },

    /// A name that no configured device, switch or coil carries.
    #[error("Unknown {kind}{}: {name}", format_context(.context))]
    UnknownDevice { kind: &'static str, name: String, context: Option<Cow<'static, str>> },

    /// A validated setting the runtime still can't use.
    #[error("Invalid setting{}: {path}: {message}", format_context(.context))]
    InvalidSetting { path: String, message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal machine error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl MachineError {
    pub(crate) fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownDevice { kind, name: name.into(), context: None }
    }

    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidSetting { path: path.into(), message: message.into(), context: None }
    }
}
