use pinrig_derive::pinrig_error;
use std::borrow::Cow;

#[pinrig_error]
pub enum BusError {
    #[error("Queue full{}: {message}", format_context(.context))]
    QueueFull { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Missing version{}: {file}", format_context(.context))]
    MissingVersion { file: String, context: Option<Cow<'static, str>> },
}

fn main() {
    let full = BusError::QueueFull { message: "10000".into(), context: None };
    assert_eq!(full.kind(), "queue_full");

    let missing: Result<(), BusError> =
        Err(BusError::MissingVersion { file: "machine.yaml".to_owned(), context: None });
    let missing = missing.context("loading").unwrap_err();
    assert_eq!(missing.kind(), "missing_version");
    assert_eq!(missing.to_string(), "Missing version (loading): machine.yaml");
}
