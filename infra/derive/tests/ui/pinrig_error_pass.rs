use pinrig_derive::pinrig_error;
use std::borrow::Cow;

#[pinrig_error]
pub enum LoadError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read_missing() -> Result<String, LoadError> {
    std::fs::read_to_string("/definitely/not/here.yaml").context("reading machine file")
}

fn main() {
    let err = read_missing().unwrap_err();
    assert!(err.to_string().starts_with("IO error (reading machine file)"));

    let internal: LoadError = "boom".into();
    assert_eq!(internal.to_string(), "Internal error: boom");
}
