#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the pinrig crates: the error enum attribute used by
//! every crate and the `main` attribute that boots the Tokio runtime for binaries.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! pinrig-derive = { path = "../infra/derive" }
//! ```
//!
//! Examples are `ignore`d here because a proc-macro crate can't use its own macros.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, parse_macro_input};

/// Attribute macro to bootstrap the Tokio runtime.
///
/// Turns an `async fn main` into a plain `fn main` that builds a runtime from one of the
/// `pinrig_runtime::RuntimeConfig` presets and blocks on the body.
///
/// # Arguments
///
/// * `realtime` - Single-threaded runtime for deterministic machine loops.
/// * `service` - Multi-threaded runtime sized from available parallelism.
/// * `default` - Same as `service`.
///
/// # Examples
///
/// ```rust,ignore
/// #[pinrig_runtime::main(realtime)]
/// async fn main() -> anyhow::Result<()> {
/// # Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Attribute macro for crate error enums.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` unless present.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to `Result<T, Self>` and to `Result<T, Source>` for every wrapped source type.
/// * **Standard Conversions**: Implements `From<Source>` for variants with a `source` field
///   (or a field marked `#[source]`/`#[from]`), so `?` works on upstream errors.
/// * **Internal Fallback**: `From<&'static str>` and `From<String>` when an `Internal`
///   variant exists.
/// * **Kind**: `kind()` returns the variant name in `snake_case`, for structured log fields.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum** with named-field variants.
/// 2. A `context` field, when present, must be `Option<Cow<'static, str>>`.
/// 3. Variants with a source must carry a `context` field.
///
/// # Example
///
/// ```rust,ignore
/// use pinrig_derive::pinrig_error;
/// use std::borrow::Cow;
///
/// #[pinrig_error]
/// pub enum LoadError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read(path: &str) -> Result<String, LoadError> {
///     std::fs::read_to_string(path).context("reading machine file")
/// }
///
/// assert_eq!(LoadError::from("boom").kind(), "internal");
/// ```
#[proc_macro_attribute]
pub fn pinrig_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
