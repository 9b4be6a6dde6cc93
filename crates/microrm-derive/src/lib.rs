//! Derive macros for microrm
//!
//! Provides `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod entity;

/// Derive the `Entity` accessor table for a struct.
///
/// # Example
///
/// ```ignore
/// use microrm::Entity;
///
/// #[derive(Debug, Default, Entity)]
/// #[orm(name = "Member")]
/// struct User {
///     id: Option<i64>,
///     username: String,
///     created: Option<chrono::NaiveDateTime>,
///     #[orm(skip)]
///     cache: Vec<u8>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(name = "Name")]` - Entity name used for config lookup (defaults to the struct name)
/// - `#[orm(skip)]` - Leave a field out of the accessor table
///
/// Every other field must implement `IntoValue`, `FromValue` and `Clone`.
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
