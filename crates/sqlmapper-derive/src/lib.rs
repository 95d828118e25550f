//! Derive macros for sqlmapper
//!
//! Provides `#[derive(FromRecord)]`, `#[derive(ToRecord)]` and `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod entity;
mod from_record;
mod to_record;

/// Derive `FromRecord` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use sqlmapper::FromRecord;
///
/// #[derive(FromRecord)]
/// struct User {
///     id: i64,
///     first_name: String,
///     #[orm(column = "email_address")]
///     email: Option<String>,
///     #[orm(skip)]
///     cached: Vec<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(column = "name")]` - Read the field from a different column
/// - `#[orm(skip)]` - Leave the field at `Default::default()`
/// - `#[orm(default)]` - Use `Default::default()` when the column is absent
#[proc_macro_derive(FromRecord, attributes(orm))]
pub fn derive_from_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `ToRecord` so the struct can be passed as write arguments or a filter.
///
/// Every field type must be `Clone + Into<sqlmapper::Value>`.
///
/// # Attributes
///
/// - `#[orm(column = "name")]` - Write the field under a different column
/// - `#[orm(skip)]` - Leave the field out
#[proc_macro_derive(ToRecord, attributes(orm))]
pub fn derive_to_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    to_record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `Entity`, binding the struct to a table.
///
/// The struct must also implement `FromRecord`.
///
/// ```ignore
/// #[derive(FromRecord, Entity)]
/// #[orm(table = "users")]
/// struct User {
///     id: i64,
/// }
///
/// let users = Dao::<User>::for_entity(router)?;
/// ```
///
/// Without `#[orm(table = "...")]` the table is the snake_case struct name.
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
