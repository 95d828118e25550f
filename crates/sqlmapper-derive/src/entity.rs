//! Entity derive macro implementation

use crate::attrs::table_name;
use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let table = table_name(&input)?.unwrap_or_else(|| name.to_string().to_snake_case());

    Ok(quote! {
        impl #impl_generics ::sqlmapper::Entity for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
        }
    })
}
