//! FromRecord derive macro implementation

use crate::attrs::{FieldAttr, column_name, named_fields};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let fields = named_fields(&input, "FromRecord")?;

    let mut field_extracts = Vec::with_capacity(fields.len());
    for field in fields {
        let attr = FieldAttr::from_field(field)?;
        let field_name = &field.ident;

        let extract = if attr.skip {
            quote! { #field_name: ::std::default::Default::default() }
        } else {
            let column = column_name(field, &attr);
            if attr.default {
                quote! {
                    #field_name: if record.contains_key(#column) {
                        record.try_get(#column)?
                    } else {
                        ::std::default::Default::default()
                    }
                }
            } else {
                quote! { #field_name: record.try_get(#column)? }
            }
        };
        field_extracts.push(extract);
    }

    Ok(quote! {
        impl #impl_generics ::sqlmapper::FromRecord for #name #ty_generics #where_clause {
            fn from_record(record: ::sqlmapper::Record) -> ::sqlmapper::OrmResult<Self> {
                Ok(Self {
                    #(#field_extracts),*
                })
            }
        }
    })
}
