//! ToRecord derive macro implementation

use crate::attrs::{FieldAttr, column_name, named_fields};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let fields = named_fields(&input, "ToRecord")?;

    let mut inserts = Vec::with_capacity(fields.len());
    for field in fields {
        let attr = FieldAttr::from_field(field)?;
        if attr.skip {
            continue;
        }
        let field_name = &field.ident;
        let column = column_name(field, &attr);
        inserts.push(quote! {
            record.insert(
                #column,
                ::sqlmapper::Value::from(::std::clone::Clone::clone(&self.#field_name)),
            );
        });
    }
    let capacity = inserts.len();

    Ok(quote! {
        impl #impl_generics ::sqlmapper::ToRecord for #name #ty_generics #where_clause {
            fn to_record(&self) -> ::sqlmapper::OrmResult<::sqlmapper::Record> {
                let mut record = ::sqlmapper::Record::with_capacity(#capacity);
                #(#inserts)*
                Ok(record)
            }
        }
    })
}
