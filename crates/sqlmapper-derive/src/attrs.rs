//! `#[orm(...)]` attribute parsing shared by the derives.

use syn::punctuated::Punctuated;
use syn::{Data, DeriveInput, Field, Fields, Result, Token};

/// Field-level options.
#[derive(Default)]
pub(crate) struct FieldAttr {
    pub column: Option<String>,
    pub skip: bool,
    pub default: bool,
}

impl syn::parse::Parse for FieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            if ident == "skip" {
                attr.skip = true;
            } else if ident == "default" {
                attr.default = true;
            } else if ident == "column" {
                let _: Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                attr.column = Some(value.value());
            } else {
                return Err(syn::Error::new_spanned(
                    &ident,
                    format!("unknown orm field attribute `{ident}`"),
                ));
            }

            if input.peek(Token![,]) {
                let _: Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

impl FieldAttr {
    pub(crate) fn from_field(field: &Field) -> Result<Self> {
        let mut out = FieldAttr::default();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("orm")) {
            let parsed: FieldAttr = attr.parse_args()?;
            out.skip |= parsed.skip;
            out.default |= parsed.default;
            if parsed.column.is_some() {
                out.column = parsed.column;
            }
        }
        Ok(out)
    }
}

/// Column name for a field: `#[orm(column)]` or the field name.
pub(crate) fn column_name(field: &Field, attr: &FieldAttr) -> String {
    attr.column.clone().unwrap_or_else(|| {
        field
            .ident
            .as_ref()
            .map(|i| i.to_string().trim_start_matches("r#").to_string())
            .unwrap_or_default()
    })
}

/// Named fields of a struct, or an error naming the derive.
pub(crate) fn named_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
) -> Result<&'a Punctuated<Field, Token![,]>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(&fields.named),
            _ => Err(syn::Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            input,
            format!("{derive} can only be derived for structs"),
        )),
    }
}

/// Struct-level `#[orm(table = "...")]`, if present.
pub(crate) fn table_name(input: &DeriveInput) -> Result<Option<String>> {
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("orm")) {
        let nested: syn::MetaNameValue = attr.parse_args()?;
        if !nested.path.is_ident("table") {
            return Err(syn::Error::new_spanned(
                &nested.path,
                "expected #[orm(table = \"table_name\")]",
            ));
        }
        if let syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(lit),
            ..
        }) = &nested.value
        {
            return Ok(Some(lit.value()));
        }
        return Err(syn::Error::new_spanned(
            &nested.value,
            "table name must be a string literal",
        ));
    }
    Ok(None)
}
