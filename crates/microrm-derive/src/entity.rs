//! Entity derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let entity_name = match struct_name_override(&input.attrs)? {
        Some(lit) => lit.value(),
        None => name.to_string(),
    };

    let mut accessors = Vec::with_capacity(fields.len());
    for field in fields {
        if is_skipped(&field.attrs)? {
            continue;
        }
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let attr_name = field_name.to_string();
        let ty = &field.ty;

        accessors.push(quote! {
            microrm::Accessor::<Self>::new(
                #attr_name,
                <#ty as microrm::IntoValue>::KIND,
                |e| microrm::IntoValue::into_value(::std::clone::Clone::clone(&e.#field_name)),
                |e, v| {
                    e.#field_name = <#ty as microrm::FromValue>::from_value(v)?;
                    ::std::result::Result::Ok(())
                },
            )
        });
    }

    Ok(quote! {
        impl #impl_generics microrm::Entity for #name #ty_generics #where_clause {
            const NAME: &'static str = #entity_name;

            fn accessors() -> ::std::vec::Vec<microrm::Accessor<Self>> {
                ::std::vec![#(#accessors),*]
            }
        }
    })
}

/// `#[orm(name = "...")]` on the struct.
fn struct_name_override(attrs: &[Attribute]) -> Result<Option<LitStr>> {
    let mut found = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("orm")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                found = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported orm attribute on struct; expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(found)
}

/// `#[orm(skip)]` on a field.
fn is_skipped(attrs: &[Attribute]) -> Result<bool> {
    let mut skip = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("orm")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported orm attribute on field; expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}
