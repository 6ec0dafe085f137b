//! Procedural macros for the docmodel project.
//!
//! `#[derive(Entity)]` turns a (usually unit) struct into an entity type:
//!
//! ```ignore
//! #[derive(Entity)]
//! #[entity(
//!     collection = "albums",
//!     using = "archive",
//!     verbose_name = "album",
//!     index = "-year,title",
//!     unique_index = "slug",
//!     auto_ensure_indexes = false,
//! )]
//! pub struct Album;
//! ```
//!
//! Every option is optional; `index` and `unique_index` may be repeated and take
//! comma separated ordering keys.

#[allow(unused_extern_crates)]
extern crate self as docmodel_macros;

use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitBool, LitStr, parse_macro_input};

#[derive(Default)]
struct EntityAttributes {
    collection: Option<String>,
    using: Option<String>,
    verbose_name: Option<String>,
    verbose_name_plural: Option<String>,
    indexes: Vec<(String, bool)>,
    auto_ensure_indexes: Option<bool>,
}

fn parse_entity_attributes(input: &DeriveInput) -> syn::Result<EntityAttributes> {
    let mut attributes = EntityAttributes::default();

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                attributes.collection = Some(meta.value()?.parse::<LitStr>()?.value());
                return Ok(());
            }

            if meta.path.is_ident("using") {
                attributes.using = Some(meta.value()?.parse::<LitStr>()?.value());
                return Ok(());
            }

            if meta.path.is_ident("verbose_name") {
                attributes.verbose_name = Some(meta.value()?.parse::<LitStr>()?.value());
                return Ok(());
            }

            if meta.path.is_ident("verbose_name_plural") {
                attributes.verbose_name_plural = Some(meta.value()?.parse::<LitStr>()?.value());
                return Ok(());
            }

            if meta.path.is_ident("index") || meta.path.is_ident("unique_index") {
                let unique = meta.path.is_ident("unique_index");
                let lit: LitStr = meta.value()?.parse()?;

                if lit.value().split(',').all(|key| key.trim().trim_start_matches('-').is_empty()) {
                    return Err(syn::Error::new(lit.span(), "index needs at least one field"));
                }

                attributes.indexes.push((lit.value(), unique));
                return Ok(());
            }

            if meta.path.is_ident("auto_ensure_indexes") {
                attributes.auto_ensure_indexes = Some(meta.value()?.parse::<LitBool>()?.value());
                return Ok(());
            }

            Err(meta.error(
                "Unsupported entity attribute. Supported: collection, using, verbose_name, \
                 verbose_name_plural, index, unique_index = \"...\", auto_ensure_indexes = <bool>",
            ))
        })?;
    }

    Ok(attributes)
}

#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let attributes = match parse_entity_attributes(&input) {
        Ok(attributes) => attributes,
        Err(err) => return err.to_compile_error().into(),
    };

    let name = &input.ident;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut options = quote! { ::docmodel::options::EntityOptions::new() };

    if let Some(collection) = &attributes.collection {
        options = quote! { #options.collection_name(#collection) };
    }
    if let Some(using) = &attributes.using {
        options = quote! { #options.using(#using) };
    }
    if let Some(verbose_name) = &attributes.verbose_name {
        options = quote! { #options.verbose_name(#verbose_name) };
    }
    if let Some(verbose_name_plural) = &attributes.verbose_name_plural {
        options = quote! { #options.verbose_name_plural(#verbose_name_plural) };
    }
    for (spec, unique) in &attributes.indexes {
        let index = if *unique {
            quote! { ::docmodel::index::Index::parse(#spec).unique() }
        } else {
            quote! { ::docmodel::index::Index::parse(#spec) }
        };
        options = quote! { #options.index(#index) };
    }
    if let Some(enabled) = attributes.auto_ensure_indexes {
        options = quote! { #options.auto_ensure_indexes(#enabled) };
    }

    quote! {
        impl #impl_generics ::docmodel::document::EntityType for #name #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            fn options() -> ::docmodel::options::EntityOptions {
                #options
            }
        }
    }
    .into()
}
