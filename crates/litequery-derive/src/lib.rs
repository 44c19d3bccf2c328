//! Derive macro describing Rust structs as litequery tables.
//!
//! This crate provides the `#[derive(Storable)]` macro, which implements
//! `litequery_core::schema::Storable` from a struct's fields and their
//! `#[table]` / `#[column]` attributes.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Lit, Meta, PathArguments, Type,
    parse_macro_input,
};

/// Derives the `Storable` trait for a struct.
///
/// # Attributes
///
/// - `#[table(name = "table_name")]` - Specifies the SQL table name (optional,
///   defaults to the struct name)
///
/// # Field Attributes
///
/// - `#[column(name = "column_name")]` - Specifies the SQL column name
///   (optional, defaults to the field name)
/// - `#[column(ignore)]` - Leaves the field out of the table
/// - `#[column(primary_key)]` - Marks the field as (part of) the primary key
/// - `#[column(autoincrement)]` - Marks the key as AUTOINCREMENT
/// - `#[column(not_null)]` - Declares the column NOT NULL
/// - `#[column(collation = "nocase")]` - Sets the column collation
/// - `#[column(max_length = 50)]` - Declared text length (default 140)
/// - `#[column(default = "literal")]` - Sets a literal default value
/// - `#[column(indexed)]` - Adds the column to an unnamed index
/// - `#[column(indexed(name = "ix", order = 1, unique))]` - Adds the column to
///   a named, possibly composite and unique, index
/// - `#[column(unique)]` - Shorthand for an unnamed unique index
/// - `#[column(enumeration)]` - Stores a fieldless `Copy` enum by ordinal
/// - `#[column(document)]` - Stores text without a length bound
/// - `#[column(read_only)]` - Describes the field but never maps it
///
/// The value kind of each column follows from the field type; `Option<T>`
/// maps like `T`. Any other type, `Uuid` and `Decimal` included, becomes
/// `ValueKind::Custom` named after its last path segment. Such a type must
/// implement `ToValue`, and the connection needs a storage class for it
/// (`extra_type_mapping`) or a blob serializer.
#[proc_macro_derive(Storable, attributes(table, column))]
pub fn derive_storable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_storable_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_storable_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let type_name = struct_name.to_string();
    let table_name = get_table_name(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Storable derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Storable derive only supports structs",
            ));
        }
    };

    let mut members = Vec::new();
    let mut values = Vec::new();
    for field in fields {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let attrs = parse_column_attrs(&field.attrs)?;
        let name = field_name.to_string();

        let kind = if attrs.enumeration {
            quote! { ::litequery_core::types::ValueKind::Enum }
        } else if attrs.document {
            quote! { ::litequery_core::types::ValueKind::Document }
        } else {
            value_kind(&field.ty)
        };

        let annotations = attrs.annotations();
        let read_only = if attrs.read_only {
            quote! { .read_only() }
        } else {
            quote! {}
        };
        members.push(quote! {
            .member(
                ::litequery_core::schema::MemberDescriptor::new(#name, #kind)
                    #read_only
                    #(.attribute(#annotations))*
            )
        });

        values.push(if attrs.ignore {
            quote! { ::litequery_core::value::Value::Null }
        } else if attrs.enumeration {
            quote! { ::litequery_core::value::Value::Int(self.#field_name as i64) }
        } else {
            quote! { ::litequery_core::value::ToValue::to_value(&self.#field_name) }
        });
    }

    let table_name = table_name.map(|name| quote! { .table_name(#name) });
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::litequery_core::schema::Storable for #struct_name #ty_generics #where_clause {
            fn descriptor() -> ::litequery_core::schema::TypeDescriptor {
                ::litequery_core::schema::TypeDescriptor::new(#type_name)
                    #table_name
                    #(#members)*
            }

            fn to_values(&self) -> ::std::vec::Vec<::litequery_core::value::Value> {
                ::std::vec![#(#values),*]
            }
        }
    })
}

#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    ignore: bool,
    primary_key: bool,
    autoincrement: bool,
    not_null: bool,
    collation: Option<String>,
    max_length: Option<u32>,
    default_value: Option<String>,
    indices: Vec<IndexAttr>,
    enumeration: bool,
    document: bool,
    read_only: bool,
}

struct IndexAttr {
    name: Option<String>,
    order: i32,
    unique: bool,
}

impl ColumnAttrs {
    fn annotations(&self) -> Vec<TokenStream2> {
        let attr = quote! { ::litequery_core::schema::ColumnAttribute };
        let mut out = Vec::new();
        if let Some(name) = &self.name {
            out.push(quote! { #attr::Name(::std::string::String::from(#name)) });
        }
        if self.ignore {
            out.push(quote! { #attr::Ignore });
        }
        if self.primary_key {
            out.push(quote! { #attr::PrimaryKey });
        }
        if self.autoincrement {
            out.push(quote! { #attr::AutoIncrement });
        }
        if self.not_null {
            out.push(quote! { #attr::NotNull });
        }
        if let Some(collation) = &self.collation {
            out.push(quote! { #attr::Collation(::std::string::String::from(#collation)) });
        }
        if let Some(len) = self.max_length {
            out.push(quote! { #attr::MaxLength(#len) });
        }
        if let Some(default) = &self.default_value {
            out.push(quote! { #attr::Default(::std::string::String::from(#default)) });
        }
        for index in &self.indices {
            let name = match &index.name {
                Some(name) => quote! { ::std::option::Option::Some(::std::string::String::from(#name)) },
                None => quote! { ::std::option::Option::None },
            };
            let order = index.order;
            let unique = index.unique;
            out.push(quote! {
                #attr::Indexed(::litequery_core::schema::IndexedAttribute {
                    name: #name,
                    order: #order,
                    unique: #unique,
                })
            });
        }
        out
    }
}

fn get_table_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    for attr in attrs {
        if attr.path().is_ident("table") {
            let mut table_name = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    table_name = Some(parse_str(&meta)?);
                    Ok(())
                } else {
                    Err(meta.error("unsupported table attribute"))
                }
            })?;
            if table_name.is_some() {
                return Ok(table_name);
            }
        }
    }
    Ok(None)
}

fn parse_column_attrs(attrs: &[Attribute]) -> syn::Result<ColumnAttrs> {
    let mut result = ColumnAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("column") {
            continue;
        }
        // Handle empty attribute like #[column]
        if matches!(attr.meta, Meta::Path(_)) {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                result.name = Some(parse_str(&meta)?);
            } else if meta.path.is_ident("ignore") {
                result.ignore = true;
            } else if meta.path.is_ident("primary_key") {
                result.primary_key = true;
            } else if meta.path.is_ident("autoincrement") {
                result.autoincrement = true;
            } else if meta.path.is_ident("not_null") {
                result.not_null = true;
            } else if meta.path.is_ident("collation") {
                result.collation = Some(parse_str(&meta)?);
            } else if meta.path.is_ident("max_length") {
                result.max_length = Some(parse_int(&meta)?);
            } else if meta.path.is_ident("default") {
                result.default_value = Some(parse_str(&meta)?);
            } else if meta.path.is_ident("enumeration") {
                result.enumeration = true;
            } else if meta.path.is_ident("document") {
                result.document = true;
            } else if meta.path.is_ident("read_only") {
                result.read_only = true;
            } else if meta.path.is_ident("unique") {
                result.indices.push(IndexAttr {
                    name: None,
                    order: 0,
                    unique: true,
                });
            } else if meta.path.is_ident("indexed") {
                let mut index = IndexAttr {
                    name: None,
                    order: 0,
                    unique: false,
                };
                if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("name") {
                            index.name = Some(parse_str(&inner)?);
                        } else if inner.path.is_ident("order") {
                            index.order = parse_int(&inner)?;
                        } else if inner.path.is_ident("unique") {
                            index.unique = true;
                        } else {
                            return Err(inner.error("unsupported index attribute"));
                        }
                        Ok(())
                    })?;
                }
                result.indices.push(index);
            } else {
                return Err(meta.error("unsupported column attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn parse_str(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<String> {
    let value: Expr = meta.value()?.parse()?;
    match value {
        Expr::Lit(lit) => match lit.lit {
            Lit::Str(s) => Ok(s.value()),
            other => Err(syn::Error::new_spanned(other, "expected a string literal")),
        },
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}

fn parse_int<N>(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<N>
where
    N: std::str::FromStr,
    N::Err: std::fmt::Display,
{
    let value: Expr = meta.value()?.parse()?;
    match value {
        Expr::Lit(lit) => match lit.lit {
            Lit::Int(n) => n.base10_parse(),
            other => Err(syn::Error::new_spanned(other, "expected an integer literal")),
        },
        other => Err(syn::Error::new_spanned(other, "expected an integer literal")),
    }
}

/// Maps a field type to the tokens of its `ValueKind`.
fn value_kind(ty: &Type) -> TokenStream2 {
    let kind = quote! { ::litequery_core::types::ValueKind };
    let Some(segment) = last_segment(ty) else {
        let name = quote!(#ty).to_string().replace(' ', "");
        return quote! { #kind::Custom(::std::string::String::from(#name)) };
    };
    let ident = segment.ident.to_string();
    match ident.as_str() {
        "Option" => match first_type_argument(&segment.arguments) {
            Some(inner) => value_kind(inner),
            None => quote! { #kind::Custom(::std::string::String::from("Option")) },
        },
        "Vec" if first_type_argument(&segment.arguments).is_some_and(is_u8) => {
            quote! { #kind::Blob }
        }
        "bool" => quote! { #kind::Bool },
        "i8" => quote! { #kind::I8 },
        "i16" => quote! { #kind::I16 },
        "i32" => quote! { #kind::I32 },
        "i64" => quote! { #kind::I64 },
        "u8" => quote! { #kind::U8 },
        "u16" => quote! { #kind::U16 },
        "u32" => quote! { #kind::U32 },
        "u64" => quote! { #kind::U64 },
        "f32" => quote! { #kind::F32 },
        "f64" => quote! { #kind::F64 },
        "String" | "str" => quote! { #kind::Text },
        "NaiveDateTime" | "DateTime" => quote! { #kind::DateTime },
        "TimeDelta" | "Duration" => quote! { #kind::Duration },
        other => quote! { #kind::Custom(::std::string::String::from(#other)) },
    }
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        Type::Reference(reference) => last_segment(&reference.elem),
        Type::Group(group) => last_segment(&group.elem),
        Type::Paren(paren) => last_segment(&paren.elem),
        _ => None,
    }
}

fn first_type_argument(arguments: &PathArguments) -> Option<&Type> {
    match arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    }
}

fn is_u8(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|s| s.ident == "u8")
}
