//! Procedural macros for configuration structs.
//!
//! `#[derive(ApplyDefaults)]` generates an `infra_config::ApplyDefaults`
//! implementation that visits fields in declaration order. Supported attributes:
//!
//! - container: `#[defaults(rename_all = "camelCase" | "lowercase" | "kebab-case")]`
//!   controls how field names map to defaults document keys;
//! - field: `#[defaults(value = "90")]` declares an inline default,
//!   `#[defaults(key = "diskSizeGb")]` overrides the document key,
//!   `#[defaults(nested)]` recurses into a nested configuration struct and
//!   `#[defaults(skip)]` leaves the field alone.
//!
//! Fields without a `#[defaults]` attribute are never touched.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derives `infra_config::ApplyDefaults` for a struct with named fields.
#[proc_macro_derive(ApplyDefaults, attributes(defaults))]
pub fn derive_apply_defaults(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Clone, Copy)]
enum RenameRule {
    Verbatim,
    CamelCase,
    LowerCase,
    KebabCase,
}

impl RenameRule {
    fn from_lit(lit: &LitStr) -> syn::Result<Self> {
        match lit.value().as_str() {
            "snake_case" => Ok(Self::Verbatim),
            "camelCase" => Ok(Self::CamelCase),
            "lowercase" => Ok(Self::LowerCase),
            "kebab-case" => Ok(Self::KebabCase),
            other => Err(syn::Error::new(
                lit.span(),
                format!(
                    "unsupported rename_all rule `{other}`; expected snake_case, camelCase, lowercase, or kebab-case"
                ),
            )),
        }
    }

    fn apply(self, field: &str) -> String {
        match self {
            Self::Verbatim => field.to_owned(),
            Self::LowerCase => field.replace('_', "").to_lowercase(),
            Self::KebabCase => field.replace('_', "-"),
            Self::CamelCase => {
                let mut out = String::with_capacity(field.len());
                let mut upper_next = false;
                for c in field.chars() {
                    if c == '_' {
                        upper_next = !out.is_empty();
                    } else if upper_next {
                        out.extend(c.to_uppercase());
                        upper_next = false;
                    } else {
                        out.push(c);
                    }
                }
                out
            }
        }
    }
}

enum FieldMode {
    Untouched,
    Leaf(Option<LitStr>),
    Nested,
}

struct FieldOptions {
    mode: FieldMode,
    key: Option<LitStr>,
}

fn defaults_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("defaults"))
}

fn container_rule(attrs: &[Attribute]) -> syn::Result<RenameRule> {
    let mut rule = RenameRule::Verbatim;
    for attr in defaults_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                let lit: LitStr = meta.value()?.parse()?;
                rule = RenameRule::from_lit(&lit)?;
                Ok(())
            } else {
                Err(meta.error("expected `rename_all` on the struct"))
            }
        })?;
    }
    Ok(rule)
}

fn field_options(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut seen = false;
    let mut nested = false;
    let mut skip = false;
    let mut value: Option<LitStr> = None;
    let mut key: Option<LitStr> = None;
    let mut last: Option<&Attribute> = None;

    for attr in defaults_attrs(attrs) {
        seen = true;
        last = Some(attr);
        // `#[defaults]` without arguments marks a document-only leaf.
        if matches!(attr.meta, syn::Meta::Path(_)) {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("nested") {
                nested = true;
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else if meta.path.is_ident("value") {
                value = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("key") {
                key = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error("expected `value`, `key`, `nested`, or `skip`"));
            }
            Ok(())
        })?;
    }

    if let Some(attr) = last.filter(|_| skip && (nested || value.is_some())) {
        return Err(syn::Error::new_spanned(
            attr,
            "`skip` cannot be combined with `nested` or `value`",
        ));
    }
    if let (true, Some(lit)) = (nested, value.as_ref()) {
        return Err(syn::Error::new(
            lit.span(),
            "nested structs take their defaults from their own fields",
        ));
    }

    let mode = if !seen || skip {
        FieldMode::Untouched
    } else if nested {
        FieldMode::Nested
    } else {
        FieldMode::Leaf(value)
    };
    Ok(FieldOptions { mode, key })
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "ApplyDefaults can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "ApplyDefaults requires named fields",
        ));
    };

    let rule = container_rule(&input.attrs)?;
    let mut steps = Vec::with_capacity(fields.named.len());

    for field in &fields.named {
        let options = field_options(&field.attrs)?;
        let Some(ident) = &field.ident else { continue };
        let key = options
            .key
            .as_ref()
            .map_or_else(|| rule.apply(&ident.unraw().to_string()), LitStr::value);

        match options.mode {
            FieldMode::Untouched => {}
            FieldMode::Nested => steps.push(quote! {
                ctx.nested(#key, &mut self.#ident)?;
            }),
            FieldMode::Leaf(value) => {
                let annotation = match value {
                    Some(lit) => quote!(::core::option::Option::Some(#lit)),
                    None => quote!(::core::option::Option::None),
                };
                steps.push(quote! {
                    ctx.leaf(#key, &mut self.#ident, #annotation)?;
                });
            }
        }
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::infra_config::ApplyDefaults for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn apply_defaults(
                &mut self,
                ctx: &mut ::infra_config::DefaultsContext<'_>,
            ) -> ::infra_config::ConfigResult<()> {
                #(#steps)*
                ::core::result::Result::Ok(())
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_rules() {
        assert_eq!(RenameRule::CamelCase.apply("disk_size_gb"), "diskSizeGb");
        assert_eq!(RenameRule::CamelCase.apply("_private"), "private");
        assert_eq!(RenameRule::LowerCase.apply("disk_size_gb"), "disksizegb");
        assert_eq!(RenameRule::KebabCase.apply("disk_size_gb"), "disk-size-gb");
        assert_eq!(RenameRule::Verbatim.apply("disk_size_gb"), "disk_size_gb");
    }

    #[test]
    fn expands_leaves_and_nested_fields() {
        let input: DeriveInput = syn::parse_quote! {
            #[defaults(rename_all = "camelCase")]
            struct NodePool {
                #[defaults(value = "90")]
                disk_size_gb: i64,
                #[defaults(nested)]
                node_config: NodeConfig,
                untouched: Vec<String>,
            }
        };

        let expanded = expand(&input).unwrap().to_string();
        assert!(expanded.contains("\"diskSizeGb\""));
        assert!(expanded.contains("\"90\""));
        assert!(expanded.contains("\"nodeConfig\""));
        assert!(expanded.contains("nested"));
        assert!(!expanded.contains("untouched"));
    }

    #[test]
    fn rejects_enums_and_conflicting_options() {
        let input: DeriveInput = syn::parse_quote! {
            enum Mode { A, B }
        };
        assert!(expand(&input).is_err());

        let input: DeriveInput = syn::parse_quote! {
            struct Bad {
                #[defaults(nested, value = "1")]
                inner: Inner,
            }
        };
        assert!(expand(&input).is_err());

        let input: DeriveInput = syn::parse_quote! {
            struct Unknown {
                #[defaults(fallback = "1")]
                field: i64,
            }
        };
        assert!(expand(&input).is_err());
    }
}
