//! Shared helpers for the attribute macros.

use std::collections::HashMap;

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, Expr, FnArg, Lit, Meta, Pat, PatType, Result, Type};

use crate::MetaArgs;

/// Parse `key = "value"` (and bare-flag) attribute arguments.
pub struct Args {
    strings: HashMap<String, String>,
    flags: Vec<String>,
}

impl Args {
    pub fn parse(args: MetaArgs) -> Result<Self> {
        let mut strings = HashMap::new();
        let mut flags = Vec::new();
        for arg in args {
            match arg {
                Meta::NameValue(nv) => {
                    let key = nv
                        .path
                        .get_ident()
                        .map(|i| i.to_string())
                        .ok_or_else(|| syn::Error::new_spanned(&nv.path, "expected identifier"))?;
                    let Expr::Lit(expr_lit) = &nv.value else {
                        return Err(syn::Error::new_spanned(&nv.value, "expected literal value"));
                    };
                    let Lit::Str(s) = &expr_lit.lit else {
                        return Err(syn::Error::new_spanned(
                            &expr_lit.lit,
                            "expected string literal",
                        ));
                    };
                    strings.insert(key, s.value());
                }
                Meta::Path(path) => {
                    if let Some(ident) = path.get_ident() {
                        flags.push(ident.to_string());
                    }
                }
                Meta::List(list) => {
                    return Err(syn::Error::new_spanned(list, "unexpected attribute list"));
                }
            }
        }
        Ok(Self { strings, flags })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.strings.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.flags.iter().any(|f| f == key)
    }
}

/// First non-empty line of the doc comment, used as the default description.
pub fn doc_summary(attrs: &[Attribute]) -> Option<String> {
    for attr in attrs {
        if attr.path().is_ident("doc")
            && let Meta::NameValue(nv) = &attr.meta
            && let Expr::Lit(expr_lit) = &nv.value
            && let Lit::Str(s) = &expr_lit.lit
        {
            let line = s.value().trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
    }
    None
}

/// snake_case to PascalCase.
pub fn pascal_case(s: &str) -> String {
    s.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}

/// One typed function parameter.
pub struct FnParam {
    pub ident: syn::Ident,
    pub ty: Type,
    /// `#[param(name = "...")]` rename; lets snake_case parameters bind
    /// camelCase wire names and template variables.
    pub rename: Option<String>,
    pub description: Option<String>,
    pub completions: Vec<String>,
}

impl FnParam {
    /// The name this parameter carries on the wire.
    pub fn wire_name(&self) -> String {
        self.rename.clone().unwrap_or_else(|| self.ident.to_string())
    }
}

/// Collect the typed parameters of a function, reading and stripping the
/// `#[param(...)]` / `#[complete(...)]` helper attributes.
pub fn collect_params(input: &mut syn::ItemFn) -> Result<Vec<FnParam>> {
    let mut params = Vec::new();
    for arg in &mut input.sig.inputs {
        let FnArg::Typed(pat_type) = arg else {
            return Err(syn::Error::new_spanned(arg, "self parameters are not supported"));
        };
        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            return Err(syn::Error::new_spanned(
                &pat_type.pat,
                "parameter patterns are not supported",
            ));
        };

        let (rename, description) = param_meta(pat_type)?;
        let completions = param_completions(pat_type)?;
        pat_type
            .attrs
            .retain(|attr| !attr.path().is_ident("param") && !attr.path().is_ident("complete"));

        params.push(FnParam {
            ident: pat_ident.ident.clone(),
            ty: (*pat_type.ty).clone(),
            rename,
            description,
            completions,
        });
    }
    Ok(params)
}

fn param_meta(pat_type: &PatType) -> Result<(Option<String>, Option<String>)> {
    for attr in &pat_type.attrs {
        if attr.path().is_ident("param") {
            let mut rename = None;
            let mut description = None;
            attr.parse_nested_meta(|meta| {
                let target = if meta.path.is_ident("name") {
                    &mut rename
                } else if meta.path.is_ident("description") {
                    &mut description
                } else {
                    return Err(meta.error("expected name = \"...\" or description = \"...\""));
                };
                let value: Lit = meta.value()?.parse()?;
                match value {
                    Lit::Str(s) => {
                        *target = Some(s.value());
                        Ok(())
                    }
                    other => Err(syn::Error::new_spanned(other, "expected string literal")),
                }
            })?;
            return Ok((rename, description));
        }
    }
    Ok((None, None))
}

fn param_completions(pat_type: &PatType) -> Result<Vec<String>> {
    for attr in &pat_type.attrs {
        if attr.path().is_ident("complete") {
            let values: syn::punctuated::Punctuated<Lit, syn::Token![,]> =
                attr.parse_args_with(syn::punctuated::Punctuated::parse_terminated)?;
            let mut completions = Vec::new();
            for value in values {
                let Lit::Str(s) = value else {
                    return Err(syn::Error::new_spanned(
                        attr,
                        "expected string literals in #[complete(...)]",
                    ));
                };
                completions.push(s.value());
            }
            return Ok(completions);
        }
    }
    Ok(Vec::new())
}

/// Strip `Option<T>`, returning the inner type.
pub fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else { return None };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn last_ident(ty: &Type) -> Option<String> {
    if let Type::Path(type_path) = ty {
        type_path.path.segments.last().map(|s| s.ident.to_string())
    } else {
        None
    }
}

/// Map a Rust parameter type to a `ParamKind` expression. Unknown path
/// types map to `Object` and deserialize through serde.
pub fn param_kind_tokens(ty: &Type) -> TokenStream {
    if let Some(inner) = option_inner(ty) {
        return param_kind_tokens(inner);
    }
    match last_ident(ty).as_deref() {
        Some("String") | Some("str") => quote!(kestrel_mcp_server::ParamKind::String),
        Some("i8") | Some("i16") | Some("i32") | Some("i64") | Some("isize") | Some("u8")
        | Some("u16") | Some("u32") | Some("u64") | Some("usize") => {
            quote!(kestrel_mcp_server::ParamKind::Integer)
        }
        Some("f32") | Some("f64") => quote!(kestrel_mcp_server::ParamKind::Number),
        Some("bool") => quote!(kestrel_mcp_server::ParamKind::Boolean),
        Some("Vec") => {
            let inner = match ty {
                Type::Path(type_path) => {
                    let segment = type_path.path.segments.last().unwrap();
                    match &segment.arguments {
                        syn::PathArguments::AngleBracketed(args) => match args.args.first() {
                            Some(syn::GenericArgument::Type(inner)) => param_kind_tokens(inner),
                            _ => quote!(kestrel_mcp_server::ParamKind::Any),
                        },
                        _ => quote!(kestrel_mcp_server::ParamKind::Any),
                    }
                }
                _ => quote!(kestrel_mcp_server::ParamKind::Any),
            };
            quote!(kestrel_mcp_server::ParamKind::Array(Box::new(#inner)))
        }
        Some("Value") => quote!(kestrel_mcp_server::ParamKind::Any),
        Some("HashMap") | Some("BTreeMap") | Some("Map") => {
            quote!(kestrel_mcp_server::ParamKind::Object)
        }
        _ => quote!(kestrel_mcp_server::ParamKind::Object),
    }
}

/// Build the `ParamSpec` expression for one tool parameter.
pub fn param_spec_tokens(param: &FnParam) -> TokenStream {
    let name = param.wire_name();
    let kind = param_kind_tokens(&param.ty);
    let nullable = option_inner(&param.ty).is_some();

    let mut spec = quote! {
        kestrel_mcp_server::ParamSpec::new(#name, #kind)
    };
    if nullable {
        spec = quote!(#spec.nullable());
    }
    if let Some(description) = &param.description {
        spec = quote!(#spec.describe(#description));
    }
    spec
}

/// Generate the extraction of one positional marshalled argument into the
/// parameter's declared type.
pub fn param_extraction_tokens(index: usize, param: &FnParam) -> TokenStream {
    let ident = &param.ident;
    let ty = &param.ty;
    let name = param.wire_name();
    quote! {
        let #ident: #ty = kestrel_mcp_server::serde_json::from_value(
            args.positional().get(#index).cloned().unwrap_or(kestrel_mcp_server::serde_json::Value::Null),
        )
        .map_err(|err| kestrel_mcp_server::McpError::invalid_params(
            format!("parameter '{}': {}", #name, err),
        ))?;
    }
}

/// The `module_path::function` handler id expression.
pub fn handler_id_tokens(fn_name: &syn::Ident) -> TokenStream {
    let name = fn_name.to_string();
    quote!(concat!(module_path!(), "::", #name))
}

pub fn struct_ident(fn_name: &syn::Ident, suffix: &str) -> syn::Ident {
    format_ident!("{}{}", pascal_case(&fn_name.to_string()), suffix)
}

pub fn build_fn_ident(fn_name: &syn::Ident, kind: &str) -> syn::Ident {
    format_ident!("__kestrel_{}_build_{}", kind, fn_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse::Parser;
    use syn::parse_quote;

    fn metas(tokens: TokenStream) -> crate::MetaArgs {
        crate::MetaArgs::parse_terminated.parse2(tokens).unwrap()
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("greet_user"), "GreetUser");
        assert_eq!(pascal_case("x"), "X");
        assert_eq!(pascal_case("a__b"), "AB");
    }

    #[test]
    fn test_args_strings_and_flags() {
        let args = Args::parse(metas(quote!(name = "greet", read_only))).unwrap();
        assert_eq!(args.get("name"), Some("greet"));
        assert!(args.flag("read_only"));
        assert!(!args.flag("destructive"));
    }

    #[test]
    fn test_args_reject_non_string_values() {
        assert!(Args::parse(metas(quote!(name = 42))).is_err());
    }

    #[test]
    fn test_doc_summary_takes_first_line() {
        let item: syn::ItemFn = parse_quote! {
            /// Greets a user.
            /// Second line ignored.
            async fn greet() {}
        };
        assert_eq!(doc_summary(&item.attrs).as_deref(), Some("Greets a user."));
    }

    #[test]
    fn test_option_inner() {
        let ty: Type = parse_quote!(Option<String>);
        assert!(option_inner(&ty).is_some());
        let ty: Type = parse_quote!(String);
        assert!(option_inner(&ty).is_none());
    }

    #[test]
    fn test_collect_params_strips_helper_attrs() {
        let mut item: syn::ItemFn = parse_quote! {
            async fn f(#[param(description = "the text")] text: String, n: Option<i64>) {}
        };
        let params = collect_params(&mut item).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].description.as_deref(), Some("the text"));
        assert!(params[1].description.is_none());

        // Helper attributes are gone from the rewritten function.
        for arg in &item.sig.inputs {
            if let FnArg::Typed(pat_type) = arg {
                assert!(pat_type.attrs.is_empty());
            }
        }
    }
}
