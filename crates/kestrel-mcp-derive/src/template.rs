//! Expansion of `#[mcp_resource_template]`.
//!
//! Function parameters bind template variables by name; all captures are
//! strings. A parameter named `uri` receives the original request URI.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{ItemFn, Result};

use crate::MetaArgs;
use crate::util::{
    Args, build_fn_ident, collect_params, doc_summary, handler_id_tokens, option_inner,
    struct_ident,
};

pub fn expand(args: MetaArgs, mut input: ItemFn) -> Result<TokenStream> {
    let args = Args::parse(args)?;
    let params = collect_params(&mut input)?;

    let fn_name = input.sig.ident.clone();
    let fn_vis = input.vis.clone();
    let uri_template = args
        .get("uri_template")
        .ok_or_else(|| {
            syn::Error::new_spanned(&fn_name, "#[mcp_resource_template] requires uri_template = \"...\"")
        })?
        .to_string();
    let name = args
        .get("name")
        .map(str::to_string)
        .unwrap_or_else(|| fn_name.to_string());
    let description = args
        .get("description")
        .map(str::to_string)
        .or_else(|| doc_summary(&input.attrs));

    // Bind each parameter: `uri` gets the request URI, everything else a
    // captured variable of the same name.
    let mut bindings = Vec::new();
    let mut call_args = Vec::new();
    let mut completion_inserts = Vec::new();
    for param in &params {
        let ident = &param.ident;
        let param_name = param.wire_name();
        if param.rename.is_none() && param_name == "uri" {
            bindings.push(quote! { let #ident = uri.to_string(); });
        } else if option_inner(&param.ty).is_some() {
            bindings.push(quote! { let #ident = vars.get(#param_name).cloned(); });
        } else {
            bindings.push(quote! {
                let #ident = vars.get(#param_name).cloned().ok_or_else(|| {
                    kestrel_mcp_server::McpError::missing_param(#param_name)
                })?;
            });
        }
        call_args.push(quote!(#ident));

        if !param.completions.is_empty() {
            let values = &param.completions;
            completion_inserts.push(quote! {
                completions.insert(
                    #param_name.to_string(),
                    kestrel_mcp_server::CompletionSource::Values(vec![#(#values.to_string()),*]),
                );
            });
        }
    }

    let handler_struct = struct_ident(&fn_name, "Template");
    let build_fn = build_fn_ident(&fn_name, "template");
    let handler_id = handler_id_tokens(&fn_name);

    let description_tokens = match &description {
        Some(description) => quote!(template = template.with_description(#description);),
        None => quote!(),
    };
    let mime_tokens = match args.get("mime_type") {
        Some(mime_type) => quote!(template = template.with_mime_type(#mime_type);),
        None => quote!(),
    };

    Ok(quote! {
        #input

        #[derive(Clone, Copy)]
        #fn_vis struct #handler_struct;

        #[kestrel_mcp_server::async_trait::async_trait]
        impl kestrel_mcp_server::TemplateHandler for #handler_struct {
            async fn read(
                &self,
                uri: &str,
                vars: std::collections::HashMap<String, String>,
            ) -> kestrel_mcp_server::McpResult<kestrel_mcp_server::ResourceOutput> {
                let _ = (&uri, &vars);
                #(#bindings)*
                let result = #fn_name(#(#call_args),*).await?;
                Ok(kestrel_mcp_server::ResourceOutput::from(result))
            }
        }

        #[doc(hidden)]
        fn #build_fn() -> kestrel_mcp_server::McpResult<(
            kestrel_mcp_server::protocol::ResourceTemplate,
            std::collections::HashMap<String, kestrel_mcp_server::CompletionSource>,
            std::sync::Arc<dyn kestrel_mcp_server::TemplateHandler>,
        )> {
            #[allow(unused_mut)]
            let mut template = kestrel_mcp_server::protocol::ResourceTemplate::new(#uri_template, #name);
            #description_tokens
            #mime_tokens
            #[allow(unused_mut)]
            let mut completions: std::collections::HashMap<String, kestrel_mcp_server::CompletionSource> =
                std::collections::HashMap::new();
            #(#completion_inserts)*
            Ok((template, completions, std::sync::Arc::new(#handler_struct)))
        }

        kestrel_mcp_server::inventory::submit! {
            kestrel_mcp_server::discovery::TemplateRegistration {
                id: #handler_id,
                build: #build_fn,
            }
        }
    })
}
