//! Expansion of `#[mcp_prompt]`.
//!
//! Function parameters become prompt arguments. Arguments arrive as JSON
//! values; string parameters take the value verbatim (stringifying
//! scalars), `Option<String>` ones are optional.

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
    let prompt_name = args
        .get("name")
        .map(str::to_string)
        .unwrap_or_else(|| fn_name.to_string());
    let description = args
        .get("description")
        .map(str::to_string)
        .or_else(|| doc_summary(&input.attrs));

    let mut argument_decls = Vec::new();
    let mut bindings = Vec::new();
    let mut call_args = Vec::new();
    let mut completion_inserts = Vec::new();

    for param in &params {
        let ident = &param.ident;
        let param_name = param.wire_name();
        let optional = option_inner(&param.ty).is_some();

        let mut decl = quote! {
            kestrel_mcp_server::protocol::PromptArgument::new(#param_name)
        };
        if let Some(description) = &param.description {
            decl = quote!(#decl.with_description(#description));
        }
        if !optional {
            decl = quote!(#decl.required());
        }
        argument_decls.push(decl);

        if optional {
            bindings.push(quote! {
                let #ident = args.get(#param_name).map(__kestrel_prompt_arg_to_string);
            });
        } else {
            bindings.push(quote! {
                let #ident = args
                    .get(#param_name)
                    .map(__kestrel_prompt_arg_to_string)
                    .ok_or_else(|| kestrel_mcp_server::McpError::missing_param(#param_name))?;
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

    let handler_struct = struct_ident(&fn_name, "Prompt");
    let build_fn = build_fn_ident(&fn_name, "prompt");
    let handler_id = handler_id_tokens(&fn_name);

    let description_tokens = match &description {
        Some(description) => quote!(prompt = prompt.with_description(#description);),
        None => quote!(),
    };

    Ok(quote! {
        #input

        #[derive(Clone, Copy)]
        #fn_vis struct #handler_struct;

        #[kestrel_mcp_server::async_trait::async_trait]
        impl kestrel_mcp_server::PromptHandler for #handler_struct {
            async fn render(
                &self,
                args: std::collections::HashMap<String, kestrel_mcp_server::serde_json::Value>,
            ) -> kestrel_mcp_server::McpResult<kestrel_mcp_server::PromptOutput> {
                fn __kestrel_prompt_arg_to_string(
                    value: &kestrel_mcp_server::serde_json::Value,
                ) -> String {
                    match value.as_str() {
                        Some(text) => text.to_string(),
                        None => value.to_string(),
                    }
                }
                let _ = &args;
                #(#bindings)*
                let result = #fn_name(#(#call_args),*).await?;
                Ok(kestrel_mcp_server::PromptOutput::from(result))
            }
        }

        #[doc(hidden)]
        fn #build_fn() -> kestrel_mcp_server::McpResult<(
            kestrel_mcp_server::protocol::Prompt,
            std::collections::HashMap<String, kestrel_mcp_server::CompletionSource>,
            std::sync::Arc<dyn kestrel_mcp_server::PromptHandler>,
        )> {
            #[allow(unused_mut)]
            let mut prompt = kestrel_mcp_server::protocol::Prompt::new(#prompt_name);
            #description_tokens
            #(
                prompt = prompt.with_argument(#argument_decls);
            )*
            #[allow(unused_mut)]
            let mut completions: std::collections::HashMap<String, kestrel_mcp_server::CompletionSource> =
                std::collections::HashMap::new();
            #(#completion_inserts)*
            Ok((prompt, completions, std::sync::Arc::new(#handler_struct)))
        }

        kestrel_mcp_server::inventory::submit! {
            kestrel_mcp_server::discovery::PromptRegistration {
                id: #handler_id,
                build: #build_fn,
            }
        }
    })
}
