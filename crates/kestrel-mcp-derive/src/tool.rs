//! Expansion of `#[mcp_tool]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{ItemFn, Result};

use crate::MetaArgs;
use crate::util::{
    Args, build_fn_ident, collect_params, doc_summary, handler_id_tokens, param_extraction_tokens,
    param_spec_tokens, struct_ident,
};

pub fn expand(args: MetaArgs, mut input: ItemFn) -> Result<TokenStream> {
    let args = Args::parse(args)?;
    let params = collect_params(&mut input)?;

    let fn_name = input.sig.ident.clone();
    let fn_vis = input.vis.clone();
    let tool_name = args
        .get("name")
        .map(str::to_string)
        .unwrap_or_else(|| fn_name.to_string());
    let description = args
        .get("description")
        .map(str::to_string)
        .or_else(|| doc_summary(&input.attrs));

    let handler_struct = struct_ident(&fn_name, "Tool");
    let build_fn = build_fn_ident(&fn_name, "tool");
    let handler_id = handler_id_tokens(&fn_name);

    let description_tokens = match &description {
        Some(description) => quote!(tool = tool.with_description(#description);),
        None => quote!(),
    };

    let annotation_tokens = annotations_tokens(&args);

    let param_specs: Vec<TokenStream> = params.iter().map(param_spec_tokens).collect();
    let extractions: Vec<TokenStream> = params
        .iter()
        .enumerate()
        .map(|(index, param)| param_extraction_tokens(index, param))
        .collect();
    let call_args: Vec<&syn::Ident> = params.iter().map(|p| &p.ident).collect();

    Ok(quote! {
        #input

        #[derive(Clone, Copy)]
        #fn_vis struct #handler_struct;

        #[kestrel_mcp_server::async_trait::async_trait]
        impl kestrel_mcp_server::ToolHandler for #handler_struct {
            async fn call(
                &self,
                args: kestrel_mcp_server::Arguments,
            ) -> kestrel_mcp_server::McpResult<kestrel_mcp_server::ToolOutput> {
                let _ = &args;
                #(#extractions)*
                let result = #fn_name(#(#call_args),*).await?;
                Ok(kestrel_mcp_server::ToolOutput::from(result))
            }
        }

        #[doc(hidden)]
        fn #build_fn() -> kestrel_mcp_server::McpResult<(
            kestrel_mcp_server::protocol::Tool,
            Vec<kestrel_mcp_server::ParamSpec>,
            std::sync::Arc<dyn kestrel_mcp_server::ToolHandler>,
        )> {
            let params = vec![#(#param_specs),*];
            #[allow(unused_mut)]
            let mut tool = kestrel_mcp_server::protocol::Tool::new(
                #tool_name,
                kestrel_mcp_server::schema_gen::generate_input_schema(&params),
            );
            #description_tokens
            #annotation_tokens
            Ok((tool, params, std::sync::Arc::new(#handler_struct)))
        }

        kestrel_mcp_server::inventory::submit! {
            kestrel_mcp_server::discovery::ToolRegistration {
                id: #handler_id,
                build: #build_fn,
            }
        }
    })
}

fn annotations_tokens(args: &Args) -> TokenStream {
    let title = args.get("title");
    let hints = [
        ("read_only", quote!(read_only_hint)),
        ("destructive", quote!(destructive_hint)),
        ("idempotent", quote!(idempotent_hint)),
        ("open_world", quote!(open_world_hint)),
    ];

    let any_hint = title.is_some() || hints.iter().any(|(flag, _)| args.flag(flag));
    if !any_hint {
        return quote!();
    }

    let mut fields = TokenStream::new();
    if let Some(title) = title {
        fields.extend(quote!(annotations.title = Some(#title.to_string());));
    }
    for (flag, field) in hints {
        if args.flag(flag) {
            fields.extend(quote!(annotations.#field = Some(true);));
        }
    }

    quote! {
        let mut annotations = kestrel_mcp_server::protocol::ToolAnnotations::default();
        #fields
        tool = tool.with_annotations(annotations);
    }
}
