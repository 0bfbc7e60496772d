//! Expansion of `#[mcp_resource]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{ItemFn, Result};

use crate::MetaArgs;
use crate::util::{
    Args, build_fn_ident, collect_params, doc_summary, handler_id_tokens, struct_ident,
};

pub fn expand(args: MetaArgs, mut input: ItemFn) -> Result<TokenStream> {
    let args = Args::parse(args)?;
    let params = collect_params(&mut input)?;

    let fn_name = input.sig.ident.clone();
    let fn_vis = input.vis.clone();
    let uri = args
        .get("uri")
        .ok_or_else(|| syn::Error::new_spanned(&fn_name, "#[mcp_resource] requires uri = \"...\""))?
        .to_string();
    let name = args
        .get("name")
        .map(str::to_string)
        .unwrap_or_else(|| fn_name.to_string());
    let description = args
        .get("description")
        .map(str::to_string)
        .or_else(|| doc_summary(&input.attrs));

    // The handler takes no parameters, or exactly one receiving the URI.
    let call = match params.len() {
        0 => quote!({
            let _ = uri;
            #fn_name().await?
        }),
        1 => quote!(#fn_name(uri.to_string()).await?),
        _ => {
            return Err(syn::Error::new_spanned(
                &input.sig,
                "#[mcp_resource] functions take no parameters, or one uri: String",
            ));
        }
    };

    let handler_struct = struct_ident(&fn_name, "Resource");
    let build_fn = build_fn_ident(&fn_name, "resource");
    let handler_id = handler_id_tokens(&fn_name);

    let description_tokens = match &description {
        Some(description) => quote!(resource = resource.with_description(#description);),
        None => quote!(),
    };
    let mime_tokens = match args.get("mime_type") {
        Some(mime_type) => quote!(resource = resource.with_mime_type(#mime_type);),
        None => quote!(),
    };

    Ok(quote! {
        #input

        #[derive(Clone, Copy)]
        #fn_vis struct #handler_struct;

        #[kestrel_mcp_server::async_trait::async_trait]
        impl kestrel_mcp_server::ResourceHandler for #handler_struct {
            async fn read(
                &self,
                uri: &str,
            ) -> kestrel_mcp_server::McpResult<kestrel_mcp_server::ResourceOutput> {
                let result = #call;
                Ok(kestrel_mcp_server::ResourceOutput::from(result))
            }
        }

        #[doc(hidden)]
        fn #build_fn() -> kestrel_mcp_server::McpResult<(
            kestrel_mcp_server::protocol::Resource,
            std::sync::Arc<dyn kestrel_mcp_server::ResourceHandler>,
        )> {
            #[allow(unused_mut)]
            let mut resource = kestrel_mcp_server::protocol::Resource::new(#uri, #name);
            #description_tokens
            #mime_tokens
            Ok((resource, std::sync::Arc::new(#handler_struct)))
        }

        kestrel_mcp_server::inventory::submit! {
            kestrel_mcp_server::discovery::ResourceRegistration {
                id: #handler_id,
                build: #build_fn,
            }
        }
    })
}
