//! Attribute-driven discovery.
//!
//! The `kestrel-mcp-derive` macros expand each annotated function into a
//! handler type plus an `inventory`-submitted registration record. At
//! startup the discoverer harvests every record linked into the binary,
//! the compile-time analog of scanning a source tree for annotations.
//!
//! One bad registration logs a warning and is skipped; discovery never
//! aborts the process.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use kestrel_mcp_protocol::{McpResult, Prompt, Resource, ResourceTemplate, Tool};

use crate::completion::CompletionSource;
use crate::handler::{PromptHandler, ResourceHandler, TemplateHandler, ToolHandler};
use crate::registry::{PromptEntry, Registry, ResourceEntry, TemplateEntry, ToolEntry};
use crate::schema_gen::ParamSpec;
use crate::uri_template::UriTemplate;

/// A tool registration submitted by the derive macros.
pub struct ToolRegistration {
    /// Stable handler id, `module_path::function`.
    pub id: &'static str,
    pub build: fn() -> McpResult<(Tool, Vec<ParamSpec>, Arc<dyn ToolHandler>)>,
}

/// A resource registration submitted by the derive macros.
pub struct ResourceRegistration {
    pub id: &'static str,
    pub build: fn() -> McpResult<(Resource, Arc<dyn ResourceHandler>)>,
}

/// A resource-template registration submitted by the derive macros.
pub struct TemplateRegistration {
    pub id: &'static str,
    pub build: fn() -> McpResult<(
        ResourceTemplate,
        HashMap<String, CompletionSource>,
        Arc<dyn TemplateHandler>,
    )>,
}

/// A prompt registration submitted by the derive macros.
pub struct PromptRegistration {
    pub id: &'static str,
    pub build: fn() -> McpResult<(
        Prompt,
        HashMap<String, CompletionSource>,
        Arc<dyn PromptHandler>,
    )>,
}

inventory::collect!(ToolRegistration);
inventory::collect!(ResourceRegistration);
inventory::collect!(TemplateRegistration);
inventory::collect!(PromptRegistration);

/// Everything harvested from the inventory, keyed by handler id. Also the
/// binding table used to re-attach handlers to cached descriptors.
#[derive(Default)]
pub struct DiscoveredCatalog {
    pub tools: HashMap<String, (Tool, Vec<ParamSpec>, Arc<dyn ToolHandler>)>,
    pub resources: HashMap<String, (Resource, Arc<dyn ResourceHandler>)>,
    pub templates: HashMap<
        String,
        (
            ResourceTemplate,
            HashMap<String, CompletionSource>,
            Arc<dyn TemplateHandler>,
        ),
    >,
    pub prompts: HashMap<
        String,
        (
            Prompt,
            HashMap<String, CompletionSource>,
            Arc<dyn PromptHandler>,
        ),
    >,
}

impl DiscoveredCatalog {
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
            && self.resources.is_empty()
            && self.templates.is_empty()
            && self.prompts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len() + self.resources.len() + self.templates.len() + self.prompts.len()
    }
}

/// Harvest every registration linked into the binary.
pub fn harvest() -> DiscoveredCatalog {
    let mut catalog = DiscoveredCatalog::default();

    for registration in inventory::iter::<ToolRegistration> {
        match (registration.build)() {
            Ok(built) => {
                catalog.tools.insert(registration.id.to_string(), built);
            }
            Err(err) => warn!("skipping discovered tool {}: {}", registration.id, err),
        }
    }
    for registration in inventory::iter::<ResourceRegistration> {
        match (registration.build)() {
            Ok(built) => {
                catalog.resources.insert(registration.id.to_string(), built);
            }
            Err(err) => warn!("skipping discovered resource {}: {}", registration.id, err),
        }
    }
    for registration in inventory::iter::<TemplateRegistration> {
        match (registration.build)() {
            Ok(built) => {
                catalog.templates.insert(registration.id.to_string(), built);
            }
            Err(err) => warn!("skipping discovered template {}: {}", registration.id, err),
        }
    }
    for registration in inventory::iter::<PromptRegistration> {
        match (registration.build)() {
            Ok(built) => {
                catalog.prompts.insert(registration.id.to_string(), built);
            }
            Err(err) => warn!("skipping discovered prompt {}: {}", registration.id, err),
        }
    }

    debug!("discovery harvested {} elements", catalog.len());
    catalog
}

/// Register every harvested element with `is_manual = false`. A single bad
/// element logs a warning and the rest continue.
pub fn register_all(registry: &mut Registry, catalog: &DiscoveredCatalog) {
    for (id, (tool, params, handler)) in &catalog.tools {
        let entry = ToolEntry {
            tool: tool.clone(),
            params: params.clone(),
            handler: Arc::clone(handler),
            handler_id: Some(id.clone()),
            is_manual: false,
        };
        if let Err(err) = registry.register_tool(entry) {
            warn!("failed to register discovered tool {}: {}", id, err);
        }
    }
    for (id, (resource, handler)) in &catalog.resources {
        let entry = ResourceEntry {
            resource: resource.clone(),
            handler: Arc::clone(handler),
            handler_id: Some(id.clone()),
            is_manual: false,
        };
        if let Err(err) = registry.register_resource(entry) {
            warn!("failed to register discovered resource {}: {}", id, err);
        }
    }
    for (id, (template, completions, handler)) in &catalog.templates {
        let compiled = match UriTemplate::compile(&template.uri_template) {
            Ok(compiled) => compiled,
            Err(err) => {
                warn!("failed to compile discovered template {}: {}", id, err);
                continue;
            }
        };
        let entry = TemplateEntry {
            template: template.clone(),
            compiled,
            handler: Arc::clone(handler),
            completions: completions.clone(),
            handler_id: Some(id.clone()),
            is_manual: false,
        };
        if let Err(err) = registry.register_template(entry) {
            warn!("failed to register discovered template {}: {}", id, err);
        }
    }
    for (id, (prompt, completions, handler)) in &catalog.prompts {
        let entry = PromptEntry {
            prompt: prompt.clone(),
            handler: Arc::clone(handler),
            completions: completions.clone(),
            handler_id: Some(id.clone()),
            is_manual: false,
        };
        if let Err(err) = registry.register_prompt(entry) {
            warn!("failed to register discovered prompt {}: {}", id, err);
        }
    }
}
