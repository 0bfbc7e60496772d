//! On-disk cache for discovered catalog entries.
//!
//! The cache stores descriptors and parameter specs as JSON under a schema
//! tag; handlers are rebound at load time from the discovery harvest via
//! their stable ids. A missing file, unreadable content or a tag mismatch
//! is a cache miss, never an error. Manual entries never flow to the cache
//! and always win over cached ones at load.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use kestrel_mcp_protocol::{Prompt, Resource, ResourceTemplate, Tool};

use crate::discovery::DiscoveredCatalog;
use crate::registry::{PromptEntry, Registry, ResourceEntry, TemplateEntry, ToolEntry};
use crate::schema_gen::ParamSpec;
use crate::uri_template::UriTemplate;

/// Bump when the snapshot layout changes; mismatched tags are refused.
pub const CACHE_SCHEMA_TAG: &str = "kestrel-registry-v1";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CachedTool {
    pub tool: Tool,
    pub params: Vec<ParamSpec>,
    pub handler_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CachedResource {
    pub resource: Resource,
    pub handler_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CachedTemplate {
    pub template: ResourceTemplate,
    pub handler_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CachedPrompt {
    pub prompt: Prompt,
    pub handler_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CachedCatalog {
    pub schema: String,
    pub tools: Vec<CachedTool>,
    pub resources: Vec<CachedResource>,
    pub templates: Vec<CachedTemplate>,
    pub prompts: Vec<CachedPrompt>,
}

/// A cache file location.
#[derive(Debug, Clone)]
pub struct RegistryCache {
    path: PathBuf,
}

impl RegistryCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Read and validate the snapshot. `None` is a miss.
    pub(crate) fn load(&self) -> Option<CachedCatalog> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("registry cache read failed, treating as miss: {}", err);
                return None;
            }
        };
        let snapshot: CachedCatalog = match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("registry cache is corrupt, treating as miss: {}", err);
                return None;
            }
        };
        if snapshot.schema != CACHE_SCHEMA_TAG {
            warn!(
                "registry cache schema '{}' does not match '{}', treating as miss",
                snapshot.schema, CACHE_SCHEMA_TAG
            );
            return None;
        }
        Some(snapshot)
    }

    /// Persist discovered entries. Failures log and are otherwise ignored.
    pub(crate) fn save(&self, registry: &Registry) {
        let snapshot = snapshot_discovered(registry);
        let json = match serde_json::to_vec_pretty(&snapshot) {
            Ok(json) => json,
            Err(err) => {
                warn!("failed to serialize registry cache: {}", err);
                return;
            }
        };
        if let Some(parent) = self.path.parent()
            && let Err(err) = std::fs::create_dir_all(parent)
        {
            warn!("failed to create registry cache directory: {}", err);
            return;
        }
        match std::fs::write(&self.path, json) {
            Ok(()) => debug!(
                "registry cache saved: {} tools, {} resources, {} templates, {} prompts",
                snapshot.tools.len(),
                snapshot.resources.len(),
                snapshot.templates.len(),
                snapshot.prompts.len()
            ),
            Err(err) => warn!("failed to write registry cache: {}", err),
        }
    }

    /// Delete the cache file if present.
    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("registry cache deleted"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to delete registry cache: {}", err),
        }
    }
}

fn snapshot_discovered(registry: &Registry) -> CachedCatalog {
    let mut snapshot = CachedCatalog {
        schema: CACHE_SCHEMA_TAG.to_string(),
        tools: Vec::new(),
        resources: Vec::new(),
        templates: Vec::new(),
        prompts: Vec::new(),
    };

    for tool in registry.discovered_tools() {
        if let Some(handler_id) = &tool.handler_id {
            snapshot.tools.push(CachedTool {
                tool: tool.tool.clone(),
                params: tool.params.clone(),
                handler_id: handler_id.clone(),
            });
        }
    }
    for resource in registry.discovered_resources() {
        if let Some(handler_id) = &resource.handler_id {
            snapshot.resources.push(CachedResource {
                resource: resource.resource.clone(),
                handler_id: handler_id.clone(),
            });
        }
    }
    for template in registry.discovered_templates() {
        if let Some(handler_id) = &template.handler_id {
            snapshot.templates.push(CachedTemplate {
                template: template.template.clone(),
                handler_id: handler_id.clone(),
            });
        }
    }
    for prompt in registry.discovered_prompts() {
        if let Some(handler_id) = &prompt.handler_id {
            snapshot.prompts.push(CachedPrompt {
                prompt: prompt.prompt.clone(),
                handler_id: handler_id.clone(),
            });
        }
    }

    snapshot
}

/// Rebind cached descriptors to live discovered handlers and admit them
/// into the registry. Entries whose key a manual registration holds, or
/// whose handler id no longer exists, are skipped.
pub(crate) fn rebind(
    registry: &mut Registry,
    snapshot: CachedCatalog,
    discovered: &DiscoveredCatalog,
) -> usize {
    let mut admitted = 0;

    for cached in snapshot.tools {
        if registry.find_tool(&cached.tool.name).is_some_and(|e| e.is_manual) {
            debug!("cached tool '{}' shadowed by manual entry", cached.tool.name);
            continue;
        }
        let Some((_, _, handler)) = discovered.tools.get(&cached.handler_id) else {
            warn!("cached tool '{}' has no live handler, dropped", cached.tool.name);
            continue;
        };
        let entry = ToolEntry {
            tool: cached.tool,
            params: cached.params,
            handler: handler.clone(),
            handler_id: Some(cached.handler_id),
            is_manual: false,
        };
        if registry.register_tool(entry).is_ok() {
            admitted += 1;
        }
    }

    for cached in snapshot.resources {
        if registry
            .find_resource(&cached.resource.uri)
            .is_some_and(|e| e.is_manual)
        {
            continue;
        }
        let Some((_, handler)) = discovered.resources.get(&cached.handler_id) else {
            warn!("cached resource '{}' has no live handler, dropped", cached.resource.uri);
            continue;
        };
        let entry = ResourceEntry {
            resource: cached.resource,
            handler: handler.clone(),
            handler_id: Some(cached.handler_id),
            is_manual: false,
        };
        if registry.register_resource(entry).is_ok() {
            admitted += 1;
        }
    }

    for cached in snapshot.templates {
        if registry
            .find_template(&cached.template.uri_template)
            .is_some_and(|e| e.is_manual)
        {
            continue;
        }
        let Some((_, completions, handler)) = discovered.templates.get(&cached.handler_id) else {
            warn!(
                "cached template '{}' has no live handler, dropped",
                cached.template.uri_template
            );
            continue;
        };
        let compiled = match UriTemplate::compile(&cached.template.uri_template) {
            Ok(compiled) => compiled,
            Err(err) => {
                warn!("cached template failed to compile, dropped: {}", err);
                continue;
            }
        };
        let entry = TemplateEntry {
            template: cached.template,
            compiled,
            handler: handler.clone(),
            completions: completions.clone(),
            handler_id: Some(cached.handler_id),
            is_manual: false,
        };
        if registry.register_template(entry).is_ok() {
            admitted += 1;
        }
    }

    for cached in snapshot.prompts {
        if registry
            .find_prompt(&cached.prompt.name)
            .is_some_and(|e| e.is_manual)
        {
            continue;
        }
        let Some((_, completions, handler)) = discovered.prompts.get(&cached.handler_id) else {
            warn!("cached prompt '{}' has no live handler, dropped", cached.prompt.name);
            continue;
        };
        let entry = PromptEntry {
            prompt: cached.prompt,
            handler: handler.clone(),
            completions: completions.clone(),
            handler_id: Some(cached.handler_id),
            is_manual: false,
        };
        if registry.register_prompt(entry).is_ok() {
            admitted += 1;
        }
    }

    debug!("registry cache admitted {} entries", admitted);
    admitted
}
