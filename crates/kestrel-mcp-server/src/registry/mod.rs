//! The registry: a typed catalog of tools, resources, resource templates
//! and prompts.
//!
//! Entries come from two sources: manual registration through the builder
//! and attribute-driven discovery. On a key collision, manual wins: a
//! discovered entry never displaces a manual one (it is dropped with a
//! debug log), while any other replacement logs a warning. Adding an entry
//! under a previously-absent key emits a list-changed notification through
//! the configured sink, except during bulk cache load.

pub mod cache;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use kestrel_mcp_protocol::{
    McpError, McpResult, Prompt, Resource, ResourceTemplate, Tool,
};

use crate::completion::CompletionSource;
use crate::handler::{PromptHandler, ResourceHandler, TemplateHandler, ToolHandler};
use crate::schema_gen::ParamSpec;
use crate::uri_template::UriTemplate;

pub use cache::{CACHE_SCHEMA_TAG, RegistryCache};

/// Which catalog changed, for list-changed notifications. Templates do not
/// notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Tools,
    Resources,
    Prompts,
}

/// Receives list-changed events; the session layer broadcasts them.
pub trait ListChangedSink: Send + Sync {
    fn list_changed(&self, kind: CatalogKind);
}

/// A registered tool.
#[derive(Clone)]
pub struct ToolEntry {
    pub tool: Tool,
    pub params: Vec<ParamSpec>,
    pub handler: Arc<dyn ToolHandler>,
    /// Stable id for cache rebinding; present on discovered entries.
    pub handler_id: Option<String>,
    pub is_manual: bool,
}

/// A registered resource.
#[derive(Clone)]
pub struct ResourceEntry {
    pub resource: Resource,
    pub handler: Arc<dyn ResourceHandler>,
    pub handler_id: Option<String>,
    pub is_manual: bool,
}

/// A registered resource template.
#[derive(Clone)]
pub struct TemplateEntry {
    pub template: ResourceTemplate,
    pub compiled: UriTemplate,
    pub handler: Arc<dyn TemplateHandler>,
    /// Per-variable completion sources.
    pub completions: HashMap<String, CompletionSource>,
    pub handler_id: Option<String>,
    pub is_manual: bool,
}

/// A registered prompt.
#[derive(Clone)]
pub struct PromptEntry {
    pub prompt: Prompt,
    pub handler: Arc<dyn PromptHandler>,
    /// Per-argument completion sources.
    pub completions: HashMap<String, CompletionSource>,
    pub handler_id: Option<String>,
    pub is_manual: bool,
}

/// The catalog itself. Callers serialize their own register/clear calls;
/// lookups observe a consistent snapshot (the server wraps the registry in
/// a lock).
#[derive(Default)]
pub struct Registry {
    tools: HashMap<String, ToolEntry>,
    resources: HashMap<String, ResourceEntry>,
    /// Insertion-ordered: template matching takes the first hit.
    templates: Vec<TemplateEntry>,
    prompts: HashMap<String, PromptEntry>,
    sink: Option<Arc<dyn ListChangedSink>>,
    cache: Option<RegistryCache>,
    bulk_loading: bool,
}

/// Outcome of a precedence check.
enum Admission {
    Insert { notify: bool },
    Drop,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sink(&mut self, sink: Arc<dyn ListChangedSink>) {
        self.sink = Some(sink);
    }

    pub fn set_cache(&mut self, cache: RegistryCache) {
        self.cache = Some(cache);
    }

    fn admit(&self, key: &str, existing_manual: Option<bool>, new_manual: bool) -> Admission {
        match existing_manual {
            None => Admission::Insert { notify: true },
            Some(true) if !new_manual => {
                debug!("discovered entry '{}' ignored; manual registration wins", key);
                Admission::Drop
            }
            Some(_) => {
                warn!("replacing existing registration '{}'", key);
                Admission::Insert { notify: false }
            }
        }
    }

    fn notify(&self, kind: CatalogKind) {
        if self.bulk_loading {
            return;
        }
        if let Some(sink) = &self.sink {
            sink.list_changed(kind);
        }
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub fn register_tool(&mut self, entry: ToolEntry) -> McpResult<()> {
        if entry.tool.name.trim().is_empty() {
            return Err(McpError::configuration("tool name must not be empty"));
        }
        let existing = self.tools.get(&entry.tool.name).map(|e| e.is_manual);
        match self.admit(&entry.tool.name, existing, entry.is_manual) {
            Admission::Drop => Ok(()),
            Admission::Insert { notify } => {
                self.tools.insert(entry.tool.name.clone(), entry);
                if notify {
                    self.notify(CatalogKind::Tools);
                }
                Ok(())
            }
        }
    }

    pub fn register_resource(&mut self, entry: ResourceEntry) -> McpResult<()> {
        validate_uri(&entry.resource.uri)?;
        let existing = self.resources.get(&entry.resource.uri).map(|e| e.is_manual);
        match self.admit(&entry.resource.uri, existing, entry.is_manual) {
            Admission::Drop => Ok(()),
            Admission::Insert { notify } => {
                self.resources.insert(entry.resource.uri.clone(), entry);
                if notify {
                    self.notify(CatalogKind::Resources);
                }
                Ok(())
            }
        }
    }

    pub fn register_template(&mut self, entry: TemplateEntry) -> McpResult<()> {
        let key = entry.template.uri_template.clone();
        let existing = self
            .templates
            .iter()
            .position(|e| e.template.uri_template == key);
        match self.admit(&key, existing.map(|i| self.templates[i].is_manual), entry.is_manual) {
            Admission::Drop => Ok(()),
            Admission::Insert { .. } => {
                match existing {
                    Some(index) => self.templates[index] = entry,
                    None => self.templates.push(entry),
                }
                // Templates never emit list-changed notifications.
                Ok(())
            }
        }
    }

    pub fn register_prompt(&mut self, entry: PromptEntry) -> McpResult<()> {
        if entry.prompt.name.trim().is_empty() {
            return Err(McpError::configuration("prompt name must not be empty"));
        }
        let existing = self.prompts.get(&entry.prompt.name).map(|e| e.is_manual);
        match self.admit(&entry.prompt.name, existing, entry.is_manual) {
            Admission::Drop => Ok(()),
            Admission::Insert { notify } => {
                self.prompts.insert(entry.prompt.name.clone(), entry);
                if notify {
                    self.notify(CatalogKind::Prompts);
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn find_tool(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.get(name)
    }

    pub fn find_resource(&self, uri: &str) -> Option<&ResourceEntry> {
        self.resources.get(uri)
    }

    pub fn find_prompt(&self, name: &str) -> Option<&PromptEntry> {
        self.prompts.get(name)
    }

    pub fn find_template(&self, uri_template: &str) -> Option<&TemplateEntry> {
        self.templates
            .iter()
            .find(|e| e.template.uri_template == uri_template)
    }

    /// Match a concrete URI against registered templates in insertion
    /// order; first hit wins.
    pub fn match_template(
        &self,
        uri: &str,
    ) -> Option<(&TemplateEntry, HashMap<String, String>)> {
        self.templates
            .iter()
            .find_map(|entry| entry.compiled.extract(uri).map(|vars| (entry, vars)))
    }

    // ------------------------------------------------------------------
    // Listing (sorted for stable pagination)
    // ------------------------------------------------------------------

    pub fn list_tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.tools.values().map(|e| e.tool.clone()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn list_resources(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> =
            self.resources.values().map(|e| e.resource.clone()).collect();
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        resources
    }

    pub fn list_templates(&self) -> Vec<ResourceTemplate> {
        let mut templates: Vec<ResourceTemplate> =
            self.templates.iter().map(|e| e.template.clone()).collect();
        templates.sort_by(|a, b| a.uri_template.cmp(&b.uri_template));
        templates
    }

    pub fn list_prompts(&self) -> Vec<Prompt> {
        let mut prompts: Vec<Prompt> = self.prompts.values().map(|e| e.prompt.clone()).collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        prompts
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
            && self.resources.is_empty()
            && self.templates.is_empty()
            && self.prompts.is_empty()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.len()
    }

    // ------------------------------------------------------------------
    // Discovered-entry lifecycle
    // ------------------------------------------------------------------

    pub(crate) fn discovered_tools(&self) -> impl Iterator<Item = &ToolEntry> {
        self.tools.values().filter(|e| !e.is_manual)
    }

    pub(crate) fn discovered_resources(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.resources.values().filter(|e| !e.is_manual)
    }

    pub(crate) fn discovered_templates(&self) -> impl Iterator<Item = &TemplateEntry> {
        self.templates.iter().filter(|e| !e.is_manual)
    }

    pub(crate) fn discovered_prompts(&self) -> impl Iterator<Item = &PromptEntry> {
        self.prompts.values().filter(|e| !e.is_manual)
    }

    /// Remove every discovered entry, optionally deleting the cache file.
    pub fn clear_discovered(&mut self, delete_cache: bool) {
        self.tools.retain(|_, e| e.is_manual);
        self.resources.retain(|_, e| e.is_manual);
        self.templates.retain(|e| e.is_manual);
        self.prompts.retain(|_, e| e.is_manual);
        if delete_cache
            && let Some(cache) = &self.cache
        {
            cache.clear();
        }
    }

    /// Persist discovered entries to the configured cache. Write failures
    /// log and are otherwise ignored.
    pub fn save_to_cache(&self) {
        let Some(cache) = &self.cache else { return };
        cache.save(self);
    }

    /// Load discovered entries from the configured cache, rebinding
    /// handlers from `discovered`. Returns `None` on a cache miss
    /// (no file, unreadable, or schema tag mismatch), otherwise the number
    /// of admitted entries. Manual keys always win over cached entries, and
    /// notifications are suppressed for the whole load.
    pub fn load_from_cache(&mut self, discovered: &crate::discovery::DiscoveredCatalog) -> Option<usize> {
        let cache = self.cache.clone()?;
        let snapshot = cache.load()?;

        self.bulk_loading = true;
        let admitted = cache::rebind(self, snapshot, discovered);
        self.bulk_loading = false;
        Some(admitted)
    }
}

/// Resource URIs must be absolute: `scheme://...`.
fn validate_uri(uri: &str) -> McpResult<()> {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return Err(McpError::configuration(format!(
            "resource URI '{}' must be absolute (scheme://...)",
            uri
        )));
    };
    let valid_scheme = !scheme.is_empty()
        && scheme.chars().next().unwrap().is_ascii_alphabetic()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
    if !valid_scheme || rest.is_empty() {
        return Err(McpError::configuration(format!(
            "resource URI '{}' has an invalid scheme",
            uri
        )));
    }
    Ok(())
}
