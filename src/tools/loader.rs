//! Tool discovery - scan a directory tree for tool modules
//!
//! Layout: `<tools_dir>/<domain>/<module>.yaml`. Each module is a manifest
//! listing exported handlers from the `HandlerTable`, optionally (re)marking
//! them. Directories and files whose name starts with `_` are internal and
//! skipped. Enumeration is sorted so discovery is reproducible.
//!
//! A module that fails to load (bad YAML, unknown handler) is logged, recorded
//! in the `DiscoveryReport`, and skipped; the rest of the tree still loads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, ToolbeltError};

use super::handlers::HandlerTable;
use super::marker::{ToolFn, ToolSpec};

/// Environment variable that demotes per-tool discovery logging to debug
pub const QUIET_ENV: &str = "TOOLBELT_QUIET";

/// Leading marker for internal directories, files and exports
const INTERNAL_PREFIX: char = '_';

const MODULE_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// One exported attribute of a module manifest
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestExport {
    handler: String,
    #[serde(default)]
    export: Option<String>,
    #[serde(default)]
    tool: Option<ToolSpec>,
}

/// Module manifest file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    exports: Vec<ManifestExport>,
}

/// A successfully loaded module
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub path: PathBuf,
    /// Dotted module path, `"{domain}.{file_stem}"`
    pub module_path: String,
    /// SHA-256 of the file contents, hex encoded
    pub digest: String,
    /// Exported attributes in file order
    pub exports: Vec<(String, ToolFn)>,
}

/// A module that failed to load during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedModule {
    pub path: PathBuf,
    pub reason: String,
}

/// What a discovery pass attempted and found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub domains_scanned: usize,
    pub files_attempted: usize,
    pub files_failed: Vec<FailedModule>,
    pub tools_found: usize,
}

impl DiscoveryReport {
    pub fn files_loaded(&self) -> usize {
        self.files_attempted - self.files_failed.len()
    }

    /// True if every attempted module loaded
    pub fn is_clean(&self) -> bool {
        self.files_failed.is_empty()
    }
}

/// Result of a discovery pass: tools keyed by identifier plus the report
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub tools: IndexMap<String, ToolFn>,
    pub report: DiscoveryReport,
}

/// Check the quiet-mode environment variable
pub fn quiet_from_env() -> bool {
    std::env::var(QUIET_ENV)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn is_internal(name: &str) -> bool {
    name.starts_with(INTERNAL_PREFIX)
}

fn digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Discovers tool modules under a root directory
pub struct ToolLoader {
    tools_dir: PathBuf,
    handlers: HandlerTable,
    quiet: bool,
    modules: RwLock<HashMap<PathBuf, LoadedModule>>,
}

impl ToolLoader {
    /// Create a loader for `tools_dir` resolving exports against `handlers`
    pub fn new(tools_dir: impl AsRef<Path>, handlers: HandlerTable) -> Self {
        let tools_dir = tools_dir.as_ref().to_path_buf();
        log::debug!("ToolLoader initialized with directory: {}", tools_dir.display());
        Self {
            tools_dir,
            handlers,
            quiet: quiet_from_env(),
            modules: RwLock::new(HashMap::new()),
        }
    }

    /// Force quiet mode on or off
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn chatty_level(&self) -> log::Level {
        if self.quiet { log::Level::Debug } else { log::Level::Info }
    }

    /// Scan every domain directory and collect marked exports
    pub fn discover(&self) -> Discovery {
        let mut discovery = Discovery::default();

        if !self.tools_dir.is_dir() {
            log::warn!("Tools directory not found: {}", self.tools_dir.display());
            return discovery;
        }

        log::log!(self.chatty_level(), "Discovering tools in: {}", self.tools_dir.display());

        for (domain, dir) in self.domain_dirs() {
            log::debug!("Scanning domain: {}", domain);
            discovery.report.domains_scanned += 1;
            self.scan_domain_directory(&domain, &dir, &mut discovery);
        }

        discovery.report.tools_found = discovery.tools.len();
        log::info!(
            "Discovery complete: Found {} tools ({} of {} modules failed)",
            discovery.report.tools_found,
            discovery.report.files_failed.len(),
            discovery.report.files_attempted
        );
        discovery
    }

    /// Immediate, non-internal subdirectories of the root, sorted by name
    fn domain_dirs(&self) -> Vec<(String, PathBuf)> {
        let entries = match std::fs::read_dir(&self.tools_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("Failed to read tools directory {}: {}", self.tools_dir.display(), e);
                return Vec::new();
            }
        };

        let mut dirs: Vec<(String, PathBuf)> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                (!is_internal(&name)).then(|| (name, entry.path()))
            })
            .collect();

        dirs.sort_by(|a, b| a.0.cmp(&b.0));
        dirs
    }

    /// Non-internal module files directly inside `dir`, sorted
    fn module_files(dir: &Path) -> Vec<PathBuf> {
        let base = glob::Pattern::escape(&dir.to_string_lossy());
        let mut files = Vec::new();

        for ext in MODULE_EXTENSIONS {
            let pattern = format!("{}/*.{}", base, ext);
            let paths = match glob::glob(&pattern) {
                Ok(paths) => paths,
                Err(e) => {
                    log::error!("Invalid module pattern {}: {}", pattern, e);
                    continue;
                }
            };
            for path in paths.flatten() {
                let internal = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_none_or(is_internal);
                if path.is_file() && !internal {
                    files.push(path);
                }
            }
        }

        files.sort();
        files.dedup();
        files
    }

    fn scan_domain_directory(&self, domain: &str, dir: &Path, discovery: &mut Discovery) {
        for path in Self::module_files(dir) {
            discovery.report.files_attempted += 1;

            let module = match self.load_module(&path) {
                Ok(module) => module,
                Err(e) => {
                    log::error!("Error loading module {}: {}", path.display(), e);
                    discovery.report.files_failed.push(FailedModule {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            log::debug!("Loaded module: {}", module.module_path);

            for (attr, function) in module.exports {
                if is_internal(&attr) {
                    continue;
                }
                let Some(metadata) = function.metadata() else {
                    continue;
                };

                if metadata.domain != domain {
                    log::warn!(
                        "Tool '{}' in {} declares domain '{}' but lives in directory '{}'",
                        metadata.name,
                        path.display(),
                        metadata.domain,
                        domain
                    );
                }

                let tool_id = metadata.id();
                log::log!(self.chatty_level(), "✓ Discovered tool: {}", tool_id);
                if discovery.tools.insert(tool_id.clone(), function).is_some() {
                    log::warn!("Tool identifier collision during discovery: {} (last one wins)", tool_id);
                }
            }
        }
    }

    /// Resolve a module path given relative to the tools directory
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.exists() {
            path.to_path_buf()
        } else {
            self.tools_dir.join(path)
        }
    }

    /// Load one module file and cache it
    pub fn load_module(&self, path: impl AsRef<Path>) -> Result<LoadedModule> {
        let path = self.resolve(path.as_ref());
        let module_load = |reason: String| ToolbeltError::ModuleLoad {
            path: path.clone(),
            reason,
        };

        let content = std::fs::read_to_string(&path).map_err(|e| module_load(e.to_string()))?;
        let manifest: Manifest = if content.trim().is_empty() {
            Manifest::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| module_load(e.to_string()))?
        };

        let domain = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let module_path = format!("{}.{}", domain, stem);

        let mut exports = Vec::with_capacity(manifest.exports.len());
        for export in manifest.exports {
            let handler = self
                .handlers
                .get(&export.handler)
                .ok_or_else(|| module_load(ToolbeltError::UnknownHandler(export.handler.clone()).to_string()))?;

            let mut function = match export.tool {
                Some(spec) => handler.clone().mark(spec),
                None => handler.clone(),
            };
            function.set_source_module(&module_path);

            let attr = export.export.unwrap_or(export.handler);
            exports.push((attr, function));
        }

        let module = LoadedModule {
            path: path.clone(),
            module_path,
            digest: digest(&content),
            exports,
        };

        if let Ok(mut cache) = self.modules.write() {
            cache.insert(path, module.clone());
        }
        Ok(module)
    }

    /// Re-read one module in place
    ///
    /// Errors are logged and yield `None`. No registry is touched: callers
    /// re-run discovery or re-register the returned exports themselves.
    pub fn reload_module(&self, path: impl AsRef<Path>) -> Option<LoadedModule> {
        let resolved = self.resolve(path.as_ref());
        let previous = self
            .modules
            .read()
            .ok()
            .and_then(|cache| cache.get(&resolved).map(|m| m.digest.clone()));

        match self.load_module(&resolved) {
            Ok(module) => {
                match previous {
                    Some(d) if d == module.digest => {
                        log::info!("Reloaded module: {} (unchanged)", module.module_path)
                    }
                    Some(_) => log::info!("Reloaded module: {} (contents changed)", module.module_path),
                    None => log::info!("Loaded module: {} (not previously loaded)", module.module_path),
                }
                Some(module)
            }
            Err(e) => {
                log::error!("Error reloading module {}: {}", resolved.display(), e);
                None
            }
        }
    }

    /// A cached module, if it has been loaded
    pub fn cached_module(&self, path: impl AsRef<Path>) -> Option<LoadedModule> {
        let resolved = self.resolve(path.as_ref());
        self.modules.read().ok()?.get(&resolved).cloned()
    }

    /// Paths of every cached module, sorted
    pub fn loaded_modules(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .modules
            .read()
            .map(|cache| cache.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }
}

impl std::fmt::Debug for ToolLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoader")
            .field("tools_dir", &self.tools_dir)
            .field("handlers", &self.handlers.len())
            .field("quiet", &self.quiet)
            .finish()
    }
}
