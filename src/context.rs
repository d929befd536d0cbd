//! Kubernetes context switching.

use std::{
    ffi::OsStr,
    io::{self, Write},
    path::{Path, PathBuf},
};

use kube::config::Kubeconfig;
use log::debug;
use tempfile::NamedTempFile;

use crate::{
    error::{Error, Result},
    prompt::{Prompter, take_selected},
};

/// Kubeconfig path: the first entry of `kubeconfig` (a `KUBECONFIG`-style
/// list) when given, `~/.kube/config` otherwise.
pub fn kubeconfig_path(kubeconfig: Option<&OsStr>) -> Result<PathBuf> {
    if let Some(path) = kubeconfig.and_then(|list| std::env::split_paths(list).next()) {
        if !path.as_os_str().is_empty() {
            return Ok(path);
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".kube").join("config"))
        .ok_or(Error::HomeDir)
}

pub struct KubeContexts {
    path: PathBuf,
    config: Kubeconfig,
}

impl KubeContexts {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match Kubeconfig::read_from(&path) {
            Ok(config) => Ok(Self { path, config }),
            Err(e) => Err(Error::KubeconfigLoad {
                path,
                message: e.to_string(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Context names in file order.
    pub fn names(&self) -> Result<Vec<String>> {
        let names: Vec<String> = self
            .config
            .contexts
            .iter()
            .map(|context| context.name.clone())
            .collect();
        if names.is_empty() {
            return Err(Error::NoContexts(self.path.clone()));
        }
        Ok(names)
    }

    pub fn current(&self) -> Result<&str> {
        self.config
            .current_context
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::NoCurrentContext(self.path.clone()))
    }

    /// Makes `name` the current context and writes the file back.
    pub fn switch(&mut self, name: &str) -> Result<()> {
        if !self.config.contexts.iter().any(|context| context.name == name) {
            return Err(Error::UnknownContext(name.to_string()));
        }
        self.config.current_context = Some(name.to_string());
        self.save()
    }

    fn save(&self) -> Result<()> {
        let persistence = |source| Error::Persistence {
            path: self.path.clone(),
            source,
        };

        let yaml =
            serde_yaml::to_string(&self.config).map_err(|e| persistence(io::Error::other(e)))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(persistence)?;
        file.write_all(yaml.as_bytes()).map_err(persistence)?;
        file.persist(&self.path).map_err(|e| persistence(e.error))?;

        debug!("Saved kube config to {}", self.path.display());
        Ok(())
    }
}

/// Prompts for a context, defaulting to the current one, and switches to it.
pub fn switch_interactively<P: Prompter>(
    contexts: &mut KubeContexts,
    prompter: &P,
) -> Result<String> {
    let names = contexts.names()?;
    let default = contexts
        .current()
        .ok()
        .and_then(|current| names.iter().position(|name| name == current))
        .unwrap_or_default();

    let index = prompter.select("Choose a context", &names, default)?;
    let name = take_selected(names, index)?;
    contexts.switch(&name)?;
    Ok(name)
}
