pub mod apply;
pub mod diff;
pub mod modules;

use anyhow::{Context as AnyhowContext, Result};
use armkit::{Catalog, RestClient};
use declarative::{Fragments, ModuleDefinition, Request};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Settings;
use crate::document::{self, ResourceDocument};

/// Per-request HTTP timeout; long-running operations are polled separately
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// A document resolved against its module and validated
pub struct Prepared<'a> {
    pub document: ResourceDocument,
    pub module: &'a ModuleDefinition,
    pub request: Request,
}

/// Load and validate every document before any call reaches Azure
pub fn prepare<'a>(catalog: &'a Catalog, files: &[PathBuf], defaults: &Fragments) -> Result<Vec<Prepared<'a>>> {
    let mut prepared = Vec::new();
    for file in files {
        for document in document::load(file)? {
            let module = catalog
                .get(&document.module)
                .with_context(|| document.location.clone())?;
            let request = module
                .parse_request(&document.args, defaults)
                .with_context(|| document.location.clone())?;
            prepared.push(Prepared {
                document,
                module,
                request,
            });
        }
    }
    Ok(prepared)
}

/// REST client for the configured endpoint
pub fn connect(settings: &Settings) -> Result<RestClient> {
    let token = settings.token()?;
    log::debug!("using ARM endpoint {}", settings.endpoint);
    Ok(RestClient::new(&settings.endpoint, token, HTTP_TIMEOUT))
}
