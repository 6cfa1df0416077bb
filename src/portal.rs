//! Composition root: wires the directory, token codec and visitor desk
//! from configuration. Owns the single shared `DirectoryResolver`.

use crate::config::Config;
use crate::directory::{
    DirectoryCache, DirectoryResolver, DirectorySource, FileDirectoryCache, SheetsDirectory,
};
use crate::session::{SessionLifecycle, SessionTokenCodec};
use crate::visitor::{VisitRules, VisitorDesk};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

pub struct Portal {
    resolver: Arc<DirectoryResolver>,
    codec: Arc<SessionTokenCodec>,
    visitors: VisitorDesk,
    lifetime: Duration,
}

impl Portal {
    /// Build from configuration using the spreadsheet directory and file cache.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source: Arc<dyn DirectorySource> = Arc::new(SheetsDirectory::new(&config.directory)?);
        let cache: Arc<dyn DirectoryCache> = Arc::new(FileDirectoryCache::new(&config.cache.path));
        Self::with_parts(config, source, cache)
    }

    /// Build with explicit collaborators.
    pub fn with_parts(
        config: &Config,
        source: Arc<dyn DirectorySource>,
        cache: Arc<dyn DirectoryCache>,
    ) -> Result<Self> {
        let resolver = DirectoryResolver::new(Arc::clone(&source), cache)
            .with_timeout(config.directory.timeout());
        let visitors = VisitorDesk::new(source, VisitRules::from_config(&config.visitors)?);

        Ok(Self {
            resolver: Arc::new(resolver),
            codec: Arc::new(SessionTokenCodec::new(config.session.signing_key())),
            visitors,
            lifetime: config.session.lifetime(),
        })
    }

    pub fn resolver(&self) -> &Arc<DirectoryResolver> {
        &self.resolver
    }

    pub fn codec(&self) -> &Arc<SessionTokenCodec> {
        &self.codec
    }

    pub fn visitors(&self) -> &VisitorDesk {
        &self.visitors
    }

    /// Fresh, unauthenticated session context for one interaction.
    pub fn session(&self) -> SessionLifecycle {
        SessionLifecycle::new(
            Arc::clone(&self.resolver),
            Arc::clone(&self.codec),
            self.lifetime,
        )
    }
}
