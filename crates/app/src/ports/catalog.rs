//! Catalog port: bulk entity and device metadata.

use std::future::Future;

use hamirror_domain::device::CatalogEntity;
use hamirror_domain::error::MirrorError;

/// Fetches every supported entity together with its device metadata.
pub trait DeviceCatalog: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<Vec<CatalogEntity>, MirrorError>> + Send;
}

impl<T: DeviceCatalog> DeviceCatalog for std::sync::Arc<T> {
    fn fetch(&self) -> impl Future<Output = Result<Vec<CatalogEntity>, MirrorError>> + Send {
        (**self).fetch()
    }
}
