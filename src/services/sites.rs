//! Site operations.

use crate::client::{NationBuilderClient, ResourceList};
use crate::errors::NationBuilderResult;
use crate::pagination::PaginationInfo;
use crate::query::Params;
use crate::task::TaskHandle;

/// Service for site operations.
pub struct SitesService<'a> {
    client: &'a NationBuilderClient,
}

impl<'a> SitesService<'a> {
    /// Creates a new sites service.
    pub fn new(client: &'a NationBuilderClient) -> Self {
        Self { client }
    }

    /// Lists the nation's sites.
    pub fn list<F>(&self, pagination: Option<&PaginationInfo>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.client
            .fetch_list("sites", &Params::new(), None, pagination, completion)
    }
}
