//! Tag operations.

use super::segment;
use crate::client::{NationBuilderClient, ResourceList};
use crate::errors::NationBuilderResult;
use crate::pagination::PaginationInfo;
use crate::query::Params;
use crate::task::TaskHandle;

/// Service for tag operations.
pub struct TagsService<'a> {
    client: &'a NationBuilderClient,
}

impl<'a> TagsService<'a> {
    /// Creates a new tags service.
    pub fn new(client: &'a NationBuilderClient) -> Self {
        Self { client }
    }

    /// Lists the nation's tags.
    pub fn list<F>(&self, pagination: Option<&PaginationInfo>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.client
            .fetch_list("tags", &Params::new(), None, pagination, completion)
    }

    /// Lists the people carrying a tag.
    pub fn people<F>(&self, tag: &str, pagination: Option<&PaginationInfo>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        let tag = or_complete!(segment(tag, "Tag"), completion);
        self.client.fetch_list(
            &format!("tags/{}/people", tag),
            &Params::new(),
            None,
            pagination,
            completion,
        )
    }
}
