//! List operations.

use super::identifier;
use crate::client::{NationBuilderClient, ResourceList};
use crate::errors::{NationBuilderError, NationBuilderResult};
use crate::pagination::PaginationInfo;
use crate::query::Params;
use crate::task::TaskHandle;
use serde_json::Value;
use std::fmt;

/// Service for list operations.
pub struct ListsService<'a> {
    client: &'a NationBuilderClient,
}

impl<'a> ListsService<'a> {
    /// Creates a new lists service.
    pub fn new(client: &'a NationBuilderClient) -> Self {
        Self { client }
    }

    /// Lists the nation's lists.
    pub fn list<F>(&self, pagination: Option<&PaginationInfo>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.client
            .fetch_list("lists", &Params::new(), None, pagination, completion)
    }

    /// Lists the people on a list.
    pub fn people<F>(
        &self,
        list_id: impl fmt::Display,
        pagination: Option<&PaginationInfo>,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        let list_id = or_complete!(identifier(list_id, "List id"), completion);
        self.client.fetch_list(
            &format!("lists/{}/people", list_id),
            &Params::new(),
            None,
            pagination,
            completion,
        )
    }

    /// Adds people to a list.
    pub fn add_people<F>(&self, list_id: impl fmt::Display, people_ids: &[u64], completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let list_id = or_complete!(identifier(list_id, "List id"), completion);
        let params = or_complete!(listing_params(people_ids), completion);
        self.client.create(
            &format!("lists/{}/people", list_id),
            &params,
            None,
            completion,
        )
    }

    /// Removes people from a list.
    pub fn remove_people<F>(&self, list_id: impl fmt::Display, people_ids: &[u64], completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let list_id = or_complete!(identifier(list_id, "List id"), completion);
        let params = or_complete!(listing_params(people_ids), completion);
        self.client.delete(
            &format!("lists/{}/people", list_id),
            &params,
            None,
            completion,
        )
    }
}

fn listing_params(people_ids: &[u64]) -> NationBuilderResult<Params> {
    if people_ids.is_empty() {
        return Err(NationBuilderError::invalid_argument("At least one person id is required"));
    }
    let mut params = Params::new();
    params.insert("people_ids".into(), people_ids.into());
    Ok(params)
}
