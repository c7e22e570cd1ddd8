//! Contact operations.

use super::{identifier, wrapped};
use crate::client::{NationBuilderClient, ResourceList};
use crate::errors::NationBuilderResult;
use crate::pagination::PaginationInfo;
use crate::query::Params;
use crate::task::TaskHandle;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Service for contact logging and its settings.
pub struct ContactsService<'a> {
    client: &'a NationBuilderClient,
}

impl<'a> ContactsService<'a> {
    /// Creates a new contacts service.
    pub fn new(client: &'a NationBuilderClient) -> Self {
        Self { client }
    }

    /// Lists the contacts logged for a person.
    pub fn list<F>(
        &self,
        person_id: impl fmt::Display,
        pagination: Option<&PaginationInfo>,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        let person_id = or_complete!(identifier(person_id, "Person id"), completion);
        self.client.fetch_list(
            &format!("people/{}/contacts", person_id),
            &Params::new(),
            None,
            pagination,
            completion,
        )
    }

    /// Logs a contact with a person.
    pub fn create<T, F>(&self, person_id: impl fmt::Display, contact: &T, completion: F) -> Option<TaskHandle>
    where
        T: Serialize + ?Sized,
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let person_id = or_complete!(identifier(person_id, "Person id"), completion);
        let params = or_complete!(wrapped("contact", contact), completion);
        self.client.create(
            &format!("people/{}/contacts", person_id),
            &params,
            Some("contact"),
            completion,
        )
    }

    /// Lists contact types.
    pub fn types<F>(&self, pagination: Option<&PaginationInfo>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.client
            .fetch_list("settings/contact_types", &Params::new(), None, pagination, completion)
    }

    /// Lists contact methods.
    pub fn methods<F>(&self, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.client
            .fetch_list("settings/contact_methods", &Params::new(), None, None, completion)
    }

    /// Lists contact statuses.
    pub fn statuses<F>(&self, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.client
            .fetch_list("settings/contact_statuses", &Params::new(), None, None, completion)
    }
}
