//! Donation operations.

use super::{identifier, wrapped};
use crate::client::{NationBuilderClient, ResourceList};
use crate::errors::NationBuilderResult;
use crate::pagination::PaginationInfo;
use crate::query::Params;
use crate::task::TaskHandle;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Service for donation operations.
pub struct DonationsService<'a> {
    client: &'a NationBuilderClient,
}

impl<'a> DonationsService<'a> {
    /// Creates a new donations service.
    pub fn new(client: &'a NationBuilderClient) -> Self {
        Self { client }
    }

    /// Lists donations.
    pub fn list<F>(&self, pagination: Option<&PaginationInfo>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.client
            .fetch_list("donations", &Params::new(), None, pagination, completion)
    }

    /// Records a donation.
    pub fn create<T, F>(&self, donation: &T, completion: F) -> Option<TaskHandle>
    where
        T: Serialize + ?Sized,
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let params = or_complete!(wrapped("donation", donation), completion);
        self.client
            .create("donations", &params, Some("donation"), completion)
    }

    /// Updates a donation.
    pub fn save<T, F>(&self, id: impl fmt::Display, donation: &T, completion: F) -> Option<TaskHandle>
    where
        T: Serialize + ?Sized,
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Donation id"), completion);
        let params = or_complete!(wrapped("donation", donation), completion);
        self.client
            .save(&format!("donations/{}", id), &params, Some("donation"), completion)
    }

    /// Deletes a donation.
    pub fn delete<F>(&self, id: impl fmt::Display, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Donation id"), completion);
        self.client
            .delete(&format!("donations/{}", id), &Params::new(), None, completion)
    }
}
