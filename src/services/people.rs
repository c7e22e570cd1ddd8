//! People operations.

use super::{identifier, segment, wrapped};
use crate::client::{NationBuilderClient, ResourceList};
use crate::errors::{NationBuilderError, NationBuilderResult};
use crate::pagination::PaginationInfo;
use crate::query::{Params, LIST_SEPARATOR};
use crate::task::TaskHandle;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Location filter for [`PeopleService::nearby`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Radius in miles.
    pub distance: Option<u32>,
}

impl NearbyQuery {
    fn to_params(self) -> Params {
        let mut params = Params::new();
        params.insert(
            "location".into(),
            Value::String(format!("{},{}", self.latitude, self.longitude)),
        );
        if let Some(distance) = self.distance {
            params.insert("distance".into(), distance.into());
        }
        params
    }
}

fn tag_name(tag: &str) -> NationBuilderResult<String> {
    let tag = segment(tag, "Tag")?;
    if tag.contains(LIST_SEPARATOR) {
        return Err(NationBuilderError::invalid_argument(format!(
            "Tag '{}' cannot contain '{}'",
            tag, LIST_SEPARATOR
        )));
    }
    Ok(tag)
}

fn tag_names(tags: &[&str]) -> NationBuilderResult<Vec<String>> {
    if tags.is_empty() {
        return Err(NationBuilderError::invalid_argument("At least one tag is required"));
    }
    tags.iter().map(|tag| tag_name(tag)).collect()
}

/// Service for people operations.
pub struct PeopleService<'a> {
    client: &'a NationBuilderClient,
}

impl<'a> PeopleService<'a> {
    /// Creates a new people service.
    pub fn new(client: &'a NationBuilderClient) -> Self {
        Self { client }
    }

    /// Lists people.
    pub fn list<F>(&self, pagination: Option<&PaginationInfo>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.client
            .fetch_list("people", &Params::new(), None, pagination, completion)
    }

    /// Counts people. The item is the `people_count` number.
    pub fn count<F>(&self, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        self.client
            .fetch_item("people/count", &Params::new(), Some("people_count"), completion)
    }

    /// Gets a person.
    pub fn show<F>(&self, id: impl fmt::Display, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        self.client.fetch_item(
            &format!("people/{}", id),
            &Params::new(),
            Some("person"),
            completion,
        )
    }

    /// Searches people by attributes such as `first_name` or `city`.
    pub fn search<F>(
        &self,
        filters: &Params,
        pagination: Option<&PaginationInfo>,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.client
            .fetch_list("people/search", filters, None, pagination, completion)
    }

    /// Lists people near a location.
    pub fn nearby<F>(
        &self,
        query: NearbyQuery,
        pagination: Option<&PaginationInfo>,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.client
            .fetch_list("people/nearby", &query.to_params(), None, pagination, completion)
    }

    /// Gets the person the access token belongs to.
    pub fn me<F>(&self, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        self.client
            .fetch_item("people/me", &Params::new(), Some("person"), completion)
    }

    /// Sends a person the nation's registration email.
    pub fn register<F>(&self, id: impl fmt::Display, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        self.client.fetch_item(
            &format!("people/{}/register", id),
            &Params::new(),
            Some("status"),
            completion,
        )
    }

    /// Finds the single person matching `criteria`, e.g. `email`.
    pub fn match_person<F>(&self, criteria: &Params, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        self.client
            .fetch_item("people/match", criteria, Some("person"), completion)
    }

    /// Creates a person.
    pub fn create<T, F>(&self, person: &T, completion: F) -> Option<TaskHandle>
    where
        T: Serialize + ?Sized,
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let params = or_complete!(wrapped("person", person), completion);
        self.client.create("people", &params, Some("person"), completion)
    }

    /// Updates a person.
    pub fn save<T, F>(&self, id: impl fmt::Display, person: &T, completion: F) -> Option<TaskHandle>
    where
        T: Serialize + ?Sized,
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        let params = or_complete!(wrapped("person", person), completion);
        self.client
            .save(&format!("people/{}", id), &params, Some("person"), completion)
    }

    /// Deletes a person.
    pub fn delete<F>(&self, id: impl fmt::Display, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        self.client
            .delete(&format!("people/{}", id), &Params::new(), None, completion)
    }

    // Taggings

    /// Lists a person's taggings.
    pub fn taggings<F>(&self, id: impl fmt::Display, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        self.client.fetch_list(
            &format!("people/{}/taggings", id),
            &Params::new(),
            Some("taggings"),
            None,
            completion,
        )
    }

    /// Tags a person. The item is the new tagging.
    pub fn add_tag<F>(&self, id: impl fmt::Display, tag: &str, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        let tag = or_complete!(tag_name(tag), completion);
        let params = or_complete!(wrapped("tagging", &serde_json::json!({ "tag": tag })), completion);
        self.client.save(
            &format!("people/{}/taggings", id),
            &params,
            Some("tagging"),
            completion,
        )
    }

    /// Tags a person with several tags at once. The list holds every resulting tagging.
    pub fn add_tags<F>(&self, id: impl fmt::Display, tags: &[&str], completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        let tags = or_complete!(tag_names(tags), completion);
        let params = or_complete!(wrapped("tagging", &serde_json::json!({ "tag": tags })), completion);
        self.client.save_list(
            &format!("people/{}/taggings", id),
            &params,
            Some("taggings"),
            completion,
        )
    }

    /// Removes a tag from a person.
    pub fn remove_tag<F>(&self, id: impl fmt::Display, tag: &str, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        self.remove_tags(id, &[tag], completion)
    }

    /// Removes several tags from a person in one request.
    pub fn remove_tags<F>(&self, id: impl fmt::Display, tags: &[&str], completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        let tags = or_complete!(tag_names(tags), completion);
        self.client.delete(
            &format!("people/{}/taggings/{}", id, tags.join(LIST_SEPARATOR)),
            &Params::new(),
            None,
            completion,
        )
    }

    // Capitals

    /// Lists a person's capital entries.
    pub fn capitals<F>(
        &self,
        id: impl fmt::Display,
        pagination: Option<&PaginationInfo>,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        self.client.fetch_list(
            &format!("people/{}/capitals", id),
            &Params::new(),
            None,
            pagination,
            completion,
        )
    }

    /// Adds a capital entry to a person.
    pub fn create_capital<T, F>(&self, id: impl fmt::Display, capital: &T, completion: F) -> Option<TaskHandle>
    where
        T: Serialize + ?Sized,
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        let params = or_complete!(wrapped("capital", capital), completion);
        self.client.create(
            &format!("people/{}/capitals", id),
            &params,
            Some("capital"),
            completion,
        )
    }

    /// Deletes a capital entry.
    pub fn delete_capital<F>(
        &self,
        id: impl fmt::Display,
        capital_id: impl fmt::Display,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        let capital_id = or_complete!(identifier(capital_id, "Capital id"), completion);
        self.client.delete(
            &format!("people/{}/capitals/{}", id, capital_id),
            &Params::new(),
            None,
            completion,
        )
    }

    /// Adds a private note to a person.
    pub fn create_private_note<F>(&self, id: impl fmt::Display, content: &str, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let id = or_complete!(identifier(id, "Person id"), completion);
        let params = or_complete!(
            wrapped("note", &serde_json::json!({ "content": content })),
            completion
        );
        self.client
            .create(&format!("people/{}/notes", id), &params, Some("note"), completion)
    }
}
