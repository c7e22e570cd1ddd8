//! Survey operations.

use super::{identifier, segment, wrapped};
use crate::client::{NationBuilderClient, ResourceList};
use crate::errors::NationBuilderResult;
use crate::pagination::PaginationInfo;
use crate::query::Params;
use crate::task::TaskHandle;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Service for survey operations. Surveys are pages of a site.
pub struct SurveysService<'a> {
    client: &'a NationBuilderClient,
}

impl<'a> SurveysService<'a> {
    /// Creates a new surveys service.
    pub fn new(client: &'a NationBuilderClient) -> Self {
        Self { client }
    }

    /// Lists the surveys of a site.
    pub fn list<F>(&self, site_slug: &str, pagination: Option<&PaginationInfo>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        let site_slug = or_complete!(segment(site_slug, "Site slug"), completion);
        self.client.fetch_list(
            &format!("sites/{}/pages/surveys", site_slug),
            &Params::new(),
            None,
            pagination,
            completion,
        )
    }

    /// Creates a survey.
    pub fn create<T, F>(&self, site_slug: &str, survey: &T, completion: F) -> Option<TaskHandle>
    where
        T: Serialize + ?Sized,
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let site_slug = or_complete!(segment(site_slug, "Site slug"), completion);
        let params = or_complete!(wrapped("survey", survey), completion);
        self.client.create(
            &format!("sites/{}/pages/surveys", site_slug),
            &params,
            Some("survey"),
            completion,
        )
    }

    /// Updates a survey.
    pub fn save<T, F>(&self, site_slug: &str, id: impl fmt::Display, survey: &T, completion: F) -> Option<TaskHandle>
    where
        T: Serialize + ?Sized,
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let site_slug = or_complete!(segment(site_slug, "Site slug"), completion);
        let id = or_complete!(identifier(id, "Survey id"), completion);
        let params = or_complete!(wrapped("survey", survey), completion);
        self.client.save(
            &format!("sites/{}/pages/surveys/{}", site_slug, id),
            &params,
            Some("survey"),
            completion,
        )
    }

    /// Deletes a survey.
    pub fn delete<F>(&self, site_slug: &str, id: impl fmt::Display, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let site_slug = or_complete!(segment(site_slug, "Site slug"), completion);
        let id = or_complete!(identifier(id, "Survey id"), completion);
        self.client.delete(
            &format!("sites/{}/pages/surveys/{}", site_slug, id),
            &Params::new(),
            None,
            completion,
        )
    }

    /// Lists the responses to a survey.
    pub fn responses<F>(
        &self,
        survey_id: impl fmt::Display,
        pagination: Option<&PaginationInfo>,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        let survey_id = or_complete!(identifier(survey_id, "Survey id"), completion);
        let mut params = Params::new();
        params.insert("survey_id".into(), Value::String(survey_id));
        self.client
            .fetch_list("survey_responses", &params, None, pagination, completion)
    }

    /// Records a survey response.
    pub fn create_response<T, F>(&self, response: &T, completion: F) -> Option<TaskHandle>
    where
        T: Serialize + ?Sized,
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        let params = or_complete!(wrapped("survey_response", response), completion);
        self.client
            .create("survey_responses", &params, Some("survey_response"), completion)
    }
}
