//! Phishing category, case, and image analysis endpoints.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use mung_core::{ImageAnalysis, PhishingCase, PhishingCaseId, PhishingCaseInput, PhishingCategory};

use super::{AccessToken, BackendClient, BackendError, extract_detail, timeouts};

/// Upper bound the case listing asks the backend for.
pub const CASE_LIST_LIMIT: u32 = 200;

#[derive(Serialize)]
struct AnalyzeImageRequest<'a> {
    image_base64: &'a str,
}

impl BackendClient {
    /// Phishing categories. This endpoint is public.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip_all)]
    pub async fn get_phishing_categories(&self) -> Result<Vec<PhishingCategory>, BackendError> {
        let request = self.request(Method::GET, "/phishing/categories", None, timeouts::SHORT);
        self.send_json(request).await
    }

    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip_all)]
    pub async fn get_all_phishing_cases(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<PhishingCase>, BackendError> {
        let request = self
            .request(Method::GET, "/phishing/cases", Some(token), timeouts::STANDARD)
            .query(&[("limit", CASE_LIST_LIMIT)]);
        self.send_json(request).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` if no case has this ID.
    #[instrument(skip(self, token))]
    pub async fn get_phishing_case_by_id(
        &self,
        token: &AccessToken,
        id: PhishingCaseId,
    ) -> Result<PhishingCase, BackendError> {
        let request = self.request(
            Method::GET,
            &format!("/phishing/cases/{id}"),
            Some(token),
            timeouts::SHORT,
        );
        self.send_json(request).await
    }

    /// # Errors
    ///
    /// Returns error with the backend's `detail` if the request fails.
    #[instrument(skip(self, token, input), fields(category = %input.category_code))]
    pub async fn create_phishing_case(
        &self,
        token: &AccessToken,
        input: &PhishingCaseInput,
    ) -> Result<PhishingCase, BackendError> {
        let request = self
            .request(
                Method::POST,
                "/admin/phishing-cases",
                Some(token),
                timeouts::STANDARD,
            )
            .json(input);
        self.send_json(request).await
    }

    /// Create a case from an arbitrary JSON object (backup restore).
    ///
    /// # Errors
    ///
    /// Returns error with the backend's `detail` if the request fails.
    #[instrument(skip_all)]
    pub async fn create_phishing_case_raw(
        &self,
        token: &AccessToken,
        case: &Value,
    ) -> Result<PhishingCase, BackendError> {
        let request = self
            .request(
                Method::POST,
                "/admin/phishing-cases",
                Some(token),
                timeouts::STANDARD,
            )
            .json(case);
        self.send_json(request).await
    }

    /// # Errors
    ///
    /// Returns error with the backend's `detail` if the request fails.
    #[instrument(skip(self, token, input))]
    pub async fn update_phishing_case(
        &self,
        token: &AccessToken,
        id: PhishingCaseId,
        input: &PhishingCaseInput,
    ) -> Result<PhishingCase, BackendError> {
        let request = self
            .request(
                Method::PUT,
                &format!("/admin/phishing-cases/{id}"),
                Some(token),
                timeouts::STANDARD,
            )
            .json(input);
        self.send_json(request).await
    }

    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn delete_phishing_case(
        &self,
        token: &AccessToken,
        id: PhishingCaseId,
    ) -> Result<(), BackendError> {
        let request = self.request(
            Method::DELETE,
            &format!("/admin/phishing-cases/{id}"),
            Some(token),
            timeouts::STANDARD,
        );
        self.send_unit(request).await
    }

    /// Score an image for phishing risk.
    ///
    /// A success body without `phishing_score` is reported as an error
    /// carrying whatever `detail` the backend sent.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or no score was returned.
    #[instrument(skip_all, fields(size = image_base64.len()))]
    pub async fn analyze_image_for_phishing(
        &self,
        token: &AccessToken,
        image_base64: &str,
    ) -> Result<ImageAnalysis, BackendError> {
        let request = self
            .request(
                Method::POST,
                "/phishing/analyze-image",
                Some(token),
                timeouts::ANALYSIS,
            )
            .json(&AnalyzeImageRequest { image_base64 });

        let body: Value = self.send_json(request).await?;
        if body.get("phishing_score").is_some_and(Value::is_number) {
            return serde_json::from_value(body)
                .map_err(|e| BackendError::Parse(format!("Failed to parse analysis: {e}")));
        }

        let detail = body
            .get("detail")
            .and_then(|_| extract_detail(&body.to_string()))
            .unwrap_or_else(|| "no score was returned".to_string());
        Err(BackendError::Api {
            status: 200,
            detail,
        })
    }
}
