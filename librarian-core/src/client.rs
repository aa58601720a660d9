use std::time::SystemTime;

use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const FILE_FIELDS: &str = "id,name,mimeType,parents,modifiedTime";

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api {
        status: StatusCode,
        body: String,
        retry_after: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

/// Which corpus a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corpora {
    User,
    TeamDrive,
}

impl Corpora {
    pub fn as_str(&self) -> &'static str {
        match self {
            Corpora::User => "user",
            Corpora::TeamDrive => "teamDrive",
        }
    }
}

/// Addressing fields attached to list and update calls.
///
/// A team drive scope carries both `corpora=teamDrive` and the team drive id;
/// the default scope carries neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveScope {
    pub corpora: Option<Corpora>,
    pub team_drive_id: Option<String>,
}

impl DriveScope {
    pub fn team_drive(drive_id: impl Into<String>) -> Self {
        Self {
            corpora: Some(Corpora::TeamDrive),
            team_drive_id: Some(drive_id.into()),
        }
    }

    pub fn is_team_drive(&self) -> bool {
        self.team_drive_id.is_some()
    }
}

/// Parent linkage change for `files.update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentUpdate {
    pub file_id: String,
    pub add_parents: Vec<String>,
    pub remove_parents: Vec<String>,
    pub scope: DriveScope,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub async fn get_file(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint(&format!("/drive/v3/files/{file_id}"))?;
        url.query_pairs_mut()
            .append_pair("fields", FILE_FIELDS)
            .append_pair("supportsTeamDrives", "true");
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn list_children(
        &self,
        folder_id: &str,
        scope: &DriveScope,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        let mut url = self.endpoint("/drive/v3/files")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", &format!("'{folder_id}' in parents and trashed = false"))
                .append_pair("pageSize", &page_size.max(1).to_string())
                .append_pair("fields", &format!("nextPageToken,files({FILE_FIELDS})"));
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
            Self::append_scope(&mut query, scope);
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn list_children_all(
        &self,
        folder_id: &str,
        scope: &DriveScope,
        page_size: u32,
    ) -> Result<Vec<DriveFile>, DriveError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_children(folder_id, scope, page_size, page_token.as_deref())
                .await?;
            items.extend(page.files);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(items)
    }

    pub async fn update_parents(&self, update: &ParentUpdate) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint(&format!("/drive/v3/files/{}", update.file_id))?;
        {
            let mut query = url.query_pairs_mut();
            if !update.add_parents.is_empty() {
                query.append_pair("addParents", &update.add_parents.join(","));
            }
            if !update.remove_parents.is_empty() {
                query.append_pair("removeParents", &update.remove_parents.join(","));
            }
            query.append_pair("fields", FILE_FIELDS);
            Self::append_scope(&mut query, &update.scope);
        }
        let response = self
            .http
            .patch(url)
            .header("Authorization", self.auth_header_value())
            .header(CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn append_scope(
        query: &mut url::form_urlencoded::Serializer<'_, url::UrlQuery<'_>>,
        scope: &DriveScope,
    ) {
        query.append_pair("supportsTeamDrives", "true");
        if let Some(corpora) = scope.corpora {
            query.append_pair("corpora", corpora.as_str());
        }
        if let Some(team_drive_id) = &scope.team_drive_id {
            query
                .append_pair("teamDriveId", team_drive_id)
                .append_pair("includeTeamDriveItems", "true");
        }
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api {
                status,
                body,
                retry_after,
            })
        }
    }
}

impl DriveError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DriveError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            DriveError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if status == StatusCode::UNAUTHORIZED {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
        // Drive reports user rate limits as 403.
        ApiErrorClass::RateLimit
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

fn parse_retry_after(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    let at = httpdate::parse_http_date(value).ok()?;
    Some(
        at.duration_since(SystemTime::now())
            .map(|delta| delta.as_secs())
            .unwrap_or(0),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Folder,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

impl DriveFile {
    pub fn resource_type(&self) -> ResourceType {
        if self.mime_type == FOLDER_MIME_TYPE {
            ResourceType::Folder
        } else {
            ResourceType::File
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        assert_eq!(
            classify_api_status(StatusCode::UNAUTHORIZED),
            ApiErrorClass::Auth
        );
        assert_eq!(
            classify_api_status(StatusCode::FORBIDDEN),
            ApiErrorClass::RateLimit
        );
        assert_eq!(
            classify_api_status(StatusCode::BAD_GATEWAY),
            ApiErrorClass::Transient
        );
        assert_eq!(
            classify_api_status(StatusCode::NOT_FOUND),
            ApiErrorClass::Permanent
        );
    }

    #[test]
    fn parses_retry_after_seconds_and_past_dates() {
        assert_eq!(parse_retry_after(" 12 "), Some(12));
        assert_eq!(parse_retry_after("Sun, 06 Nov 1994 08:49:37 GMT"), Some(0));
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn team_drive_scope_sets_both_fields() {
        let scope = DriveScope::team_drive("drive-1");
        assert_eq!(scope.corpora, Some(Corpora::TeamDrive));
        assert_eq!(scope.team_drive_id.as_deref(), Some("drive-1"));
        assert!(!DriveScope::default().is_team_drive());
    }
}
