//! TestFlight resource shapes and the requests that read or change them
//!
//! Only the attributes the CLI prints are modeled; everything else in the
//! payload is ignored. All attributes are optional because the API omits
//! fields that are null for a given record.

use asc_client::ApiRequest;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// One JSON:API resource object. The `type` member is not kept.
#[derive(Debug, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    pub attributes: Option<A>,
}

/// One-line, human-readable description of a record.
pub trait Summary {
    fn summary(&self) -> String;
}

impl<A: Summary> Resource<A> {
    pub fn line(&self) -> String {
        match &self.attributes {
            Some(a) => format!("{}\t{}", self.id, a.summary()),
            None => self.id.clone(),
        }
    }
}

/// Decode a drained `data` array into typed resources.
pub fn decode_list<A: DeserializeOwned>(data: Value) -> asc_client::Result<Vec<Resource<A>>> {
    decode_items(data)
}

/// Decode a drained `data` array whose items are not plain resources
/// (usage metrics).
pub fn decode_items<T: DeserializeOwned>(data: Value) -> asc_client::Result<Vec<T>> {
    serde_json::from_value(data).map_err(|e| asc_client::Error::Decode(e.to_string()))
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub name: Option<String>,
    pub bundle_id: Option<String>,
}

impl Summary for App {
    fn summary(&self) -> String {
        format!("{}\t{}", or_dash(&self.name), or_dash(&self.bundle_id))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub version: Option<String>,
    pub uploaded_date: Option<String>,
    #[serde(default)]
    pub expired: bool,
    pub processing_state: Option<String>,
}

impl Summary for Build {
    fn summary(&self) -> String {
        let state = if self.expired {
            "EXPIRED"
        } else {
            or_dash(&self.processing_state)
        };
        format!(
            "{}\t{}\t{}",
            or_dash(&self.version),
            state,
            or_dash(&self.uploaded_date)
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetaGroup {
    pub name: Option<String>,
    #[serde(default)]
    pub is_internal_group: bool,
    #[serde(default)]
    pub public_link_enabled: bool,
    pub public_link: Option<String>,
}

impl Summary for BetaGroup {
    fn summary(&self) -> String {
        let kind = if self.is_internal_group {
            "internal"
        } else {
            "external"
        };
        let link = if self.public_link_enabled {
            or_dash(&self.public_link)
        } else {
            "-"
        };
        format!("{}\t{kind}\t{link}", or_dash(&self.name))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetaTester {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub state: Option<String>,
}

impl Summary for BetaTester {
    fn summary(&self) -> String {
        let name = full_name(&self.first_name, &self.last_name);
        format!("{name}\t{}\t{}", or_dash(&self.email), or_dash(&self.state))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Summary for User {
    fn summary(&self) -> String {
        let name = full_name(&self.first_name, &self.last_name);
        format!(
            "{name}\t{}\t{}",
            or_dash(&self.username),
            self.roles.join(",")
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInvitation {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub expiration_date: Option<String>,
}

impl Summary for UserInvitation {
    fn summary(&self) -> String {
        let name = full_name(&self.first_name, &self.last_name);
        format!(
            "{name}\t{}\texpires {}",
            or_dash(&self.email),
            or_dash(&self.expiration_date)
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetaBuildLocalization {
    pub locale: Option<String>,
    pub whats_new: Option<String>,
}

impl Summary for BetaBuildLocalization {
    fn summary(&self) -> String {
        let notes = self
            .whats_new
            .as_deref()
            .map(|text| text.replace('\n', " "))
            .unwrap_or_else(|| "-".to_string());
        format!("{}\t{notes}", or_dash(&self.locale))
    }
}

/// Counters of one usage data point. Absent counters read as zero.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageValues {
    pub install_count: u64,
    pub session_count: u64,
    pub crash_count: u64,
    pub feedback_count: u64,
    pub invite_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct UsageDataPoint {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub values: UsageValues,
}

/// One item of `/builds/{id}/metrics/betaBuildUsages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildUsage {
    #[serde(default)]
    pub data_points: Vec<UsageDataPoint>,
}

/// One item of `/betaGroups/{id}/metrics/betaTesterUsages?groupBy=betaTesters`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TesterUsage {
    #[serde(default)]
    pub data_points: Vec<UsageDataPoint>,
    pub dimensions: TesterDimension,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TesterDimension {
    pub beta_testers: Linkage,
}

#[derive(Debug, Deserialize)]
pub struct Linkage {
    pub data: LinkedId,
}

#[derive(Debug, Deserialize)]
pub struct LinkedId {
    pub id: String,
}

impl UsageDataPoint {
    pub fn line(&self) -> String {
        let v = &self.values;
        format!(
            "{}\t{}\tinstalls {}\tsessions {}\tcrashes {}\tfeedback {}\tinvites {}",
            or_dash(&self.start),
            or_dash(&self.end),
            v.install_count,
            v.session_count,
            v.crash_count,
            v.feedback_count,
            v.invite_count
        )
    }
}

impl TesterUsage {
    /// Tester id with the counters of the first (current) data point.
    pub fn line(&self) -> String {
        let id = &self.dimensions.beta_testers.data.id;
        match self.data_points.first() {
            Some(point) => format!(
                "{id}\tsessions {}\tcrashes {}\tfeedback {}",
                point.values.session_count, point.values.crash_count, point.values.feedback_count
            ),
            None => id.clone(),
        }
    }
}

fn full_name(first: &Option<String>, last: &Option<String>) -> String {
    match (first.as_deref(), last.as_deref()) {
        (Some(f), Some(l)) => format!("{f} {l}"),
        (Some(n), None) | (None, Some(n)) => n.to_string(),
        (None, None) => "-".to_string(),
    }
}

/// Percent-encode a value placed in a query string.
fn query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn build_linkage(build_ids: &[&str]) -> Value {
    let data: Vec<Value> = build_ids
        .iter()
        .map(|id| json!({"type": "builds", "id": id}))
        .collect();
    json!({ "data": data })
}

// --- Reads ---

pub fn list_apps() -> ApiRequest {
    ApiRequest::get("/apps")
}

/// Builds for an app, newest upload first.
pub fn list_builds(app_id: &str) -> ApiRequest {
    ApiRequest::get(format!(
        "/builds?filter[app]={}&sort=-uploadedDate",
        query_value(app_id)
    ))
}

pub fn list_beta_groups(app_id: &str) -> ApiRequest {
    ApiRequest::get(format!("/betaGroups?filter[app]={}", query_value(app_id)))
}

pub fn list_beta_testers(group_id: &str) -> ApiRequest {
    ApiRequest::get(format!(
        "/betaTesters?filter[betaGroups]={}",
        query_value(group_id)
    ))
}

pub fn list_users() -> ApiRequest {
    ApiRequest::get("/users")
}

pub fn list_user_invitations() -> ApiRequest {
    ApiRequest::get("/userInvitations")
}

/// "What to Test" notes of a build, one per locale.
pub fn list_beta_build_localizations(build_id: &str) -> ApiRequest {
    ApiRequest::get(format!(
        "/builds/{build_id}/betaBuildLocalizations?fields[betaBuildLocalizations]=locale,whatsNew"
    ))
}

pub fn build_usage(build_id: &str) -> ApiRequest {
    ApiRequest::get(format!("/builds/{build_id}/metrics/betaBuildUsages"))
}

pub fn tester_usage(group_id: &str) -> ApiRequest {
    ApiRequest::get(format!(
        "/betaGroups/{group_id}/metrics/betaTesterUsages?groupBy=betaTesters"
    ))
}

/// Cheapest authenticated call; used to check freshly stored credentials.
pub fn sign_in_check() -> ApiRequest {
    ApiRequest::get("/apps?limit=1")
}

// --- Mutations ---

/// Expire a build so testers can no longer install it.
pub fn expire_build(build_id: &str) -> ApiRequest {
    ApiRequest::patch(
        format!("/builds/{build_id}"),
        json!({
            "data": {
                "type": "builds",
                "id": build_id,
                "attributes": {"expired": true}
            }
        }),
    )
}

/// Answer the export compliance question for a build.
pub fn set_export_compliance(build_id: &str, uses_non_exempt_encryption: bool) -> ApiRequest {
    ApiRequest::patch(
        format!("/builds/{build_id}"),
        json!({
            "data": {
                "type": "builds",
                "id": build_id,
                "attributes": {"usesNonExemptEncryption": uses_non_exempt_encryption}
            }
        }),
    )
}

pub fn update_whats_new(localization_id: &str, whats_new: &str) -> ApiRequest {
    ApiRequest::patch(
        format!("/betaBuildLocalizations/{localization_id}"),
        json!({
            "data": {
                "type": "betaBuildLocalizations",
                "id": localization_id,
                "attributes": {"whatsNew": whats_new}
            }
        }),
    )
}

pub fn add_builds_to_group(group_id: &str, build_ids: &[&str]) -> ApiRequest {
    ApiRequest::post(
        format!("/betaGroups/{group_id}/relationships/builds"),
        build_linkage(build_ids),
    )
}

pub fn remove_build_from_group(build_id: &str, group_id: &str) -> ApiRequest {
    ApiRequest::delete(format!("/betaGroups/{group_id}/relationships/builds"))
        .with_body(build_linkage(&[build_id]))
}

pub fn add_build_to_group(build_id: &str, group_id: &str) -> ApiRequest {
    ApiRequest::post(
        format!("/builds/{build_id}/relationships/betaGroups"),
        json!({"data": [{"type": "betaGroups", "id": group_id}]}),
    )
}

pub fn remove_tester_from_group(tester_id: &str, group_id: &str) -> ApiRequest {
    ApiRequest::delete(format!("/betaTesters/{tester_id}/relationships/betaGroups"))
        .with_body(json!({"data": [{"type": "betaGroups", "id": group_id}]}))
}

pub fn submit_for_beta_review(build_id: &str) -> ApiRequest {
    ApiRequest::post(
        "/betaAppReviewSubmissions",
        json!({
            "data": {
                "type": "betaAppReviewSubmissions",
                "relationships": {
                    "build": {"data": {"type": "builds", "id": build_id}}
                }
            }
        }),
    )
}

pub fn delete_beta_group(group_id: &str) -> ApiRequest {
    ApiRequest::delete(format!("/betaGroups/{group_id}"))
}

pub fn delete_user(user_id: &str) -> ApiRequest {
    ApiRequest::delete(format!("/users/{user_id}"))
}

pub fn cancel_user_invitation(invitation_id: &str) -> ApiRequest {
    ApiRequest::delete(format!("/userInvitations/{invitation_id}"))
}
