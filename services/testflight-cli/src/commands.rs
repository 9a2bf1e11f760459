//! Command execution
//!
//! Every command goes through one `ApiClient`; output goes to the given
//! writer so tests can capture it.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use asc_auth::{Credentials, encode_private_key_file};
use asc_client::{ApiClient, ApiRequest, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::Command;
use crate::error::{Error, signed_in};
use crate::resources::{self, Resource, Summary};

pub async fn execute<W: Write>(client: &ApiClient, command: Command, out: &mut W) -> Result<()> {
    match command {
        Command::SignIn {
            key_id,
            issuer_id,
            key_file,
        } => sign_in(client, key_id, issuer_id, &key_file, out).await,
        Command::SignOut => {
            client
                .credential_store()
                .clear()
                .await
                .context("failed to clear stored credentials")?;
            writeln!(out, "Signed out")?;
            Ok(())
        }
        Command::Apps => list::<resources::App, W>(client, resources::list_apps(), out).await,
        Command::Builds { app_id } => {
            list::<resources::Build, W>(client, resources::list_builds(&app_id), out).await
        }
        Command::BetaGroups { app_id } => {
            list::<resources::BetaGroup, W>(client, resources::list_beta_groups(&app_id), out)
                .await
        }
        Command::Testers { group_id } => {
            list::<resources::BetaTester, W>(client, resources::list_beta_testers(&group_id), out)
                .await
        }
        Command::Users => list::<resources::User, W>(client, resources::list_users(), out).await,
        Command::Invitations => {
            list::<resources::UserInvitation, W>(client, resources::list_user_invitations(), out)
                .await
        }
        Command::BuildUsage { build_id } => build_usage(client, &build_id, out).await,
        Command::TesterUsage { group_id } => tester_usage(client, &group_id, out).await,
        Command::WhatToTest { build_id } => {
            let request = resources::list_beta_build_localizations(&build_id);
            list::<resources::BetaBuildLocalization, W>(client, request, out).await
        }
        Command::SetWhatToTest {
            build_id,
            text,
            locale,
        } => set_what_to_test(client, build_id, &text, locale, out).await,
        Command::SetExportCompliance {
            build_id,
            uses_non_exempt_encryption,
        } => {
            let request =
                resources::set_export_compliance(&build_id, uses_non_exempt_encryption);
            mutate(client, request, out, "Export compliance set").await
        }
        Command::ExpireBuild { build_id } => {
            mutate(client, resources::expire_build(&build_id), out, "Build expired").await
        }
        Command::AddBuildToGroup { build_id, group_id } => {
            let request = resources::add_build_to_group(&build_id, &group_id);
            mutate(client, request, out, "Build added to group").await
        }
        Command::AddBuildsToGroup {
            group_id,
            build_ids,
        } => {
            let ids: Vec<&str> = build_ids.iter().map(String::as_str).collect();
            let request = resources::add_builds_to_group(&group_id, &ids);
            mutate(client, request, out, "Builds added to group").await
        }
        Command::RemoveBuildFromGroup { build_id, group_id } => {
            let request = resources::remove_build_from_group(&build_id, &group_id);
            mutate(client, request, out, "Build removed from group").await
        }
        Command::RemoveTester {
            tester_id,
            group_id,
        } => {
            let request = resources::remove_tester_from_group(&tester_id, &group_id);
            mutate(client, request, out, "Tester removed from group").await
        }
        Command::SubmitBetaReview { build_id } => {
            let request = resources::submit_for_beta_review(&build_id);
            mutate(client, request, out, "Submitted for beta review").await
        }
        Command::DeleteBetaGroup { group_id } => {
            let request = resources::delete_beta_group(&group_id);
            mutate(client, request, out, "Beta group deleted").await
        }
        Command::DeleteUser { user_id } => {
            mutate(client, resources::delete_user(&user_id), out, "User removed").await
        }
        Command::CancelInvitation { invitation_id } => {
            let request = resources::cancel_user_invitation(&invitation_id);
            mutate(client, request, out, "Invitation cancelled").await
        }
        Command::Request {
            method,
            path,
            body,
            all,
        } => raw_request(client, method, path, body, all, out).await,
    }
}

/// Store the key, then prove it works. A rejected key is wiped again so a
/// bad sign-in never leaves the store half signed in.
async fn sign_in<W: Write>(
    client: &ApiClient,
    key_id: String,
    issuer_id: String,
    key_file: &Path,
    out: &mut W,
) -> Result<()> {
    let private_key = encode_private_key_file(key_file)
        .await
        .with_context(|| format!("failed to read private key from {}", key_file.display()))?;

    let store = client.credential_store();
    store
        .set(Credentials::new(key_id.clone(), issuer_id, private_key))
        .await
        .context("failed to store credentials")?;

    let verified = match client.send(&resources::sign_in_check()).await {
        Ok(response) => response.decode::<AppsPage>().map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = verified {
        warn!(error = %e, "sign-in verification failed");
        store
            .clear()
            .await
            .context("failed to clear rejected credentials")?;
        return Err(Error::SignInRejected(e).into());
    }

    info!(key_id = %key_id, "signed in");
    writeln!(out, "Signed in with key {key_id}")?;
    Ok(())
}

#[derive(serde::Deserialize)]
struct AppsPage {
    #[allow(dead_code)]
    data: Vec<Value>,
}

async fn list<A, W>(client: &ApiClient, request: ApiRequest, out: &mut W) -> Result<()>
where
    A: DeserializeOwned + Summary,
    W: Write,
{
    let data = client.drain_all(request).await.map_err(signed_in)?;
    let items: Vec<Resource<A>> = resources::decode_list(data)?;
    for item in &items {
        writeln!(out, "{}", item.line())?;
    }
    info!(count = items.len(), "listed resources");
    Ok(())
}

async fn build_usage<W: Write>(client: &ApiClient, build_id: &str, out: &mut W) -> Result<()> {
    let data = client
        .drain_all(resources::build_usage(build_id))
        .await
        .map_err(signed_in)?;
    let usages: Vec<resources::BuildUsage> = resources::decode_items(data)?;
    for point in usages.iter().flat_map(|usage| &usage.data_points) {
        writeln!(out, "{}", point.line())?;
    }
    Ok(())
}

async fn tester_usage<W: Write>(client: &ApiClient, group_id: &str, out: &mut W) -> Result<()> {
    let data = client
        .drain_all(resources::tester_usage(group_id))
        .await
        .map_err(signed_in)?;
    let usages: Vec<resources::TesterUsage> = resources::decode_items(data)?;
    for usage in &usages {
        writeln!(out, "{}", usage.line())?;
    }
    Ok(())
}

/// Edit one localization's notes. Unchanged text sends nothing.
async fn set_what_to_test<W: Write>(
    client: &ApiClient,
    build_id: String,
    text: &str,
    locale: Option<String>,
    out: &mut W,
) -> Result<()> {
    let data = client
        .drain_all(resources::list_beta_build_localizations(&build_id))
        .await
        .map_err(signed_in)?;
    let localizations: Vec<Resource<resources::BetaBuildLocalization>> =
        resources::decode_list(data)?;

    let target = localizations.iter().find(|l| match &locale {
        Some(wanted) => l
            .attributes
            .as_ref()
            .and_then(|a| a.locale.as_deref())
            .is_some_and(|have| have == wanted),
        None => true,
    });
    let Some(target) = target else {
        return Err(Error::NoLocalization { build_id, locale }.into());
    };

    let current = target.attributes.as_ref().and_then(|a| a.whats_new.as_deref());
    if current == Some(text) {
        writeln!(out, "What to Test unchanged")?;
        return Ok(());
    }

    let request = resources::update_whats_new(&target.id, text);
    mutate(client, request, out, "What to Test updated").await
}

async fn mutate<W: Write>(
    client: &ApiClient,
    request: ApiRequest,
    out: &mut W,
    done: &str,
) -> Result<()> {
    client.send(&request).await.map_err(signed_in)?;
    writeln!(out, "{done}")?;
    Ok(())
}

async fn raw_request<W: Write>(
    client: &ApiClient,
    method: Method,
    path: String,
    body: Option<String>,
    all: bool,
    out: &mut W,
) -> Result<()> {
    let mut request = ApiRequest::new(method, path);
    if let Some(raw) = body {
        let value: Value =
            serde_json::from_str(&raw).map_err(|e| Error::InvalidBody(e.to_string()))?;
        request = request.with_body(value);
    }

    let value = if all {
        client.drain_all(request).await.map_err(signed_in)?
    } else {
        client.send(&request).await.map_err(signed_in)?.json()?
    };

    if !value.is_null() {
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    }
    Ok(())
}
