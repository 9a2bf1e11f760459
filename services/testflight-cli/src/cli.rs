//! Command-line surface

use std::path::PathBuf;

use asc_client::Method;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "testflight",
    version,
    about = "Manage TestFlight builds, groups and testers through App Store Connect"
)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Write request metrics in Prometheus text format to this file on exit
    #[arg(long, global = true)]
    pub metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store an API key and check it against App Store Connect
    SignIn {
        #[arg(long)]
        key_id: String,
        #[arg(long)]
        issuer_id: String,
        /// The .p8 private key downloaded from App Store Connect
        #[arg(long)]
        key_file: PathBuf,
    },
    /// Forget the stored API key
    SignOut,
    /// List apps
    Apps,
    /// List builds for an app, newest first
    Builds {
        #[arg(value_parser = resource_id)]
        app_id: String,
    },
    /// List beta groups for an app
    BetaGroups {
        #[arg(value_parser = resource_id)]
        app_id: String,
    },
    /// List testers in a beta group
    Testers {
        #[arg(value_parser = resource_id)]
        group_id: String,
    },
    /// List team members
    Users,
    /// List pending user invitations
    Invitations,
    /// Show install, session and crash counts for a build
    BuildUsage {
        #[arg(value_parser = resource_id)]
        build_id: String,
    },
    /// Show per-tester session, crash and feedback counts for a beta group
    TesterUsage {
        #[arg(value_parser = resource_id)]
        group_id: String,
    },
    /// Show the "What to Test" notes of a build
    WhatToTest {
        #[arg(value_parser = resource_id)]
        build_id: String,
    },
    /// Replace the "What to Test" notes of a build
    SetWhatToTest {
        #[arg(value_parser = resource_id)]
        build_id: String,
        text: String,
        /// Localization to edit; defaults to the first one
        #[arg(long)]
        locale: Option<String>,
    },
    /// Answer the export compliance question for a build
    SetExportCompliance {
        #[arg(value_parser = resource_id)]
        build_id: String,
        #[arg(long, required = true, action = ArgAction::Set)]
        uses_non_exempt_encryption: bool,
    },
    /// Expire a build
    ExpireBuild {
        #[arg(value_parser = resource_id)]
        build_id: String,
    },
    /// Make a build available to a beta group
    AddBuildToGroup {
        #[arg(value_parser = resource_id)]
        build_id: String,
        #[arg(value_parser = resource_id)]
        group_id: String,
    },
    /// Add one or more builds to a beta group
    AddBuildsToGroup {
        #[arg(value_parser = resource_id)]
        group_id: String,
        #[arg(required = true, value_parser = resource_id)]
        build_ids: Vec<String>,
    },
    /// Take a build away from a beta group
    RemoveBuildFromGroup {
        #[arg(value_parser = resource_id)]
        build_id: String,
        #[arg(value_parser = resource_id)]
        group_id: String,
    },
    /// Remove a tester from a beta group
    RemoveTester {
        #[arg(value_parser = resource_id)]
        tester_id: String,
        #[arg(value_parser = resource_id)]
        group_id: String,
    },
    /// Submit a build for beta app review
    SubmitBetaReview {
        #[arg(value_parser = resource_id)]
        build_id: String,
    },
    /// Delete a beta group
    DeleteBetaGroup {
        #[arg(value_parser = resource_id)]
        group_id: String,
    },
    /// Remove a user from the team
    DeleteUser {
        #[arg(value_parser = resource_id)]
        user_id: String,
    },
    /// Cancel a pending user invitation
    CancelInvitation {
        #[arg(value_parser = resource_id)]
        invitation_id: String,
    },
    /// Send an arbitrary request and print the JSON response
    Request {
        method: Method,
        path: String,
        /// JSON request body (ignored for GET)
        #[arg(long)]
        body: Option<String>,
        /// Follow next links and print every page's data as one array
        #[arg(long)]
        all: bool,
    },
}

/// Resource ids end up in URL paths and query strings; refuse anything that
/// would change the request's shape.
fn resource_id(value: &str) -> Result<String, String> {
    let reserved = |c: char| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '&' | '=' | '%');
    if value.is_empty() || value.contains(reserved) {
        return Err(format!("invalid resource id {value:?}"));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sign_in() {
        let cli = Cli::try_parse_from([
            "testflight",
            "sign-in",
            "--key-id",
            "AK1",
            "--issuer-id",
            "IS1",
            "--key-file",
            "AuthKey_AK1.p8",
        ])
        .unwrap();
        match cli.command {
            Command::SignIn {
                key_id,
                issuer_id,
                key_file,
            } => {
                assert_eq!(key_id, "AK1");
                assert_eq!(issuer_id, "IS1");
                assert_eq!(key_file, PathBuf::from("AuthKey_AK1.p8"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_request_method_case_insensitively() {
        let cli = Cli::try_parse_from([
            "testflight",
            "request",
            "patch",
            "/builds/b1",
            "--body",
            "{}",
            "--json-logs",
        ])
        .unwrap();
        assert!(cli.json_logs);
        match cli.command {
            Command::Request {
                method, path, all, ..
            } => {
                assert_eq!(method, Method::Patch);
                assert_eq!(path, "/builds/b1");
                assert!(!all);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_ids_that_would_reshape_the_url() {
        for bad in ["123&sort=name", "g1/../users", "b1?x", "a b", ""] {
            assert!(
                Cli::try_parse_from(["testflight", "builds", bad]).is_err(),
                "accepted {bad:?}"
            );
        }
        assert!(Cli::try_parse_from(["testflight", "builds", "1234567890"]).is_ok());
        assert!(
            Cli::try_parse_from([
                "testflight",
                "remove-tester",
                "5f0c1e0a-7d2b-4f7e-9a51-3c2d1b0e9f11",
                "g1"
            ])
            .is_ok()
        );
    }

    #[test]
    fn export_compliance_takes_explicit_value() {
        let cli = Cli::try_parse_from([
            "testflight",
            "set-export-compliance",
            "b1",
            "--uses-non-exempt-encryption",
            "false",
        ])
        .unwrap();
        match cli.command {
            Command::SetExportCompliance {
                build_id,
                uses_non_exempt_encryption,
            } => {
                assert_eq!(build_id, "b1");
                assert!(!uses_non_exempt_encryption);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(
            Cli::try_parse_from(["testflight", "set-export-compliance", "b1"]).is_err()
        );
    }

    #[test]
    fn add_builds_to_group_needs_a_build() {
        assert!(Cli::try_parse_from(["testflight", "add-builds-to-group", "g1"]).is_err());
        let cli =
            Cli::try_parse_from(["testflight", "add-builds-to-group", "g1", "b1", "b2"]).unwrap();
        match cli.command {
            Command::AddBuildsToGroup {
                group_id,
                build_ids,
            } => {
                assert_eq!(group_id, "g1");
                assert_eq!(build_ids, vec!["b1", "b2"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn metrics_file_is_opt_in() {
        let cli = Cli::try_parse_from(["testflight", "apps"]).unwrap();
        assert!(cli.metrics_file.is_none());

        let cli =
            Cli::try_parse_from(["testflight", "apps", "--metrics-file", "/tmp/asc.prom"]).unwrap();
        assert_eq!(cli.metrics_file, Some(PathBuf::from("/tmp/asc.prom")));
    }

    #[test]
    fn rejects_unknown_method() {
        assert!(Cli::try_parse_from(["testflight", "request", "TRACE", "/apps"]).is_err());
    }
}
