//! Command execution.

use crate::cli::{Command, PeopleCommand, WorldCommand};
use admin_console_client::people::{NewPerson, PeopleQuery, PersonUpdate};
use admin_console_client::{
    ClientError, CredentialStore, LoginOutcome, SessionClient, TwoFactorChallenge,
};
use anyhow::{Context, anyhow};
use serde_json::{Value, json};
use std::io::{BufRead, Write};

/// Run `command`, returning what should be printed.
///
/// # Errors
///
/// Returns the failure formatted for display.
pub async fn run<S: CredentialStore>(
    client: &SessionClient<S>,
    command: Command,
) -> anyhow::Result<Value> {
    match command {
        Command::Login {
            email,
            password,
            code,
        } => login(client, &email, &password, code).await,
        Command::Logout => to_json(client.logout().await.map_err(describe)?),
        Command::Me => to_json(client.me().await.map_err(describe)?),
        Command::Refresh => {
            client.refresh_session().await.map_err(describe)?;
            let session = client.session().await;
            Ok(json!({ "refreshed": true, "expires_at": session.expires_at() }))
        }
        Command::Register {
            name,
            email,
            password,
        } => to_json(
            client
                .register(&name, &email, &password)
                .await
                .map_err(describe)?,
        ),
        Command::People(command) => people(client, command).await,
        Command::World(command) => world(client, command).await,
        Command::Dashboard => client.dashboard_overview().await.map_err(describe),
    }
}

async fn login<S: CredentialStore>(
    client: &SessionClient<S>,
    email: &str,
    password: &str,
    code: Option<String>,
) -> anyhow::Result<Value> {
    let user = match client.login(email, password).await.map_err(describe)? {
        LoginOutcome::Authenticated(user) => user,
        LoginOutcome::TwoFactorRequired(challenge) => {
            let code = match code {
                Some(code) => code,
                None => prompt_code(&challenge)?,
            };
            match client.verify_two_factor(code.trim()).await {
                Ok(user) => user,
                Err(err) => {
                    client.abandon_two_factor().await;
                    return Err(describe(err));
                }
            }
        }
    };
    to_json(user)
}

fn prompt_code(challenge: &TwoFactorChallenge) -> anyhow::Result<String> {
    let mut stderr = std::io::stderr();
    write!(
        stderr,
        "Verification code (expires in {}s): ",
        challenge.ttl_seconds
    )?;
    stderr.flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read verification code")?;
    Ok(line)
}

async fn people<S: CredentialStore>(
    client: &SessionClient<S>,
    command: PeopleCommand,
) -> anyhow::Result<Value> {
    match command {
        PeopleCommand::List(args) => {
            to_json(client.list_people(&PeopleQuery::from(args)).await.map_err(describe)?)
        }
        PeopleCommand::Show { id } => to_json(client.get_person(id).await.map_err(describe)?),
        PeopleCommand::Create(args) => {
            to_json(client.create_person(&NewPerson::from(args)).await.map_err(describe)?)
        }
        PeopleCommand::Update { id, fields } => to_json(
            client
                .update_person(id, &PersonUpdate::from(fields))
                .await
                .map_err(describe)?,
        ),
        PeopleCommand::Delete { id } => {
            to_json(client.delete_person(id).await.map_err(describe)?)
        }
    }
}

async fn world<S: CredentialStore>(
    client: &SessionClient<S>,
    command: WorldCommand,
) -> anyhow::Result<Value> {
    match command {
        WorldCommand::Countries => to_json(client.countries().await.map_err(describe)?),
        WorldCommand::States { country_id } => {
            to_json(client.states(country_id).await.map_err(describe)?)
        }
        WorldCommand::Cities { state_id } => {
            to_json(client.cities(state_id).await.map_err(describe)?)
        }
        WorldCommand::Currencies { country_id } => {
            to_json(client.currencies(country_id).await.map_err(describe)?)
        }
    }
}

fn to_json<T: serde::Serialize>(value: T) -> anyhow::Result<Value> {
    serde_json::to_value(value).context("Failed to encode output")
}

/// Display form of a client failure: the server message, then any field
/// errors one per line.
fn describe(err: ClientError) -> anyhow::Error {
    tracing::debug!(error = ?err, "Command failed");

    let mut message = err.user_message();
    if let Some(payload) = err.payload() {
        for (field, messages) in payload.field_errors() {
            for text in messages {
                message.push_str(&format!("\n  {field}: {text}"));
            }
        }
    }
    anyhow!(message)
}
