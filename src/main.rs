use clap::{Parser, Subcommand};
use std::env;
use std::error::Error;
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use vault_client::RenewEvent;
use vault_k8s::{K8sError, Vault};

/// Obtains and renews a Vault token with the Kubernetes auth method
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and store the token in VAULT_TOKEN_PATH
    Login,
    /// Keep the stored token alive until its lease can no longer be extended
    Renew,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logger();

    let result = match Vault::from_env() {
        Ok(vault) => run(cli.command, vault).await,
        Err(e) => Err(e),
    };
    ExitCode::from(exit_code(&result, allow_fail(|name| env::var(name).ok())))
}

/// Process exit status for `result`. Failures exit 0 when `allow_fail` is set.
fn exit_code(result: &Result<(), K8sError>, allow_fail: bool) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) if allow_fail => {
            tracing::warn!("Vault authentication failed, continuing: {}", error_chain(e));
            0
        }
        Err(e) => {
            tracing::error!("Vault authentication failed: {}", error_chain(e));
            1
        }
    }
}

/// `ALLOW_FAIL` is read on its own so that configuration errors are covered too
fn allow_fail<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup("ALLOW_FAIL")
        .and_then(|s| vault_k8s::parse_bool(&s))
        .unwrap_or_default()
}

fn error_chain(e: &dyn Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(e) = source {
        message.push_str(": ");
        message.push_str(&e.to_string());
        source = e.source();
    }
    message
}

async fn run(command: Command, mut vault: Vault) -> Result<(), K8sError> {
    match command {
        Command::Login => login(&mut vault).await,
        Command::Renew => renew(&mut vault).await,
    }
}

async fn login(vault: &mut Vault) -> Result<(), K8sError> {
    let token = if vault.reauth {
        vault.get_token().await?
    } else {
        vault.authenticate().await?
    };
    vault.store_token(&token)?;
    tracing::info!(path = %vault.token_path.display(), "Stored Vault token");
    Ok(())
}

async fn renew(vault: &mut Vault) -> Result<(), K8sError> {
    let token = vault.get_token().await?;
    vault.store_token(&token)?;

    let mut renewer = vault.new_renewer(token).await?.start();
    loop {
        tokio::select! {
            event = renewer.next() => match event {
                Some(RenewEvent::Renewed(secret)) => {
                    let lease_duration = secret
                        .auth
                        .as_ref()
                        .map_or(secret.lease_duration, |auth| auth.lease_duration);
                    tracing::info!(lease_duration, "Renewed Vault token");
                }
                Some(RenewEvent::Done(Some(e))) => return Err(K8sError::Renew(e)),
                Some(RenewEvent::Done(None)) | None => {
                    tracing::info!("Vault token lease reached its maximum TTL");
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping renewal");
                renewer.stop();
                return Ok(());
            }
        }
    }
}

fn init_logger() -> Option<WorkerGuard> {
    use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
    use tracing_log::LogTracer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::{EnvFilter, Registry};

    let env_filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !env::var("JSON_LOG").is_ok_and(|s| s.parse().unwrap_or_default()) {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    // Redirect the logs from log library to tracing's subscribers.
    if let Err(e) = LogTracer::init() {
        eprintln!("Unable to setup log tracer: {}", e);
    }

    let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")).to_string();

    // Non-blocking stdout writer
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);
    let subscriber = Registry::default()
        .with(env_filter())
        .with(JsonStorageLayer)
        .with(bunyan_formatting_layer);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to setup tracing subscriber: {}", e);
    }
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vault(vars: &[(&str, &str)]) -> Vault {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Vault::from_lookup(move |name| vars.get(name).cloned()).unwrap()
    }

    fn temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn path_str(file: &NamedTempFile) -> &str {
        file.path().to_str().unwrap()
    }

    fn auth_response(token: &str, lease_duration: u64, renewable: bool) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "auth": {
                "client_token": token,
                "lease_duration": lease_duration,
                "renewable": renewable
            }
        }))
    }

    async fn login_mock(mock_server: &MockServer, issued: &str, expected_calls: u64) {
        Mock::given(method("PUT"))
            .and(path("/v1/auth/kubernetes/login"))
            .respond_with(auth_response(issued, 3600, true))
            .expect(expected_calls)
            .mount(mock_server)
            .await;
    }

    /// Two renewable renew-self responses (get_token and new_renewer), then `last`
    async fn renew_mocks(mock_server: &MockServer, last: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/renew-self"))
            .and(header("X-Vault-Token", "s.stored"))
            .respond_with(auth_response("s.stored", 1, true))
            .up_to_n_times(2)
            .mount(mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/renew-self"))
            .respond_with(last)
            .mount(mock_server)
            .await;
    }

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["vault-k8s-login", "renew"]).unwrap();
        assert!(matches!(cli.command, Command::Renew));
        assert!(Cli::try_parse_from(["vault-k8s-login"]).is_err());
    }

    #[test]
    fn test_exit_code() {
        let failed = Err(K8sError::MissingConfig {
            name: "VAULT_TOKEN_PATH",
        });
        assert_eq!(exit_code(&Ok(()), false), 0);
        assert_eq!(exit_code(&failed, true), 0);
        assert_eq!(exit_code(&failed, false), 1);
    }

    #[test]
    fn test_allow_fail() {
        assert!(allow_fail(|_| Some("true".to_string())));
        assert!(allow_fail(|_| Some("1".to_string())));
        assert!(!allow_fail(|_| None));
        assert!(!allow_fail(|_| Some("no".to_string())));
    }

    #[test]
    fn test_error_chain() {
        let err = K8sError::Renew(vault_client::VaultError::ClientError {
            status: 403,
            errors: vec!["permission denied".to_string()],
        });
        assert_eq!(
            error_chain(&err),
            "failed to renew token: Vault client error (403): permission denied"
        );
    }

    #[tokio::test]
    async fn test_login_authenticates_without_reauth() {
        let mock_server = MockServer::start().await;
        login_mock(&mock_server, "s.issued", 1).await;

        let token_file = temp_file("s.stale");
        let sa_token = temp_file("jwt");
        let vault = vault(&[
            ("VAULT_ADDR", mock_server.uri().as_str()),
            ("VAULT_TOKEN_PATH", path_str(&token_file)),
            ("SERVICE_ACCOUNT_TOKEN_PATH", path_str(&sa_token)),
        ]);

        run(Command::Login, vault).await.unwrap();
        assert_eq!(std::fs::read_to_string(token_file.path()).unwrap(), "s.issued");
    }

    #[tokio::test]
    async fn test_login_keeps_valid_token_with_reauth() {
        let mock_server = MockServer::start().await;
        login_mock(&mock_server, "s.issued", 0).await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/renew-self"))
            .and(header("X-Vault-Token", "s.stored"))
            .respond_with(auth_response("s.stored", 3600, true))
            .expect(1)
            .mount(&mock_server)
            .await;

        let token_file = temp_file("s.stored");
        let vault = vault(&[
            ("VAULT_ADDR", mock_server.uri().as_str()),
            ("VAULT_TOKEN_PATH", path_str(&token_file)),
            ("VAULT_REAUTH", "true"),
        ]);

        run(Command::Login, vault).await.unwrap();
        assert_eq!(std::fs::read_to_string(token_file.path()).unwrap(), "s.stored");
    }

    #[tokio::test]
    async fn test_login_failure() {
        let mock_server = MockServer::start().await;
        let sa_token = temp_file("jwt");
        let vault = vault(&[
            ("VAULT_ADDR", mock_server.uri().as_str()),
            ("VAULT_TOKEN_PATH", "/tmp/vault-token"),
            ("SERVICE_ACCOUNT_TOKEN_PATH", path_str(&sa_token)),
        ]);

        let result = run(Command::Login, vault).await;
        assert!(matches!(result, Err(K8sError::Login { .. })));
        assert_eq!(exit_code(&result, false), 1);
    }

    #[tokio::test]
    async fn test_renew_until_lease_is_exhausted() {
        let mock_server = MockServer::start().await;
        renew_mocks(&mock_server, auth_response("s.stored", 0, false)).await;

        let token_file = temp_file("s.stored");
        let vault = vault(&[
            ("VAULT_ADDR", mock_server.uri().as_str()),
            ("VAULT_TOKEN_PATH", path_str(&token_file)),
        ]);

        tokio::time::timeout(Duration::from_secs(10), run(Command::Renew, vault))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(std::fs::read_to_string(token_file.path()).unwrap(), "s.stored");
    }

    #[tokio::test]
    async fn test_renew_failure_is_renew_error() {
        let mock_server = MockServer::start().await;
        renew_mocks(
            &mock_server,
            ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "errors": ["permission denied"]
            })),
        )
        .await;

        let token_file = temp_file("s.stored");
        let vault = vault(&[
            ("VAULT_ADDR", mock_server.uri().as_str()),
            ("VAULT_TOKEN_PATH", path_str(&token_file)),
        ]);

        let result = tokio::time::timeout(Duration::from_secs(10), run(Command::Renew, vault))
            .await
            .unwrap();
        match result {
            Err(K8sError::Renew(source)) => assert_eq!(source.status(), Some(403)),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
