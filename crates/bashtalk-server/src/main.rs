//! BashTalk server executable.
//!
//! Loads [`ServerConfig`], installs logging, obtains the admin password and
//! serves until Ctrl-C.

use std::io::{self, BufRead, Write};

use bashtalk::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    bashtalk::logging::init(&config.log_level)?;

    let env_password = std::env::var("BASHTALK_ADMIN_PASSWORD").ok();
    let auth = match configured_gate(&config, env_password.as_deref())? {
        Some(auth) => auth,
        None => tokio::task::spawn_blocking(|| {
            let stdin = io::stdin();
            prompt_admin_password(&mut stdin.lock(), &mut io::stderr())
        })
        .await??,
    };

    tracing::info!(addr = %config.bind_addr(), max_clients = config.max_clients, "starting BashTalk server");
    let server = ChatServerBuilder::from_config(&config).build(auth).await?;
    server.run().await?;

    // Let writer tasks flush the shutdown line before the runtime drops them.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    Ok(())
}

/// Builds the gate from the configured digest or the environment secret.
///
/// Returns `Ok(None)` when neither is set and the operator must be asked.
fn configured_gate(
    config: &ServerConfig,
    env_password: Option<&str>,
) -> Result<Option<AuthGate>, BashTalkError> {
    if let Some(hex) = &config.admin_password_sha256 {
        return Ok(Some(AuthGate::from_digest_hex(hex)?));
    }
    Ok(env_password
        .filter(|p| !p.is_empty())
        .map(AuthGate::from_secret))
}

/// Asks for the admin password twice, repeating until both entries match.
fn prompt_admin_password(
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<AuthGate, BashTalkError> {
    loop {
        let first = read_secret(input, output, "Enter admin password: ")?;
        let second = read_secret(input, output, "Confirm admin password: ")?;
        if !first.is_empty() && first == second {
            return Ok(AuthGate::from_secret(&first));
        }
        if let Err(e) = writeln!(output, "Passwords do not match or are empty. Try again.") {
            tracing::debug!(error = %e, "cannot write password mismatch notice");
        }
    }
}

fn read_secret(
    input: &mut impl BufRead,
    output: &mut impl Write,
    prompt: &str,
) -> Result<String, BashTalkError> {
    if let Err(e) = write!(output, "{prompt}").and_then(|()| output.flush()) {
        tracing::debug!(error = %e, "cannot write password prompt");
    }

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => Err(ConfigError::MissingPassword.into()),
        Ok(_) => Ok(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_gate_prefers_digest() {
        let config = ServerConfig {
            admin_password_sha256: Some(AuthGate::from_secret("a").digest_hex()),
            ..ServerConfig::default()
        };
        let gate = configured_gate(&config, Some("b")).unwrap().unwrap();
        assert!(gate.verify("a"));
        assert!(!gate.verify("b"));
    }

    #[test]
    fn test_configured_gate_bad_digest_is_error() {
        let config = ServerConfig {
            admin_password_sha256: Some("zz".into()),
            ..ServerConfig::default()
        };
        assert!(configured_gate(&config, None).is_err());
    }

    #[test]
    fn test_configured_gate_falls_back_to_env() {
        let gate = configured_gate(&ServerConfig::default(), Some("s3cret"))
            .unwrap()
            .unwrap();
        assert!(gate.verify("s3cret"));
    }

    #[test]
    fn test_configured_gate_nothing_set_returns_none() {
        assert!(configured_gate(&ServerConfig::default(), None).unwrap().is_none());
        assert!(configured_gate(&ServerConfig::default(), Some("")).unwrap().is_none());
    }

    #[test]
    fn test_prompt_admin_password_repeats_until_match() {
        let mut input = io::Cursor::new("one\ntwo\nfinal\nfinal\n");
        let mut output = Vec::new();
        let gate = prompt_admin_password(&mut input, &mut output).unwrap();
        assert!(gate.verify("final"));

        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("Enter admin password: ").count(), 2);
        assert!(shown.contains("do not match"));
    }

    #[test]
    fn test_prompt_admin_password_eof_is_missing_password() {
        let mut input = io::Cursor::new("only-once\n");
        let mut output = Vec::new();
        let err = prompt_admin_password(&mut input, &mut output).unwrap_err();
        assert!(matches!(err, BashTalkError::Config(ConfigError::MissingPassword)));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn test_prompt_admin_password_unwritable_output_still_reads() {
        let mut input = io::Cursor::new("pw\nnope\npw\npw\n");
        let gate = prompt_admin_password(&mut input, &mut BrokenPipe).unwrap();
        assert!(gate.verify("pw"));
    }
}
