pub mod apply;
pub mod lookup;
pub mod plan;
pub mod schema;
pub mod state;
pub mod validate;

use anyhow::Result;
use reconcile::Error;
use remote::{CancelToken, Client, ClientConfig};
use std::time::Duration;

use crate::cli::ApiArgs;
use crate::config::{self, FileConfig, Overrides};
use crate::ui;

/// Client and cancellation token for one command run
pub struct Session {
    pub client: Client,
    pub cancel: CancelToken,
}

/// Resolve the API settings and connect
pub fn session(api: &ApiArgs) -> Result<Session> {
    let overrides = Overrides {
        api_url: api.api_url.clone(),
        api_token: api.api_token.clone(),
        timeout_secs: api.timeout,
    };
    let config: ClientConfig = config::resolve(overrides, FileConfig::load()?)?;
    log::debug!("Client config: {config:?}");
    Ok(Session {
        cancel: CancelToken::with_timeout(Duration::from_secs(config.timeout_secs)),
        client: Client::new(&config),
    })
}

/// Ask before touching the remote entity
pub fn confirm(prompt: &str) -> Result<bool> {
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()?;
    Ok(confirmed)
}

/// Print the details of a reconciliation error before it is returned
pub fn report(err: &Error) {
    for violation in err.violations() {
        ui::error(&format!("{}: {}", violation.summary, violation.detail));
    }

    match err {
        Error::Adapter(remote) => {
            let category = remote.category();
            ui::error(&category.to_string());
            ui::dim(category.advice());
        }
        _ => ui::error(&err.category().to_string()),
    }
}

/// Run a reconciliation step, printing details on failure
pub fn reconciled<T>(result: reconcile::Result<T>) -> Result<T> {
    result.map_err(|err| {
        report(&err);
        err.into()
    })
}
