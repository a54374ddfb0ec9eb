use crate::app::{App, BootReport, Challenge, Shell};
use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::shell::{MemoryHistory, Notification, NotificationLog};
use crate::storage::FileStore;
use crate::verify::{
    ChallengeWidget, ScriptHost, SolutionCallback, WidgetConfig, WidgetError, WidgetHandle,
};
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub config: AppConfig,
    pub store: PathBuf,
    pub page_url: Url,
    pub challenge_token: Option<SecretString>,
    pub watch: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    report: &'a BootReport,
    notifications: Vec<Notification>,
}

/// Boot the client once, print the outcome, optionally keep the session alive.
/// # Errors
/// Returns an error if the client cannot be configured or output fails.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let notifications = Arc::new(NotificationLog::new());
    let app = App::new(
        args.config,
        Shell {
            storage: Arc::new(FileStore::new(args.store)),
            navigator: Arc::new(MemoryHistory::new(args.page_url)),
            notifier: notifications.clone(),
            clock: Arc::new(SystemClock),
        },
    )?;
    let app = match &args.challenge_token {
        Some(solution) => app.with_challenge(Challenge {
            widget: Arc::new(PresetSolution(solution.clone())),
            document: Arc::new(HeadlessDocument::default()),
        }),
        None => app,
    };

    let mut report = app.boot();
    if args.challenge_token.is_some() && !report.verification.is_verified() {
        report = app.run_challenge().await?;
    }

    print_json(&Output {
        report: &report,
        notifications: notifications.entries(),
    })?;

    if args.watch {
        watch(&app).await?;
    }

    Ok(())
}

/// Prints every session change until Ctrl-C.
async fn watch(app: &App) -> Result<()> {
    let mut changes = app.session().subscribe();
    info!("Watching session; press Ctrl-C to exit");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupted");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let session = changes.borrow_and_update().clone();
                let decision = app.settle();
                print_json(&serde_json::json!({ "session": session, "decision": decision }))?;
            }
        }
    }

    Ok(())
}

/// Widget that answers every render with the solution passed on the command
/// line.
struct PresetSolution(SecretString);

impl ChallengeWidget for PresetSolution {
    fn is_ready(&self) -> bool {
        true
    }

    fn render(
        &self,
        config: &WidgetConfig,
        on_solution: SolutionCallback,
    ) -> Result<WidgetHandle, WidgetError> {
        debug!(action = %config.action, "Submitting preset challenge solution");
        on_solution(self.0.expose_secret().to_string());
        Ok(WidgetHandle(config.widget_name.clone()))
    }

    fn dispose(&self, _handle: &WidgetHandle) {}
}

/// Script registry standing in for the page document.
#[derive(Default)]
struct HeadlessDocument {
    scripts: Mutex<Vec<String>>,
}

impl ScriptHost for HeadlessDocument {
    fn has_script(&self, id: &str) -> bool {
        self.scripts
            .lock()
            .is_ok_and(|scripts| scripts.iter().any(|known| known == id))
    }

    fn inject_script(&self, id: &str, _src: &str) -> Result<(), WidgetError> {
        self.scripts
            .lock()
            .map_err(|err| WidgetError::Script(err.to_string()))?
            .push(id.to_string());
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn log_startup_args(args: &Args) {
    debug!(
        base_url = %args.config.api_base_url,
        store = %args.store.display(),
        page = %args.page_url.path(),
        challenge = args.challenge_token.is_some(),
        watch = args.watch,
        "Booting client"
    );
}
