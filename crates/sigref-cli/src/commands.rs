//! One function per CLI command.
//!
//! Each command opens the services, probes the server once and then works
//! like the matching screen: cached data first, fresh data when reachable.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Result};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use sigref_core::auth::{CredentialStore, TokenProvider};
use sigref_core::config::{Config, ENV_PASSWORD};
use sigref_core::models::AnswerValue;
use sigref_core::queue::deliver_pending;
use sigref_core::screens::{QuestionnaireResponse, ScreenState, SubmitOutcome};
use sigref_core::sync::SyncStatus;
use sigref_core::{AppContext, AppError, Notice};

use crate::render;

/// Open the services and learn whether the server is reachable
async fn open(config: Config) -> Result<(AppContext, broadcast::Receiver<Notice>)> {
    let ctx = AppContext::open(config)?;
    let notices = ctx.notices().subscribe();
    let reach = ctx.check_connectivity().await;
    debug!(?reach, "Connectivity checked");
    Ok((ctx, notices))
}

/// Print whatever the services announced while the command ran
fn print_notices(rx: &mut broadcast::Receiver<Notice>) {
    loop {
        match rx.try_recv() {
            Ok(notice) => eprintln!("* {}", notice.message()),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

fn print_state<T>(state: &ScreenState<T>) -> Result<()> {
    if let ScreenState::Error(e) = state {
        bail!("{}", e);
    }
    if let Some(banner) = render::freshness(state) {
        println!("{}", banner);
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("Input closed");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn login(mut config: Config, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| config.last_username.clone()) {
        Some(u) if !u.trim().is_empty() => u,
        _ => prompt("Username: ")?,
    };

    let password = match std::env::var(ENV_PASSWORD).ok().filter(|p| !p.is_empty()) {
        Some(p) => p,
        None => match CredentialStore::get_password(&username) {
            Ok(p) => {
                debug!("Using password from keychain");
                p
            }
            Err(_) => rpassword::prompt_password("Password: ")?,
        },
    };

    let (ctx, mut notices) = open(config.clone()).await?;
    let user = ctx.login(&username, &password).await?;

    if let Err(e) = CredentialStore::store(&username, &password) {
        warn!(error = %e, "Failed to save password to keychain");
    }
    config.last_username = Some(username);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    let name = if user.full_name.is_empty() {
        &user.username
    } else {
        &user.full_name
    };
    println!("Signed in as {} ({})", name, user.display_role());

    let pending = ctx.queue().len().await?;
    if pending > 0 {
        if let Some(report) = deliver_pending(
            ctx.queue(),
            ctx.backend().as_ref(),
            ctx.tokens().as_ref(),
            ctx.connectivity(),
            ctx.notices(),
        )
        .await
        {
            debug!(delivered = report.delivered.len(), "Delivered queued responses after login");
        }
    }
    print_notices(&mut notices);
    Ok(())
}

pub fn logout(config: Config, forget: bool) -> Result<()> {
    let username = config.last_username.clone();
    let ctx = AppContext::open(config)?;
    ctx.logout()?;
    if forget {
        if let Some(username) = username {
            if let Err(e) = CredentialStore::delete(&username) {
                warn!(error = %e, "Failed to remove password from keychain");
            }
        }
    }
    println!("Signed out.");
    Ok(())
}

pub async fn status(config: Config) -> Result<()> {
    let (ctx, _notices) = open(config).await?;

    let online = ctx.connectivity().is_reachable();
    println!("Server:       {} ({})", ctx.config().api_base_url, if online { "online" } else { "offline" });
    match ctx.session().user() {
        Some(user) => println!("Signed in:    {}", user.username),
        None => println!("Signed in:    no"),
    }

    let ages = ctx.cache().get_cache_ages();
    let snapshot = ctx.master().snapshot();
    println!(
        "Master data:  {} schools, {} questionnaires, {} questions (updated {})",
        snapshot.schools.len(),
        snapshot.questionnaires.len(),
        snapshot.questions.len(),
        ages.last_updated()
    );
    println!(
        "Next sync:    {}",
        if ctx.master().is_due() { "due now" } else { "not due" }
    );
    println!("Pending:      {} response(s)", ctx.queue().len().await?);
    Ok(())
}

pub async fn sync(config: Config, force: bool) -> Result<()> {
    let (ctx, mut notices) = open(config).await?;
    let token = ctx.tokens().current_token();

    let result = if force {
        ctx.master().sync(token.as_deref()).await.map(|_| SyncStatus::Synced)
    } else {
        ctx.master().sync_if_due(token.as_deref()).await
    };

    match result {
        Ok(SyncStatus::Synced) => {
            let snapshot = ctx.master().snapshot();
            println!(
                "Master data updated: {} schools, {} questionnaires, {} questions, {} sectors.",
                snapshot.schools.len(),
                snapshot.questionnaires.len(),
                snapshot.questions.len(),
                snapshot.sectors.len()
            );
        }
        Ok(SyncStatus::Fresh) => {
            println!(
                "Master data is up to date (updated {}). Use --force to sync anyway.",
                ctx.cache().get_cache_ages().last_updated()
            );
        }
        Err(AppError::NetworkUnreachable) => {
            println!("Offline. Keeping master data from {}.", ctx.cache().get_cache_ages().last_updated());
        }
        Err(e) => return Err(e.into()),
    }
    print_notices(&mut notices);
    Ok(())
}

pub async fn schools(config: Config, query: &str) -> Result<()> {
    let (ctx, mut notices) = open(config).await?;
    let screen = ctx.school_search();
    screen.source().set_query(query);
    let state = screen.mount().await;
    screen.unmount();

    print_state(&state)?;
    let schools = state.data().cloned().unwrap_or_default();
    if schools.is_empty() {
        println!("No schools found.");
    }
    for school in &schools {
        println!("{}", render::school_line(school));
    }
    print_notices(&mut notices);
    Ok(())
}

pub async fn questionnaires(config: Config, school_id: i64) -> Result<()> {
    let (ctx, mut notices) = open(config).await?;
    let screen = ctx.questionnaire_list(school_id);
    let state = screen.mount().await;
    screen.unmount();

    print_state(&state)?;
    if let Some(listing) = state.data() {
        for line in render::questionnaires(listing) {
            println!("{}", line);
        }
    }
    print_notices(&mut notices);
    Ok(())
}

pub async fn dashboard(config: Config, school_id: i64) -> Result<()> {
    let (ctx, mut notices) = open(config).await?;
    let screen = ctx.school_dashboard(school_id);
    let state = screen.mount().await;
    screen.unmount();

    print_state(&state)?;
    if let Some(dashboard) = state.data() {
        for line in render::dashboard(dashboard) {
            println!("{}", line);
        }
    }
    print_notices(&mut notices);
    Ok(())
}

pub async fn answer(config: Config, school_id: i64, questionnaire_id: i64) -> Result<()> {
    let (ctx, mut notices) = open(config).await?;
    let screen = ctx.questionnaire_form(school_id, questionnaire_id);
    let state = screen.mount().await;
    screen.unmount();

    print_state(&state)?;
    let form = state
        .data()
        .cloned()
        .ok_or_else(|| anyhow!("Questionnaire {} is not available", questionnaire_id))?;

    println!("{} - {}", form.school.name, form.questionnaire.title);
    let mut response = QuestionnaireResponse::new(school_id, &form);
    let questions = response.questions().to_vec();
    for (i, question) in questions.iter().enumerate() {
        println!();
        println!("{}/{}. {} [{}]", i + 1, questions.len(), question.text, question.kind_label());
        loop {
            let raw = prompt("> ")?;
            match AnswerValue::parse(question.kind, &raw) {
                Ok(_) => {
                    response.set_answer(question.id, raw)?;
                    break;
                }
                Err(reason) => println!("  {}", reason),
            }
        }
    }

    let (answered, total) = response.progress();
    println!();
    println!("{} of {} answered.", answered, total);
    match response.submit(&ctx.submitter()).await? {
        SubmitOutcome::Sent(ack) => {
            println!("{}", ack.message.unwrap_or_else(|| "Response sent.".to_string()));
        }
        SubmitOutcome::SavedOffline(id) => {
            println!("Saved on this device as {}. It will be sent when you are online.", id);
        }
    }
    print_notices(&mut notices);
    Ok(())
}

pub async fn pending(config: Config) -> Result<()> {
    let ctx = AppContext::open(config)?;
    let items = ctx.queue().list().await?;
    if items.is_empty() {
        println!("No responses waiting to be sent.");
    }
    for item in &items {
        println!("{}", render::pending_line(item));
    }
    Ok(())
}

pub async fn drain(config: Config) -> Result<()> {
    let (ctx, mut notices) = open(config).await?;
    if !ctx.connectivity().is_reachable() {
        println!("Offline. {} response(s) stay queued.", ctx.queue().len().await?);
        return Ok(());
    }
    match deliver_pending(
        ctx.queue(),
        ctx.backend().as_ref(),
        ctx.tokens().as_ref(),
        ctx.connectivity(),
        ctx.notices(),
    )
    .await
    {
        Some(report) => println!(
            "{} sent, {} failed, {} still queued.",
            report.delivered.len(),
            report.failed.len(),
            report.remaining
        ),
        None => println!("Nothing to send."),
    }
    print_notices(&mut notices);
    Ok(())
}

pub async fn watch(config: Config) -> Result<()> {
    let mut ctx = AppContext::start(config)?;
    let mut notices = ctx.notices().subscribe();
    println!("Watching {} (Ctrl-C to stop)", ctx.config().api_base_url);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            notice = notices.recv() => match notice {
                Ok(notice) => println!("{}", notice.message()),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(missed = n, "Notice receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    ctx.shutdown();
    Ok(())
}
