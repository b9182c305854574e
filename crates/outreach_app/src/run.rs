use std::env;
use std::path::Path;
use std::process::ExitCode;

use outreach_engine::{
    build_report, run_campaign, AuthError, Authenticator, CampaignError, CampaignLedger,
    CancelFlag, ContactStore, HarvestError, HttpAuthenticator, HttpMessenger, HttpPagedSource,
    LedgerError, ListHarvester, StoreError, TemplateError, TokioScheduler,
};
use outreach_logging::{outreach_error, outreach_info, outreach_warn};
use thiserror::Error;

use crate::config::{AppConfig, ConfigError};
use crate::logging::{self, LogDestination};

const USAGE: &str = "usage: outreach_app <harvest|campaign|report> <config.ron>";

#[derive(Debug, Clone, Copy)]
enum Mode {
    Harvest,
    Campaign,
    Report,
}

impl Mode {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "harvest" => Some(Mode::Harvest),
            "campaign" => Some(Mode::Campaign),
            "report" => Some(Mode::Report),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Harvest(#[from] HarvestError),
    #[error(transparent)]
    Campaign(#[from] CampaignError),
    #[error(transparent)]
    Templates(#[from] TemplateError),
    #[error("could not start the async runtime: {0}")]
    Runtime(std::io::Error),
}

pub(crate) fn run_app() -> ExitCode {
    let mut args = env::args().skip(1);
    let (Some(mode_word), Some(config_path)) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let Some(mode) = Mode::parse(&mode_word) else {
        eprintln!("unknown mode {mode_word:?}\n{USAGE}");
        return ExitCode::FAILURE;
    };

    // Keep the report readable on stdout; the long-running modes also
    // log to the file.
    match mode {
        Mode::Report => logging::initialize(LogDestination::Terminal),
        _ => logging::initialize(LogDestination::Both),
    }

    match execute(mode, Path::new(&config_path)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            outreach_error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn execute(mode: Mode, config_path: &Path) -> Result<(), AppError> {
    let config = AppConfig::load(config_path)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;

    let cancel = CancelFlag::new();
    runtime.spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                outreach_warn!("interrupt received, finishing the current step");
                cancel.cancel();
            }
        }
    });

    runtime.block_on(async {
        match mode {
            Mode::Harvest => harvest(&config, &cancel).await,
            Mode::Campaign => campaign(&config, &cancel).await,
            Mode::Report => report(&config),
        }
    })
}

async fn harvest(config: &AppConfig, cancel: &CancelFlag) -> Result<(), AppError> {
    let identity = config.harvest_identity();
    outreach_info!("harvesting as {}", identity.name);

    let authenticator = HttpAuthenticator::new(config.auth_settings());
    let session = authenticator.authenticate(&identity).await?;
    let source = HttpPagedSource::new(config.source_settings(), authenticator, identity, session);

    let mut store = ContactStore::open(&config.store_path)?;
    let mut harvester = ListHarvester::new(source, config.harvest_settings());
    let summary = harvester.run(&mut store, &TokioScheduler, cancel).await?;

    outreach_info!(
        "harvest finished ({:?}): {} rounds, {} new, {} updated, {} duplicates, {} skipped",
        summary.stop,
        summary.rounds,
        summary.inserted,
        summary.updated,
        summary.duplicates,
        summary.extraction_failures
    );
    Ok(())
}

async fn campaign(config: &AppConfig, cancel: &CancelFlag) -> Result<(), AppError> {
    let store = ContactStore::open(&config.store_path)?;
    let mut ledger = CampaignLedger::open(&config.ledger_path)?;
    let templates = config.template_set()?;
    let settings = config.campaign_settings();
    let authenticator = HttpAuthenticator::new(config.auth_settings());

    let outcome = run_campaign(
        &store,
        &mut ledger,
        &templates,
        &settings,
        |name: &str| {
            let identity = config.identity(name);
            let name = name.to_string();
            let authenticator = authenticator.clone();
            let chat_url = config.chat_url.clone();
            async move {
                let identity = identity
                    .ok_or_else(|| AuthError::UnexpectedResponse(format!("no account named {name}")))?;
                let own_user_id = identity.user_id.clone();
                let session = authenticator.authenticate(&identity).await?;
                Ok(HttpMessenger::new(session, chat_url, own_user_id))
            }
        },
        &TokioScheduler,
        cancel,
    )
    .await?;

    for summary in &outcome.dispatches {
        outreach_info!(
            "{}: {} sent, {} already contacted, {} failed, {} deferred ({:?})",
            summary.account,
            summary.sent,
            summary.already_contacted,
            summary.failed,
            summary.deferred,
            summary.stop
        );
    }
    if !outcome.auth_failures.is_empty() {
        outreach_warn!("skipped shares after failed logins: {:?}", outcome.auth_failures);
    }

    ledger.export_results(&config.results_path)?;
    outreach_info!("results exported to {:?}", config.results_path);
    Ok(())
}

fn report(config: &AppConfig) -> Result<(), AppError> {
    let store = ContactStore::open(&config.store_path)?;
    let ledger = CampaignLedger::open(&config.ledger_path)?;
    let report = build_report(&store, &ledger, &config.filter_config());
    println!("{report}");
    Ok(())
}
