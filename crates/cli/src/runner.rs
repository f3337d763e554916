//! Wire a scenario to the configured provider and run it.

use loopwright_agent::{
    AgentOptions, IterationLoop, PlanManager, PromptApproval, ReplanCoordinator, RunOutcome,
    RunReport, TurnExecutor,
};
use loopwright_config::AppConfig;
use loopwright_core::error::ProviderError;
use loopwright_core::event::EventBus;
use loopwright_providers::build_from_config;
use loopwright_tools::{StdinPrompter, Toolbox};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::progress;
use crate::scenario::{Mode, Planning};

pub struct RunRequest {
    pub mode: Mode,
    pub task: String,
    pub approve: bool,
    pub verbose: bool,
}

pub async fn run(config: AppConfig, request: RunRequest) -> Result<(), Box<dyn std::error::Error>> {
    let provider = match build_from_config(&config) {
        Ok(provider) => provider,
        Err(ProviderError::NotConfigured(reason)) => {
            print_setup_instructions();
            return Err(format!("Provider not configured: {reason}").into());
        }
        Err(e) => return Err(e.into()),
    };

    let scenario = request.mode.scenario();
    let verbose = request.verbose || config.agent.verbose;

    // ask_human and the approval prompt share one reader over stdin
    let prompter = Arc::new(StdinPrompter::new());
    let toolbox = Toolbox::new(config.tools.clone())
        .with_prompter(prompter.clone())
        .with_revision_action(config.agent.revision_action.clone());
    let loadout = scenario.loadout(&toolbox)?;
    let registry = Arc::new(loadout.registry);

    let mut options = AgentOptions::from_config(&config).with_verbose(verbose);
    if let Some(max) = scenario.max_iterations {
        options = options.with_max_iterations(max);
    }

    let event_bus = Arc::new(EventBus::default());
    let printer = verbose.then(|| progress::spawn(event_bus.subscribe()));

    let mut executor = TurnExecutor::new(provider.clone(), registry.clone(), options.clone())
        .with_event_bus(event_bus.clone());
    if request.approve || config.agent.require_approval {
        executor = executor.with_approval(Arc::new(PromptApproval::new(prompter)));
    }

    let planner = PlanManager::new(provider, options)
        .with_actions(&registry)
        .with_parse_retries(config.agent.plan_parse_retries);

    let max_replans = match scenario.planning {
        Planning::Adaptive => config.agent.max_replans,
        Planning::None | Planning::Once => 0,
    };

    let coordinator = ReplanCoordinator::new(planner, IterationLoop::new(executor))
        .with_system_prompt(scenario.system_prompt(&loadout.instructions))
        .with_max_replans(max_replans)
        .with_iteration_limit_policy(config.agent.on_iteration_limit)
        .with_event_bus(event_bus.clone());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    info!(
        mode = ?request.mode,
        provider = %config.provider,
        model = %config.model,
        actions = registry.len(),
        "Running scenario"
    );

    let result = match scenario.planning {
        Planning::None => coordinator.execute_without_plan(&request.task, &cancel).await,
        Planning::Once | Planning::Adaptive => coordinator.run(&request.task, &cancel).await,
    };

    // Dropping every bus handle closes the channel and lets the printer finish.
    drop(coordinator);
    drop(event_bus);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let report = result?;
    print_report(&report, verbose);
    Ok(())
}

fn print_report(report: &RunReport, verbose: bool) {
    if verbose {
        for (i, plan) in report.plans.iter().enumerate() {
            eprintln!();
            eprintln!("  Plan {}:", i + 1);
            for line in plan.render().lines() {
                eprintln!("    {line}");
            }
        }
        eprintln!();
    }

    match &report.outcome {
        RunOutcome::Completed(text) => println!("{text}"),
        RunOutcome::Aborted {
            reason, last_text, ..
        } => {
            eprintln!(
                "  Gave up after {} replan(s): {reason}",
                report.replans
            );
            if let Some(text) = last_text {
                println!("{text}");
            }
        }
        RunOutcome::IterationLimitExceeded { last_text } => {
            eprintln!(
                "  Stopped after {} step(s) without a final answer.",
                report.iterations
            );
            if let Some(text) = last_text {
                println!("{text}");
            }
        }
        RunOutcome::Cancelled => eprintln!("  Cancelled."),
    }
}

fn print_setup_instructions() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    export OPENROUTER_API_KEY='sk-or-v1-...'   (recommended)");
    eprintln!("    export OPENAI_API_KEY='sk-...'             (for OpenAI direct)");
    eprintln!("    export LOOPWRIGHT_API_KEY='sk-...'         (generic)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    eprintln!("  Local servers need no key: set provider = \"ollama\" in the config.");
    eprintln!();
}
