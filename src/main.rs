//! Permission check tool
//!
//! Loads the grants for an actor and prints the decision for each argument.
//! Arguments starting with `/` are treated as navigation paths and go through
//! the route table; anything else is `module[:action]`.
//!
//! ```text
//! FLEET_AUTHZ_CONFIG=authz.json FLEET_AUTHZ_ROLE=ADMIN FLEET_AUTHZ_TOKEN=... \
//!     fleet-authz bookings:write /drivers/12
//! ```

use colored::Colorize;
use std::env;

use fleet_authz::config::AuthzConfig;
use fleet_authz::core::ActorContext;
use fleet_authz::guard::GuardOutcome;
use fleet_authz::logging;
use fleet_authz::permissions::{Action, PermissionView, Role};
use fleet_authz::session::AuthzSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging()?;

    let config = AuthzConfig::from_env()?;
    let role: Role = env::var("FLEET_AUTHZ_ROLE")
        .unwrap_or_else(|_| "VIEWER".to_string())
        .parse()?;
    let mut actor = match env::var("FLEET_AUTHZ_ACTOR") {
        Ok(id) => ActorContext::new(id, role),
        Err(_) => ActorContext::anonymous(role),
    };
    if let Ok(token) = env::var("FLEET_AUTHZ_TOKEN") {
        actor = actor.with_access_token(token);
    }

    tracing::info!("Checking permissions for {} ({})", actor.actor_id, actor.role);

    let session = AuthzSession::from_config(&config, actor)?;
    if let Err(err) = session.load().await {
        println!("{} {}", "load failed:".red().bold(), err);
    }
    println!("{} {}", "state:".bold(), session.store().state());

    for arg in env::args().skip(1) {
        if arg.starts_with('/') {
            match session.mount(&arg).await {
                GuardOutcome::Proceed => println!("{} {}", "allow".green().bold(), arg),
                GuardOutcome::Redirect { target, reason } => println!(
                    "{} {} ({}, redirect to {})",
                    "deny ".red().bold(),
                    arg,
                    reason,
                    target
                ),
            }
            continue;
        }

        let (module, action) = match arg.split_once(':') {
            Some((module, action)) => (module, Action::from(action)),
            None => (arg.as_str(), Action::default()),
        };
        let decision = session.decide(module, &action);
        match decision.reason {
            None => println!("{} {}:{}", "allow".green().bold(), module, action),
            Some(reason) => println!(
                "{} {}:{} ({})",
                "deny ".red().bold(),
                module,
                action,
                reason
            ),
        }
    }

    Ok(())
}
