mod auth;
mod commands;
mod config;
mod error;
mod lottery;
mod status;
mod teleport;
mod token;

use std::env;
use std::fmt::Debug;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use poise::serenity_prelude::{GatewayIntents, Http};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{debug, help, tp, Data};
use crate::config::Config;
use crate::error::{Error, LoginError};
use crate::token::TokenStore;

/// First process argument that runs one lottery round instead of the bot.
const LOTTERY_ARG: &str = "sbRoleLottery";
const MAX_LOGIN_ATTEMPTS: usize = 3;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // This will load the environment variables located at `./.env`, relative to
    // the CWD, when the file exists.
    dotenv::dotenv().ok();

    // `RUST_LOG` overrides the default `info` level.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let store = TokenStore::new(&config.token_path);
    let token = login(
        &store,
        &mut io::stdin().lock(),
        &mut io::stdout(),
        |token| async move {
            Http::new(&token)
                .get_current_user()
                .await
                .map(|user| user.name)
        },
    )
    .await?;

    match env::args().nth(1).as_deref() {
        Some(LOTTERY_ARG) => {
            info!("Running the role lottery");
            let http = Http::new(&token);
            if let Err(why) = lottery::run(&http, &config.lottery).await {
                error!("Lottery failed: {}", why);
                return Err(why);
            }
            Ok(())
        }
        _ => run_bot(token, config).await,
    }
}

// `validate` resolves to the account name the token belongs to.
async fn login<R, W, F, Fut, E>(
    store: &TokenStore,
    input: &mut R,
    output: &mut W,
    validate: F,
) -> Result<String, LoginError>
where
    R: BufRead,
    W: Write,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<String, E>>,
    E: Debug,
{
    for attempt in 1..=MAX_LOGIN_ATTEMPTS {
        let token = store.load_or_prompt(input, output)?;

        match validate(token.clone()).await {
            Ok(name) => {
                info!("Authenticated as {}", name);
                return Ok(token);
            }
            Err(why) => {
                warn!(
                    "Login attempt {} of {} failed: {:?}",
                    attempt, MAX_LOGIN_ATTEMPTS, why
                );
                writeln!(
                    output,
                    "That token doesn't work, or Discord may be down, please try again."
                )?;
                store.remove()?;
            }
        }
    }

    Err(LoginError::AttemptsExhausted(MAX_LOGIN_ATTEMPTS))
}

async fn run_bot(token: String, config: Config) -> Result<(), Error> {
    let Config {
        prefix, moderators, ..
    } = config;
    info!(
        "Starting with prefix {:?} and {} bot moderators",
        prefix,
        moderators.len()
    );

    let gateway_intents = GatewayIntents::non_privileged()
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::MESSAGE_CONTENT;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![tp(), debug(), help()],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix.clone()),
                mention_as_prefix: true,
                edit_tracker: Some(poise::EditTracker::for_timespan(Duration::from_secs(3600))),
                ..Default::default()
            },
            on_error: |error| Box::pin(commands::on_error(error)),
            post_command: |ctx| Box::pin(commands::post_command(ctx)),
            ..Default::default()
        })
        .token(token)
        .intents(gateway_intents)
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("{} is connected!", ready.user.name);

                let started = Instant::now();
                status::spawn_refresher(ctx.clone(), prefix.clone(), started);

                let shard_manager = framework.shard_manager().clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Interrupted, disconnecting");
                        shard_manager.lock().await.shutdown_all().await;
                    }
                });

                Ok(Data {
                    moderators,
                    prefix,
                    started,
                })
            })
        });

    framework.run().await?;
    info!("Disconnected");

    Ok(())
}
