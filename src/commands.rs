use std::time::Instant;

use poise::serenity_prelude::{CacheHttp, ChannelId, Guild, RoleId, UserId};
use tracing::{debug, error, info, warn};

use crate::auth::ModeratorPolicy;
use crate::error::{Error, TeleportError};
use crate::status;
use crate::teleport::{self, GuildView, MemberView, TeleportRequest};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) struct Data {
    pub moderators: ModeratorPolicy,
    pub prefix: String,
    pub started: Instant,
}

type Context<'a> = poise::Context<'a, Data, Error>;

async fn is_bot_mod(ctx: Context<'_>) -> Result<bool, Error> {
    Ok(ctx.data().moderators.is_moderator(ctx.author().id))
}

/// Moves members into a voice channel.
///
/// The last argument is the destination: a voice channel, or a member whose
/// current channel is used. Mentioned members are moved there; with no other
/// arguments you are moved yourself. Bot moderators with a lone destination
/// move everyone in voice, and mentioned roles bring along every member of
/// that role who is in voice.
#[poise::command(prefix_command, guild_only)]
pub(crate) async fn tp(
    ctx: Context<'_>,
    #[rest]
    #[description = "Members or roles to move, then the destination"]
    content: Option<String>,
) -> Result<(), Error> {
    let poise::Context::Prefix(prefix_ctx) = ctx else {
        return Ok(());
    };
    let msg = prefix_ctx.msg;
    let remainder = content.unwrap_or_default();
    let guild = ctx.guild().ok_or::<Error>("tp only works inside a server".into())?;

    let bot_id = ctx.framework().bot_id;
    let mentioned_users: Vec<UserId> = msg
        .mentions
        .iter()
        .map(|user| user.id)
        .filter(|id| *id != bot_id)
        .collect();
    let mentioned_roles: Vec<RoleId> = msg.mention_roles.clone();

    let mut view = GuildView::from_guild(&guild);
    let mut wanted = mentioned_users.clone();
    wanted.push(ctx.author().id);
    if let Some(id) = teleport::destination_token(&remainder).and_then(teleport::parse_destination_id)
    {
        wanted.push(UserId(id));
    }
    fetch_missing_members(&ctx, &guild, &mut view, &wanted).await;

    let author = ctx.author().id;
    let request = TeleportRequest {
        remainder: &remainder,
        author,
        mentioned_users: &mentioned_users,
        mentioned_roles: &mentioned_roles,
        privileged: ctx.data().moderators.is_moderator(author),
    };

    let plan = match teleport::plan(&view, &request) {
        Ok(plan) => plan,
        Err(TeleportError::EmptyArgument) => return Ok(()),
        Err(why) => {
            debug!("tp from {} not planned: {}", ctx.author().name, why);
            ctx.say(why.to_string()).await?;
            return Ok(());
        }
    };

    let mut moved = 0;
    for member in &plan.members {
        info!("Teleporting {} to {}", member.name, plan.destination_name);
        match guild
            .id
            .move_member(ctx.http(), member.id, plan.destination)
            .await
        {
            Ok(_) => moved += 1,
            Err(why) => warn!("Could not move {}: {:?}", member.name, why),
        }
    }

    ctx.say(teleport::summary(moved, &plan.destination_name))
        .await?;

    Ok(())
}

// The cache only knows members the gateway has told us about.
async fn fetch_missing_members(
    ctx: &Context<'_>,
    guild: &Guild,
    view: &mut GuildView,
    wanted: &[UserId],
) {
    for &id in wanted {
        let known = view.member(id).is_some()
            || view.is_voice_channel(ChannelId(id.0))
            || guild.roles.contains_key(&RoleId(id.0));
        if known {
            continue;
        }

        match guild.id.member(ctx.http(), id).await {
            Ok(member) => {
                let voice_channel = teleport::voice_channel_of(guild, id);
                view.insert_member(MemberView::new(&member, voice_channel));
            }
            Err(why) => debug!("{} is not a member of {}: {:?}", id, guild.id, why),
        }
    }
}

#[poise::command(
    prefix_command,
    check = "is_bot_mod",
    subcommands("roles", "echo", "exit"),
    hide_in_help
)]
pub(crate) async fn debug(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Subcommands: roles, echo, exit").await?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
struct RoleLine {
    position: i64,
    name: String,
    id: u64,
}

fn role_listing(mut roles: Vec<RoleLine>) -> String {
    roles.sort_by(|a, b| b.position.cmp(&a.position).then(a.id.cmp(&b.id)));

    let mut listing = String::from("Roles:\n");
    for role in roles {
        listing.push_str(&format!("{} {}: {}\n", role.position, role.name, role.id));
    }
    listing
}

/// Lists the server's roles, highest first.
#[poise::command(prefix_command, guild_only, check = "is_bot_mod")]
async fn roles(ctx: Context<'_>) -> Result<(), Error> {
    let guild = ctx.guild().ok_or::<Error>("roles only works inside a server".into())?;

    let lines = guild
        .roles
        .values()
        .map(|role| RoleLine {
            position: i64::from(role.position),
            name: role.name.clone(),
            id: role.id.0,
        })
        .collect();

    ctx.say(role_listing(lines)).await?;
    Ok(())
}

/// Repeats the given text.
#[poise::command(prefix_command, check = "is_bot_mod")]
async fn echo(
    ctx: Context<'_>,
    #[rest]
    #[description = "Text to repeat"]
    text: String,
) -> Result<(), Error> {
    ctx.say(text).await?;
    Ok(())
}

/// Disconnects the bot and ends the process.
#[poise::command(prefix_command, check = "is_bot_mod")]
async fn exit(ctx: Context<'_>) -> Result<(), Error> {
    info!("Shutdown requested by {}", ctx.author().name);
    ctx.say("Shutting down.").await?;
    ctx.framework()
        .shard_manager()
        .lock()
        .await
        .shutdown_all()
        .await;
    Ok(())
}

/// Shows this menu.
#[poise::command(prefix_command, track_edits)]
pub(crate) async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"] command: Option<String>,
) -> Result<(), Error> {
    let extra_text = format!(
        "\
suitebot version {}

Type {}help <command> for more info on a command.
You can edit your message to the bot and the bot will edit its response.",
        VERSION,
        ctx.data().prefix
    );
    let config = poise::builtins::HelpConfiguration {
        extra_text_at_bottom: &extra_text,
        ..Default::default()
    };
    poise::builtins::help(ctx, command.as_deref(), config).await?;
    Ok(())
}

pub(crate) async fn post_command(ctx: Context<'_>) {
    let data = ctx.data();
    status::refresh(ctx.serenity_context(), &data.prefix, data.started).await;
}

pub(crate) async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => panic!("Failed to start bot: {:?}", error),
        poise::FrameworkError::Command { error, ctx, .. } => {
            warn!("Error in command `{}`: {:?}", ctx.command().qualified_name, error);
            if let Err(e) = ctx.say(error.to_string()).await {
                error!("Could not report command error: {}", e);
            }
        }
        poise::FrameworkError::CommandCheckFailed { ctx, .. } => {
            let refusal = format!("{} is not a bot mod", ctx.author().name);
            if let Err(e) = ctx.say(refusal).await {
                error!("Could not report failed check: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e)
            }
        }
    }
}
