use std::collections::{HashMap, HashSet};

use poise::serenity_prelude::{Channel, ChannelId, ChannelType, Guild, Member, RoleId, UserId};

use crate::error::TeleportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MemberView {
    pub id: UserId,
    pub name: String,
    pub voice_channel: Option<ChannelId>,
    pub roles: Vec<RoleId>,
}

impl MemberView {
    pub(crate) fn new(member: &Member, voice_channel: Option<ChannelId>) -> Self {
        Self {
            id: member.user.id,
            name: member.user.name.clone(),
            voice_channel,
            roles: member.roles.clone(),
        }
    }

    fn in_voice(&self) -> bool {
        self.voice_channel.is_some()
    }

    fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Default)]
pub(crate) struct GuildView {
    pub members: Vec<MemberView>,
    pub voice_channels: HashMap<ChannelId, String>,
    pub afk_channel: Option<ChannelId>,
}

impl GuildView {
    pub(crate) fn from_guild(guild: &Guild) -> Self {
        let members = guild
            .members
            .values()
            .map(|member| MemberView::new(member, voice_channel_of(guild, member.user.id)))
            .collect();

        let voice_channels = guild
            .channels
            .values()
            .filter_map(|channel| match channel {
                Channel::Guild(channel)
                    if matches!(channel.kind, ChannelType::Voice | ChannelType::Stage) =>
                {
                    Some((channel.id, channel.name.clone()))
                }
                _ => None,
            })
            .collect();

        Self {
            members,
            voice_channels,
            afk_channel: guild.afk_channel_id,
        }
    }

    pub(crate) fn member(&self, id: UserId) -> Option<&MemberView> {
        self.members.iter().find(|member| member.id == id)
    }

    /// Adds a member fetched outside the cache. Known members are left alone.
    pub(crate) fn insert_member(&mut self, member: MemberView) {
        if self.member(member.id).is_none() {
            self.members.push(member);
        }
    }

    pub(crate) fn is_voice_channel(&self, id: ChannelId) -> bool {
        self.voice_channels.contains_key(&id)
    }
}

pub(crate) fn voice_channel_of(guild: &Guild, user: UserId) -> Option<ChannelId> {
    guild
        .voice_states
        .get(&user)
        .and_then(|state| state.channel_id)
}

pub(crate) struct TeleportRequest<'a> {
    pub remainder: &'a str,
    pub author: UserId,
    pub mentioned_users: &'a [UserId],
    pub mentioned_roles: &'a [RoleId],
    pub privileged: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct TeleportPlan {
    pub destination: ChannelId,
    pub destination_name: String,
    pub members: Vec<MemberView>,
}

pub(crate) fn tokens(remainder: &str) -> Vec<&str> {
    let remainder = remainder.trim();
    if remainder.is_empty() {
        return Vec::new();
    }
    remainder.split(' ').collect()
}

pub(crate) fn destination_token(remainder: &str) -> Option<&str> {
    tokens(remainder).last().copied()
}

type IdForm = fn(&str) -> Option<&str>;

// Tried in this order; the first form whose inner text parses wins.
const ID_FORMS: [IdForm; 3] = [role_mention, channel_or_user_mention, bare_id];

fn role_mention(token: &str) -> Option<&str> {
    token.strip_prefix("<@&")?.strip_suffix('>')
}

fn channel_or_user_mention(token: &str) -> Option<&str> {
    let inner = token.strip_suffix('>')?;
    inner
        .strip_prefix("<#")
        .or_else(|| inner.strip_prefix("<@!"))
        .or_else(|| inner.strip_prefix("<@"))
}

fn bare_id(token: &str) -> Option<&str> {
    Some(token)
}

pub(crate) fn parse_destination_id(token: &str) -> Option<u64> {
    ID_FORMS
        .iter()
        .find_map(|form| form(token)?.parse::<u64>().ok())
}

struct Destination<'a> {
    channel: ChannelId,
    channel_name: String,
    member: Option<&'a MemberView>,
}

fn resolve_destination(guild: &GuildView, id: u64) -> Result<Destination<'_>, TeleportError> {
    let member = guild.member(UserId(id));
    let channel = ChannelId(id);

    if let Some(name) = guild.voice_channels.get(&channel) {
        return Ok(Destination {
            channel,
            channel_name: name.clone(),
            member,
        });
    }

    let member = member.ok_or(TeleportError::NoDestination)?;
    let channel = member
        .voice_channel
        .ok_or_else(|| TeleportError::NotInVoice {
            name: member.name.clone(),
        })?;

    Ok(Destination {
        channel,
        channel_name: guild
            .voice_channels
            .get(&channel)
            .cloned()
            .unwrap_or_else(|| channel.0.to_string()),
        member: Some(member),
    })
}

// Deduplicated, not yet filtered against the destination.
pub(crate) fn select_candidates<'a>(
    guild: &'a GuildView,
    request: &TeleportRequest<'_>,
    token_count: usize,
    destination_member: Option<UserId>,
) -> Vec<&'a MemberView> {
    let mut candidates: Vec<&MemberView> = request
        .mentioned_users
        .iter()
        .filter_map(|id| guild.member(*id))
        .collect();

    let single_token = token_count == 1;
    if single_token {
        candidates.extend(guild.member(request.author));
    }

    if request.privileged {
        if single_token && destination_member.is_none() {
            candidates.extend(
                guild
                    .members
                    .iter()
                    .filter(|member| member.in_voice() && member.voice_channel != guild.afk_channel),
            );
        }

        for role in request.mentioned_roles {
            candidates.extend(
                guild
                    .members
                    .iter()
                    .filter(|member| member.in_voice() && member.has_role(*role)),
            );
        }
    }

    let mut seen = HashSet::new();
    candidates.retain(|member| seen.insert(member.id));
    candidates
}

pub(crate) fn plan(
    guild: &GuildView,
    request: &TeleportRequest<'_>,
) -> Result<TeleportPlan, TeleportError> {
    let tokens = tokens(request.remainder);
    let token = tokens.last().ok_or(TeleportError::EmptyArgument)?;
    let id = parse_destination_id(token).ok_or(TeleportError::IdNotFound)?;
    let destination = resolve_destination(guild, id)?;
    let destination_member = destination.member.map(|member| member.id);

    let members = select_candidates(guild, request, tokens.len(), destination_member)
        .into_iter()
        .filter(|member| Some(member.id) != destination_member)
        .filter(|member| guild.afk_channel.is_none() || member.voice_channel != guild.afk_channel)
        .filter(|member| member.voice_channel != Some(destination.channel))
        .cloned()
        .collect();

    Ok(TeleportPlan {
        destination: destination.channel,
        destination_name: destination.channel_name,
        members,
    })
}

pub(crate) fn summary(moved: usize, destination_name: &str) -> String {
    format!("Teleported {} users to {}", moved, destination_name)
}
