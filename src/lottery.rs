use poise::serenity_prelude::{
    self as serenity, GuildId, Http, Member, PermissionOverwrite, PermissionOverwriteType,
    Permissions, RoleId, UserId,
};
use rand::seq::SliceRandom;
use rand::Rng;
use strum_macros::{Display, EnumString};
use tracing::info;

use crate::config::LotteryConfig;
use crate::error::{Error, LotteryError};

const MEMBER_PAGE: u64 = 1000;
const AUDIT_REASON: &str = "Weekly role lottery";

/// Who the winner is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub(crate) enum DrawPool {
    #[default]
    #[strum(serialize = "all")]
    AllParticipants,
    #[strum(serialize = "exclude-holders")]
    ExcludeHolders,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entrant {
    pub id: UserId,
    pub name: String,
    pub roles: Vec<RoleId>,
}

impl From<&Member> for Entrant {
    fn from(member: &Member) -> Self {
        Self {
            id: member.user.id,
            name: member.user.name.clone(),
            roles: member.roles.clone(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct LotteryDraw {
    pub previous_holders: Vec<Entrant>,
    pub participants: Vec<Entrant>,
    pub pool: Vec<Entrant>,
    pub winner: Entrant,
}

pub(crate) fn draw<R: Rng + ?Sized>(
    entrants: &[Entrant],
    lottery_role: RoleId,
    winner_role: RoleId,
    draw_pool: DrawPool,
    rng: &mut R,
) -> Result<LotteryDraw, LotteryError> {
    let previous_holders: Vec<Entrant> = entrants
        .iter()
        .filter(|entrant| entrant.roles.contains(&winner_role))
        .cloned()
        .collect();

    let participants: Vec<Entrant> = entrants
        .iter()
        .filter(|entrant| entrant.roles.contains(&lottery_role))
        .cloned()
        .collect();

    let pool: Vec<Entrant> = participants
        .iter()
        .filter(|entrant| match draw_pool {
            DrawPool::AllParticipants => true,
            DrawPool::ExcludeHolders => !previous_holders.iter().any(|h| h.id == entrant.id),
        })
        .cloned()
        .collect();

    let winner = pool
        .choose(rng)
        .cloned()
        .ok_or(LotteryError::NoParticipants)?;

    Ok(LotteryDraw {
        previous_holders,
        participants,
        pool,
        winner,
    })
}

fn names(entrants: &[Entrant]) -> String {
    entrants
        .iter()
        .map(|entrant| entrant.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn announcement(draw: &LotteryDraw, role_name: &str) -> String {
    format!(
        "Lottery:\nTook away {}'s {}\nParticipants: {}\nThis week's winner is: {}!",
        names(&draw.previous_holders),
        role_name,
        names(&draw.participants),
        draw.winner.name
    )
}

pub(crate) fn suite_name(winner: &str) -> String {
    format!("{}'s Executive Suite", winner)
}

pub(crate) fn suite_overwrites(guild: GuildId, winner_role: RoleId) -> [PermissionOverwrite; 2] {
    let access = Permissions::CONNECT | Permissions::MOVE_MEMBERS;
    [
        PermissionOverwrite {
            allow: Permissions::empty(),
            deny: access,
            kind: PermissionOverwriteType::Role(RoleId(guild.0)),
        },
        PermissionOverwrite {
            allow: access,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Role(winner_role),
        },
    ]
}

async fn fetch_members(http: &Http, guild: GuildId) -> Result<Vec<Member>, serenity::Error> {
    let mut members = Vec::new();
    let mut after: Option<UserId> = None;

    loop {
        let page = guild.members(http, Some(MEMBER_PAGE), after).await?;
        let fetched = page.len() as u64;
        after = page.last().map(|member| member.user.id);
        members.extend(page);

        if fetched < MEMBER_PAGE {
            break;
        }
    }

    Ok(members)
}

/// Performs one lottery round. Any failed request ends the round.
pub(crate) async fn run(http: &Http, config: &LotteryConfig) -> Result<(), Error> {
    let guild = config.guild;

    let roles = guild.roles(http).await?;
    if !roles.contains_key(&config.lottery_role) {
        return Err(LotteryError::UnknownRole(config.lottery_role.0).into());
    }
    let role_name = roles
        .get(&config.winner_role)
        .map(|role| role.name.clone())
        .ok_or(LotteryError::UnknownRole(config.winner_role.0))?;

    let entrants: Vec<Entrant> = fetch_members(http, guild)
        .await?
        .iter()
        .map(Entrant::from)
        .collect();
    info!("Fetched {} members of guild {}", entrants.len(), guild);

    let draw = draw(
        &entrants,
        config.lottery_role,
        config.winner_role,
        config.draw_pool,
        &mut rand::thread_rng(),
    )?;
    info!(
        "Drew {} from a pool of {} ({} participants, draw pool {})",
        draw.winner.name,
        draw.pool.len(),
        draw.participants.len(),
        config.draw_pool
    );

    for holder in &draw.previous_holders {
        info!("Taking {} from {}", role_name, holder.name);
        http.remove_member_role(guild.0, holder.id.0, config.winner_role.0, Some(AUDIT_REASON))
            .await?;
    }

    info!("Giving {} to {}", role_name, draw.winner.name);
    http.add_member_role(guild.0, draw.winner.id.0, config.winner_role.0, Some(AUDIT_REASON))
        .await?;

    reset_suite(http, config, &draw.winner.name).await?;

    config
        .announce_channel
        .say(http, announcement(&draw, &role_name))
        .await?;
    info!("Lottery announced in channel {}", config.announce_channel);

    Ok(())
}

async fn reset_suite(http: &Http, config: &LotteryConfig, winner: &str) -> Result<(), Error> {
    let suite = config.suite_channel;
    let channel = suite
        .to_channel(http)
        .await?
        .guild()
        .ok_or(LotteryError::NotAGuildChannel(suite.0))?;

    // Permissions go back to whatever the parent category grants.
    let inherited = match channel.parent_id {
        Some(parent) => parent
            .to_channel(http)
            .await?
            .category()
            .map(|category| category.permission_overwrites)
            .unwrap_or_default(),
        None => Vec::new(),
    };

    let name = suite_name(winner);
    info!("Renaming suite {} to {:?}", suite, name);
    suite
        .edit(http, |c| {
            c.name(&name)
                .bitrate(config.suite_bitrate)
                .permissions(inherited)
        })
        .await?;

    for overwrite in suite_overwrites(config.guild, config.winner_role) {
        suite.create_permission(http, &overwrite).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const LOTTERY: RoleId = RoleId(411);
    const WINNER: RoleId = RoleId(335);

    fn entrant(id: u64, name: &str, roles: &[RoleId]) -> Entrant {
        Entrant {
            id: UserId(id),
            name: name.to_string(),
            roles: roles.to_vec(),
        }
    }

    fn abc_with_b_holding() -> Vec<Entrant> {
        vec![
            entrant(1, "A", &[LOTTERY]),
            entrant(2, "B", &[LOTTERY, WINNER]),
            entrant(3, "C", &[LOTTERY]),
            entrant(4, "D", &[]),
        ]
    }

    #[test]
    fn holder_always_loses_and_anyone_can_win() {
        let entrants = abc_with_b_holding();
        let mut winners = Vec::new();

        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let draw = draw(&entrants, LOTTERY, WINNER, DrawPool::AllParticipants, &mut rng)
                .unwrap();

            assert_eq!(draw.previous_holders, vec![entrant(2, "B", &[LOTTERY, WINNER])]);
            assert_eq!(draw.pool.len(), 3);
            assert!(["A", "B", "C"].contains(&draw.winner.name.as_str()));
            winners.push(draw.winner.id);
        }

        // D never entered
        assert!(!winners.contains(&UserId(4)));
    }

    #[test]
    fn excluding_holders_never_redraws_them() {
        let entrants = abc_with_b_holding();

        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let draw =
                draw(&entrants, LOTTERY, WINNER, DrawPool::ExcludeHolders, &mut rng).unwrap();

            assert_eq!(draw.previous_holders.len(), 1);
            assert_eq!(draw.participants.len(), 3);
            assert_eq!(draw.pool.len(), 2);
            assert_ne!(draw.winner.name, "B");
        }
    }

    #[test]
    fn excluded_holder_is_still_announced_as_participant() {
        let entrants = abc_with_b_holding();
        let mut rng = StdRng::seed_from_u64(7);

        let draw = draw(&entrants, LOTTERY, WINNER, DrawPool::ExcludeHolders, &mut rng).unwrap();
        let text = announcement(&draw, "Executive");

        assert!(text.contains("Took away B's Executive\n"));
        assert!(text.contains("\nParticipants: A, B, C\n"));
        assert!(!text.ends_with("winner is: B!"));
    }

    #[test]
    fn no_participants_is_an_error() {
        let entrants = vec![entrant(1, "A", &[]), entrant(2, "B", &[WINNER])];
        let mut rng = StdRng::seed_from_u64(1);

        let err = draw(&entrants, LOTTERY, WINNER, DrawPool::AllParticipants, &mut rng)
            .unwrap_err();

        assert_eq!(err, LotteryError::NoParticipants);
    }

    #[test]
    fn only_holder_participating_leaves_empty_pool_when_excluded() {
        let entrants = vec![entrant(2, "B", &[LOTTERY, WINNER])];
        let mut rng = StdRng::seed_from_u64(1);

        assert!(draw(&entrants, LOTTERY, WINNER, DrawPool::ExcludeHolders, &mut rng).is_err());
        assert!(draw(&entrants, LOTTERY, WINNER, DrawPool::AllParticipants, &mut rng).is_ok());
    }

    #[test]
    fn announcement_text() {
        let draw = LotteryDraw {
            previous_holders: vec![entrant(2, "B", &[])],
            participants: vec![entrant(1, "A", &[]), entrant(2, "B", &[]), entrant(3, "C", &[])],
            pool: vec![entrant(1, "A", &[]), entrant(3, "C", &[])],
            winner: entrant(3, "C", &[]),
        };

        assert_eq!(
            announcement(&draw, "Executive"),
            "Lottery:\nTook away B's Executive\nParticipants: A, B, C\nThis week's winner is: C!"
        );
    }

    #[test]
    fn suite_is_named_after_winner() {
        assert_eq!(suite_name("C"), "C's Executive Suite");
    }

    #[test]
    fn suite_is_closed_to_everyone_but_winners() {
        let [everyone, winner] = suite_overwrites(GuildId(259), WINNER);
        let access = Permissions::CONNECT | Permissions::MOVE_MEMBERS;

        assert!(matches!(everyone.kind, PermissionOverwriteType::Role(RoleId(259))));
        assert_eq!(everyone.deny, access);
        assert!(everyone.allow.is_empty());

        assert!(matches!(winner.kind, PermissionOverwriteType::Role(WINNER)));
        assert_eq!(winner.allow, access);
        assert!(winner.deny.is_empty());
    }

    #[test]
    fn draw_pool_names() {
        assert_eq!("all".parse::<DrawPool>().unwrap(), DrawPool::AllParticipants);
        assert_eq!(
            "exclude-holders".parse::<DrawPool>().unwrap(),
            DrawPool::ExcludeHolders
        );
        assert_eq!(DrawPool::ExcludeHolders.to_string(), "exclude-holders");
    }
}
