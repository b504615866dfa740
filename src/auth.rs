use std::collections::HashSet;

use poise::serenity_prelude::UserId;

#[derive(Debug, Clone, Default)]
pub(crate) struct ModeratorPolicy {
    moderators: HashSet<UserId>,
}

impl ModeratorPolicy {
    pub(crate) fn new(moderators: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            moderators: moderators.into_iter().collect(),
        }
    }

    pub(crate) fn is_moderator(&self, user: UserId) -> bool {
        self.moderators.contains(&user)
    }

    pub(crate) fn len(&self) -> usize {
        self.moderators.len()
    }
}
