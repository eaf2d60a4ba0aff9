//! Toggle semantics for reactions and favorites.
//!
//! Repeating the same toggle removes the reaction instead of reapplying it,
//! so `like, like` ends with no reaction and `like, dislike` ends disliked.

use crate::model::{Id, post::PostMarker};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    pub post_id: Id<PostMarker>,
    pub liked: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub post_id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionState {
    #[default]
    None,
    Liked,
    Disliked,
}

/// The write that moves a stored reaction to its next state.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ReactionAction {
    Insert { liked: bool },
    Update { liked: bool },
    Delete,
}

impl ReactionState {
    /// State of a stored row: its `liked` column, or no row at all.
    #[must_use]
    pub fn from_stored(liked: Option<bool>) -> Self {
        match liked {
            None => ReactionState::None,
            Some(true) => ReactionState::Liked,
            Some(false) => ReactionState::Disliked,
        }
    }

    #[must_use]
    pub fn toggle(self, liked: bool) -> (ReactionAction, ReactionState) {
        match (self, liked) {
            (ReactionState::None, liked) => {
                (ReactionAction::Insert { liked }, Self::from_stored(Some(liked)))
            }
            (ReactionState::Liked, false) => (
                ReactionAction::Update { liked: false },
                ReactionState::Disliked,
            ),
            (ReactionState::Disliked, true) => {
                (ReactionAction::Update { liked: true }, ReactionState::Liked)
            }
            (ReactionState::Liked, true) | (ReactionState::Disliked, false) => {
                (ReactionAction::Delete, ReactionState::None)
            }
        }
    }

    /// The value reported as a post's `reaction` for its owner.
    #[must_use]
    pub fn sign(self) -> i64 {
        match self {
            ReactionState::None => 0,
            ReactionState::Liked => 1,
            ReactionState::Disliked => -1,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteState {
    #[default]
    NotFavorited,
    Favorited,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum FavoriteAction {
    Insert,
    Delete,
}

impl FavoriteState {
    #[must_use]
    pub fn toggle(self) -> (FavoriteAction, FavoriteState) {
        match self {
            FavoriteState::NotFavorited => (FavoriteAction::Insert, FavoriteState::Favorited),
            FavoriteState::Favorited => (FavoriteAction::Delete, FavoriteState::NotFavorited),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::reaction::{FavoriteAction, FavoriteState, ReactionAction, ReactionState};

    fn run(toggles: &[bool]) -> ReactionState {
        toggles
            .iter()
            .fold(ReactionState::None, |state, &liked| state.toggle(liked).1)
    }

    #[test]
    fn toggle_sequences() {
        assert_eq!(run(&[true]), ReactionState::Liked);
        assert_eq!(run(&[true, true]), ReactionState::None);
        assert_eq!(run(&[true, false]), ReactionState::Disliked);
        assert_eq!(run(&[false, false]), ReactionState::None);
        assert_eq!(run(&[false, true]), ReactionState::Liked);
        assert_eq!(run(&[true, true, true]), ReactionState::Liked);
    }

    #[test]
    fn toggle_actions() {
        assert_eq!(
            ReactionState::None.toggle(false).0,
            ReactionAction::Insert { liked: false }
        );
        assert_eq!(
            ReactionState::Liked.toggle(false).0,
            ReactionAction::Update { liked: false }
        );
        assert_eq!(
            ReactionState::Disliked.toggle(true).0,
            ReactionAction::Update { liked: true }
        );
        assert_eq!(ReactionState::Liked.toggle(true).0, ReactionAction::Delete);
        assert_eq!(
            ReactionState::Disliked.toggle(false).0,
            ReactionAction::Delete
        );
    }

    #[test]
    fn stored_state_and_sign() {
        assert_eq!(ReactionState::from_stored(None).sign(), 0);
        assert_eq!(ReactionState::from_stored(Some(true)).sign(), 1);
        assert_eq!(ReactionState::from_stored(Some(false)).sign(), -1);
    }

    #[test]
    fn favorite_is_binary() {
        let (action, state) = FavoriteState::NotFavorited.toggle();
        assert_eq!(action, FavoriteAction::Insert);
        assert_eq!(state, FavoriteState::Favorited);

        let (action, state) = state.toggle();
        assert_eq!(action, FavoriteAction::Delete);
        assert_eq!(state, FavoriteState::NotFavorited);
    }
}
