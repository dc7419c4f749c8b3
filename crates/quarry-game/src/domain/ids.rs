//! Typed identifiers for every game entity.

use quarry_core::entity_id;

entity_id!(
    /// Identifies a [`Game`](super::game::Game).
    GameId => "game"
);
entity_id!(
    /// Identifies a [`Player`](super::player::Player).
    PlayerId => "player"
);
entity_id!(
    /// Identifies a [`Charactor`](super::charactor::Charactor).
    CharactorId => "charactor"
);
entity_id!(
    /// Identifies a [`Mission`](super::mission::Mission).
    MissionId => "mission"
);
entity_id!(
    /// Identifies a [`Submission`](super::submission::Submission).
    SubmissionId => "submission"
);
entity_id!(
    /// Identifies a [`Bounty`](super::bounty::Bounty).
    BountyId => "bounty"
);
entity_id!(
    /// Identifies a [`MissionStunt`](super::stunt::MissionStunt).
    StuntId => "mission_stunt"
);
entity_id!(
    /// Identifies an [`Event`](super::event::Event).
    EventId => "event"
);
