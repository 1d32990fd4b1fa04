use serde::{Deserialize, Serialize};

use super::{PostId, UserId};

/// Listing kind. Agreements can only be opened against `Lend` posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Lend,
    Borrow,
}

/// The only slice of a post the agreement state machine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: PostId,
    pub author_id: UserId,
    pub kind: PostKind,
}
