use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Amount, HoldBandId, ProductId, TaskId, UserId};

/// A review task assigned to a worker.
///
/// Lifecycle: created (`played = false`), presented (`pending = true`, funds
/// reserved for specials), terminal (`played = true`, kept as history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub user: UserId,
    pub products: Vec<ProductId>,
    pub amount: Amount,
    pub commission: Amount,
    pub commission_percentage: Amount,
    pub rating_no: String,
    /// Rank of the day this task represents (1-based).
    pub game_number: u32,
    pub special_product: bool,
    pub played: bool,
    pub pending: bool,
    pub is_active: bool,
    /// Band the amount of a special task was sized from.
    pub on_hold: Option<HoldBandId>,
    pub rating_score: Option<u8>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Album details embedded in the presentation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub image: String,
    pub price: Amount,
    pub rating_no: String,
}

/// What the worker sees when asking for their current task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    pub id: TaskId,
    pub products: Vec<ProductView>,
    pub amount: Amount,
    pub commission: Amount,
    pub commission_percentage: Amount,
    pub total_number_can_play: u32,
    pub current_number_count: u32,
    pub special_product: bool,
    pub created_at: DateTime<Utc>,
    pub rating_no: String,
    pub game_number: u32,
    pub pending: bool,
}

/// Play submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRequest {
    pub rating_score: u8,
    #[serde(default)]
    pub comment: String,
}
