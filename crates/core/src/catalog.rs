use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Amount, HoldBandId, ProductId};

/// A priced album available for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Amount,
    pub image_ref: String,
    /// Unique review code, auto-assigned on creation.
    pub rating_no: String,
    pub date_created: DateTime<Utc>,
}

/// Named `[min, max]` interval bounding the random slice added on top of a
/// worker's balance when sizing a special task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldBand {
    pub id: HoldBandId,
    pub min_amount: Amount,
    pub max_amount: Amount,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl HoldBand {
    pub fn is_well_formed(&self) -> bool {
        self.min_amount <= self.max_amount
    }
}

/// Eight-digit review code. Uniqueness is enforced by the store on insert.
pub fn generate_rating_code(rng: &mut impl Rng) -> String {
    format!("{:08}", rng.gen_range(0..100_000_000u32))
}
