use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Amount, PackId};

/// Membership tier. Determines daily limits, commission percentages and the
/// minimum balance required to submit reviews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pack {
    pub id: PackId,
    pub name: String,
    pub usd_value: Amount,
    pub daily_missions: u32,
    pub number_of_set: u32,
    pub profit_percentage: Amount,
    pub special_product_percentage: Amount,
    /// `None` on legacy tiers; the site-wide fallback applies then.
    pub minimum_balance_for_submissions: Option<Amount>,
    pub payment_limit_to_trigger_bonus: Amount,
    pub payment_bonus: Amount,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pack {
    /// Commission percentage applied to special tasks. Packs created before
    /// the dedicated field existed fall back to five times the regular rate.
    pub fn special_rate(&self) -> Amount {
        if self.special_product_percentage > Decimal::ZERO {
            self.special_product_percentage
        } else {
            self.profit_percentage * Decimal::from(5)
        }
    }
}

/// Pick the pack a wallet with the given balance belongs to: the active pack
/// with the greatest `usd_value` not exceeding the balance, falling back to
/// the cheapest active pack.
pub fn best_pack_for_balance(packs: &[Pack], balance: Amount) -> Option<PackId> {
    let mut active: Vec<&Pack> = packs.iter().filter(|p| p.is_active).collect();
    active.sort_by(|a, b| b.usd_value.cmp(&a.usd_value));

    if let Some(pack) = active.iter().find(|p| balance >= p.usd_value) {
        return Some(pack.id);
    }

    active.last().map(|p| p.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    fn pack(id: PackId, usd_value: Decimal, is_active: bool) -> Pack {
        Pack {
            id,
            name: format!("tier-{id}"),
            usd_value,
            daily_missions: 5,
            number_of_set: 2,
            profit_percentage: dec!(0.5),
            special_product_percentage: dec!(2.5),
            minimum_balance_for_submissions: Some(dec!(50)),
            payment_limit_to_trigger_bonus: dec!(0),
            payment_bonus: dec!(0),
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn picks_greatest_tier_within_balance() {
        let packs = vec![
            pack(1, dec!(100), true),
            pack(2, dec!(500), true),
            pack(3, dec!(1000), true),
        ];

        assert_eq!(best_pack_for_balance(&packs, dec!(600)), Some(2));
        assert_eq!(best_pack_for_balance(&packs, dec!(1000)), Some(3));
    }

    #[test]
    fn falls_back_to_cheapest_active() {
        let packs = vec![pack(1, dec!(100), true), pack(2, dec!(500), true)];

        assert_eq!(best_pack_for_balance(&packs, dec!(20)), Some(1));
    }

    #[test]
    fn ignores_inactive_packs() {
        let packs = vec![pack(1, dec!(100), false), pack(2, dec!(500), true)];

        assert_eq!(best_pack_for_balance(&packs, dec!(600)), Some(2));
        assert_eq!(best_pack_for_balance(&packs, dec!(20)), Some(2));
    }

    #[test]
    fn no_active_packs_means_none() {
        let packs = vec![pack(1, dec!(100), false)];

        assert_eq!(best_pack_for_balance(&packs, dec!(600)), None);
    }

    #[test]
    fn special_rate_falls_back_to_five_times_profit() {
        let mut p = pack(1, dec!(100), true);
        assert_eq!(p.special_rate(), dec!(2.5));

        p.special_product_percentage = Decimal::ZERO;
        assert_eq!(p.special_rate(), dec!(2.5));

        p.profit_percentage = dec!(1.0);
        assert_eq!(p.special_rate(), dec!(5.0));
    }
}
