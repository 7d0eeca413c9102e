//! Task assignment and play engine.
//!
//! Decides what a worker sees next, enforces daily caps and sets, reserves
//! funds for special tasks and records review outcomes. Every operation is
//! one store write transaction; the referral bonus runs in a follow-up
//! transaction so a referrer lookup failure can never block the worker's
//! earnings.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::notify;
use crate::prelude::*;

pub struct Engine {
    store: Store,
}

/// Result of a play submission.
#[derive(Debug, Clone)]
pub struct PlayOutcome {
    pub task: TaskView,
    pub message: String,
    pub played: bool,
}

/// Everything an engine operation needs about one worker, loaded under the
/// operation's own write transaction.
struct Context {
    user: User,
    wallet: Wallet,
    pack: Pack,
    settings: Settings,
    clock: Clock,
}

impl Context {
    fn load(writer: &StoreWriter, user_id: UserId, now: DateTime<Utc>) -> Result<Self, Error> {
        let user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;

        let mut wallet = match writer.wallet(user_id)? {
            Some(wallet) => wallet,
            None => Wallet::new(user_id, now),
        };

        let packs = writer.packs_all()?;

        // reassign when unset or pointing at a deactivated tier
        let current = wallet.pack.and_then(|id| packs.iter().find(|p| p.id == id));
        let pack = match current {
            Some(pack) if pack.is_active => pack.clone(),
            _ => {
                let id = best_pack_for_balance(&packs, wallet.balance)
                    .ok_or_else(|| Error::conflict("no active membership packs configured"))?;
                wallet.pack = Some(id);
                packs
                    .iter()
                    .find(|p| p.id == id)
                    .cloned()
                    .expect("best_pack_for_balance returns a known pack")
            }
        };

        wallet.updated_at = now;
        writer.put_wallet(&wallet)?;

        let settings = writer.settings()?;
        let clock = Clock::from_name_or_default(&settings.timezone);

        Ok(Self {
            user,
            wallet,
            pack,
            settings,
            clock,
        })
    }
}

impl Engine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The task the worker should see right now, creating or reserving one
    /// if needed. Reservations persist even when the worker never plays.
    pub fn current_task(&self, user_id: UserId, now: DateTime<Utc>) -> Result<TaskView, Error> {
        let writer = self.store.start_writer()?;
        let mut ctx = Context::load(&writer, user_id, now)?;

        let task = self.select_or_assign(&writer, &mut ctx, now)?;
        let view = build_view(&writer, &ctx, &task)?;

        writer.commit()?;

        Ok(view)
    }

    /// Mark the current task as played with a rating and comment.
    pub fn play(
        &self,
        user_id: UserId,
        request: &PlayRequest,
        now: DateTime<Utc>,
    ) -> Result<PlayOutcome, Error> {
        if !(1..=5).contains(&request.rating_score) {
            return Err(Error::validation(
                "rating_score",
                "rating score must be between 1 and 5",
            ));
        }

        let writer = self.store.start_writer()?;
        let mut ctx = Context::load(&writer, user_id, now)?;

        let task = self.select_or_assign(&writer, &mut ctx, now)?;

        // a reservation made during selection must stick even when the
        // worker turns out to be ineligible
        if let Err(reason) = eligibility(&ctx) {
            writer.commit()?;
            return Err(reason);
        }

        let outcome = self.mark_played(&writer, &mut ctx, task, request, now)?;

        let view = build_view(&writer, &ctx, &outcome.0)?;
        writer.commit()?;

        let (task, message, played, earned) = outcome;

        if let Some(commission) = earned {
            self.propagate_referral(user_id, commission, now);
        }

        debug!(user = user_id, task = task.id, played, "play recorded");

        Ok(PlayOutcome {
            task: view,
            message,
            played,
        })
    }

    /// Selection priority: reserved special, fresh special at the current
    /// rank, pending regular, unplayed regular, then a fresh assignment.
    fn select_or_assign(
        &self,
        writer: &StoreWriter,
        ctx: &mut Context,
        now: DateTime<Utc>,
    ) -> Result<Task, Error> {
        let tasks = writer.tasks_for_user(ctx.user.id)?;

        if let Some(task) = tasks
            .iter()
            .find(|t| !t.played && t.pending && t.is_active && t.special_product)
        {
            return Ok(task.clone());
        }

        let target_rank = ctx.user.submissions_today + 1;

        let mut specials: Vec<&Task> = tasks
            .iter()
            .filter(|t| {
                !t.played && t.is_active && t.special_product && t.game_number == target_rank
            })
            .collect();
        specials.sort_by_key(|t| t.created_at);

        if let Some(special) = specials.first() {
            return self.reserve_special(writer, ctx, (*special).clone(), now);
        }

        if let Some(task) = tasks
            .iter()
            .find(|t| !t.played && t.pending && t.is_active && !t.special_product)
        {
            return Ok(task.clone());
        }

        if let Some(task) = tasks
            .iter()
            .find(|t| !t.played && t.is_active && !t.special_product)
        {
            let mut task = task.clone();
            task.pending = true;
            task.updated_at = now;
            writer.put_task(&task)?;
            return Ok(task);
        }

        self.assign_fresh(writer, ctx, now)
    }

    /// Size the special from the hold band and lock the funds: the amount is
    /// `balance + random slice`, which drives the balance negative by the
    /// slice and puts the whole amount on hold.
    fn reserve_special(
        &self,
        writer: &StoreWriter,
        ctx: &mut Context,
        mut task: Task,
        now: DateTime<Utc>,
    ) -> Result<Task, Error> {
        let band = match task.on_hold {
            Some(id) => writer.hold_band(id)?,
            None => None,
        };

        let Some(band) = band else {
            // band removed since injection; present the task unsized
            return Ok(task);
        };

        let slice = sample_band_slice(&band);
        task.amount = round2(ctx.wallet.balance + slice);
        // the rate was fixed at injection; the commission follows the
        // amount sized here, not the one estimated back then
        task.commission = apply_percentage(task.amount, task.commission_percentage);
        task.pending = true;
        task.updated_at = now;

        ctx.wallet
            .debit(task.amount)
            .map_err(|err| Error::conflict(format!("cannot reserve special task: {err}")))?;
        ctx.wallet.updated_at = now;

        writer.put_task(&task)?;
        writer.put_wallet(&ctx.wallet)?;

        Ok(task)
    }

    /// Create a fresh regular task from the albums the worker has not seen
    /// today, sized to their balance.
    fn assign_fresh(
        &self,
        writer: &StoreWriter,
        ctx: &mut Context,
        now: DateTime<Utc>,
    ) -> Result<Task, Error> {
        let (day_start, day_end) = ctx.clock.day_bounds_utc(now);

        let seen_today: HashSet<ProductId> = writer
            .tasks_for_user(ctx.user.id)?
            .iter()
            .filter(|t| t.is_active && t.created_at >= day_start && t.created_at < day_end)
            .flat_map(|t| t.products.iter().copied())
            .collect();

        let catalog = writer.products_all()?;
        let unseen: Vec<&Product> = catalog
            .iter()
            .filter(|p| !seen_today.contains(&p.id))
            .collect();

        let product = select_product_for_balance(&unseen, &catalog, ctx.wallet.balance)
            .ok_or_else(|| {
                Error::eligibility(
                    "No suitable albums available for your current balance. \
                     Please add funds to access more album options.",
                )
            })?;

        let commission_percentage = ctx.pack.profit_percentage;
        let amount = product.price;
        let commission = apply_percentage(amount, commission_percentage);

        let id = writer.next_id("tasks")?;
        let task = Task {
            id,
            user: ctx.user.id,
            products: vec![product.id],
            amount,
            commission,
            commission_percentage,
            rating_no: unique_rating_code(writer, id)?,
            game_number: ctx.user.submissions_today + 1,
            special_product: false,
            played: false,
            pending: true,
            is_active: true,
            on_hold: None,
            rating_score: None,
            comment: None,
            created_at: now,
            updated_at: now,
        };

        writer.put_task(&task)?;

        Ok(task)
    }

    /// Record the outcome. Returns the updated task, the caller message,
    /// whether it was actually played, and the commission to propagate to a
    /// referrer (None when the play did not complete).
    #[allow(clippy::type_complexity)]
    fn mark_played(
        &self,
        writer: &StoreWriter,
        ctx: &mut Context,
        mut task: Task,
        request: &PlayRequest,
        now: DateTime<Utc>,
    ) -> Result<(Task, String, bool, Option<Decimal>), Error> {
        let commission = task.commission;

        if task.pending {
            // funds for specials were reserved at presentation; only the
            // commission ledger moves now
            ctx.wallet.credit_commission(commission)?;
        } else if ctx.wallet.balance < task.amount && task.special_product {
            // unsized special straight to play: enter the reservation state
            task.pending = true;
            task.updated_at = now;
            writer.put_task(&task)?;

            ctx.wallet.debit(task.amount)?;
            ctx.wallet.updated_at = now;
            writer.put_wallet(&ctx.wallet)?;

            return Ok((
                task,
                "Insufficient balance to review this album.".into(),
                false,
                None,
            ));
        } else {
            // regular tasks earn commission without moving principal
            ctx.wallet.credit_commission(commission)?;
        }

        task.rating_score = Some(request.rating_score);
        task.comment = Some(request.comment.clone());
        task.played = true;
        task.pending = false;
        task.updated_at = now;
        writer.put_task(&task)?;

        // with more specials queued at this rank, the worker stays at the
        // same rank until the queue drains
        let more_specials_at_rank = task.special_product
            && writer.tasks_for_user(ctx.user.id)?.iter().any(|t| {
                t.id != task.id
                    && t.special_product
                    && !t.played
                    && t.is_active
                    && t.game_number == task.game_number
            });

        ctx.user.today_profit += commission;

        if !more_specials_at_rank {
            ctx.user.submissions_today += 1;

            if ctx.user.submissions_today >= ctx.pack.daily_missions {
                ctx.user.sets_today += 1;
                let set = ordinal(ctx.user.sets_today);

                notify::admin_notify(
                    writer,
                    "Worker Set Completed",
                    &format!(
                        "{} has completed all album reviews in the {set} set, \
                         you can proceed to reset the account",
                        ctx.user.username
                    ),
                    now,
                );

                if ctx.user.sets_today < ctx.pack.number_of_set {
                    notify::user_notify(
                        writer,
                        ctx.user.id,
                        "Album Review Set Completed",
                        &format!(
                            "Good job! The {set} set of album reviews has been completed. \
                             Kindly request the next set."
                        ),
                        now,
                    );
                } else {
                    notify::user_notify(
                        writer,
                        ctx.user.id,
                        "Album Review Set Completed",
                        &format!(
                            "Good job! You have completed all {} album review sets for today!",
                            ctx.user.sets_today
                        ),
                        now,
                    );
                    notify::admin_notify(
                        writer,
                        "Worker Set Completed",
                        &format!(
                            "{} has completed all {} album review sets for today",
                            ctx.user.username, ctx.user.sets_today
                        ),
                        now,
                    );
                }
            }
        }

        writer.put_user(&ctx.user)?;
        ctx.wallet.updated_at = now;
        writer.put_wallet(&ctx.wallet)?;

        Ok((
            task,
            "Album reviewed successfully!".into(),
            true,
            Some(commission),
        ))
    }

    /// Credit the referrer their share of the commission. Runs after the
    /// play transaction committed; any failure is logged and swallowed.
    fn propagate_referral(&self, user_id: UserId, commission: Decimal, now: DateTime<Utc>) {
        let attempt = || -> Result<(), Error> {
            let writer = self.store.start_writer()?;

            let Some(invitation) = writer.invitation_for(user_id)? else {
                return Ok(());
            };

            let Some(mut referrer) = writer.user(invitation.referrer)? else {
                return Ok(());
            };

            let Some(mut wallet) = writer.wallet(referrer.id)? else {
                warn!(referrer = referrer.id, "referrer has no wallet");
                return Ok(());
            };

            let settings = writer.settings()?;
            let bonus = apply_percentage(commission, settings.percentage_of_sponsors);

            wallet.credit(bonus)?;
            wallet.updated_at = now;
            referrer.current_referral_bonus += bonus;

            if referrer.current_referral_bonus >= Decimal::TEN {
                referrer.current_referral_bonus -= Decimal::TEN;
                notify::user_notify(
                    &writer,
                    referrer.id,
                    "Referral Bonus",
                    "You have received a total of 10 USD for referral bonus!",
                    now,
                );
            }

            writer.put_wallet(&wallet)?;
            writer.put_user(&referrer)?;
            writer.commit()?;

            Ok(())
        };

        if let Err(error) = attempt() {
            warn!(%error, user = user_id, "referral bonus propagation failed");
        }
    }
}

/// Whether the worker may submit a review right now.
fn eligibility(ctx: &Context) -> Result<(), Error> {
    if ctx.wallet.balance < Decimal::ZERO {
        return Err(Error::eligibility(
            "You have a negative balance, please add funds to proceed.",
        ));
    }

    if !ctx.user.is_min_balance_waived {
        let minimum = ctx
            .pack
            .minimum_balance_for_submissions
            .unwrap_or(ctx.settings.minimum_balance_for_submissions);

        if ctx.wallet.balance < minimum {
            return Err(Error::eligibility(format!(
                "You need a minimum of {minimum} USD balance for your current pack \
                 to review albums."
            )));
        }
    }

    if ctx.user.submissions_today >= ctx.pack.daily_missions {
        let set = ordinal(ctx.user.sets_today);

        if ctx.pack.number_of_set > ctx.user.sets_today {
            return Err(Error::eligibility(format!(
                "Good job! The {set} set of album reviews has been completed. \
                 Kindly request the next set."
            )));
        }

        return Err(Error::eligibility(format!(
            "Good job! You have completed all {} album review sets for today!",
            ctx.user.sets_today
        )));
    }

    Ok(())
}

fn build_view(writer: &StoreWriter, ctx: &Context, task: &Task) -> Result<TaskView, Error> {
    let mut products = Vec::with_capacity(task.products.len());

    for id in &task.products {
        if let Some(product) = writer.product(*id)? {
            products.push(ProductView {
                id: product.id,
                name: product.name,
                image: product.image_ref,
                price: product.price,
                rating_no: product.rating_no,
            });
        }
    }

    Ok(TaskView {
        id: task.id,
        products,
        amount: task.amount,
        commission: task.commission,
        commission_percentage: task.commission_percentage,
        total_number_can_play: ctx.pack.daily_missions,
        current_number_count: ctx.user.submissions_today,
        special_product: task.special_product,
        created_at: task.created_at,
        rating_no: task.rating_no.clone(),
        game_number: task.game_number,
        pending: task.pending,
    })
}

/// Random slice within the band, two-decimal rounded.
pub(crate) fn sample_band_slice(band: &HoldBand) -> Decimal {
    let min = band.min_amount.to_f64().unwrap_or(0.0);
    let max = band.max_amount.to_f64().unwrap_or(min);

    let raw = rand::thread_rng().gen_range(min..=max);

    Decimal::from_f64(raw).map(round2).unwrap_or(band.min_amount)
}

/// Rank the candidates into descending balance bands and pick uniformly from
/// the highest non-empty one. Falls back to the whole catalog when the
/// worker has seen every affordable album today.
fn select_product_for_balance<'a>(
    unseen: &[&'a Product],
    catalog: &'a [Product],
    balance: Decimal,
) -> Option<&'a Product> {
    const BANDS: [(f64, f64); 7] = [
        (0.8, 1.0),
        (0.6, 0.8),
        (0.4, 0.6),
        (0.2, 0.4),
        (0.1, 0.2),
        (0.05, 0.1),
        (0.01, 0.05),
    ];

    let mut rng = rand::thread_rng();

    let exact: Vec<&&Product> = unseen.iter().filter(|p| p.price == balance).collect();
    if let Some(product) = exact.choose(&mut rng) {
        return Some(**product);
    }

    for (lo, hi) in BANDS {
        let lo = balance * Decimal::from_f64(lo).unwrap_or_default();
        let hi = balance * Decimal::from_f64(hi).unwrap_or_default();

        let band: Vec<&&Product> = unseen
            .iter()
            .filter(|p| p.price >= lo && p.price < hi)
            .collect();

        if let Some(product) = band.choose(&mut rng) {
            return Some(**product);
        }
    }

    // every affordable album was reviewed today: repeat the priciest one
    // that still fits, or the cheapest in the catalog
    catalog
        .iter()
        .filter(|p| p.price <= balance)
        .max_by_key(|p| p.price)
        .or_else(|| catalog.iter().min_by_key(|p| p.price))
}

pub(crate) fn unique_rating_code(writer: &StoreWriter, owner: u64) -> Result<String, Error> {
    let mut rng = rand::thread_rng();

    for _ in 0..64 {
        let code = generate_rating_code(&mut rng);
        if writer.claim_rating_code(&code, owner)? {
            return Ok(code);
        }
    }

    Err(Error::server("could not allocate a unique rating code"))
}

/// 1 -> "1st", 2 -> "2nd", 11 -> "11th", 23 -> "23rd".
pub(crate) fn ordinal(number: u32) -> String {
    let suffix = if (10..=20).contains(&(number % 100)) {
        "th"
    } else {
        match number % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };

    format!("{number}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::dec;

    fn product(id: ProductId, price: Decimal) -> Product {
        Product {
            id,
            name: format!("album-{id}"),
            price,
            image_ref: String::new(),
            rating_no: format!("{id:08}"),
            date_created: Utc::now(),
        }
    }

    #[test]
    fn ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(112), "112th");
    }

    #[test]
    fn exact_balance_match_wins() {
        let catalog = vec![product(1, dec!(100)), product(2, dec!(85)), product(3, dec!(10))];
        let unseen: Vec<&Product> = catalog.iter().collect();

        let picked = select_product_for_balance(&unseen, &catalog, dec!(100)).unwrap();
        assert_eq!(picked.id, 1);
    }

    #[test]
    fn highest_band_beats_lower_bands() {
        let catalog = vec![product(1, dec!(85)), product(2, dec!(45)), product(3, dec!(12))];
        let unseen: Vec<&Product> = catalog.iter().collect();

        // 85 sits in [80, 100), the top band
        let picked = select_product_for_balance(&unseen, &catalog, dec!(100)).unwrap();
        assert_eq!(picked.id, 1);
    }

    #[test]
    fn falls_back_to_priciest_affordable_seen_album() {
        let catalog = vec![product(1, dec!(85)), product(2, dec!(45))];
        let unseen: Vec<&Product> = vec![]; // everything reviewed today

        let picked = select_product_for_balance(&unseen, &catalog, dec!(100)).unwrap();
        assert_eq!(picked.id, 1);
    }

    #[test]
    fn falls_back_to_cheapest_when_nothing_affordable() {
        let catalog = vec![product(1, dec!(85)), product(2, dec!(45))];
        let unseen: Vec<&Product> = vec![];

        let picked = select_product_for_balance(&unseen, &catalog, dec!(10)).unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn empty_catalog_selects_nothing() {
        assert!(select_product_for_balance(&[], &[], dec!(100)).is_none());
    }

    #[test]
    fn band_slice_stays_in_range() {
        let band = HoldBand {
            id: 1,
            min_amount: dec!(50),
            max_amount: dec!(75),
            is_active: true,
            created_at: Utc::now(),
        };

        for _ in 0..64 {
            let slice = sample_band_slice(&band);
            assert!(slice >= dec!(50) && slice <= dec!(75), "slice {slice}");
        }
    }

    #[test]
    fn degenerate_band_is_exact() {
        let band = HoldBand {
            id: 1,
            min_amount: dec!(50),
            max_amount: dec!(50),
            is_active: true,
            created_at: Utc::now(),
        };

        assert_eq!(sample_band_slice(&band), dec!(50));
    }
}
