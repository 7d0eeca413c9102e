//! Administrator mutations over wallets, accounts and the catalog.
//!
//! Every wallet or account mutation re-verifies the acting administrator's
//! transactional password and appends an audit-log entry. Audit or inbox
//! append failures never abort the mutation itself.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::notify;
use crate::prelude::*;

pub struct AdminOps {
    store: Store,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackSpec {
    pub name: String,
    pub usd_value: Amount,
    pub daily_missions: u32,
    pub number_of_set: u32,
    pub profit_percentage: Amount,
    pub special_product_percentage: Amount,
    pub minimum_balance_for_submissions: Option<Amount>,
    #[serde(default)]
    pub payment_limit_to_trigger_bonus: Amount,
    #[serde(default)]
    pub payment_bonus: Amount,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductSpec {
    pub name: String,
    pub price: Amount,
    #[serde(default)]
    pub image_ref: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoldBandSpec {
    pub min_amount: Amount,
    pub max_amount: Amount,
    pub is_active: bool,
}

impl AdminOps {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Re-verify the acting admin's transactional password.
    fn authorize(
        &self,
        writer: &StoreWriter,
        actor: UserId,
        admin_password: &str,
    ) -> Result<User, Error> {
        let admin = writer.user(actor)?.ok_or(Error::NotFound("user"))?;

        if !verify_secret(admin_password, &admin.transactional_password_hash) {
            return Err(Error::validation(
                "admin_password",
                "invalid transactional password",
            ));
        }

        Ok(admin)
    }

    /// Credit an adjustment onto the worker's balance. Clears negatives and
    /// merges any outstanding hold, like any other deposit.
    pub fn set_balance(
        &self,
        actor: UserId,
        admin_password: &str,
        user_id: UserId,
        amount: Amount,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Wallet, Error> {
        let writer = self.store.start_writer()?;
        self.authorize(&writer, actor, admin_password)?;

        let user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        let mut wallet = self.wallet_or_new(&writer, user_id, now)?;

        wallet.credit(amount)?;
        wallet.updated_at = now;
        writer.put_wallet(&wallet)?;

        notify::user_notify(
            &writer,
            user_id,
            "Admin Update",
            &format!(
                "Your balance has been updated with {amount} USD, new balance {} USD",
                wallet.balance
            ),
            now,
        );
        notify::admin_log(
            &writer,
            Some(actor),
            &format!(
                "Adjusted balance for worker {} by {amount} USD. Reason: {reason}",
                user.username
            ),
            now,
        );

        writer.commit()?;
        Ok(wallet)
    }

    /// Set today's profit outright; the commission ledger moves by the
    /// delta.
    pub fn set_today_profit(
        &self,
        actor: UserId,
        admin_password: &str,
        user_id: UserId,
        profit: Amount,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Wallet, Error> {
        let writer = self.store.start_writer()?;
        self.authorize(&writer, actor, admin_password)?;

        let mut user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        let mut wallet = self.wallet_or_new(&writer, user_id, now)?;

        let diff = profit - user.today_profit;
        user.today_profit = profit;

        if diff >= Decimal::ZERO {
            wallet.credit_commission(diff)?;
        } else {
            wallet.debit_commission(-diff)?;
        }

        wallet.updated_at = now;
        writer.put_user(&user)?;
        writer.put_wallet(&wallet)?;

        notify::admin_log(
            &writer,
            Some(actor),
            &format!(
                "Updated today_profit for worker {} to {profit} USD. Reason: {reason}",
                user.username
            ),
            now,
        );

        writer.commit()?;
        Ok(wallet)
    }

    /// Set the salary outright; the balance moves by the delta. A decrease
    /// subtracts directly and never creates a hold.
    pub fn set_salary(
        &self,
        actor: UserId,
        admin_password: &str,
        user_id: UserId,
        salary: Amount,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Wallet, Error> {
        let writer = self.store.start_writer()?;
        self.authorize(&writer, actor, admin_password)?;

        let user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        let mut wallet = self.wallet_or_new(&writer, user_id, now)?;

        let diff = salary - wallet.salary;
        wallet.salary = salary;

        if diff >= Decimal::ZERO {
            wallet.credit(diff)?;
        } else {
            wallet.balance += diff;
        }

        wallet.updated_at = now;
        writer.put_wallet(&wallet)?;

        notify::user_notify(
            &writer,
            user_id,
            "Admin Update",
            &format!(
                "Your salary has been updated with {diff} USD, new balance {} USD",
                wallet.balance
            ),
            now,
        );
        notify::admin_log(
            &writer,
            Some(actor),
            &format!(
                "Updated salary for worker {} to {salary} USD. Reason: {reason}",
                user.username
            ),
            now,
        );

        writer.commit()?;
        Ok(wallet)
    }

    /// Credit or withdraw the registration bonus, flipping the flag.
    pub fn toggle_reg_bonus(
        &self,
        actor: UserId,
        admin_password: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<User, Error> {
        let writer = self.store.start_writer()?;
        self.authorize(&writer, actor, admin_password)?;

        let mut user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        let mut wallet = self.wallet_or_new(&writer, user_id, now)?;

        if user.is_reg_bonus_credited {
            wallet.balance -= user.reg_bonus_amount;
            user.is_reg_bonus_credited = false;
        } else {
            wallet.credit(user.reg_bonus_amount)?;
            user.is_reg_bonus_credited = true;
        }

        wallet.updated_at = now;
        writer.put_user(&user)?;
        writer.put_wallet(&wallet)?;

        let action = if user.is_reg_bonus_credited {
            "Added"
        } else {
            "Removed"
        };
        notify::admin_log(
            &writer,
            Some(actor),
            &format!("{action} registration bonus for worker {}", user.username),
            now,
        );

        writer.commit()?;
        Ok(user)
    }

    pub fn set_credit_score(
        &self,
        actor: UserId,
        admin_password: &str,
        user_id: UserId,
        score: Amount,
        now: DateTime<Utc>,
    ) -> Result<Wallet, Error> {
        if score < Decimal::ZERO || score > Decimal::ONE_HUNDRED {
            return Err(Error::validation(
                "credit_score",
                "credit score must be between 0 and 100",
            ));
        }

        let writer = self.store.start_writer()?;
        self.authorize(&writer, actor, admin_password)?;

        let user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        let mut wallet = self.wallet_or_new(&writer, user_id, now)?;

        wallet.credit_score = score;
        wallet.updated_at = now;
        writer.put_wallet(&wallet)?;

        notify::user_notify(
            &writer,
            user_id,
            "Admin Update",
            &format!("Your credit score has been updated to {score}%"),
            now,
        );
        notify::admin_log(
            &writer,
            Some(actor),
            &format!(
                "Updated credit score for worker {} to {score}%",
                user.username
            ),
            now,
        );

        writer.commit()?;
        Ok(wallet)
    }

    /// Manually pin a worker to a pack. The pack must exist and be active.
    pub fn set_pack(
        &self,
        actor: UserId,
        admin_password: &str,
        user_id: UserId,
        pack_id: PackId,
        now: DateTime<Utc>,
    ) -> Result<Wallet, Error> {
        let writer = self.store.start_writer()?;
        self.authorize(&writer, actor, admin_password)?;

        let user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        let pack = writer.pack(pack_id)?.ok_or_else(|| {
            Error::validation("pack_id", "selected pack does not exist")
        })?;

        if !pack.is_active {
            return Err(Error::validation(
                "pack_id",
                "selected pack is inactive, please choose an active pack",
            ));
        }

        let mut wallet = self.wallet_or_new(&writer, user_id, now)?;
        wallet.pack = Some(pack.id);
        wallet.updated_at = now;
        writer.put_wallet(&wallet)?;

        notify::user_notify(
            &writer,
            user_id,
            "Package Updated",
            &format!("Your membership pack has been set to {}.", pack.name),
            now,
        );
        notify::admin_log(
            &writer,
            Some(actor),
            &format!(
                "Manually set pack for worker {} to {}",
                user.username, pack.name
            ),
            now,
        );

        writer.commit()?;
        Ok(wallet)
    }

    /// Reset the daily counters, optionally to explicit values bounded by
    /// the pack limits.
    pub fn reset_account(
        &self,
        actor: UserId,
        admin_password: &str,
        user_id: UserId,
        submissions: Option<u32>,
        sets: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<User, Error> {
        let writer = self.store.start_writer()?;
        self.authorize(&writer, actor, admin_password)?;

        let mut user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        let wallet = self.wallet_or_new(&writer, user_id, now)?;

        let pack = wallet
            .pack
            .map(|id| writer.pack(id))
            .transpose()?
            .flatten()
            .ok_or_else(|| Error::conflict("worker does not have a valid pack assigned"))?;

        if let Some(submissions) = submissions {
            if submissions > pack.daily_missions {
                return Err(Error::validation(
                    "submission_count",
                    format!(
                        "submission count cannot exceed the pack daily missions limit ({})",
                        pack.daily_missions
                    ),
                ));
            }
            user.submissions_today = submissions;
        } else {
            user.submissions_today = 0;
        }

        if let Some(sets) = sets {
            if sets > pack.number_of_set {
                return Err(Error::validation(
                    "set_count",
                    format!(
                        "set count cannot exceed the pack number of sets limit ({})",
                        pack.number_of_set
                    ),
                ));
            }
            user.sets_today = sets;
        } else if user.sets_today >= pack.number_of_set {
            user.sets_today = 0;
        }

        writer.put_user(&user)?;

        notify::user_notify(
            &writer,
            user_id,
            "Account Reset",
            "Your account has been successfully reset, proceed to make your submissions",
            now,
        );
        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Reset account counters for worker {}", user.username),
            now,
        );

        writer.commit()?;
        Ok(user)
    }

    pub fn toggle_min_balance_waiver(
        &self,
        actor: UserId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<User, Error> {
        let writer = self.store.start_writer()?;

        let mut user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        user.is_min_balance_waived = !user.is_min_balance_waived;
        writer.put_user(&user)?;

        let state = if user.is_min_balance_waived {
            "Disabled"
        } else {
            "Enabled"
        };
        notify::user_notify(
            &writer,
            user_id,
            "Admin Update",
            &format!("Minimum balance for submissions has been {}", state.to_lowercase()),
            now,
        );
        notify::admin_log(
            &writer,
            Some(actor),
            &format!(
                "{state} minimum-balance requirement for worker {}",
                user.username
            ),
            now,
        );

        writer.commit()?;
        Ok(user)
    }

    pub fn toggle_active(
        &self,
        actor: UserId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<User, Error> {
        let writer = self.store.start_writer()?;

        let mut user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        user.is_active = !user.is_active;
        writer.put_user(&user)?;

        let state = if user.is_active { "Activated" } else { "Deactivated" };
        notify::admin_log(
            &writer,
            Some(actor),
            &format!("{state} worker {}", user.username),
            now,
        );

        writer.commit()?;
        Ok(user)
    }

    pub fn set_login_password(
        &self,
        actor: UserId,
        user_id: UserId,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        if password.is_empty() {
            return Err(Error::validation("password", "this field is required"));
        }

        let writer = self.store.start_writer()?;

        let mut user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        user.password_hash = hash_secret(password)?;
        writer.put_user(&user)?;

        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Updated login password for worker {}", user.username),
            now,
        );

        writer.commit()?;
        Ok(())
    }

    pub fn set_transactional_password(
        &self,
        actor: UserId,
        user_id: UserId,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        if password.chars().count() != 4 {
            return Err(Error::validation(
                "password",
                "the transactional password must be exactly 4 characters long",
            ));
        }

        let writer = self.store.start_writer()?;

        let mut user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;
        user.transactional_password_hash = hash_secret(password)?;
        writer.put_user(&user)?;

        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Updated transactional password for worker {}", user.username),
            now,
        );

        writer.commit()?;
        Ok(())
    }

    // catalog management

    pub fn create_pack(
        &self,
        actor: UserId,
        spec: &PackSpec,
        now: DateTime<Utc>,
    ) -> Result<Pack, Error> {
        validate_pack(spec)?;

        let writer = self.store.start_writer()?;

        let pack = Pack {
            id: writer.next_id("packs")?,
            name: spec.name.clone(),
            usd_value: spec.usd_value,
            daily_missions: spec.daily_missions,
            number_of_set: spec.number_of_set,
            profit_percentage: spec.profit_percentage,
            special_product_percentage: spec.special_product_percentage,
            minimum_balance_for_submissions: spec.minimum_balance_for_submissions,
            payment_limit_to_trigger_bonus: spec.payment_limit_to_trigger_bonus,
            payment_bonus: spec.payment_bonus,
            is_active: spec.is_active,
            created_at: now,
            updated_at: now,
        };

        writer.put_pack(&pack)?;
        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Created pack {}", pack.name),
            now,
        );
        writer.commit()?;

        Ok(pack)
    }

    /// Update a pack in place. Deactivating it reassigns every wallet that
    /// referenced it.
    pub fn update_pack(
        &self,
        actor: UserId,
        pack_id: PackId,
        spec: &PackSpec,
        now: DateTime<Utc>,
    ) -> Result<Pack, Error> {
        validate_pack(spec)?;

        let writer = self.store.start_writer()?;

        let mut pack = writer.pack(pack_id)?.ok_or(Error::NotFound("pack"))?;
        pack.name = spec.name.clone();
        pack.usd_value = spec.usd_value;
        pack.daily_missions = spec.daily_missions;
        pack.number_of_set = spec.number_of_set;
        pack.profit_percentage = spec.profit_percentage;
        pack.special_product_percentage = spec.special_product_percentage;
        pack.minimum_balance_for_submissions = spec.minimum_balance_for_submissions;
        pack.payment_limit_to_trigger_bonus = spec.payment_limit_to_trigger_bonus;
        pack.payment_bonus = spec.payment_bonus;
        pack.is_active = spec.is_active;
        pack.updated_at = now;
        writer.put_pack(&pack)?;

        if !pack.is_active {
            reassign_wallets(&writer, now)?;
        }

        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Updated pack {}", pack.name),
            now,
        );
        writer.commit()?;

        Ok(pack)
    }

    pub fn delete_pack(&self, actor: UserId, pack_id: PackId, now: DateTime<Utc>) -> Result<(), Error> {
        let writer = self.store.start_writer()?;

        let pack = writer.pack(pack_id)?.ok_or(Error::NotFound("pack"))?;
        writer.delete_pack(pack_id)?;

        reassign_wallets(&writer, now)?;

        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Deleted pack {}", pack.name),
            now,
        );
        writer.commit()?;

        Ok(())
    }

    pub fn create_product(
        &self,
        actor: UserId,
        spec: &ProductSpec,
        now: DateTime<Utc>,
    ) -> Result<Product, Error> {
        if spec.price <= Decimal::ZERO {
            return Err(Error::validation("price", "price must be greater than 0"));
        }

        let writer = self.store.start_writer()?;

        let id = writer.next_id("products")?;
        let product = Product {
            id,
            name: spec.name.clone(),
            price: spec.price,
            image_ref: spec.image_ref.clone(),
            rating_no: crate::engine::unique_rating_code(&writer, id)?,
            date_created: now,
        };

        writer.put_product(&product)?;
        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Created album {}", product.name),
            now,
        );
        writer.commit()?;

        Ok(product)
    }

    pub fn update_product(
        &self,
        actor: UserId,
        product_id: ProductId,
        spec: &ProductSpec,
        now: DateTime<Utc>,
    ) -> Result<Product, Error> {
        if spec.price <= Decimal::ZERO {
            return Err(Error::validation("price", "price must be greater than 0"));
        }

        let writer = self.store.start_writer()?;

        let mut product = writer.product(product_id)?.ok_or(Error::NotFound("product"))?;
        product.name = spec.name.clone();
        product.price = spec.price;
        product.image_ref = spec.image_ref.clone();
        writer.put_product(&product)?;

        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Updated album {}", product.name),
            now,
        );
        writer.commit()?;

        Ok(product)
    }

    pub fn delete_product(
        &self,
        actor: UserId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let writer = self.store.start_writer()?;

        let product = writer.product(product_id)?.ok_or(Error::NotFound("product"))?;
        writer.delete_product(product_id)?;

        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Deleted album {}", product.name),
            now,
        );
        writer.commit()?;

        Ok(())
    }

    pub fn create_hold_band(
        &self,
        actor: UserId,
        spec: &HoldBandSpec,
        now: DateTime<Utc>,
    ) -> Result<HoldBand, Error> {
        if spec.min_amount > spec.max_amount {
            return Err(Error::validation(
                "min_amount",
                "minimum must not exceed maximum",
            ));
        }

        let writer = self.store.start_writer()?;

        let band = HoldBand {
            id: writer.next_id("hold_bands")?,
            min_amount: spec.min_amount,
            max_amount: spec.max_amount,
            is_active: spec.is_active,
            created_at: now,
        };

        writer.put_hold_band(&band)?;
        notify::admin_log(
            &writer,
            Some(actor),
            &format!(
                "Created hold range {} - {}",
                band.min_amount, band.max_amount
            ),
            now,
        );
        writer.commit()?;

        Ok(band)
    }

    pub fn delete_hold_band(
        &self,
        actor: UserId,
        band_id: HoldBandId,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let writer = self.store.start_writer()?;

        let band = writer.hold_band(band_id)?.ok_or(Error::NotFound("hold band"))?;
        writer.delete_hold_band(band_id)?;

        notify::admin_log(
            &writer,
            Some(actor),
            &format!(
                "Deleted hold range {} - {}",
                band.min_amount, band.max_amount
            ),
            now,
        );
        writer.commit()?;

        Ok(())
    }

    pub fn update_settings(
        &self,
        actor: UserId,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let writer = self.store.start_writer()?;

        writer.put_settings(settings)?;
        notify::admin_log(&writer, Some(actor), "Updated site settings", now);
        writer.commit()?;

        Ok(())
    }

    fn wallet_or_new(
        &self,
        writer: &StoreWriter,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Wallet, Error> {
        match writer.wallet(user_id)? {
            Some(wallet) => Ok(wallet),
            None => {
                let packs = writer.packs_all()?;
                let mut wallet = Wallet::new(user_id, now);
                wallet.pack = best_pack_for_balance(&packs, wallet.balance);
                writer.put_wallet(&wallet)?;
                Ok(wallet)
            }
        }
    }
}

fn validate_pack(spec: &PackSpec) -> Result<(), Error> {
    if spec.name.trim().is_empty() {
        return Err(Error::validation("name", "this field is required"));
    }

    if spec.daily_missions == 0 {
        return Err(Error::validation(
            "daily_missions",
            "daily missions must be at least 1",
        ));
    }

    if spec.number_of_set == 0 {
        return Err(Error::validation(
            "number_of_set",
            "number of sets must be at least 1",
        ));
    }

    Ok(())
}

/// Re-point wallets whose pack vanished or went inactive at the best active
/// tier for their balance.
fn reassign_wallets(writer: &StoreWriter, now: DateTime<Utc>) -> Result<(), Error> {
    let packs = writer.packs_all()?;

    for mut wallet in writer.wallets_all()? {
        let current = wallet.pack.and_then(|id| packs.iter().find(|p| p.id == id));

        let needs_reassign = match current {
            Some(pack) => !pack.is_active,
            None => true,
        };

        if needs_reassign {
            if let Some(best) = best_pack_for_balance(&packs, wallet.balance) {
                wallet.pack = Some(best);
                wallet.updated_at = now;
                writer.put_wallet(&wallet)?;
            }
        }
    }

    Ok(())
}
