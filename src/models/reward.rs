use async_graphql::{ComplexObject, Context, Enum, InputObject, Result, SimpleObject};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;

use crate::error::{ConsoleError, ConsoleResult, FieldErrors};
use crate::graphql::IntoGql;
use crate::models::student::Student;
use crate::models::tags::TagList;
use crate::models::Entity;
use crate::store::{encode, Store, Timestamp};
use crate::util::{current_time, format_date, format_iso_date, local_offset, parse_iso_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardCategory {
    Merchandise,
    Experience,
    Voucher,
    Service,
    Other,
}

impl RewardCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merchandise => "merchandise",
            Self::Experience => "experience",
            Self::Voucher => "voucher",
            Self::Service => "service",
            Self::Other => "other",
        }
    }

    pub fn parse(category: &str) -> Option<Self> {
        [
            Self::Merchandise,
            Self::Experience,
            Self::Voucher,
            Self::Service,
            Self::Other,
        ]
        .into_iter()
        .find(|known| known.as_str() == category)
    }
}

#[derive(Debug, Clone, Default, Deserialize, SimpleObject)]
#[serde(default, rename_all = "camelCase")]
#[graphql(complex)]
pub struct Reward {
    /// The ID of the reward
    pub id: String,
    pub title: String,
    pub description: String,
    /// How many credit points redeeming this reward costs
    pub credit_cost: i64,
    /// How many are left to redeem
    pub quantity: i64,
    /// After this date the reward can no longer be redeemed
    pub expiry_date: Option<Timestamp>,
    pub image_url: String,
    /// One of merchandise, experience, voucher, service or other; empty if unset
    pub category: String,
    pub tags: Vec<String>,
    /// The ids of the students that redeemed this reward
    pub redeemed_by: Vec<String>,
    pub created_at: Option<Timestamp>,
}

#[ComplexObject]
impl Reward {
    /// The expiry date, e.g. "May 2, 2025", or "No expiry date"
    pub async fn formatted_expiry(&self) -> String {
        self.expiry_date
            .and_then(|expiry| expiry.to_datetime().ok())
            .map(format_date)
            .unwrap_or_else(|| "No expiry date".to_owned())
    }

    /// Whether the reward's expiry date has passed
    pub async fn is_expired(&self) -> bool {
        self.expired_at(current_time())
    }

    /// The students who redeemed this reward
    pub async fn redemptions(&self, ctx: &Context<'_>) -> Result<Vec<Student>> {
        let store: &Store = ctx.data_unchecked();
        Student::with_ids(&self.redeemed_by, store).await.gql()
    }
}

impl Entity for Reward {
    const COLLECTION: &'static str = "rewards";
    const NAME: &'static str = "reward";
}

impl Reward {
    pub fn expired_at(&self, now: OffsetDateTime) -> bool {
        self.expiry_date
            .and_then(|expiry| expiry.to_datetime().ok())
            .map(|expiry| expiry < now)
            .unwrap_or(false)
    }

    pub async fn create(form: RewardForm, store: &Store) -> ConsoleResult<String> {
        let fields = form.validate(FormMode::Create)?;
        let mut document = encode(&fields)?;
        document.insert("redeemedBy".to_owned(), json!([]));
        document.insert("createdAt".to_owned(), json!(Timestamp::now()));

        let id = store.add(Self::COLLECTION, document).await.map_err(|err| {
            tracing::error!("Failed to create reward {:?}: {}", fields.title, err);
            err
        })?;
        tracing::info!("Created reward {} ({})", id, fields.title);

        Ok(id)
    }

    /// Applies the edit over the stored reward. Fields left out of the edit
    /// keep their current values.
    pub async fn update(id: &str, edit: RewardEdit, store: &Store) -> ConsoleResult<()> {
        let reward = Self::with_id(id, store).await?;
        let fields = edit.over(&reward).validate(FormMode::Edit)?;

        store
            .update_fields(Self::COLLECTION, id, encode(&fields)?)
            .await
            .map_err(|err| {
                tracing::error!("Failed to update reward {}: {}", id, err);
                err
            })
    }

    pub async fn delete(id: &str, store: &Store) -> ConsoleResult<()> {
        store
            .delete(Self::COLLECTION, id)
            .await
            .map_err(|err| match err {
                ConsoleError::NotFound { .. } => ConsoleError::not_found(Self::NAME, id),
                other => {
                    tracing::error!("Failed to delete reward {}: {}", id, other);
                    other
                }
            })?;
        tracing::info!("Deleted reward {}", id);

        Ok(())
    }

    /// Spends a student's credit points on the reward.
    pub async fn redeem(
        reward_id: &str,
        student_id: &str,
        store: &Store,
    ) -> ConsoleResult<Redemption> {
        let result = Self::redeem_in_transaction(reward_id, student_id, store).await;
        match &result {
            Ok(redemption) => tracing::info!(
                "Student {} redeemed reward {} (balance {})",
                student_id,
                reward_id,
                redemption.credit_points
            ),
            Err(err) => tracing::error!(
                "Student {} failed to redeem reward {}: {}",
                student_id,
                reward_id,
                err
            ),
        }

        result
    }

    async fn redeem_in_transaction(
        reward_id: &str,
        student_id: &str,
        store: &Store,
    ) -> ConsoleResult<Redemption> {
        let mut transaction = store.begin().await?;
        let mut reward = Self::locked(&mut *transaction, reward_id).await?;
        let student = Student::locked(&mut *transaction, student_id).await?;

        if reward.redeemed_by.iter().any(|id| id == student_id) {
            return Err(ConsoleError::Redemption(
                "the student already redeemed this reward".to_owned(),
            ));
        }
        if reward.quantity <= 0 {
            return Err(ConsoleError::Redemption("the reward is out of stock".to_owned()));
        }
        if reward.expired_at(current_time()) {
            return Err(ConsoleError::Redemption("the reward has expired".to_owned()));
        }
        if student.credit_points < reward.credit_cost {
            return Err(ConsoleError::Redemption(format!(
                "the student has {} credit points but the reward costs {}",
                student.credit_points, reward.credit_cost
            )));
        }

        let balance = student.credit_points - reward.credit_cost;
        reward.quantity -= 1;
        reward.redeemed_by.push(student_id.to_owned());

        transaction
            .update_fields(
                Student::COLLECTION,
                student_id,
                encode(&json!({ "creditPoints": balance }))?,
            )
            .await?;
        transaction
            .update_fields(
                Self::COLLECTION,
                reward_id,
                encode(&json!({
                    "quantity": reward.quantity,
                    "redeemedBy": reward.redeemed_by,
                }))?,
            )
            .await?;
        transaction.commit().await?;

        Ok(Redemption {
            reward_id: reward_id.to_owned(),
            student_id: student_id.to_owned(),
            credit_points: balance,
            quantity_remaining: reward.quantity,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, SimpleObject)]
pub struct Redemption {
    pub reward_id: String,
    pub student_id: String,
    /// The student's balance after paying for the reward
    pub credit_points: i64,
    pub quantity_remaining: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

#[derive(Debug, Clone, InputObject)]
pub struct RewardForm {
    pub title: String,
    pub description: String,
    #[graphql(default = 100)]
    pub credit_cost: i64,
    #[graphql(default = 10)]
    pub quantity: i64,
    /// `YYYY-MM-DD`; empty or absent for no expiry
    pub expiry_date: Option<String>,
    #[graphql(default)]
    pub image_url: String,
    pub category: Option<RewardCategory>,
    #[graphql(default)]
    pub tags: Vec<String>,
}

/// Changes to an existing reward. Absent fields are left as they are; an
/// empty `expiryDate` clears the expiry.
#[derive(Debug, Clone, Default, InputObject)]
pub struct RewardEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub credit_cost: Option<i64>,
    pub quantity: Option<i64>,
    pub expiry_date: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<RewardCategory>,
    pub tags: Option<Vec<String>>,
}

impl RewardEdit {
    /// The full form this edit produces for `reward`.
    pub fn over(self, reward: &Reward) -> RewardForm {
        let expiry_date = self.expiry_date.or_else(|| {
            reward
                .expiry_date
                .and_then(|expiry| expiry.to_datetime().ok())
                .map(|expiry| format_iso_date(expiry.to_offset(local_offset()).date()))
        });

        RewardForm {
            title: self.title.unwrap_or_else(|| reward.title.clone()),
            description: self.description.unwrap_or_else(|| reward.description.clone()),
            credit_cost: self.credit_cost.unwrap_or(reward.credit_cost),
            quantity: self.quantity.unwrap_or(reward.quantity),
            expiry_date,
            image_url: self.image_url.unwrap_or_else(|| reward.image_url.clone()),
            category: self
                .category
                .or_else(|| RewardCategory::parse(&reward.category)),
            tags: self.tags.unwrap_or_else(|| reward.tags.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardFields {
    pub title: String,
    pub description: String,
    pub credit_cost: i64,
    pub quantity: i64,
    pub expiry_date: Option<Timestamp>,
    pub image_url: String,
    pub category: String,
    pub tags: TagList,
}

impl RewardForm {
    /// Checks every field at once. New rewards need stock; edits may leave
    /// the quantity at zero.
    pub fn validate(&self, mode: FormMode) -> ConsoleResult<RewardFields> {
        let mut errors = FieldErrors::new();

        if self.title.trim().is_empty() {
            errors.add("title", "Title is required");
        }
        if self.description.trim().is_empty() {
            errors.add("description", "Description is required");
        }
        if self.credit_cost <= 0 {
            errors.add("creditCost", "Credit cost must be greater than 0");
        }
        match mode {
            FormMode::Create if self.quantity <= 0 => {
                errors.add("quantity", "Quantity must be greater than 0")
            }
            FormMode::Edit if self.quantity < 0 => {
                errors.add("quantity", "Quantity cannot be negative")
            }
            _ => {}
        }

        let expiry_date = match self.expiry_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match parse_iso_date(raw) {
                Ok(date) => Some(Timestamp::from(date.midnight().assume_offset(local_offset()))),
                Err(_) => {
                    errors.add("expiryDate", "Expiry date is invalid");
                    None
                }
            },
        };

        errors.into_result()?;

        Ok(RewardFields {
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            credit_cost: self.credit_cost,
            quantity: self.quantity,
            expiry_date,
            image_url: self.image_url.trim().to_owned(),
            category: self
                .category
                .map(|category| category.as_str().to_owned())
                .unwrap_or_default(),
            tags: self.tags.iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn form() -> RewardForm {
        RewardForm {
            title: "Campus Hoodie".to_owned(),
            description: "Official CampusConnect hoodie".to_owned(),
            credit_cost: 100,
            quantity: 10,
            expiry_date: None,
            image_url: String::new(),
            category: Some(RewardCategory::Merchandise),
            tags: vec!["apparel".to_owned()],
        }
    }

    fn errors_of(result: ConsoleResult<RewardFields>) -> FieldErrors {
        match result {
            Err(ConsoleError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn new_rewards_need_cost_and_stock() {
        let mut bad = form();
        bad.title = " ".to_owned();
        bad.description = String::new();
        bad.credit_cost = 0;
        bad.quantity = 0;

        let errors = errors_of(bad.validate(FormMode::Create));
        assert_eq!(errors.len(), 4);
        assert_eq!(
            errors.get("creditCost"),
            Some("Credit cost must be greater than 0")
        );
        assert_eq!(errors.get("quantity"), Some("Quantity must be greater than 0"));
    }

    #[test]
    fn edits_may_sell_out_but_not_go_negative() {
        let mut sold_out = form();
        sold_out.quantity = 0;
        assert!(sold_out.validate(FormMode::Edit).is_ok());

        sold_out.quantity = -1;
        let errors = errors_of(sold_out.validate(FormMode::Edit));
        assert_eq!(errors.get("quantity"), Some("Quantity cannot be negative"));
    }

    #[test]
    fn expiry_dates_are_optional_but_must_parse() {
        let mut with_expiry = form();
        with_expiry.expiry_date = Some("".to_owned());
        assert_eq!(with_expiry.validate(FormMode::Create).unwrap().expiry_date, None);

        with_expiry.expiry_date = Some("2025-05-02".to_owned());
        assert!(with_expiry
            .validate(FormMode::Create)
            .unwrap()
            .expiry_date
            .is_some());

        with_expiry.expiry_date = Some("May 2nd".to_owned());
        let errors = errors_of(with_expiry.validate(FormMode::Create));
        assert_eq!(errors.get("expiryDate"), Some("Expiry date is invalid"));
    }

    #[test]
    fn edits_keep_the_fields_they_leave_out() {
        let reward = Reward {
            id: "R1".to_owned(),
            title: "Campus Hoodie".to_owned(),
            description: "Official hoodie".to_owned(),
            credit_cost: 250,
            quantity: 3,
            expiry_date: Some(Timestamp::from(
                datetime!(2099-12-31 0:00).assume_offset(local_offset()),
            )),
            category: "voucher".to_owned(),
            tags: vec!["apparel".to_owned()],
            ..Reward::default()
        };

        let edit = RewardEdit {
            quantity: Some(0),
            ..RewardEdit::default()
        };
        let fields = edit.over(&reward).validate(FormMode::Edit).unwrap();

        assert_eq!(fields.title, "Campus Hoodie");
        assert_eq!(fields.credit_cost, 250);
        assert_eq!(fields.quantity, 0);
        assert_eq!(fields.expiry_date, reward.expiry_date);
        assert_eq!(fields.category, "voucher");
        assert_eq!(fields.tags.as_slice(), ["apparel"]);

        let cleared = RewardEdit {
            expiry_date: Some(String::new()),
            ..RewardEdit::default()
        };
        assert_eq!(
            cleared.over(&reward).validate(FormMode::Edit).unwrap().expiry_date,
            None
        );
    }

    #[test]
    fn category_is_stored_lowercase() {
        let fields = form().validate(FormMode::Create).unwrap();
        assert_eq!(fields.category, "merchandise");
    }

    #[test]
    fn expiry_is_checked_against_the_given_time() {
        let reward = Reward {
            expiry_date: Some(Timestamp::from(datetime!(2025-05-02 0:00 UTC))),
            ..Reward::default()
        };

        assert!(!reward.expired_at(datetime!(2025-05-01 12:00 UTC)));
        assert!(reward.expired_at(datetime!(2025-05-03 0:00 UTC)));
        assert!(!Reward::default().expired_at(datetime!(2100-01-01 0:00 UTC)));
    }
}
