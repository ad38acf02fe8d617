use async_graphql::{ComplexObject, SimpleObject};
use serde::Deserialize;

use crate::models::Entity;

/// A student account. Enrollment happens elsewhere; the console only reads
/// students and adjusts their credit balance.
#[derive(Debug, Clone, Default, Deserialize, SimpleObject)]
#[serde(default, rename_all = "camelCase")]
#[graphql(complex)]
pub struct Student {
    /// The ID of the student's document
    pub id: String,
    /// The student number issued by the school
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub email: String,
    /// The student's running credit balance
    pub credit_points: i64,
}

#[ComplexObject]
impl Student {
    /// The student's full name
    pub async fn full_name(&self) -> String {
        self.name()
    }
}

impl Entity for Student {
    const COLLECTION: &'static str = "studentUsers";
    const NAME: &'static str = "student";
}

impl Student {
    pub fn name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (true, true) => self.display_name.clone(),
        }
    }
}
