use serde::{Deserialize, Serialize};

use kudimall_core::{BoostPlanId, DomainError, DomainResult, Money};

/// Admin-managed boost offering (e.g. "7-day spotlight").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostPlan {
    pub id: BoostPlanId,
    pub name: String,
    pub description: Option<String>,
    pub duration_days: u32,
    pub price: Money,
    pub is_active: bool,
}

/// Partial edit of a plan from the admin settings screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostPlanChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_days: Option<u32>,
    pub price: Option<Money>,
    pub is_active: Option<bool>,
}

impl BoostPlan {
    pub fn new(
        id: BoostPlanId,
        name: impl Into<String>,
        description: Option<String>,
        duration_days: u32,
        price: Money,
    ) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.chars().count() < 3 {
            return Err(DomainError::validation(
                "boost plan name must be at least 3 characters",
            ));
        }
        if duration_days < 1 {
            return Err(DomainError::validation(
                "boost plan duration must be at least 1 day",
            ));
        }

        Ok(Self {
            id,
            name,
            description,
            duration_days,
            price,
            is_active: true,
        })
    }

    /// Apply an admin edit. Unset fields keep their current value; an empty
    /// description clears it.
    pub fn apply(&self, changes: BoostPlanChanges) -> DomainResult<Self> {
        let description = match changes.description {
            Some(d) if d.trim().is_empty() => None,
            Some(d) => Some(d),
            None => self.description.clone(),
        };
        let mut revised = Self::new(
            self.id,
            changes.name.unwrap_or_else(|| self.name.clone()),
            description,
            changes.duration_days.unwrap_or(self.duration_days),
            changes.price.unwrap_or(self.price),
        )?;
        revised.is_active = changes.is_active.unwrap_or(self.is_active);
        Ok(revised)
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Only active plans may back a new request.
    pub fn ensure_available(&self) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::validation(format!(
                "boost plan '{}' is not active",
                self.name
            )));
        }
        Ok(())
    }
}
