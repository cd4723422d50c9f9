use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A spy agent.
///
/// The breed is checked against the breed catalog once, when the cat is
/// registered. Later edits to any field, breed included, are only checked
/// locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cat {
    pub id: Uuid,
    pub name: String,
    pub years_of_experience: i64,
    pub breed: String,
    pub salary: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a new cat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCatInput {
    pub name: String,
    pub years_of_experience: i64,
    /// Checked against the breed catalog before the cat is stored.
    pub breed: String,
    pub salary: f64,
}

impl CreateCatInput {
    /// Checks every field that can be judged without the breed catalog.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_experience(self.years_of_experience)?;
        validate_salary(self.salary)?;
        if self.breed.trim().is_empty() {
            return Err(Error::invalid("breed", "must not be empty"));
        }
        Ok(())
    }
}

/// Input for updating a cat. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCatInput {
    pub name: Option<String>,
    pub years_of_experience: Option<i64>,
    /// Not re-checked against the breed catalog.
    pub breed: Option<String>,
    pub salary: Option<f64>,
}

impl From<CreateCatInput> for UpdateCatInput {
    fn from(input: CreateCatInput) -> Self {
        Self {
            name: Some(input.name),
            years_of_experience: Some(input.years_of_experience),
            breed: Some(input.breed),
            salary: Some(input.salary),
        }
    }
}

impl Cat {
    /// Applies a partial update. Either every supplied field is valid and applied,
    /// or the cat is left untouched.
    pub fn apply(&mut self, input: UpdateCatInput) -> Result<()> {
        if let Some(name) = &input.name {
            validate_name(name)?;
        }
        if let Some(years) = input.years_of_experience {
            validate_experience(years)?;
        }
        if let Some(salary) = input.salary {
            validate_salary(salary)?;
        }
        if let Some(breed) = &input.breed {
            if breed.trim().is_empty() {
                return Err(Error::invalid("breed", "must not be empty"));
            }
        }

        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(years) = input.years_of_experience {
            self.years_of_experience = years;
        }
        if let Some(breed) = input.breed {
            self.breed = breed;
        }
        if let Some(salary) = input.salary {
            self.salary = salary;
        }
        Ok(())
    }
}

/// Whether a cat can take on a new mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatAvailability {
    pub cat_id: Uuid,
    pub free: bool,
    /// The incomplete mission the cat is engaged on, if any.
    pub mission_id: Option<Uuid>,
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid("name", "must not be empty"));
    }
    Ok(())
}

fn validate_experience(years: i64) -> Result<()> {
    if years < 0 {
        return Err(Error::invalid(
            "years_of_experience",
            format!("must be zero or more, got {}", years),
        ));
    }
    Ok(())
}

/// Salaries are money: positive, at most two decimal places, below 10^8.
const MAX_SALARY: f64 = 100_000_000.0;

fn validate_salary(salary: f64) -> Result<()> {
    if !salary.is_finite() || salary <= 0.0 {
        return Err(Error::invalid(
            "salary",
            format!("must be a positive amount, got {}", salary),
        ));
    }
    if salary >= MAX_SALARY {
        return Err(Error::invalid(
            "salary",
            format!("must be below {}, got {}", MAX_SALARY, salary),
        ));
    }
    let cents = salary * 100.0;
    if (cents - cents.round()).abs() > 1e-3 {
        return Err(Error::invalid(
            "salary",
            format!("must have at most two decimal places, got {}", salary),
        ));
    }
    Ok(())
}
