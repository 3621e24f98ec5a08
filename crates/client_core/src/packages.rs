//! Pricing packages attached to a course.

use shared::{
    domain::{CourseId, DurationUnit},
    protocol::{CreatePackageRequest, PackageDuration, PackageFeatures, PackageRecord},
};
use thiserror::Error;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageError {
    #[error("Package name is required")]
    MissingName,
    #[error("Price must be zero or more")]
    InvalidPrice,
    #[error("Discount must be between 0 and 100")]
    InvalidDiscount,
    #[error("Duration must be greater than zero")]
    InvalidDuration,
    #[error("Select at least one feature")]
    NoFeatures,
}

impl From<PackageError> for ClientError {
    fn from(value: PackageError) -> Self {
        ClientError::validation(value.to_string())
    }
}

pub fn empty_package() -> PackageRecord {
    PackageRecord {
        id: None,
        name: String::new(),
        price: None,
        discount: 0.0,
        duration: PackageDuration {
            value: None,
            unit: DurationUnit::Months,
        },
        features: PackageFeatures::default(),
    }
}

pub fn validate_package(package: &PackageRecord) -> Result<(), PackageError> {
    if package.name.trim().is_empty() {
        return Err(PackageError::MissingName);
    }
    match package.price {
        Some(price) if price.is_finite() && price >= 0.0 => {}
        _ => return Err(PackageError::InvalidPrice),
    }
    if !(0.0..=100.0).contains(&package.discount) {
        return Err(PackageError::InvalidDiscount);
    }
    if !matches!(package.duration.value, Some(value) if value > 0) {
        return Err(PackageError::InvalidDuration);
    }
    if !package.features.any() {
        return Err(PackageError::NoFeatures);
    }
    Ok(())
}

pub fn is_valid_package(package: &PackageRecord) -> bool {
    validate_package(package).is_ok()
}

/// Price after discount, rounded to the nearest whole unit. Zero when no
/// price is set.
pub fn discounted_price(package: &PackageRecord) -> f64 {
    match package.price {
        Some(price) => (price * (1.0 - package.discount / 100.0)).round(),
        None => 0.0,
    }
}

pub fn create_request(course_id: CourseId, package: &PackageRecord) -> CreatePackageRequest {
    CreatePackageRequest {
        package: PackageRecord {
            id: None,
            name: package.name.trim().to_string(),
            ..package.clone()
        },
        course_id,
    }
}
