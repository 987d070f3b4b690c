// Allow-listed partial updates.
//
// Each patch type names the fields it accepts in `apply_field`; anything else
// in the request body is dropped before it can reach the record.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::debug;

use super::input::{
    coerce_coordinate, coerce_rating, expect_str, optional_text, parse_visit_date,
    validate_content, validate_email, validate_title, validate_username,
};
use crate::error::{AppError, AppResult};

pub trait Patch: Default {
    const ENTITY: &'static str;
    /// Keys that are silently stripped from update bodies.
    const PROTECTED: &'static [&'static str];

    /// Validate and store one field. Returns `false` when the field is not updatable.
    fn apply_field(&mut self, field: &str, value: &Value) -> AppResult<bool>;

    fn from_map(body: &Map<String, Value>) -> AppResult<Self> {
        let mut patch = Self::default();
        for (key, value) in body {
            if Self::PROTECTED.contains(&key.as_str()) {
                debug!(entity = Self::ENTITY, field = %key, "Stripping protected field");
                continue;
            }
            if !patch.apply_field(key, value)? {
                debug!(entity = Self::ENTITY, field = %key, "Ignoring unknown field");
            }
        }
        Ok(patch)
    }

    fn from_json(body: &Value) -> AppResult<Self> {
        match body {
            Value::Object(map) => Self::from_map(map),
            _ => Err(AppError::validation("Request body must be a JSON object")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub rating: Option<i64>,
    pub visit_date: Option<Option<NaiveDate>>,
}

impl Patch for ReviewPatch {
    const ENTITY: &'static str = "review";
    const PROTECTED: &'static [&'static str] = &[
        "id",
        "created_at",
        "updated_at",
        "user_id",
        "place_id",
        "place",
        "name",
        "city",
        "country",
        "description",
        "latitude",
        "longitude",
    ];

    fn apply_field(&mut self, field: &str, value: &Value) -> AppResult<bool> {
        match field {
            "title" => self.title = Some(validate_title(expect_str(value, "Title")?)?),
            "content" => self.content = Some(validate_content(expect_str(value, "Content")?)?),
            "rating" => self.rating = Some(coerce_rating(value)?),
            "visit_date" => self.visit_date = Some(parse_visit_date(value)?),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl ReviewPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
}

fn required_text(value: &Value, field: &str) -> AppResult<String> {
    let text = expect_str(value, field)?.trim();
    if text.is_empty() {
        return Err(AppError::validation(format!("{} cannot be empty", field)));
    }
    Ok(text.to_string())
}

impl Patch for PlacePatch {
    const ENTITY: &'static str = "place";
    const PROTECTED: &'static [&'static str] = &[
        "id",
        "created_at",
        "updated_at",
        "reviews",
        "review_count",
        "average_rating",
    ];

    fn apply_field(&mut self, field: &str, value: &Value) -> AppResult<bool> {
        match field {
            "name" => self.name = Some(required_text(value, "Name")?),
            "city" => self.city = Some(required_text(value, "City")?),
            "country" => self.country = Some(required_text(value, "Country")?),
            "description" => {
                self.description = Some(optional_text(value, "Description")?.unwrap_or_default())
            }
            "latitude" => self.latitude = Some(coerce_coordinate(value, "latitude")?),
            "longitude" => self.longitude = Some(coerce_coordinate(value, "longitude")?),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoPatch {
    pub description: Option<Option<String>>,
    /// `Some(None)` unlinks the photo from its review.
    pub review_id: Option<Option<String>>,
}

impl Patch for PhotoPatch {
    const ENTITY: &'static str = "photo";
    const PROTECTED: &'static [&'static str] = &[
        "id",
        "created_at",
        "updated_at",
        "filename",
        "original_name",
        "file_path",
        "file_url",
        "user_id",
    ];

    fn apply_field(&mut self, field: &str, value: &Value) -> AppResult<bool> {
        match field {
            "description" => self.description = Some(optional_text(value, "Description")?),
            "review_id" => self.review_id = Some(optional_text(value, "review_id")?),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub location: Option<Option<String>>,
}

impl Patch for ProfilePatch {
    const ENTITY: &'static str = "user";
    const PROTECTED: &'static [&'static str] = &[
        "id",
        "created_at",
        "updated_at",
        "password",
        "password_hash",
        "is_admin",
        "is_active",
        "is_verified",
        "avatar_path",
        "avatar_url",
    ];

    fn apply_field(&mut self, field: &str, value: &Value) -> AppResult<bool> {
        match field {
            "username" => self.username = Some(validate_username(expect_str(value, "Username")?)?),
            "email" => self.email = Some(validate_email(expect_str(value, "Email")?)?),
            "first_name" => self.first_name = Some(optional_text(value, "first_name")?),
            "last_name" => self.last_name = Some(optional_text(value, "last_name")?),
            "bio" => self.bio = Some(optional_text(value, "bio")?),
            "location" => self.location = Some(optional_text(value, "location")?),
            _ => return Ok(false),
        }
        Ok(true)
    }
}
