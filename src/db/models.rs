use std::fmt;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::models::Role;
use crate::util::text::{split_requirements, time_ago};

/// The content categories published on the site.
///
/// Each category lives in its own MongoDB collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Jobs,
    Workshops,
    Courses,
    Hackathons,
    Roadmaps,
    Websites,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Jobs,
        Category::Workshops,
        Category::Courses,
        Category::Hackathons,
        Category::Roadmaps,
        Category::Websites,
    ];

    /// Categories covered by global search and the filter API.
    pub const SEARCHABLE: [Category; 4] = [
        Category::Jobs,
        Category::Workshops,
        Category::Courses,
        Category::Hackathons,
    ];

    pub fn collection_name(&self) -> &'static str {
        match self {
            Category::Jobs => "jobs_internships",
            Category::Workshops => "workshops",
            Category::Courses => "courses",
            Category::Hackathons => "hackathons",
            Category::Roadmaps => "roadmaps",
            Category::Websites => "websites",
        }
    }

    /// Plural slug used in listing and admin routes (e.g. `/jobs`).
    pub fn slug(&self) -> &'static str {
        match self {
            Category::Jobs => "jobs",
            Category::Workshops => "workshops",
            Category::Courses => "courses",
            Category::Hackathons => "hackathons",
            Category::Roadmaps => "roadmaps",
            Category::Websites => "websites",
        }
    }

    /// Singular slug used by detail pages and search hits (e.g. `job`).
    pub fn singular(&self) -> &'static str {
        match self {
            Category::Jobs => "job",
            Category::Workshops => "workshop",
            Category::Courses => "course",
            Category::Hackathons => "hackathon",
            Category::Roadmaps => "roadmap",
            Category::Websites => "website",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.slug() == s)
    }

    pub fn from_singular(s: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.singular() == s)
    }

    /// Whether listings of this category can be promoted as advertisements.
    pub fn is_promotable(&self) -> bool {
        Category::SEARCHABLE.contains(self)
    }

    pub fn is_searchable(&self) -> bool {
        Category::SEARCHABLE.contains(self)
    }

    /// Fields matched by text search for this category.
    pub fn search_fields(&self) -> &'static [&'static str] {
        match self {
            Category::Jobs => &["title", "role", "description", "job_type"],
            Category::Workshops | Category::Hackathons => &["title", "organizer"],
            Category::Courses => &["title", "instructor"],
            Category::Roadmaps | Category::Websites => &["title", "description"],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// A published record in one of the content categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Display name: the company for jobs, the event or resource name otherwise.
    #[serde(alias = "company_name", alias = "name")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Official link where users apply or read more.
    #[serde(default, alias = "official_link")]
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub posted_at: BsonDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<BsonDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub certification: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_project: bool,
    #[serde(default, deserialize_with = "lenient_requirements")]
    pub requirements: Vec<String>,
}

/// Reads a flag stored as a boolean, a number or a checkbox string such as `"on"`.
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(value)) => value,
        Some(Flag::Int(value)) => value != 0,
        Some(Flag::Text(value)) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "on" | "true" | "yes" | "1"
        ),
        None => false,
    })
}

/// Reads requirements stored either as a list or as one comma separated string.
/// `"N/A"` reads as an empty list.
fn lenient_requirements<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Requirements {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Option::<Requirements>::deserialize(deserializer)? {
        Some(Requirements::List(items)) => items,
        Some(Requirements::Text(raw)) => split_requirements(&raw),
        None => Vec::new(),
    })
}

impl Listing {
    /// A listing with only the common fields set.
    pub fn new(title: impl Into<String>, description: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: description.into(),
            link: link.into(),
            image: None,
            posted_at: BsonDateTime::now(),
            updated_at: None,
            admin_id: None,
            role: None,
            job_type: None,
            location: None,
            required_experience: None,
            organizer: None,
            instructor: None,
            price: None,
            certification: false,
            is_project: false,
            requirements: Vec::new(),
        }
    }

    /// Value of a searchable field by name, used by non-MongoDB backends.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "description" => Some(&self.description),
            "role" => self.role.as_deref(),
            "job_type" => self.job_type.as_deref(),
            "location" => self.location.as_deref(),
            "organizer" => self.organizer.as_deref(),
            "instructor" => self.instructor.as_deref(),
            _ => None,
        }
    }
}

/// Partial update of a stored listing. `None` keeps the stored value.
///
/// Checkboxes are always written: an unchecked box submits nothing, which reads as `false`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub image: Option<String>,
    pub role: Option<String>,
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub required_experience: Option<String>,
    pub organizer: Option<String>,
    pub instructor: Option<String>,
    pub price: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub certification: bool,
    pub is_project: bool,
    pub updated_at: Option<BsonDateTime>,
}

impl ListingChanges {
    fn optional_fields(&self) -> [(&'static str, &Option<String>); 9] {
        [
            ("description", &self.description),
            ("image", &self.image),
            ("role", &self.role),
            ("job_type", &self.job_type),
            ("location", &self.location),
            ("required_experience", &self.required_experience),
            ("organizer", &self.organizer),
            ("instructor", &self.instructor),
            ("price", &self.price),
        ]
    }

    /// Apply the changes to an in-memory copy.
    pub fn apply(&self, listing: &mut Listing) {
        if let Some(title) = &self.title {
            listing.title = title.clone();
        }
        if let Some(link) = &self.link {
            listing.link = link.clone();
        }
        if let Some(description) = &self.description {
            listing.description = description.clone();
        }

        let keep_or = |slot: &mut Option<String>, value: &Option<String>| {
            if value.is_some() {
                slot.clone_from(value);
            }
        };
        keep_or(&mut listing.image, &self.image);
        keep_or(&mut listing.role, &self.role);
        keep_or(&mut listing.job_type, &self.job_type);
        keep_or(&mut listing.location, &self.location);
        keep_or(&mut listing.required_experience, &self.required_experience);
        keep_or(&mut listing.organizer, &self.organizer);
        keep_or(&mut listing.instructor, &self.instructor);
        keep_or(&mut listing.price, &self.price);

        if let Some(requirements) = &self.requirements {
            listing.requirements = requirements.clone();
        }
        listing.certification = self.certification;
        listing.is_project = self.is_project;
        if self.updated_at.is_some() {
            listing.updated_at = self.updated_at;
        }
    }

    /// MongoDB update document: `$set` for the changed fields, plus `$unset`
    /// of legacy aliases the new values replace.
    pub fn to_update_document(&self) -> Document {
        let mut set = doc! {
            "certification": self.certification,
            "is_project": self.is_project,
        };
        let mut unset = Document::new();

        if let Some(title) = &self.title {
            set.insert("title", title.as_str());
            unset.insert("company_name", "");
            unset.insert("name", "");
        }
        if let Some(link) = &self.link {
            set.insert("link", link.as_str());
            unset.insert("official_link", "");
        }
        for (field, value) in self.optional_fields() {
            if let Some(value) = value {
                set.insert(field, value.as_str());
            }
        }
        if let Some(requirements) = &self.requirements {
            set.insert("requirements", requirements.clone());
        }
        if let Some(updated_at) = self.updated_at {
            set.insert("updated_at", updated_at);
        }

        let mut update = doc! { "$set": set };
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        update
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    /// Lowercased; unique across the collection.
    pub email: String,
    /// Argon2id PHC string.
    pub password: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: Role,
    pub created_at: BsonDateTime,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// A promoted item shown in the rotating ad slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advertisement {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub link: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub active: bool,
    #[serde(default)]
    pub clicks: i64,
    #[serde(default)]
    pub impressions: i64,
    /// Category of the listing this ad promotes, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<Category>,
    /// Id of the listing this ad promotes, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_reference: Option<ObjectId>,
    #[serde(default = "BsonDateTime::now")]
    pub posted_at: BsonDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<BsonDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<String>,
}

/// One recorded click on an advertisement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdClick {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub ad_id: ObjectId,
    pub clicked_at: BsonDateTime,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

/// Outcome of attaching an advertisement to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdUpsert {
    Created,
    Updated,
}

/// Optional constraints for the listing filter API.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    /// Case-insensitive substring match.
    pub location: Option<String>,
    pub price: Option<String>,
    pub posted_since: Option<DateTime<Utc>>,
    pub job_type: Option<String>,
    pub required_experience: Option<String>,
}

impl ListingFilter {
    /// Whether `listing` satisfies every constraint.
    pub fn matches(&self, listing: &Listing) -> bool {
        let location_ok = self.location.as_ref().map_or(true, |needle| {
            listing
                .location
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains(&needle.to_lowercase()))
        });
        let price_ok = self
            .price
            .as_ref()
            .map_or(true, |p| listing.price.as_deref() == Some(p.as_str()));
        let since_ok = self
            .posted_since
            .map_or(true, |since| listing.posted_at.to_chrono() >= since);
        let job_type_ok = self
            .job_type
            .as_ref()
            .map_or(true, |t| listing.job_type.as_deref() == Some(t.as_str()));
        let experience_ok = self
            .required_experience
            .as_ref()
            .map_or(true, |e| listing.required_experience.as_deref() == Some(e.as_str()));

        location_ok && price_ok && since_ok && job_type_ok && experience_ok
    }
}

/// Site-wide counters shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_users: u64,
    pub total_jobs: u64,
    pub total_workshops: u64,
    pub total_courses: u64,
    pub total_hackathons: u64,
    pub total_roadmaps: u64,
    pub total_websites: u64,
    pub total_ads: u64,
    pub active_ads: u64,
    pub total_ad_clicks: u64,
}

impl DashboardStats {
    /// Set the listing counter for `category`.
    pub fn set_listing_count(&mut self, category: Category, count: u64) {
        let slot = match category {
            Category::Jobs => &mut self.total_jobs,
            Category::Workshops => &mut self.total_workshops,
            Category::Courses => &mut self.total_courses,
            Category::Hackathons => &mut self.total_hackathons,
            Category::Roadmaps => &mut self.total_roadmaps,
            Category::Websites => &mut self.total_websites,
        };
        *slot = count;
    }
}

// ---------------------------------------------------------------------------
// JSON views
// ---------------------------------------------------------------------------

fn hex_id(id: &Option<ObjectId>) -> String {
    id.map(|oid| oid.to_hex()).unwrap_or_default()
}

/// A listing as returned by the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub posted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub time_ago: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub certification: bool,
    pub is_project: bool,
    pub requirements: Vec<String>,
}

impl ListingView {
    /// Public rendering: the author's admin id is withheld.
    pub fn public(listing: &Listing, now: DateTime<Utc>) -> Self {
        let mut view = Self::admin(listing, now);
        view.admin_id = None;
        view
    }

    pub fn admin(listing: &Listing, now: DateTime<Utc>) -> Self {
        let posted_at = listing.posted_at.to_chrono();
        Self {
            id: hex_id(&listing.id),
            title: listing.title.clone(),
            description: listing.description.clone(),
            link: listing.link.clone(),
            image: listing.image.clone(),
            posted_at,
            updated_at: listing.updated_at.map(|d| d.to_chrono()),
            time_ago: time_ago(posted_at, now),
            admin_id: listing.admin_id.clone(),
            role: listing.role.clone(),
            job_type: listing.job_type.clone(),
            location: listing.location.clone(),
            required_experience: listing.required_experience.clone(),
            organizer: listing.organizer.clone(),
            instructor: listing.instructor.clone(),
            price: listing.price.clone(),
            certification: listing.certification,
            is_project: listing.is_project,
            requirements: listing.requirements.clone(),
        }
    }
}

/// A user profile as returned by the HTTP API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub college: String,
    pub phone: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub profile_picture: Option<String>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: hex_id(&user.id),
            name: user.name.clone(),
            email: user.email.clone(),
            college: user.college.clone(),
            phone: user.phone.clone(),
            role: user.role,
            created_at: user.created_at.to_chrono(),
            profile_picture: user.profile_picture.clone(),
        }
    }
}

/// The public shape of a rotating ad.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub link: String,
    pub clicks: i64,
}

impl From<&Advertisement> for AdView {
    fn from(ad: &Advertisement) -> Self {
        let title = if ad.title.trim().is_empty() {
            "Opportunity".to_string()
        } else {
            ad.title.clone()
        };
        let link = if ad.link.trim().is_empty() {
            "#".to_string()
        } else {
            ad.link.clone()
        };

        Self {
            id: hex_id(&ad.id),
            title,
            description: ad.description.clone(),
            image: ad.image.clone(),
            link,
            clicks: ad.clicks,
        }
    }
}

/// Full advertisement record for the admin area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAdView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub link: String,
    pub active: bool,
    pub clicks: i64,
    pub impressions: i64,
    pub content_type: Option<Category>,
    pub content_reference: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub admin_id: Option<String>,
}

impl From<&Advertisement> for AdminAdView {
    fn from(ad: &Advertisement) -> Self {
        Self {
            id: hex_id(&ad.id),
            title: ad.title.clone(),
            description: ad.description.clone(),
            image: ad.image.clone(),
            link: ad.link.clone(),
            active: ad.active,
            clicks: ad.clicks,
            impressions: ad.impressions,
            content_type: ad.content_type,
            content_reference: ad.content_reference.map(|r| r.to_hex()),
            posted_at: ad.posted_at.to_chrono(),
            updated_at: ad.updated_at.map(|d| d.to_chrono()),
            admin_id: ad.admin_id.clone(),
        }
    }
}
