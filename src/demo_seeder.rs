use chrono::{Duration, Utc};
use mongodb::bson::DateTime as BsonDateTime;

use crate::db::ad_repository::AdRepository;
use crate::db::models::{Advertisement, Category, Listing};
use crate::db::repository::ListingRepository;

fn aged(mut listing: Listing, hours_ago: i64) -> Listing {
    listing.posted_at = BsonDateTime::from_chrono(Utc::now() - Duration::hours(hours_ago));
    listing.admin_id = Some("admin".to_string());
    listing
}

fn demo_listings() -> Vec<(Category, Listing)> {
    let mut listings = Vec::new();

    for (hours, company, role, job_type, location) in [
        (2, "Acme Robotics", "Embedded Systems Intern", "Internship", "Bangalore"),
        (20, "Northwind Labs", "Backend Engineer", "Full-time", "Remote"),
        (70, "Globex", "Data Analyst Intern", "Internship", "Pune"),
    ] {
        let mut job = Listing::new(
            company,
            format!("{role} at {company}."),
            "https://careers.example.com",
        );
        job.role = Some(role.to_string());
        job.job_type = Some(job_type.to_string());
        job.location = Some(location.to_string());
        job.required_experience = Some("Fresher".to_string());
        job.requirements = vec!["Git".to_string(), "Problem solving".to_string()];
        listings.push((Category::Jobs, aged(job, hours)));
    }

    for (hours, title, organizer) in [
        (5, "Intro to Rust", "Systems Club"),
        (48, "PCB Design Bootcamp", "IEEE Student Branch"),
    ] {
        let mut workshop = Listing::new(title, "A hands-on session.", "https://events.example.com");
        workshop.organizer = Some(organizer.to_string());
        workshop.location = Some("Main Auditorium".to_string());
        workshop.price = Some("Free".to_string());
        listings.push((Category::Workshops, aged(workshop, hours)));
    }

    for (hours, title, instructor, certification) in [
        (8, "Algorithms Part I", "R. Sedgewick", true),
        (96, "Linear Algebra", "G. Strang", false),
    ] {
        let mut course = Listing::new(title, "Self-paced online course.", "https://courses.example.com");
        course.instructor = Some(instructor.to_string());
        course.certification = certification;
        course.price = Some("Free".to_string());
        listings.push((Category::Courses, aged(course, hours)));
    }

    let mut hackathon = Listing::new("HackTheCampus", "36 hours of building.", "https://hack.example.com");
    hackathon.organizer = Some("Developer Student Club".to_string());
    hackathon.location = Some("Online".to_string());
    listings.push((Category::Hackathons, aged(hackathon, 12)));

    for (hours, title) in [(30, "Backend Developer Roadmap"), (60, "Frontend Developer Roadmap")] {
        let roadmap = Listing::new(title, "Step-by-step learning path.", "https://roadmap.example.com");
        listings.push((Category::Roadmaps, aged(roadmap, hours)));
    }

    let docs = Listing::new("The Rust Book", "The official Rust guide.", "https://doc.rust-lang.org/book/");
    listings.push((Category::Websites, aged(docs, 200)));

    let mut project = Listing::new("Campus Notes", "Notes shared by students.", "https://notes.example.com");
    project.is_project = true;
    listings.push((Category::Websites, aged(project, 3)));

    listings
}

/// Fill empty collections with sample content and one promoted job.
///
/// Categories that already hold listings are left untouched.
pub async fn seed_demo_data(listings: &dyn ListingRepository, ads: &dyn AdRepository) {
    tracing::info!("Starting demo data seeding...");

    let mut empty = Vec::new();
    for category in Category::ALL {
        match listings.count(category).await {
            Ok(0) => empty.push(category),
            Ok(_) => tracing::debug!(category = %category, "already populated, skipping"),
            Err(e) => tracing::error!("Failed to count {}: {}", category, e),
        }
    }

    let mut promoted = None;
    for (category, listing) in demo_listings() {
        if !empty.contains(&category) {
            continue;
        }

        let (title, role, link) = (listing.title.clone(), listing.role.clone(), listing.link.clone());
        match listings.insert(category, listing).await {
            Ok(id) if category == Category::Jobs && promoted.is_none() => {
                promoted = Some((id, title, role, link));
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Failed to seed {} listing '{}': {}", category, title, e),
        }
    }

    if let Some((id, title, role, link)) = promoted {
        let ad = Advertisement {
            id: None,
            title,
            description: role.unwrap_or_default(),
            image: String::new(),
            link,
            active: true,
            clicks: 0,
            impressions: 0,
            content_type: Some(Category::Jobs),
            content_reference: Some(id),
            posted_at: BsonDateTime::now(),
            updated_at: None,
            admin_id: Some("admin".to_string()),
        };
        if let Err(e) = ads.upsert_for_content(ad).await {
            tracing::error!("Failed to seed demo ad: {}", e);
        }
    }

    tracing::info!("Demo data seeding completed.");
}
