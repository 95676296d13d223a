//! Static catalog of poll categories.
//!
//! Categories are built once on first access and never change afterwards.
//! Within the catalog they are ordered by group (see `CategoryGroup::ORDER`)
//! and then alphabetically by label.

pub mod normalize;

use crate::models::{Category, CategoryGroup};
use lazy_static::lazy_static;
use regex::Regex;

pub use normalize::{normalize, normalize_with, PollMetadata};

/// Sentinel key for polls nothing in the catalog matched.
pub const MISC_KEY: &str = "other:misc";

const US_STATES: &[&str] = &[
    "Alabama", "Alaska", "Arizona", "Arkansas", "California", "Colorado",
    "Connecticut", "Delaware", "Florida", "Georgia", "Hawaii", "Idaho",
    "Illinois", "Indiana", "Iowa", "Kansas", "Kentucky", "Louisiana",
    "Maine", "Maryland", "Massachusetts", "Michigan", "Minnesota", "Mississippi",
    "Missouri", "Montana", "Nebraska", "Nevada", "New Hampshire", "New Jersey",
    "New Mexico", "New York", "North Carolina", "North Dakota", "Ohio", "Oklahoma",
    "Oregon", "Pennsylvania", "Rhode Island", "South Carolina", "South Dakota", "Tennessee",
    "Texas", "Utah", "Vermont", "Virginia", "Washington", "West Virginia",
    "Wisconsin", "Wyoming", "District of Columbia",
];

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_SLUG: Regex = Regex::new(r"[^a-z-]").unwrap();

    pub static ref ALL_CATEGORIES: Vec<Category> = build_catalog();

    pub static ref MISC_CATEGORY: Category = Category {
        key: MISC_KEY.to_string(),
        label: "Other".to_string(),
        group: CategoryGroup::Other,
        synonyms: Vec::new(),
    };
}

fn cat(key: &str, label: &str, group: CategoryGroup, synonyms: &[&str]) -> Category {
    Category {
        key: key.to_string(),
        label: label.to_string(),
        group,
        synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
    }
}

fn state_key(name: &str) -> String {
    let lower = name.to_lowercase();
    let dashed = WHITESPACE.replace_all(&lower, "-");
    NON_SLUG.replace_all(&dashed, "").into_owned()
}

fn build_catalog() -> Vec<Category> {
    use CategoryGroup::*;

    let mut all = vec![
        // Vehicles
        cat("vehicle:party-bus", "Party Bus", Vehicles, &["partybus", "limo bus", "party coach"]),
        cat("vehicle:limousine", "Limo", Vehicles, &["limousine", "stretch limo", "sedan limo"]),
        cat("vehicle:suv-limo", "SUV Limo", Vehicles, &["escalade limo", "hummer limo", "chrysler 300 limo"]),
        cat("vehicle:sprinter", "Sprinter Van", Vehicles, &["mercedes sprinter", "sprinter limo", "sprinter shuttle"]),
        cat("vehicle:shuttle-bus", "Shuttle Bus", Vehicles, &["mini shuttle", "airport shuttle", "14-24 passenger"]),
        cat("vehicle:mini-coach", "Mini Coach", Vehicles, &["mini bus", "25-35 passenger coach"]),
        cat("vehicle:motorcoach", "Motorcoach", Vehicles, &["charter bus", "coach bus", "56 passenger"]),
        cat("vehicle:sedan", "Sedan", Vehicles, &["car service", "black car"]),
        cat("vehicle:suv", "SUV", Vehicles, &["suburban", "yukon", "navigator"]),
        cat("vehicle:trolley", "Trolley", Vehicles, &[]),
        cat("vehicle:school-bus", "School Bus", Vehicles, &["yellow bus"]),
        cat("type:luxury", "Luxury", Vehicles, &["luxury", "premium"]),
        cat("type:minivan", "Minivan", Vehicles, &["minivan", "family van"]),
        cat("type:coach", "Coach", Vehicles, &["coach", "motorcoach"]),
        // Events
        cat("event:wedding", "Weddings Polls", Events, &["wedding", "rehearsal", "bridal"]),
        cat("event:prom", "Proms Polls", Events, &["homecoming", "school dance"]),
        cat("event:birthday", "Birthdays Polls", Events, &["sweet 16", "quince", "quinceañera", "mitzvah"]),
        cat("event:bachelor", "Bachelor Parties Polls", Events, &[]),
        cat("event:bachelorette", "Bachelorette Parties Polls", Events, &[]),
        cat("event:concert", "Concerts Polls", Events, &[]),
        cat("event:sports", "Sporting Events Polls", Events, &["game day", "tailgate"]),
        cat("event:night-out", "Night Out Polls", Events, &["bar crawl", "club", "downtown"]),
        cat("event:wine", "Wine Tours Polls", Events, &["vineyard"]),
        cat("event:brewery", "Brewery Tours Polls", Events, &[]),
        cat("event:corporate", "Corporate Events Polls", Events, &["offsite", "retreat", "meeting"]),
        cat("event:airport", "Airport Polls", Events, &[]),
        cat("event:holiday", "Holiday Lights Polls", Events, &[]),
        cat("event:graduation", "Graduation Polls", Events, &[]),
        cat("event:church-youth", "Church/Youth Polls", Events, &[]),
        // Features
        cat("feature:music", "Music/Playlist", Features, &["spotify", "aux", "bluetooth", "dj"]),
        cat("feature:lighting", "Lighting", Features, &["led", "neon", "strobe", "laser"]),
        cat("feature:pole", "Dance Pole", Features, &["pole"]),
        cat("feature:restroom", "Restroom", Features, &["bathroom", "toilet"]),
        cat("feature:ada", "ADA Access", Features, &["wheelchair", "handicap"]),
        cat("feature:byob", "BYOB", Features, &["alcohol", "cooler", "ice"]),
        cat("feature:charging", "Charging/USB", Features, &["usb", "outlet"]),
        cat("feature:luggage", "Luggage Space", Features, &[]),
        cat("feature:karaoke", "Karaoke", Features, &[]),
        cat("feature:pet", "Pet Friendly", Features, &[]),
        cat("feature:child-seat", "Child Seats", Features, &[]),
        // Pricing
        cat("pricing:deposits", "Deposits", Pricing, &[]),
        cat("pricing:overtime", "Overtime", Pricing, &[]),
        cat("pricing:gratuity", "Gratuity", Pricing, &["tip", "driver tip"]),
        cat("pricing:fees", "Fees/Refunds", Pricing, &["cleaning", "damage", "cancellation"]),
        cat("pricing:prom", "Prom Pricing", Pricing, &[]),
        cat("pricing:before5", "Before 5pm", Pricing, &[]),
        // Safety
        cat("safety:insurance", "Insurance & Licensing", Safety, &[]),
        cat("safety:dot", "DOT/Compliance", Safety, &[]),
        cat("safety:driver", "Driver Policies", Safety, &["wait time", "dress code"]),
        // Policies
        cat("policy:smoking", "Smoking/Vaping", Policies, &[]),
        cat("policy:routes", "Route Flexibility", Policies, &[]),
        cat("policy:food", "Food/Drink Rules", Policies, &[]),
        // Operations
        cat("ops:pickup-drop", "Pickup/Drop Windows", Operations, &[]),
        cat("ops:stops", "Extra Stops", Operations, &[]),
        cat("ops:cleanup", "Cleanup Rules", Operations, &[]),
    ];

    for name in US_STATES {
        all.push(Category {
            key: state_key(name),
            label: name.to_string(),
            group: States,
            synonyms: vec![name.to_string()],
        });
    }

    let group_rank = |g: CategoryGroup| CategoryGroup::ORDER.iter().position(|o| *o == g).unwrap_or(usize::MAX);
    all.sort_by(|a, b| {
        group_rank(a.group)
            .cmp(&group_rank(b.group))
            .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
    });
    all
}

/// Look up a category by key, including the misc sentinel.
pub fn find(key: &str) -> Option<&'static Category> {
    if key == MISC_KEY {
        return Some(&MISC_CATEGORY);
    }
    ALL_CATEGORIES.iter().find(|c| c.key == key)
}

/// Position of a key in catalog order. The misc sentinel and unknown keys sort last.
pub fn catalog_rank(key: &str) -> usize {
    ALL_CATEGORIES
        .iter()
        .position(|c| c.key == key)
        .unwrap_or(ALL_CATEGORIES.len())
}

/// Human title for a board or result group.
pub fn title_for(key: &str) -> String {
    if let Some(category) = find(key) {
        return if category.label.ends_with("Polls") {
            category.label.clone()
        } else {
            format!("{} Polls", category.label)
        };
    }

    // "vehicle:double-decker" -> "Double Decker Polls"
    let tail = key.rsplit(':').next().unwrap_or(key);
    let words: Vec<String> = tail
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        "Polls".to_string()
    } else {
        format!("{} Polls", words.join(" "))
    }
}
