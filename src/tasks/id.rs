//! Friendly task ID generation.
//!
//! IDs look like `task-<tool>-<Adjective>-<Adjective>-<Noun>`. Word IDs
//! are easier for an agent (or a human reading a transcript) to carry
//! around than UUIDs, and they survive case-mangling in URIs because the
//! store looks them up case-insensitively.

use rand::seq::SliceRandom;

pub(crate) const ADJECTIVES: &[&str] = &[
    "Agile", "Amber", "Ancient", "Ardent", "Autumn", "Bold", "Brave", "Breezy", "Bright",
    "Brisk", "Calm", "Candid", "Cheerful", "Chilly", "Civil", "Clever", "Cobalt", "Cosmic",
    "Cozy", "Crimson", "Crisp", "Curious", "Dapper", "Daring", "Deft", "Docile", "Dusty",
    "Eager", "Early", "Earnest", "Electric", "Elegant", "Emerald", "Fabled", "Fancy",
    "Fearless", "Fierce", "Floral", "Fluent", "Frosty", "Gentle", "Gilded", "Glad", "Golden",
    "Graceful", "Grand", "Hardy", "Hazel", "Hearty", "Hidden", "Humble", "Icy", "Indigo",
    "Ivory", "Jade", "Jolly", "Keen", "Kind", "Lively", "Lofty", "Loyal", "Lucid", "Lunar",
    "Mellow", "Merry", "Mighty", "Misty", "Modest", "Mossy", "Nimble", "Noble", "Olive",
    "Opal", "Ornate", "Pale", "Patient", "Peppy", "Placid", "Plucky", "Polished", "Proud",
    "Quick", "Quiet", "Radiant", "Rapid", "Regal", "Robust", "Rosy", "Royal", "Rustic",
    "Sable", "Sandy", "Scarlet", "Serene", "Sharp", "Silent", "Silver", "Sleek", "Solar",
    "Solid", "Spry", "Stable", "Stark", "Steady", "Stoic", "Stormy", "Sturdy", "Subtle",
    "Sunny", "Swift", "Tidy", "Timely", "Tranquil", "Trusty", "Velvet", "Vivid", "Warm",
    "Wise", "Witty", "Zesty",
];

pub(crate) const NOUNS: &[&str] = &[
    "Acorn", "Anchor", "Arbor", "Arrow", "Aspen", "Badger", "Banner", "Basin", "Beacon",
    "Bell", "Birch", "Bison", "Bluff", "Bridge", "Brook", "Canyon", "Cedar", "Cliff",
    "Cloud", "Comet", "Compass", "Condor", "Coral", "Cove", "Crane", "Crater", "Creek",
    "Crow", "Current", "Cypress", "Dale", "Delta", "Dune", "Eagle", "Ember", "Falcon",
    "Fern", "Finch", "Fjord", "Flint", "Forest", "Fox", "Garnet", "Geyser", "Glacier",
    "Glade", "Grove", "Harbor", "Hawk", "Heron", "Hollow", "Island", "Jasper", "Juniper",
    "Lagoon", "Lake", "Lantern", "Larch", "Lark", "Ledge", "Lynx", "Maple", "Marsh",
    "Meadow", "Mesa", "Meteor", "Mountain", "Nebula", "Oak", "Ocean", "Orchard", "Osprey",
    "Otter", "Owl", "Panther", "Peak", "Pebble", "Pine", "Plateau", "Pond", "Prairie",
    "Quarry", "Raven", "Reef", "Ridge", "River", "Sage", "Salmon", "Sequoia", "Shore",
    "Sparrow", "Spruce", "Summit", "Thicket", "Tide", "Timber", "Trail", "Tundra", "Valley",
    "Willow",
];

/// Generate a fresh friendly ID for a task of the given tool.
pub fn generate_task_id(tool: &str) -> String {
    let mut rng = rand::thread_rng();
    let first = ADJECTIVES.choose(&mut rng).expect("adjective list is non-empty");
    let second = ADJECTIVES.choose(&mut rng).expect("adjective list is non-empty");
    let noun = NOUNS.choose(&mut rng).expect("noun list is non-empty");
    format!("task-{}-{}-{}-{}", tool, first, second, noun)
}
