use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    pub id: String,
    pub name: String,
}

impl Interest {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

const CATALOG: [(&str, &str); 9] = [
    ("1", "Startups"),
    ("2", "Technology"),
    ("3", "Fundraising"),
    ("4", "Growth"),
    ("5", "Product"),
    ("6", "AI"),
    ("7", "Marketing"),
    ("8", "Design"),
    ("9", "Engineering"),
];

/// The fixed interest catalog offered to every reader.
pub fn default_catalog() -> Vec<Interest> {
    CATALOG
        .iter()
        .map(|(id, name)| Interest::new(*id, *name))
        .collect()
}

/// Look up a catalog entry by id or (case-insensitive) name.
pub fn find_in_catalog<'a>(catalog: &'a [Interest], key: &str) -> Option<&'a Interest> {
    catalog
        .iter()
        .find(|i| i.id == key)
        .or_else(|| catalog.iter().find(|i| i.name.eq_ignore_ascii_case(key)))
}
