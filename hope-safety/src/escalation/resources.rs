//! Jurisdiction-keyed emergency resource lookup.
//!
//! The built-in table covers a handful of countries plus an international
//! fallback. A JSON file keyed by ISO country code (optionally `CC:REGION`)
//! can override or extend it at startup:
//!
//! ```json
//! {
//!   "NZ": {
//!     "country_name": "New Zealand",
//!     "emergency_number": "111",
//!     "resources": [
//!       { "name": "Need to Talk?", "resource_type": "hotline", "contact": "1737",
//!         "description": "Free call or text", "available_24_7": true }
//!     ]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::types::Result;

/// Key used for the international fallback.
pub const INTERNATIONAL: &str = "INTL";

const DEFAULT_MAX_LISTED: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Hotline,
    Text,
    Website,
    Hospital,
    Chat,
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyResource {
    pub name: String,
    pub resource_type: ResourceType,
    /// Phone number, short code, URL or instruction
    pub contact: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub available_24_7: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

impl EmergencyResource {
    pub fn new(name: &str, resource_type: ResourceType, contact: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            resource_type,
            contact: contact.to_string(),
            description: description.to_string(),
            available_24_7: true,
            languages: default_languages(),
        }
    }

    fn limited_hours(mut self) -> Self {
        self.available_24_7 = false;
        self
    }

    fn languages(mut self, languages: &[&str]) -> Self {
        self.languages = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    /// One-line markdown rendering for users.
    pub fn format_for_user(&self) -> String {
        let mut line = format!("• **{}**: {}", self.name, self.contact);
        if self.available_24_7 {
            line.push_str(" (24/7)");
        }
        line
    }
}

/// Resources for one jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionResources {
    pub country_code: String,
    pub country_name: String,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    pub resources: Vec<EmergencyResource>,
    #[serde(default)]
    pub emergency_number: Option<String>,
}

impl JurisdictionResources {
    pub fn crisis_hotlines(&self) -> impl Iterator<Item = &EmergencyResource> {
        self.resources.iter().filter(|r| r.resource_type == ResourceType::Hotline)
    }

    pub fn text_lines(&self) -> impl Iterator<Item = &EmergencyResource> {
        self.resources.iter().filter(|r| r.resource_type == ResourceType::Text)
    }

    pub fn format_all(&self) -> String {
        self.resources
            .iter()
            .map(EmergencyResource::format_for_user)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Entry shape accepted in a resources file.
#[derive(Debug, Clone, Deserialize)]
struct JurisdictionEntry {
    country_name: String,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    emergency_number: Option<String>,
    #[serde(default)]
    resources: Vec<EmergencyResource>,
}

/// Resolves crisis resources by jurisdiction.
#[derive(Debug, Clone)]
pub struct EmergencyResourceResolver {
    jurisdictions: HashMap<String, JurisdictionResources>,
    international: JurisdictionResources,
    max_listed: usize,
}

impl EmergencyResourceResolver {
    /// Resolver over the built-in table.
    pub fn builtin() -> Self {
        let jurisdictions = builtin_jurisdictions()
            .into_iter()
            .map(|j| (j.country_code.clone(), j))
            .collect();
        Self {
            jurisdictions,
            international: international_resources(),
            max_listed: DEFAULT_MAX_LISTED,
        }
    }

    /// Built-in table with the entries of a JSON resources file merged over it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let resolver = Self::builtin().with_json(&text)?;
        info!(
            path = %path.as_ref().display(),
            jurisdictions = resolver.jurisdictions.len(),
            "Loaded emergency resources"
        );
        Ok(resolver)
    }

    /// Merge JSON-encoded jurisdiction entries over the current table.
    pub fn with_json(mut self, json: &str) -> Result<Self> {
        let entries: HashMap<String, JurisdictionEntry> = serde_json::from_str(json)?;
        for (key, entry) in entries {
            let (country, region) = split_key(&key);
            let resources = JurisdictionResources {
                country_code: country.clone(),
                country_name: entry.country_name,
                region_code: region,
                region_name: entry.region_name,
                resources: entry.resources,
                emergency_number: entry.emergency_number,
            };
            if country == INTERNATIONAL {
                self.international = resources;
            } else {
                self.jurisdictions.insert(normalize_key(&key), resources);
            }
        }
        Ok(self)
    }

    pub fn with_max_listed(mut self, max_listed: usize) -> Self {
        self.max_listed = max_listed.max(1);
        self
    }

    /// Most specific match: `CC:REGION`, then `CC`, then the international set.
    pub fn get_resources(&self, country_code: &str, region_code: Option<&str>) -> &JurisdictionResources {
        let country = country_code.trim().to_ascii_uppercase();
        if let Some(region) = region_code {
            let key = format!("{}:{}", country, region.trim().to_ascii_uppercase());
            if let Some(found) = self.jurisdictions.get(&key) {
                return found;
            }
        }
        if let Some(found) = self.jurisdictions.get(&country) {
            return found;
        }
        warn!(country = %country, "No resources for jurisdiction, using international fallback");
        &self.international
    }

    /// First hotline for a jurisdiction.
    pub fn primary_hotline(&self, country_code: &str) -> Option<&EmergencyResource> {
        self.get_resources(country_code, None).crisis_hotlines().next()
    }

    /// Names of the resources a crisis message would list.
    pub fn listed_resource_names(&self, country_code: &str) -> Vec<String> {
        self.get_resources(country_code, None)
            .resources
            .iter()
            .take(self.max_listed)
            .map(|r| r.name.clone())
            .collect()
    }

    /// Markdown block with the top resources for a jurisdiction.
    ///
    /// `include_emergency` adds the general emergency number when the
    /// jurisdiction has one.
    pub fn format_crisis_message(&self, country_code: &str, include_emergency: bool) -> String {
        let jurisdiction = self.get_resources(country_code, None);

        let mut lines = vec![
            "---".to_string(),
            "**If you're in crisis or having thoughts of self-harm:**\n".to_string(),
        ];

        if include_emergency {
            if let Some(number) = &jurisdiction.emergency_number {
                lines.push(format!("• **Emergency**: {}", number));
            }
        }

        lines.extend(
            jurisdiction
                .resources
                .iter()
                .take(self.max_listed)
                .map(EmergencyResource::format_for_user),
        );

        lines.push(String::new());
        lines.push("You don't have to face this alone. Professional support is available.".to_string());

        lines.join("\n")
    }

    /// Country codes with dedicated resources, sorted.
    pub fn supported_countries(&self) -> Vec<String> {
        let mut countries: Vec<String> = self
            .jurisdictions
            .values()
            .map(|j| j.country_code.clone())
            .collect();
        countries.sort();
        countries.dedup();
        countries
    }
}

impl Default for EmergencyResourceResolver {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

fn split_key(key: &str) -> (String, Option<String>) {
    let key = normalize_key(key);
    match key.split_once(':') {
        Some((country, region)) => (country.to_string(), Some(region.to_string())),
        None => (key, None),
    }
}

fn international_resources() -> JurisdictionResources {
    JurisdictionResources {
        country_code: INTERNATIONAL.to_string(),
        country_name: "International".to_string(),
        region_code: None,
        region_name: None,
        resources: vec![
            EmergencyResource::new(
                "International Association for Suicide Prevention",
                ResourceType::Website,
                "https://www.iasp.info/resources/Crisis_Centres/",
                "Directory of crisis centres worldwide",
            ),
            EmergencyResource::new(
                "Befrienders Worldwide",
                ResourceType::Website,
                "https://www.befrienders.org/",
                "Emotional support helplines around the world",
            ),
        ],
        emergency_number: None,
    }
}

fn builtin_jurisdictions() -> Vec<JurisdictionResources> {
    let country = |code: &str, name: &str, emergency: &str, resources: Vec<EmergencyResource>| {
        JurisdictionResources {
            country_code: code.to_string(),
            country_name: name.to_string(),
            region_code: None,
            region_name: None,
            resources,
            emergency_number: Some(emergency.to_string()),
        }
    };

    vec![
        country(
            "US",
            "United States",
            "911",
            vec![
                EmergencyResource::new(
                    "988 Suicide & Crisis Lifeline",
                    ResourceType::Hotline,
                    "988",
                    "Call or text for free, confidential support",
                )
                .languages(&["en", "es"]),
                EmergencyResource::new(
                    "Crisis Text Line",
                    ResourceType::Text,
                    "Text HOME to 741741",
                    "Text with a trained crisis counselor",
                ),
                EmergencyResource::new(
                    "SAMHSA National Helpline",
                    ResourceType::Hotline,
                    "1-800-662-4357",
                    "Treatment referral and information",
                ),
            ],
        ),
        country(
            "GB",
            "United Kingdom",
            "999",
            vec![
                EmergencyResource::new("Samaritans", ResourceType::Hotline, "116 123", "Free support any time"),
                EmergencyResource::new(
                    "SHOUT",
                    ResourceType::Text,
                    "Text SHOUT to 85258",
                    "Free confidential text support",
                ),
            ],
        ),
        country(
            "SA",
            "Saudi Arabia",
            "911",
            vec![EmergencyResource::new(
                "Mental Health Hotline",
                ResourceType::Hotline,
                "920033360",
                "National mental health support line",
            )
            .languages(&["ar", "en"])],
        ),
        country(
            "AE",
            "United Arab Emirates",
            "999",
            vec![EmergencyResource::new(
                "Dubai Health Authority Mental Health",
                ResourceType::Hotline,
                "800342",
                "Mental health support line",
            )
            .limited_hours()
            .languages(&["ar", "en"])],
        ),
        country(
            "EG",
            "Egypt",
            "123",
            vec![EmergencyResource::new(
                "Befrienders Cairo",
                ResourceType::Hotline,
                "+20 2 7621602",
                "Emotional support line",
            )
            .limited_hours()],
        ),
    ]
}
