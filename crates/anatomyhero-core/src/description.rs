//! Part descriptions: local catalogue, encyclopedia summaries, and the
//! request generation that keeps late responses from overwriting newer ones

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum DescriptionError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("No summary available for {0}")]
    MissingExtract(String),
}

/// Text shown in the description panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    pub title: String,
    pub info: String,
}

impl Description {
    pub fn new(title: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            info: info.into(),
        }
    }

    /// Shown when no source could describe the part
    pub fn fallback(name: &str) -> Self {
        Self {
            title: name.to_string(),
            info: format!("No description is available for {name} right now."),
        }
    }
}

/// Description panel state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DescriptionPanel {
    #[default]
    Closed,
    Loading {
        name: String,
    },
    Shown(Description),
}

impl DescriptionPanel {
    pub fn is_open(&self) -> bool {
        !matches!(self, DescriptionPanel::Closed)
    }
}

/// Handle for one outstanding description lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionTicket {
    pub generation: u64,
    pub name: String,
}

/// Tracks the current description request. Only the response for the most
/// recent ticket is applied; anything older is dropped.
#[derive(Debug, Default)]
pub struct DescriptionRequests {
    generation: u64,
    panel: DescriptionPanel,
}

impl DescriptionRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panel(&self) -> &DescriptionPanel {
        &self.panel
    }

    /// Start a lookup; the panel shows a loading state until it resolves
    pub fn begin(&mut self, name: &str) -> DescriptionTicket {
        self.generation += 1;
        debug!(generation = self.generation, name = %name, "Description requested");
        self.panel = DescriptionPanel::Loading {
            name: name.to_string(),
        };
        DescriptionTicket {
            generation: self.generation,
            name: name.to_string(),
        }
    }

    /// Apply a response. Failures become the fallback text. Returns false if
    /// the ticket was stale and the response discarded.
    pub fn resolve(
        &mut self,
        ticket: &DescriptionTicket,
        result: Result<Description, DescriptionError>,
    ) -> bool {
        if ticket.generation != self.generation {
            info!(
                name = %ticket.name,
                generation = ticket.generation,
                current = self.generation,
                "Discarding stale description response"
            );
            return false;
        }
        let description = match result {
            Ok(d) => d,
            Err(e) => {
                debug!(name = %ticket.name, error = %e, "Description lookup failed");
                Description::fallback(&ticket.name)
            }
        };
        self.panel = DescriptionPanel::Shown(description);
        true
    }

    /// Close the panel; any in-flight response becomes stale
    pub fn close(&mut self) {
        if self.panel == DescriptionPanel::Closed {
            return;
        }
        self.generation += 1;
        self.panel = DescriptionPanel::Closed;
    }
}

const SAMPLE_PARTS: &[(&str, &[&str])] = &[
    ("skeletal", &["Skull", "Vertebrae", "Ribs", "Pelvis", "Femur", "Tibia", "Humerus"]),
    ("joints", &["Knee Joint", "Hip Joint", "Shoulder Joint", "Elbow Joint", "Ankle Joint"]),
    ("muscular", &["Biceps", "Triceps", "Quadriceps", "Hamstrings", "Pectoralis"]),
    ("fasciate", &["Thoracolumbar Fascia", "Plantar Fascia", "Cervical Fascia"]),
    ("arterial", &["Aorta", "Carotid Artery", "Femoral Artery", "Brachial Artery"]),
    ("venous", &["Jugular Vein", "Femoral Vein", "Superior Vena Cava", "Portal Vein"]),
    ("lymphoid", &["Lymph Nodes", "Thymus", "Spleen", "Tonsils", "Lymphatic Vessels"]),
    ("nervous", &["Brain", "Spinal Cord", "Cranial Nerves", "Sciatic Nerve", "Brachial Plexus"]),
    ("visceral", &["Heart", "Lungs", "Liver", "Stomach", "Intestines", "Kidneys"]),
    ("regions", &["Head", "Neck", "Thorax", "Abdomen", "Upper Limb", "Lower Limb"]),
    ("movements", &["Flexion", "Extension", "Abduction", "Adduction", "Rotation"]),
];

/// One catalogue record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Slug of the form `<system>-<part-with-dashes>`
    pub id: String,
    pub name: String,
    pub system: String,
    pub description: String,
}

/// Static lookup consulted before any network source
#[derive(Debug, Clone)]
pub struct DescriptionCatalog {
    entries: Vec<CatalogEntry>,
}

impl Default for DescriptionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DescriptionCatalog {
    /// Catalogue built from the bundled sample parts of every system
    pub fn builtin() -> Self {
        let entries = SAMPLE_PARTS
            .iter()
            .flat_map(|(system, parts)| {
                parts.iter().map(move |part| CatalogEntry {
                    id: format!("{system}-{}", part.to_lowercase().replace(' ', "-")),
                    name: part.to_string(),
                    system: system.to_string(),
                    description: format!("This is the {part} of the {system} system."),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Case-insensitive lookup by part name
    pub fn lookup(&self, name: &str) -> Option<Description> {
        let needle = name.trim().to_lowercase();
        self.entries
            .iter()
            .find(|e| e.name.to_lowercase() == needle)
            .map(|e| Description::new(e.name.clone(), e.description.clone()))
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The fields of a REST page summary response that we use
#[derive(Debug, Clone, Deserialize)]
pub struct WikiSummary {
    pub title: String,
    #[serde(default)]
    pub extract: Option<String>,
}

impl WikiSummary {
    pub fn parse(body: &str) -> Result<Self, DescriptionError> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn into_description(self) -> Result<Description, DescriptionError> {
        match self.extract {
            Some(extract) if !extract.trim().is_empty() => Ok(Description::new(self.title, extract)),
            _ => Err(DescriptionError::MissingExtract(self.title)),
        }
    }
}

/// Parse a summary body straight into a description
pub fn description_from_summary(body: &str) -> Result<Description, DescriptionError> {
    WikiSummary::parse(body)?.into_description()
}

/// Summary URL for a part name: spaces become underscores and reserved
/// characters are percent-encoded
pub fn summary_url(base: &str, name: &str) -> String {
    let mut title = String::with_capacity(name.len());
    for c in name.trim().chars() {
        match c {
            ' ' => title.push('_'),
            c if c.is_ascii_alphanumeric() || "-_.()',".contains(c) => title.push(c),
            c => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    title.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    if base.ends_with('/') {
        format!("{base}{title}")
    } else {
        format!("{base}/{title}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let catalog = DescriptionCatalog::builtin();
        assert_eq!(catalog.len(), 55);

        let heart = catalog.lookup("heart").unwrap();
        assert_eq!(heart.title, "Heart");
        assert_eq!(heart.info, "This is the Heart of the visceral system.");

        let entry = catalog.entries().iter().find(|e| e.name == "Knee Joint").unwrap();
        assert_eq!(entry.id, "joints-knee-joint");

        assert!(catalog.lookup("Appendix").is_none());
    }

    #[test]
    fn test_stale_response_discarded() {
        let mut requests = DescriptionRequests::new();
        let heart = requests.begin("Heart");
        let liver = requests.begin("Liver");

        assert!(!requests.resolve(&heart, Ok(Description::new("Heart", "pumps"))));
        assert_eq!(
            requests.panel(),
            &DescriptionPanel::Loading {
                name: "Liver".to_string()
            }
        );

        assert!(requests.resolve(&liver, Ok(Description::new("Liver", "filters"))));
        assert_eq!(
            requests.panel(),
            &DescriptionPanel::Shown(Description::new("Liver", "filters"))
        );
    }

    #[test]
    fn test_close_invalidates_in_flight() {
        let mut requests = DescriptionRequests::new();
        let ticket = requests.begin("Heart");
        requests.close();
        assert!(!requests.resolve(&ticket, Ok(Description::new("Heart", "x"))));
        assert_eq!(requests.panel(), &DescriptionPanel::Closed);
    }

    #[test]
    fn test_failure_shows_fallback() {
        let mut requests = DescriptionRequests::new();
        let ticket = requests.begin("Spleen");
        assert!(requests.resolve(&ticket, Err(DescriptionError::Status(404))));
        assert_eq!(
            requests.panel(),
            &DescriptionPanel::Shown(Description::fallback("Spleen"))
        );
    }

    #[test]
    fn test_wiki_summary_parsing() {
        let body = r#"{"type":"standard","title":"Heart","extract":"The heart is a muscular organ."}"#;
        let d = description_from_summary(body).unwrap();
        assert_eq!(d.title, "Heart");
        assert_eq!(d.info, "The heart is a muscular organ.");

        let empty = r#"{"title":"Nothing","extract":""}"#;
        assert!(matches!(
            description_from_summary(empty),
            Err(DescriptionError::MissingExtract(_))
        ));
        assert!(description_from_summary("not json").is_err());
    }

    #[test]
    fn test_summary_url() {
        let base = "https://en.wikipedia.org/api/rest_v1/page/summary/";
        assert_eq!(
            summary_url(base, "Superior Vena Cava"),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Superior_Vena_Cava"
        );
        assert_eq!(summary_url("http://x/summary", "A/B"), "http://x/summary/A%2FB");
    }
}
